use bevy_math::Vec2;
use serde::{Deserialize, Serialize};

/// Texture name used for faces without a material.
pub const NO_TEXTURE_NAME: &str = "__TB_empty";

/// Numeric and material attributes of one brush face.
///
/// `rotation` is in degrees. The texture axes of the face's coordinate system
/// depend on it, so change it through [`crate::BrushFace::set_rotation`] rather
/// than writing the field of a face's attributes directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushFaceAttributes {
    pub texture_name: String,
    pub offset: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
    pub surface_contents: i32,
    pub surface_flags: i32,
    pub surface_value: f32,
}

impl Default for BrushFaceAttributes {
    fn default() -> Self {
        Self::new(NO_TEXTURE_NAME)
    }
}

impl BrushFaceAttributes {
    pub fn new(texture_name: impl Into<String>) -> Self {
        Self {
            texture_name: texture_name.into(),
            offset: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            surface_contents: 0,
            surface_flags: 0,
            surface_value: 0.0,
        }
    }

    /// A zero scale component makes texture projection singular.
    pub fn valid(&self) -> bool {
        self.scale.x != 0.0 && self.scale.y != 0.0
    }

    pub fn has_texture(&self) -> bool {
        self.texture_name != NO_TEXTURE_NAME
    }
}
