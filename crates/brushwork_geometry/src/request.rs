//! Batched face attribute edits.
//!
//! A request records one operation per attribute and applies them together to
//! every selected face. Two requests collate when applying the merged request
//! is the same as applying both in sequence.

use crate::BrushFace;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TextureOp {
    #[default]
    None,
    Set(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisOp {
    #[default]
    None,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ValueOp {
    #[default]
    None,
    Set(f32),
    Add(f32),
    Mul(f32),
}

impl ValueOp {
    pub fn evaluate(self, value: f32) -> f32 {
        match self {
            ValueOp::None => value,
            ValueOp::Set(v) => v,
            ValueOp::Add(v) => value + v,
            ValueOp::Mul(v) => value * v,
        }
    }

    /// The single op equivalent to `self` followed by `then`, if there is one.
    fn collate(self, then: ValueOp) -> Option<ValueOp> {
        match (self, then) {
            (mine, ValueOp::None) => Some(mine),
            (ValueOp::None, theirs) => Some(theirs),
            (_, ValueOp::Set(b)) => Some(ValueOp::Set(b)),
            (ValueOp::Set(a), ValueOp::Add(b)) => Some(ValueOp::Set(a + b)),
            (ValueOp::Set(a), ValueOp::Mul(b)) => Some(ValueOp::Set(a * b)),
            (ValueOp::Add(a), ValueOp::Add(b)) => Some(ValueOp::Add(a + b)),
            (ValueOp::Mul(a), ValueOp::Mul(b)) => Some(ValueOp::Mul(a * b)),
            (ValueOp::Add(_), ValueOp::Mul(_)) | (ValueOp::Mul(_), ValueOp::Add(_)) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagOp {
    #[default]
    None,
    Replace(i32),
    Set(i32),
    Unset(i32),
}

impl FlagOp {
    pub fn evaluate(self, flags: i32) -> i32 {
        match self {
            FlagOp::None => flags,
            FlagOp::Replace(v) => v,
            FlagOp::Set(v) => flags | v,
            FlagOp::Unset(v) => flags & !v,
        }
    }

    fn collate(self, then: FlagOp) -> Option<FlagOp> {
        match (self, then) {
            (mine, FlagOp::None) => Some(mine),
            (FlagOp::None, theirs) => Some(theirs),
            (_, FlagOp::Replace(b)) => Some(FlagOp::Replace(b)),
            (FlagOp::Replace(a), FlagOp::Set(b)) => Some(FlagOp::Replace(a | b)),
            (FlagOp::Replace(a), FlagOp::Unset(b)) => Some(FlagOp::Replace(a & !b)),
            (FlagOp::Set(a), FlagOp::Set(b)) => Some(FlagOp::Set(a | b)),
            (FlagOp::Unset(a), FlagOp::Unset(b)) => Some(FlagOp::Unset(a | b)),
            (FlagOp::Set(_), FlagOp::Unset(_)) | (FlagOp::Unset(_), FlagOp::Set(_)) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeBrushFaceAttributesRequest {
    texture: TextureOp,
    axis: AxisOp,
    x_offset: ValueOp,
    y_offset: ValueOp,
    rotation: ValueOp,
    x_scale: ValueOp,
    y_scale: ValueOp,
    surface_value: ValueOp,
    surface_flags: FlagOp,
    contents_flags: FlagOp,
}

impl ChangeBrushFaceAttributesRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &'static str {
        "Change Face Attributes"
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn set_texture(&mut self, texture_name: impl Into<String>) -> &mut Self {
        self.texture = TextureOp::Set(texture_name.into());
        self
    }

    pub fn reset_texture_axes(&mut self) -> &mut Self {
        self.axis = AxisOp::Reset;
        self
    }

    pub fn set_x_offset(&mut self, value: f32) -> &mut Self {
        self.x_offset = ValueOp::Set(value);
        self
    }

    pub fn set_y_offset(&mut self, value: f32) -> &mut Self {
        self.y_offset = ValueOp::Set(value);
        self
    }

    pub fn set_offset(&mut self, x: f32, y: f32) -> &mut Self {
        self.set_x_offset(x).set_y_offset(y)
    }

    pub fn add_offset(&mut self, x: f32, y: f32) -> &mut Self {
        self.x_offset = ValueOp::Add(x);
        self.y_offset = ValueOp::Add(y);
        self
    }

    pub fn set_rotation(&mut self, degrees: f32) -> &mut Self {
        self.rotation = ValueOp::Set(degrees);
        self
    }

    pub fn add_rotation(&mut self, degrees: f32) -> &mut Self {
        self.rotation = ValueOp::Add(degrees);
        self
    }

    pub fn set_x_scale(&mut self, value: f32) -> &mut Self {
        self.x_scale = ValueOp::Set(value);
        self
    }

    pub fn set_y_scale(&mut self, value: f32) -> &mut Self {
        self.y_scale = ValueOp::Set(value);
        self
    }

    pub fn set_scale(&mut self, x: f32, y: f32) -> &mut Self {
        self.set_x_scale(x).set_y_scale(y)
    }

    pub fn mul_scale(&mut self, x: f32, y: f32) -> &mut Self {
        self.x_scale = ValueOp::Mul(x);
        self.y_scale = ValueOp::Mul(y);
        self
    }

    pub fn set_surface_value(&mut self, value: f32) -> &mut Self {
        self.surface_value = ValueOp::Set(value);
        self
    }

    pub fn set_surface_flag(&mut self, flag: i32) -> &mut Self {
        self.surface_flags = FlagOp::Set(flag);
        self
    }

    pub fn unset_surface_flag(&mut self, flag: i32) -> &mut Self {
        self.surface_flags = FlagOp::Unset(flag);
        self
    }

    pub fn replace_surface_flags(&mut self, flags: i32) -> &mut Self {
        self.surface_flags = FlagOp::Replace(flags);
        self
    }

    pub fn set_contents_flag(&mut self, flag: i32) -> &mut Self {
        self.contents_flags = FlagOp::Set(flag);
        self
    }

    pub fn unset_contents_flag(&mut self, flag: i32) -> &mut Self {
        self.contents_flags = FlagOp::Unset(flag);
        self
    }

    pub fn replace_contents_flags(&mut self, flags: i32) -> &mut Self {
        self.contents_flags = FlagOp::Replace(flags);
        self
    }

    /// Offsets to 0, rotation to 0, scale to 1 and fresh texture axes.
    pub fn reset_all(&mut self) -> &mut Self {
        self.set_offset(0.0, 0.0)
            .set_rotation(0.0)
            .set_scale(1.0, 1.0)
            .reset_texture_axes()
    }

    /// Apply the request. The axis reset comes last so it sees the final rotation.
    pub fn evaluate(&self, face: &mut BrushFace) {
        if let TextureOp::Set(name) = &self.texture {
            face.set_texture(name.clone());
        }

        let attributes = face.attributes().clone();
        face.set_x_offset(self.x_offset.evaluate(attributes.offset.x));
        face.set_y_offset(self.y_offset.evaluate(attributes.offset.y));
        face.set_x_scale(self.x_scale.evaluate(attributes.scale.x));
        face.set_y_scale(self.y_scale.evaluate(attributes.scale.y));
        if self.rotation != ValueOp::None {
            face.set_rotation(self.rotation.evaluate(attributes.rotation));
        }
        face.set_surface_flags(self.surface_flags.evaluate(attributes.surface_flags));
        face.set_surface_contents(self.contents_flags.evaluate(attributes.surface_contents));
        face.set_surface_value(self.surface_value.evaluate(attributes.surface_value));

        if self.axis == AxisOp::Reset {
            face.reset_texture_axes();
        }
    }

    /// Merge `other` (applied after `self`) into `self`. Leaves `self`
    /// untouched and returns false when no single request is equivalent.
    pub fn collate_with(&mut self, other: &ChangeBrushFaceAttributesRequest) -> bool {
        if self.axis == AxisOp::Reset && other.rotation != ValueOp::None {
            return false;
        }

        match self.merged_with(other) {
            Some(merged) => {
                *self = merged;
                true
            }
            None => false,
        }
    }

    fn merged_with(&self, other: &ChangeBrushFaceAttributesRequest) -> Option<Self> {
        Some(Self {
            texture: match &other.texture {
                TextureOp::None => self.texture.clone(),
                theirs => theirs.clone(),
            },
            axis: match other.axis {
                AxisOp::None => self.axis,
                theirs => theirs,
            },
            x_offset: self.x_offset.collate(other.x_offset)?,
            y_offset: self.y_offset.collate(other.y_offset)?,
            rotation: self.rotation.collate(other.rotation)?,
            x_scale: self.x_scale.collate(other.x_scale)?,
            y_scale: self.y_scale.collate(other.y_scale)?,
            surface_value: self.surface_value.collate(other.surface_value)?,
            surface_flags: self.surface_flags.collate(other.surface_flags)?,
            contents_flags: self.contents_flags.collate(other.contents_flags)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use bevy_math::{Vec2, Vec3};

    use super::*;
    use crate::{BrushFaceAttributes, TexCoordSystemKind};

    fn face(kind: TexCoordSystemKind) -> BrushFace {
        BrushFace::with_kind(
            [Vec3::ZERO, Vec3::Y, Vec3::Z],
            BrushFaceAttributes::new("wall"),
            kind,
        )
        .unwrap()
    }

    #[test]
    fn reset_all_restores_parallel_axes() {
        let mut face = face(TexCoordSystemKind::Parallel);
        let initial_x = face.tex_coord_system().x_axis();
        let initial_y = face.tex_coord_system().y_axis();

        let mut rotate = ChangeBrushFaceAttributesRequest::new();
        rotate.add_rotation(2.0);
        for _ in 0..5 {
            rotate.evaluate(&mut face);
        }
        assert_eq!(face.attributes().rotation, 10.0);

        let mut reset = ChangeBrushFaceAttributesRequest::new();
        reset.reset_all();
        reset.evaluate(&mut face);

        assert_eq!(face.attributes().offset, Vec2::ZERO);
        assert_eq!(face.attributes().rotation, 0.0);
        assert_eq!(face.attributes().scale, Vec2::ONE);
        assert_eq!(face.tex_coord_system().x_axis(), initial_x);
        assert_eq!(face.tex_coord_system().y_axis(), initial_y);
    }

    #[test]
    fn evaluate_applies_every_op() {
        let mut face = face(TexCoordSystemKind::Paraxial);
        let mut request = ChangeBrushFaceAttributesRequest::new();
        request
            .set_texture("metal")
            .add_offset(4.0, -2.0)
            .mul_scale(2.0, 0.5)
            .set_surface_flag(0b100)
            .set_contents_flag(1)
            .set_surface_value(3.0);
        request.evaluate(&mut face);

        let attributes = face.attributes();
        assert_eq!(attributes.texture_name, "metal");
        assert_eq!(attributes.offset, Vec2::new(4.0, -2.0));
        assert_eq!(attributes.scale, Vec2::new(2.0, 0.5));
        assert_eq!(attributes.surface_flags, 0b100);
        assert_eq!(attributes.surface_contents, 1);
        assert_eq!(attributes.surface_value, 3.0);
    }

    #[test]
    fn value_ops_collate() {
        let mut first = ChangeBrushFaceAttributesRequest::new();
        first.add_rotation(10.0);
        let mut second = ChangeBrushFaceAttributesRequest::new();
        second.add_rotation(5.0);
        assert!(first.collate_with(&second));
        assert_eq!(first.rotation, ValueOp::Add(15.0));

        let mut set = ChangeBrushFaceAttributesRequest::new();
        set.set_rotation(30.0);
        assert!(set.collate_with(&second));
        assert_eq!(set.rotation, ValueOp::Set(35.0));

        let mut mul = ChangeBrushFaceAttributesRequest::new();
        mul.mul_scale(2.0, 2.0);
        let mut add_scale = ChangeBrushFaceAttributesRequest::new();
        add_scale.x_scale = ValueOp::Add(1.0);
        assert!(!mul.collate_with(&add_scale));
        assert_eq!(mul.x_scale, ValueOp::Mul(2.0));
    }

    #[test]
    fn flag_ops_collate() {
        let mut replace = ChangeBrushFaceAttributesRequest::new();
        replace.replace_surface_flags(0b0011);
        let mut unset = ChangeBrushFaceAttributesRequest::new();
        unset.unset_surface_flag(0b0001);
        assert!(replace.collate_with(&unset));
        assert_eq!(replace.surface_flags, FlagOp::Replace(0b0010));

        let mut set = ChangeBrushFaceAttributesRequest::new();
        set.set_surface_flag(0b0100);
        assert!(!set.collate_with(&unset));
    }

    #[test]
    fn reset_refuses_later_rotation() {
        let mut reset = ChangeBrushFaceAttributesRequest::new();
        reset.reset_all();
        let mut rotate = ChangeBrushFaceAttributesRequest::new();
        rotate.add_rotation(5.0);
        assert!(!reset.collate_with(&rotate));

        let mut texture = ChangeBrushFaceAttributesRequest::new();
        texture.set_texture("brick");
        assert!(reset.collate_with(&texture));
        assert_eq!(reset.texture, TextureOp::Set("brick".into()));
    }
}
