use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use bevy_math::Vec3;
use brushwork_geometry::{BBox3, NO_TEXTURE_NAME, TexCoordSystemKind};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Editor settings, constructed once by the [`crate::Editor`] and handed to
/// the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub world_bounds: BBox3,
    /// Maximum number of undo entries; 0 keeps everything.
    pub history_limit: usize,
    pub collation_window_ms: u64,
    pub texture_lock: bool,
    pub default_texture: String,
    pub default_tex_coord_system: TexCoordSystemKind,
    pub grid_size: f32,
    /// Entity classes that never own brushes. Every other class is expected
    /// to have at least one.
    pub point_entity_classes: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            world_bounds: BBox3::centered(8192.0),
            history_limit: 100,
            collation_window_ms: 1000,
            texture_lock: true,
            default_texture: NO_TEXTURE_NAME.to_owned(),
            default_tex_coord_system: TexCoordSystemKind::Paraxial,
            grid_size: 16.0,
            point_entity_classes: ["info_player_start", "info_player_deathmatch", "info_null", "light"]
                .map(str::to_owned)
                .to_vec(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("world bounds must have min < max on every axis, got {min} .. {max}")]
    InvalidWorldBounds { min: Vec3, max: Vec3 },
    #[error("grid size must be positive, got {0}")]
    InvalidGridSize(f32),
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&json)
    }

    /// Load `path`, falling back to the defaults when it does not exist. An
    /// existing file that fails to load is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("no editor config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path).with_context(|| format!("loading editor config from {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let BBox3 { min, max } = self.world_bounds;
        if !min.cmplt(max).all() {
            return Err(ConfigError::InvalidWorldBounds { min, max });
        }
        if self.grid_size.is_nan() || self.grid_size <= 0.0 {
            return Err(ConfigError::InvalidGridSize(self.grid_size));
        }
        Ok(())
    }

    pub fn collation_window(&self) -> Duration {
        Duration::from_millis(self.collation_window_ms)
    }

    pub fn is_point_entity_class(&self, classname: &str) -> bool {
        self.point_entity_classes.iter().any(|c| c == classname)
    }
}
