//! Board configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes.

use crate::collaboration::{DEFAULT_CURSOR_INTERVAL, DEFAULT_MAX_REJOIN_ATTEMPTS};
use crate::history::DEFAULT_HISTORY_DEPTH;
use crate::shapes::{ARROW_HEAD_LENGTH, DEFAULT_COLOR, DEFAULT_STROKE_WIDTH, SerializableColor};
use crate::tools::{DEFAULT_ERASER_SCALE, DEFAULT_STICKY_TEXT, EraserMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default canvas background.
pub const DEFAULT_BACKGROUND: SerializableColor = SerializableColor::rgb(0x0a, 0x0f, 0x1a);

/// Default grid spacing in world units.
pub const DEFAULT_GRID_SIZE: f64 = 40.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunable settings for a [`crate::board::Whiteboard`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background_color: SerializableColor,
    pub show_grid: bool,
    pub grid_size: f64,
    /// Number of scene snapshots kept for undo.
    pub history_depth: usize,
    pub default_color: SerializableColor,
    pub default_stroke_width: f64,
    /// Eraser width as a multiple of the stroke width.
    pub eraser_scale: f64,
    pub eraser_mode: EraserMode,
    pub sticky_placeholder: String,
    /// Arrow head length in screen pixels.
    pub arrow_head_length: f64,
    pub cursor_interval_ms: u64,
    pub max_rejoin_attempts: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1920,
            canvas_height: 1080,
            background_color: DEFAULT_BACKGROUND,
            show_grid: true,
            grid_size: DEFAULT_GRID_SIZE,
            history_depth: DEFAULT_HISTORY_DEPTH,
            default_color: DEFAULT_COLOR,
            default_stroke_width: DEFAULT_STROKE_WIDTH,
            eraser_scale: DEFAULT_ERASER_SCALE,
            eraser_mode: EraserMode::default(),
            sticky_placeholder: DEFAULT_STICKY_TEXT.to_string(),
            arrow_head_length: ARROW_HEAD_LENGTH,
            cursor_interval_ms: DEFAULT_CURSOR_INTERVAL.as_millis() as u64,
            max_rejoin_attempts: DEFAULT_MAX_REJOIN_ATTEMPTS,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is not a positive number"),
        })
    }
}

impl BoardConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        log::info!("Loading board config from {}", path.display());
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(ConfigError::Invalid {
                field: "canvas",
                reason: format!("{}x{} is empty", self.canvas_width, self.canvas_height),
            });
        }
        positive("grid_size", self.grid_size)?;
        positive("default_stroke_width", self.default_stroke_width)?;
        positive("eraser_scale", self.eraser_scale)?;
        positive("arrow_head_length", self.arrow_head_length)?;
        if self.history_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "history_depth",
                reason: "must keep at least one snapshot".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BoardConfig::default();
        assert_eq!(config.history_depth, 50);
        assert_eq!(config.default_color.to_hex(), "#00d4aa");
        assert_eq!(config.default_stroke_width, 3.0);
        assert_eq!(config.cursor_interval_ms, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            BoardConfig::from_json(r#"{"history_depth": 10, "eraser_mode": "delete"}"#).unwrap();
        assert_eq!(config.history_depth, 10);
        assert_eq!(config.eraser_mode, EraserMode::Delete);
        assert_eq!(config.canvas_width, 1920);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            BoardConfig::from_json(r#"{"grid_size": -1.0}"#),
            Err(ConfigError::Invalid { field: "grid_size", .. })
        ));
        assert!(matches!(
            BoardConfig::from_json(r#"{"history_depth": 0}"#),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            BoardConfig::from_json("[1,2]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        std::fs::write(&path, r#"{"show_grid": false}"#).unwrap();
        let config = BoardConfig::load(&path).unwrap();
        assert!(!config.show_grid);
    }
}
