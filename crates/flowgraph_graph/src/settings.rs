// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings: grid, snapping and hit-test sizes.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "flowgraph.ron";

/// Errors reading or writing the settings file
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed RON
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Tunables shared by the graph and its gestures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Grid cell size used for snapping
    pub grid_size: f32,
    /// Whether node drags snap to the grid
    pub snap_to_grid: bool,
    /// Radius of a connection point; the pointer collides as a square of the same size
    pub connection_point_radius: f32,
    /// Width of the band around a connection that counts as a hit
    pub connection_hit_width: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            grid_size: 30.0,
            snap_to_grid: false,
            connection_point_radius: 6.0,
            connection_hit_width: 20.0,
        }
    }
}

impl EditorSettings {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let contents = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Floor a coordinate to the grid
    pub fn snap(&self, value: f32) -> f32 {
        if self.grid_size > 0.0 {
            (value / self.grid_size).floor() * self.grid_size
        } else {
            value
        }
    }
}
