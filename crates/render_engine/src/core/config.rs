//! Engine configuration
//!
//! Serializable configuration for the window and renderer, loadable from a
//! TOML file or constructed in code through the builder methods.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The config file contents were not valid TOML
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Window creation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Render Engine".to_string(),
            width: 1920,
            height: 1080,
        }
    }
}

/// Renderer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Directory containing pre-compiled SPIR-V shader binaries
    pub shader_dir: PathBuf,
    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: usize,
    /// Validation layer toggle; `None` follows the build profile
    pub enable_validation: Option<bool>,
    /// Directional light intensity
    pub sunlight_intensity: f32,
    /// Ambient lighting factor applied to albedo
    pub ambient_factor: f32,
}

impl RendererConfig {
    /// Whether validation layers should be enabled for this configuration.
    #[must_use]
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation
            .unwrap_or(cfg!(debug_assertions))
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("target/shaders"),
            frames_in_flight: 2,
            enable_validation: None,
            sunlight_intensity: 1.0,
            ambient_factor: 0.1,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Window settings
    #[serde(default)]
    pub window: WindowConfig,
    /// Renderer settings
    #[serde(default)]
    pub renderer: RendererConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Set the shader directory.
    #[must_use]
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.renderer.shader_dir = dir.into();
        self
    }

    /// Set the window title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window.title = title.into();
        self
    }

    /// Validate ranges that the renderer depends on.
    pub fn validate(&self) -> Result<(), String> {
        if self.renderer.frames_in_flight == 0 {
            return Err("frames_in_flight must be at least 1".to_string());
        }
        if self.renderer.frames_in_flight > 8 {
            return Err("frames_in_flight should not exceed 8".to_string());
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err("window dimensions must be non-zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_frames_in_flight_rejected() {
        let mut config = EngineConfig::default();
        config.renderer.frames_in_flight = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            [window]
            title = "Demo"
            width = 800
            height = 600
            "#,
        )
        .expect("partial config should parse");
        assert_eq!(config.window.title, "Demo");
        assert_eq!(config.renderer.frames_in_flight, 2);
    }
}
