use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::core::compare::Tolerance;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("split_quadrants must be a positive even number, got {value}")]
    SplitQuadrants { value: u32 },

    #[error("max_dimension must be greater than zero")]
    MaxDimension,

    #[error("similarity_threshold must be in (0, 1], got {value}")]
    Threshold { value: f64 },

    #[error("background_removal_fraction must be in [0, 1), got {value}")]
    RemovalFraction { value: f64 },

    #[error("max_images must be greater than zero when set")]
    MaxImages,

    #[error("at least one file extension is required")]
    NoExtensions,
}

/// Tuning knobs for a single run. Every field has a default, so a config file
/// only needs to name the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Longer side of the normalized raster, in pixels.
    pub max_dimension: u32,
    /// Grid cell target; the grid is `split_quadrants / 2` cells per axis.
    pub split_quadrants: u32,
    pub similarity_threshold: f64,
    /// Fraction of distinct colors, most frequent first, discarded as background.
    pub background_removal_fraction: f64,
    pub max_images: Option<usize>,
    pub extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_dimension: 250,
            split_quadrants: 32,
            similarity_threshold: 0.85,
            background_removal_fraction: 0.05,
            max_images: Some(1000),
            extensions: vec!["jpg".to_string(), "jpeg".to_string()],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.split_quadrants == 0 || self.split_quadrants % 2 != 0 {
            return Err(ConfigError::SplitQuadrants {
                value: self.split_quadrants,
            });
        }
        if self.max_dimension == 0 {
            return Err(ConfigError::MaxDimension);
        }

        let t = self.similarity_threshold;
        if !t.is_finite() || t <= 0.0 || t > 1.0 {
            return Err(ConfigError::Threshold { value: t });
        }

        let f = self.background_removal_fraction;
        if !f.is_finite() || !(0.0..1.0).contains(&f) {
            return Err(ConfigError::RemovalFraction { value: f });
        }

        if self.max_images == Some(0) {
            return Err(ConfigError::MaxImages);
        }
        if self.extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(ConfigError::NoExtensions);
        }
        Ok(())
    }

    pub fn elements_per_dimension(&self) -> usize {
        (self.split_quadrants / 2) as usize
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::from_threshold(self.similarity_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.elements_per_dimension(), 16);
        assert_eq!(config.tolerance().ppm(), 150_000);
    }

    #[test]
    fn test_rejects_odd_or_zero_quadrants() {
        for value in [0, 7, 31] {
            let config = Config {
                split_quadrants: value,
                ..Config::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::SplitQuadrants { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        for value in [0.0, -0.5, 1.01, f64::NAN] {
            let config = Config {
                similarity_threshold: value,
                ..Config::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Threshold { .. })
            ));
        }

        let exact = Config {
            similarity_threshold: 1.0,
            ..Config::default()
        };
        assert!(exact.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_dimension_fraction_and_cap() {
        let zero_dim = Config {
            max_dimension: 0,
            ..Config::default()
        };
        assert!(matches!(zero_dim.validate(), Err(ConfigError::MaxDimension)));

        let fraction = Config {
            background_removal_fraction: 1.0,
            ..Config::default()
        };
        assert!(matches!(
            fraction.validate(),
            Err(ConfigError::RemovalFraction { .. })
        ));

        let cap = Config {
            max_images: Some(0),
            ..Config::default()
        };
        assert!(matches!(cap.validate(), Err(ConfigError::MaxImages)));

        let uncapped = Config {
            max_images: None,
            ..Config::default()
        };
        assert!(uncapped.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("simcull.json");
        std::fs::write(&path, r#"{ "max_dimension": 120, "max_images": null }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_dimension, 120);
        assert_eq!(config.max_images, None);
        assert_eq!(config.split_quadrants, 32);
        assert_eq!(config.similarity_threshold, 0.85);
    }

    #[test]
    fn test_load_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }
}
