//! Settings for the 3D mouse pipeline, persisted as TOML
//!
//! Missing files fall back to defaults so a fresh install works without any
//! setup; invalid values are rejected by [`SpaceNavSettings::validate`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::controller::axis::{AxisNormalizer, OperatingMode};
use crate::controller::response::{ResponseCurve, ResponseProfile};

const CONFIG_DIR_NAME: &str = "spacenav3d";
const CONFIG_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine the user config directory")]
    NoConfigDir,

    #[error("Config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceNavSettings {
    /// Name the driver registers the connection under
    pub application_name: String,
    /// Initial operating mode
    pub mode: OperatingMode,
    /// Period of the dispatch loop, one tick per host frame
    pub dispatch_interval_ms: u64,
    pub normalizer: AxisNormalizer,
    pub response: ResponseProfile,
}

impl Default for SpaceNavSettings {
    fn default() -> Self {
        Self {
            application_name: "SpaceNav3D".to_string(),
            mode: OperatingMode::default(),
            dispatch_interval_ms: 16,
            normalizer: AxisNormalizer::default(),
            response: ResponseProfile::default(),
        }
    }
}

impl SpaceNavSettings {
    /// `<config_dir>/spacenav3d/settings.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path()?)
    }

    /// Loads and validates settings; a missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&text)?;
        settings.validate()?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).map_err(io_err)?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.normalizer {
            AxisNormalizer::SignedRange {
                negative_span,
                positive_span,
            } => {
                positive("normalizer.negative_span", negative_span)?;
                positive("normalizer.positive_span", positive_span)?;
            }
            AxisNormalizer::ScaledCurve {
                denominator,
                damping,
                edit_scale,
                play_scale,
                offset,
            } => {
                positive("normalizer.denominator", denominator)?;
                non_negative("normalizer.damping", damping)?;
                non_negative("normalizer.edit_scale", edit_scale)?;
                non_negative("normalizer.play_scale", play_scale)?;
                unit_interval("normalizer.offset", offset)?;
            }
        }

        let response = &self.response;
        validate_curve("response.pan", &response.pan)?;
        validate_curve("response.rotate", &response.rotate)?;
        validate_curve("response.trigger", &response.trigger)?;
        validate_curve("response.roll", &response.roll)?;
        unit_interval("response.downstream_deadzone", response.downstream_deadzone)?;

        if self.dispatch_interval_ms == 0 {
            return Err(invalid("dispatch_interval_ms", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, "must be a finite value greater than 0"))
    }
}

fn non_negative(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, "must be a finite value of at least 0"))
    }
}

fn unit_interval(field: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, "must lie within [0, 1]"))
    }
}

fn validate_curve(field: &str, curve: &ResponseCurve) -> Result<(), ConfigError> {
    if !(0.0..1.0).contains(&curve.threshold) {
        return Err(invalid(&format!("{field}.threshold"), "must lie within [0, 1)"));
    }
    unit_interval(&format!("{field}.linear_blend"), curve.linear_blend)?;
    non_negative(&format!("{field}.gain"), curve.gain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        assert!(SpaceNavSettings::default().validate().is_ok());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = SpaceNavSettings::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, SpaceNavSettings::default());
    }

    #[test]
    fn save_then_load_keeps_custom_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut settings = SpaceNavSettings::default();
        settings.mode = OperatingMode::Play;
        settings.normalizer = AxisNormalizer::signed_range();
        settings.response.rotate.gain = 2.0;
        settings.save_to(&path).unwrap();

        assert_eq!(SpaceNavSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "mode = \"play\"\n\n[normalizer]\nkind = \"signed_range\"\nnegative_span = 2048.0\npositive_span = 2047.0\n",
        )
        .unwrap();

        let settings = SpaceNavSettings::load_from(&path).unwrap();
        assert_eq!(settings.mode, OperatingMode::Play);
        assert_eq!(settings.normalizer, AxisNormalizer::signed_range());
        assert_eq!(settings.response, ResponseProfile::default());
    }

    #[test]
    fn blend_outside_unit_interval_is_rejected() {
        let mut settings = SpaceNavSettings::default();
        settings.response.pan.linear_blend = 1.5;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "response.pan.linear_blend"
        ));
    }

    #[test]
    fn zero_denominator_is_rejected() {
        let mut settings = SpaceNavSettings::default();
        settings.normalizer = AxisNormalizer::SignedRange {
            negative_span: 0.0,
            positive_span: 2047.0,
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn invalid_file_fails_to_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "dispatch_interval_ms = 0\n").unwrap();
        assert!(matches!(
            SpaceNavSettings::load_from(&path),
            Err(ConfigError::Invalid { .. })
        ));

        fs::write(&path, "mode = [").unwrap();
        assert!(matches!(
            SpaceNavSettings::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
