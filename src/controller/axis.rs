//! Axis Normalizer - raw device counts to normalized floats
//!
//! Converts one signed axis sample from the driver into a float in `[-1, 1]`.
//! Two normalizers are supported:
//!
//! - [`AxisNormalizer::SignedRange`]: plain division with separate spans for
//!   the negative and positive half of the integer domain.
//! - [`AxisNormalizer::ScaledCurve`]: divide, damp, apply a mode-dependent
//!   scale and push non-zero values out by a fixed directional offset so they
//!   clear the deadzone the host application applies on its side.
//!
//! A raw value of exactly `0` always normalizes to exactly `0.0`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode of the host application
///
/// Selects the sensitivity of [`AxisNormalizer::ScaledCurve`] and whether the
/// roll channel is produced at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Editor viewport navigation: lower sensitivity, roll suppressed
    #[default]
    Edit,
    /// Live/run mode: higher sensitivity, roll enabled
    Play,
}

impl OperatingMode {
    /// Roll is suppressed while editing; a rolled editor camera is unusable.
    pub fn roll_enabled(self) -> bool {
        matches!(self, OperatingMode::Play)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::Edit => write!(f, "edit"),
            OperatingMode::Play => write!(f, "play"),
        }
    }
}

/// Normalization strategy for raw axis samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AxisNormalizer {
    /// `raw / negative_span` for `raw <= 0`, `raw / positive_span` otherwise
    SignedRange {
        negative_span: f32,
        positive_span: f32,
    },
    /// `raw / denominator * damping * mode_scale ± offset`
    ScaledCurve {
        denominator: f32,
        damping: f32,
        edit_scale: f32,
        play_scale: f32,
        offset: f32,
    },
}

impl AxisNormalizer {
    /// Signed range with the 2048/2047 spans of the classic driver output
    pub const fn signed_range() -> Self {
        AxisNormalizer::SignedRange {
            negative_span: 2048.0,
            positive_span: 2047.0,
        }
    }

    /// Scaled curve tuned for a 0.25 consumer deadzone
    pub const fn scaled_curve() -> Self {
        AxisNormalizer::ScaledCurve {
            denominator: 32768.0,
            damping: 0.8,
            edit_scale: 0.5,
            play_scale: 1.5,
            offset: 0.2,
        }
    }

    /// Normalizes one raw axis sample into `[-1, 1]`.
    pub fn normalize(&self, raw: i32, mode: OperatingMode) -> f32 {
        if raw == 0 {
            return 0.0;
        }
        let raw = raw as f32;

        let value = match *self {
            AxisNormalizer::SignedRange {
                negative_span,
                positive_span,
            } => {
                let span = if raw <= 0.0 {
                    negative_span
                } else {
                    positive_span
                };
                raw / span
            }
            AxisNormalizer::ScaledCurve {
                denominator,
                damping,
                edit_scale,
                play_scale,
                offset,
            } => {
                let scale = match mode {
                    OperatingMode::Edit => edit_scale,
                    OperatingMode::Play => play_scale,
                };
                raw / denominator * damping * scale + offset.abs() * raw.signum()
            }
        };

        value.clamp(-1.0, 1.0)
    }
}

impl Default for AxisNormalizer {
    fn default() -> Self {
        AxisNormalizer::scaled_curve()
    }
}
