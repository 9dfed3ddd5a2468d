//! Deadzone/Response Shaper
//!
//! Blends a quadratic and a linear response, applies gain and lifts values
//! that cleared the configured threshold past the deadzone the consuming
//! application enforces on its own.

use serde::{Deserialize, Serialize};

use crate::controller::controller_state::AnalogChannel;

/// Deadzone assumed on the consumer side of the analog sink
pub const DEFAULT_DOWNSTREAM_DEADZONE: f32 = 0.25;

/// Shapes a normalized value.
///
/// `curve = sign(v)·v²·(1 − blend) + v·blend`, scaled by `gain / 2`. When
/// `|value| > threshold` the difference between the downstream deadzone and
/// the threshold is added in the direction of `value`. The result is clamped
/// to `[-1, 1]`.
pub fn shape(
    value: f32,
    threshold: f32,
    linear_blend: f32,
    gain: f32,
    downstream_deadzone: f32,
) -> f32 {
    let blended = value * value.abs() * (1.0 - linear_blend) + value * linear_blend;
    let mut shaped = blended * gain / 2.0;

    if value.abs() > threshold {
        shaped += value.signum() * (downstream_deadzone - threshold);
    }

    shaped.clamp(-1.0, 1.0)
}

/// Tunables of one response curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseCurve {
    /// Input magnitude above which the downstream deadzone is compensated
    pub threshold: f32,
    /// Share of the linear term, `0.0` = pure quadratic, `1.0` = pure linear
    pub linear_blend: f32,
    pub gain: f32,
}

impl ResponseCurve {
    /// Gentle blend, unity gain
    pub const PAN: ResponseCurve = ResponseCurve {
        threshold: 0.05,
        linear_blend: 0.3,
        gain: 1.0,
    };

    /// Stronger linear share and gain for a more responsive rotation
    pub const ROTATE: ResponseCurve = ResponseCurve {
        threshold: 0.05,
        linear_blend: 0.6,
        gain: 1.6,
    };

    pub fn shape(&self, value: f32, downstream_deadzone: f32) -> f32 {
        shape(
            value,
            self.threshold,
            self.linear_blend,
            self.gain,
            downstream_deadzone,
        )
    }
}

/// Per-channel response curves plus the consumer deadzone they compensate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseProfile {
    pub downstream_deadzone: f32,
    pub pan: ResponseCurve,
    pub rotate: ResponseCurve,
    pub trigger: ResponseCurve,
    pub roll: ResponseCurve,
}

impl Default for ResponseProfile {
    fn default() -> Self {
        Self {
            downstream_deadzone: DEFAULT_DOWNSTREAM_DEADZONE,
            pan: ResponseCurve::PAN,
            rotate: ResponseCurve::ROTATE,
            trigger: ResponseCurve::PAN,
            roll: ResponseCurve::ROTATE,
        }
    }
}

impl ResponseProfile {
    pub fn curve(&self, channel: AnalogChannel) -> &ResponseCurve {
        match channel {
            AnalogChannel::PanX | AnalogChannel::PanY => &self.pan,
            AnalogChannel::RotateX | AnalogChannel::RotateY => &self.rotate,
            AnalogChannel::TriggerLeft | AnalogChannel::TriggerRight => &self.trigger,
            AnalogChannel::Roll => &self.roll,
        }
    }

    /// Shapes `value` with the curve assigned to `channel`.
    pub fn shape(&self, channel: AnalogChannel, value: f32) -> f32 {
        self.curve(channel).shape(value, self.downstream_deadzone)
    }
}
