//! Motion Event Decoder and raw device event intake
//!
//! Raw events arrive on the platform message thread. [`SpaceNavDecoder`]
//! implements [`RawEventHandler`], so the message router only needs to hand
//! it events; every recognized event is decoded to completion into the
//! shared [`ControllerState`](crate::controller::controller_state::ControllerState).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, error};

use crate::controller::axis::{AxisNormalizer, OperatingMode};
use crate::controller::controller_state::{AnalogChannels, SharedControllerState};

/// Six-axis sample as delivered by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAxisSample {
    pub tx: i32,
    pub ty: i32,
    pub tz: i32,
    pub rx: i32,
    pub ry: i32,
    pub rz: i32,
}

/// Raw event handed over by the device event source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawDeviceEvent {
    Motion(RawAxisSample),
    /// Device returned to rest
    Zero,
    /// Button edges, `0` meaning no edge of that kind
    Button {
        #[serde(default)]
        pressed: u32,
        #[serde(default)]
        released: u32,
    },
    Command { code: u32, pressed: bool },
    /// Event kind this decoder does not know
    Other { code: u32 },
}

/// Capability registered with the message router
///
/// Returns whether the event was consumed.
pub trait RawEventHandler: Send + Sync + fmt::Debug {
    fn handle(&self, event: &RawDeviceEvent) -> bool;
}

/// Maps a raw sample onto the logical channels.
///
/// Translation Y is split by the sign of translation Z: with `tz >= 0` it
/// drives the left trigger (negated), otherwise the right trigger. The other
/// trigger is forced to zero. Roll is zero whenever `mode` suppresses it.
pub fn decode_motion(
    sample: &RawAxisSample,
    normalizer: &AxisNormalizer,
    mode: OperatingMode,
) -> AnalogChannels {
    let norm = |raw: i32| normalizer.normalize(raw, mode);
    // Keeps a resting axis at +0.0
    let inverted = |raw: i32| {
        let value = norm(raw);
        if value == 0.0 {
            0.0
        } else {
            -value
        }
    };

    let (trigger_left, trigger_right) = if sample.tz >= 0 {
        (inverted(sample.ty), 0.0)
    } else {
        (0.0, norm(sample.ty))
    };

    AnalogChannels {
        pan_x: norm(sample.tx),
        pan_y: norm(sample.tz),
        rotate_x: inverted(sample.ry),
        rotate_y: norm(sample.rx),
        trigger_left,
        trigger_right,
        roll: if mode.roll_enabled() {
            norm(sample.rz)
        } else {
            0.0
        },
    }
}

/// Decodes raw device events into the shared controller state
#[derive(Debug)]
pub struct SpaceNavDecoder {
    state: SharedControllerState,
    normalizer: AxisNormalizer,
    mode: RwLock<OperatingMode>,
}

impl SpaceNavDecoder {
    pub fn new(
        state: SharedControllerState,
        normalizer: AxisNormalizer,
        mode: OperatingMode,
    ) -> Self {
        debug!(
            "Creating decoder with normalizer {:?} in {} mode",
            normalizer, mode
        );
        Self {
            state,
            normalizer,
            mode: RwLock::new(mode),
        }
    }

    pub fn mode(&self) -> OperatingMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies to events decoded after the call.
    pub fn set_mode(&self, mode: OperatingMode) {
        *self.mode.write().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn state(&self) -> &SharedControllerState {
        &self.state
    }
}

impl RawEventHandler for SpaceNavDecoder {
    fn handle(&self, event: &RawDeviceEvent) -> bool {
        let mode = self.mode();

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(e) => {
                error!("Controller state lock poisoned, dropping event: {}", e);
                return false;
            }
        };

        match event {
            RawDeviceEvent::Motion(sample) => {
                let channels = decode_motion(sample, &self.normalizer, mode);
                debug!("Motion {:?} decoded to {:?}", sample, channels);
                state.apply_motion(channels);
                true
            }
            RawDeviceEvent::Zero => {
                debug!("Device at rest, zeroing controller state");
                state.reset();
                true
            }
            RawDeviceEvent::Button { pressed, released } => {
                state.latch_buttons(*pressed, *released);
                true
            }
            RawDeviceEvent::Command { code, pressed } => {
                state.latch_command(*code, *pressed);
                true
            }
            RawDeviceEvent::Other { code } => {
                debug!("Ignoring unrecognized device event {}", code);
                false
            }
        }
    }
}
