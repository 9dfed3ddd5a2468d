//! Controller State, Button/Command Latch and Dispatch Tick
//!
//! [`ControllerState`] is the only persistent entity of the pipeline. The
//! decode path writes it, the dispatch tick reads it and clears the new-event
//! flag. Both sides reach it through [`SharedControllerState`] so decode and
//! dispatch never overlap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::controller::axis::OperatingMode;
use crate::controller::response::ResponseProfile;

/// Controller state guarded by a single mutex for the set-then-clear window
pub type SharedControllerState = Arc<Mutex<ControllerState>>;

/// Logical analog channel emitted to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalogChannel {
    PanX,
    PanY,
    RotateX,
    RotateY,
    TriggerLeft,
    TriggerRight,
    Roll,
}

impl AnalogChannel {
    /// Fixed emission order of a dispatch tick
    pub const DISPATCH_ORDER: [AnalogChannel; 7] = [
        AnalogChannel::PanX,
        AnalogChannel::PanY,
        AnalogChannel::RotateX,
        AnalogChannel::RotateY,
        AnalogChannel::TriggerLeft,
        AnalogChannel::TriggerRight,
        AnalogChannel::Roll,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AnalogChannel::PanX => "pan-x",
            AnalogChannel::PanY => "pan-y",
            AnalogChannel::RotateX => "rotate-x",
            AnalogChannel::RotateY => "rotate-y",
            AnalogChannel::TriggerLeft => "trigger-left",
            AnalogChannel::TriggerRight => "trigger-right",
            AnalogChannel::Roll => "roll",
        }
    }
}

impl fmt::Display for AnalogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One channel/value pair handed to an [`AnalogSink`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalogEmission {
    pub channel: AnalogChannel,
    pub value: f32,
}

/// Outbound analog-input sink of the host application
///
/// The sink only sees a channel when a tick had new data. Silence means
/// "unchanged", never "zero".
pub trait AnalogSink: Send + fmt::Debug {
    fn on_controller_analog(&mut self, channel: AnalogChannel, value: f32);
}

impl AnalogSink for Vec<AnalogEmission> {
    fn on_controller_analog(&mut self, channel: AnalogChannel, value: f32) {
        self.push(AnalogEmission { channel, value });
    }
}

/// Normalized analog channels, each in `[-1, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalogChannels {
    pub pan_x: f32,
    pub pan_y: f32,
    pub rotate_x: f32,
    pub rotate_y: f32,
    pub trigger_left: f32,
    pub trigger_right: f32,
    pub roll: f32,
}

impl AnalogChannels {
    pub fn get(&self, channel: AnalogChannel) -> f32 {
        match channel {
            AnalogChannel::PanX => self.pan_x,
            AnalogChannel::PanY => self.pan_y,
            AnalogChannel::RotateX => self.rotate_x,
            AnalogChannel::RotateY => self.rotate_y,
            AnalogChannel::TriggerLeft => self.trigger_left,
            AnalogChannel::TriggerRight => self.trigger_right,
            AnalogChannel::Roll => self.roll,
        }
    }
}

/// Latched discrete input, `0` meaning "nothing pending"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscreteInput {
    pub command: u32,
    pub button_pressed: u32,
    pub button_released: u32,
}

impl DiscreteInput {
    pub fn is_empty(&self) -> bool {
        self.command == 0 && self.button_pressed == 0 && self.button_released == 0
    }
}

/// Snapshot combining analog channels, latched buttons and the latched command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    /// Current normalized channels
    pub channels: AnalogChannels,
    /// Last pressed command code
    pub command: u32,
    /// Most recent button that went down
    pub button_pressed: u32,
    /// Most recent button that went up
    pub button_released: u32,
    previous: AnalogChannels,
    has_new_event: bool,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_new_event(&self) -> bool {
        self.has_new_event
    }

    /// Channels as they were at the last tick that emitted
    pub fn previous(&self) -> &AnalogChannels {
        &self.previous
    }

    pub fn discrete(&self) -> DiscreteInput {
        DiscreteInput {
            command: self.command,
            button_pressed: self.button_pressed,
            button_released: self.button_released,
        }
    }

    /// Stores freshly decoded motion. Marks new data even if nothing changed.
    pub fn apply_motion(&mut self, channels: AnalogChannels) {
        self.channels = channels;
        self.has_new_event = true;
    }

    /// Device returned to rest: zero analog and discrete state in one step.
    pub fn reset(&mut self) {
        self.channels = AnalogChannels::default();
        self.command = 0;
        self.button_pressed = 0;
        self.button_released = 0;
        self.has_new_event = true;
    }

    /// Zeroes roll and marks new data so the next tick releases it downstream.
    pub fn suppress_roll(&mut self) {
        self.channels.roll = 0.0;
        self.has_new_event = true;
    }

    /// Latches press/release edges. `0` means no edge of that kind.
    ///
    /// Only the most recent edge of each kind survives until it is taken.
    pub fn latch_buttons(&mut self, pressed: u32, released: u32) {
        if pressed != 0 {
            if self.button_pressed != 0 && self.button_pressed != pressed {
                debug!(
                    "Button {} press overwritten by {} before it was consumed",
                    self.button_pressed, pressed
                );
            }
            info!("Button pressed: {}", pressed);
            self.button_pressed = pressed;
        }
        if released != 0 {
            info!("Button released: {}", released);
            self.button_released = released;
        }
        self.has_new_event = true;
    }

    /// Latches a command code on its pressed transition; releases are ignored.
    pub fn latch_command(&mut self, code: u32, pressed: bool) {
        if pressed {
            info!("Command pressed: {}", code);
            self.command = code;
        } else {
            debug!("Command released: {}", code);
        }
        self.has_new_event = true;
    }

    /// Returns the latched discrete input and clears it.
    pub fn take_discrete(&mut self) -> DiscreteInput {
        let discrete = self.discrete();
        self.command = 0;
        self.button_pressed = 0;
        self.button_released = 0;
        discrete
    }

    /// Dispatch tick.
    ///
    /// With new data pending, emits every channel through its response curve
    /// in [`AnalogChannel::DISPATCH_ORDER`] and clears the flag. Roll is sent
    /// as `0.0` when `mode` suppresses it, so the sink never keeps a stale
    /// roll. Without new data nothing is emitted. Returns whether anything was
    /// emitted.
    pub fn dispatch(
        &mut self,
        profile: &ResponseProfile,
        mode: OperatingMode,
        sink: &mut dyn AnalogSink,
    ) -> bool {
        if !self.has_new_event {
            return false;
        }
        self.has_new_event = false;

        for channel in AnalogChannel::DISPATCH_ORDER {
            let value = if channel == AnalogChannel::Roll && !mode.roll_enabled() {
                0.0
            } else {
                profile.shape(channel, self.channels.get(channel))
            };
            sink.on_controller_analog(channel, value);
        }

        self.previous = self.channels;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving() -> AnalogChannels {
        AnalogChannels {
            pan_x: 0.5,
            pan_y: -0.3,
            rotate_x: 0.1,
            rotate_y: 0.2,
            trigger_left: 0.4,
            trigger_right: 0.0,
            roll: 0.6,
        }
    }

    #[test]
    fn new_state_is_zeroed() {
        let state = ControllerState::new();
        assert_eq!(state.channels, AnalogChannels::default());
        assert!(state.discrete().is_empty());
        assert!(!state.has_new_event());
    }

    #[test]
    fn tick_without_new_event_emits_nothing() {
        let mut state = ControllerState::new();
        let mut sink: Vec<AnalogEmission> = Vec::new();
        assert!(!state.dispatch(&ResponseProfile::default(), OperatingMode::Play, &mut sink));
        assert!(sink.is_empty());
    }

    #[test]
    fn second_tick_is_a_no_op() {
        let mut state = ControllerState::new();
        state.apply_motion(moving());
        let mut sink: Vec<AnalogEmission> = Vec::new();
        let profile = ResponseProfile::default();

        assert!(state.dispatch(&profile, OperatingMode::Play, &mut sink));
        assert!(!state.has_new_event());
        let emitted = sink.len();

        assert!(!state.dispatch(&profile, OperatingMode::Play, &mut sink));
        assert_eq!(sink.len(), emitted);
        assert!(!state.has_new_event());
    }

    #[test]
    fn dispatch_emits_in_fixed_order() {
        let mut state = ControllerState::new();
        state.apply_motion(moving());
        let mut sink: Vec<AnalogEmission> = Vec::new();
        state.dispatch(&ResponseProfile::default(), OperatingMode::Play, &mut sink);

        let channels: Vec<AnalogChannel> = sink.iter().map(|e| e.channel).collect();
        assert_eq!(channels, AnalogChannel::DISPATCH_ORDER.to_vec());
    }

    #[test]
    fn edit_mode_pins_roll_to_zero() {
        let mut state = ControllerState::new();
        state.apply_motion(moving());
        let mut sink: Vec<AnalogEmission> = Vec::new();
        state.dispatch(&ResponseProfile::default(), OperatingMode::Edit, &mut sink);

        assert_eq!(sink.len(), 7);
        let roll = sink.iter().find(|e| e.channel == AnalogChannel::Roll).unwrap();
        assert_eq!(roll.value, 0.0);
    }

    #[test]
    fn suppressed_roll_is_released_on_next_tick() {
        let mut state = ControllerState::new();
        state.apply_motion(moving());
        let mut sink: Vec<AnalogEmission> = Vec::new();
        state.dispatch(&ResponseProfile::default(), OperatingMode::Play, &mut sink);
        sink.clear();

        state.suppress_roll();
        assert!(state.dispatch(&ResponseProfile::default(), OperatingMode::Edit, &mut sink));
        assert_eq!(sink.last().map(|e| (e.channel, e.value)), Some((AnalogChannel::Roll, 0.0)));
    }

    #[test]
    fn dispatch_values_are_shaped() {
        let profile = ResponseProfile::default();
        let mut state = ControllerState::new();
        state.apply_motion(moving());
        let mut sink: Vec<AnalogEmission> = Vec::new();
        state.dispatch(&profile, OperatingMode::Play, &mut sink);

        for emission in &sink {
            let expected = profile.shape(emission.channel, moving().get(emission.channel));
            assert_eq!(emission.value, expected);
        }
    }

    #[test]
    fn dispatch_keeps_discrete_fields() {
        let mut state = ControllerState::new();
        state.latch_buttons(3, 0);
        state.latch_command(12, true);
        let mut sink: Vec<AnalogEmission> = Vec::new();
        state.dispatch(&ResponseProfile::default(), OperatingMode::Edit, &mut sink);

        assert_eq!(state.button_pressed, 3);
        assert_eq!(state.command, 12);
    }

    #[test]
    fn dispatch_records_previous_snapshot() {
        let mut state = ControllerState::new();
        state.apply_motion(moving());
        assert_eq!(state.previous(), &AnalogChannels::default());

        state.dispatch(
            &ResponseProfile::default(),
            OperatingMode::Edit,
            &mut Vec::<AnalogEmission>::new(),
        );
        assert_eq!(state.previous(), &moving());
    }

    #[test]
    fn reset_zeroes_everything_and_flags_new_event() {
        let mut state = ControllerState::new();
        state.apply_motion(moving());
        state.latch_buttons(4, 2);
        state.latch_command(9, true);
        state.dispatch(
            &ResponseProfile::default(),
            OperatingMode::Edit,
            &mut Vec::<AnalogEmission>::new(),
        );

        state.reset();
        assert_eq!(state.channels, AnalogChannels::default());
        assert!(state.discrete().is_empty());
        assert!(state.has_new_event());
    }

    #[test]
    fn later_press_overwrites_earlier_press() {
        let mut state = ControllerState::new();
        state.latch_buttons(3, 0);
        state.latch_buttons(5, 0);
        assert_eq!(state.button_pressed, 5);
        assert_eq!(state.button_released, 0);
    }

    #[test]
    fn zero_ids_do_not_clear_latched_edges() {
        let mut state = ControllerState::new();
        state.latch_buttons(3, 7);
        state.latch_buttons(0, 0);
        assert_eq!(state.button_pressed, 3);
        assert_eq!(state.button_released, 7);
        assert!(state.has_new_event());
    }

    #[test]
    fn command_release_changes_nothing_but_the_flag() {
        let mut state = ControllerState::new();
        state.latch_command(21, false);
        assert_eq!(state.command, 0);
        assert!(state.has_new_event());

        state.latch_command(21, true);
        state.latch_command(21, false);
        assert_eq!(state.command, 21);
    }

    #[test]
    fn take_discrete_consumes_once() {
        let mut state = ControllerState::new();
        state.latch_buttons(3, 1);
        state.latch_command(8, true);

        let first = state.take_discrete();
        assert_eq!(
            first,
            DiscreteInput {
                command: 8,
                button_pressed: 3,
                button_released: 1,
            }
        );
        assert!(state.take_discrete().is_empty());
    }

    #[test]
    fn channel_names_follow_dispatch_order() {
        let names: Vec<&str> = AnalogChannel::DISPATCH_ORDER.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            [
                "pan-x",
                "pan-y",
                "rotate-x",
                "rotate-y",
                "trigger-left",
                "trigger-right",
                "roll"
            ]
        );
    }
}
