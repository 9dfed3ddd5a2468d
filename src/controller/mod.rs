//! Controller subsystem for 3D mouse input
//!
//! Implements a two-stage pipeline joined by a shared state:
//!
//! 1. [`event_collector`] - Raw event decoding on the message thread
//! 2. [`event_processor`] - Periodic dispatch of the latest state
//! 3. [`controller_handle`] - Device lifecycle and public API
//!
//! # Architecture
//!
//! ```text
//! Device ──► Router ──► Decoder ──► ControllerState ──► Dispatch ──► AnalogSink
//!                       (normalize)                    (shape)
//! ```
//!
//! [`axis`] holds the raw-to-float normalizers, [`response`] the curves
//! applied at dispatch time.

pub mod axis;
pub mod controller_handle;
pub mod controller_state;
pub mod event_collector;
pub mod event_processor;
pub mod response;

pub use axis::{AxisNormalizer, OperatingMode};
pub use controller_handle::{
    Attached, ControllerError, Detached, DeviceDriver, DeviceError, SpaceNavController,
    WindowHandle,
};
pub use controller_state::{AnalogChannel, AnalogEmission, AnalogSink, ControllerState};
pub use event_collector::{RawAxisSample, RawDeviceEvent, RawEventHandler, SpaceNavDecoder};
pub use event_processor::{DispatchHandle, DispatchSettings};
pub use response::{ResponseCurve, ResponseProfile};
