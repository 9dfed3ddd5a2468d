//! 3D mouse (six-axis navigation device) to virtual gamepad adapter
//!
//! Raw device events are routed to a [`controller::event_collector::SpaceNavDecoder`],
//! folded into a shared controller state and pushed to an analog sink on
//! every dispatch tick.

pub mod config;
pub mod controller;
pub mod replay;
pub mod routing;
pub mod sink;
