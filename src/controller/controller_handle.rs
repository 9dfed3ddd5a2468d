//! Controller lifecycle
//!
//! [`SpaceNavController`] owns the driver session, the decoder and the
//! outbound sink. Its lifecycle is an explicit init/teardown pair modelled as
//! a statum state machine:
//!
//! ```text
//! Detached ──attach(router)──► Attached ──detach(router)──► Detached
//! ```
//!
//! Attaching opens the driver in three steps (load library, find the host
//! window, open the device). Any failure terminates the driver and aborts the
//! attach, leaving nothing registered with the router.

use statum::{machine, state};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::config::{ConfigError, SpaceNavSettings};
use crate::controller::axis::OperatingMode;
use crate::controller::controller_state::{
    AnalogSink, ControllerState, DiscreteInput, SharedControllerState,
};
use crate::controller::event_collector::{RawEventHandler, SpaceNavDecoder};
use crate::routing::{HandlerId, MessageRouter};

/// Opaque handle of the host application's top-level window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// Construction-time failures of the device driver
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Could not load the 3D mouse driver library: {0}")]
    LibraryLoad(String),

    #[error("Could not find the host application window")]
    WindowNotFound,

    #[error("Could not open the 3D mouse: {0}")]
    Open(String),
}

/// Controller errors
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Invalid settings: {0}")]
    Config(#[from] ConfigError),

    #[error("Controller state lock poisoned")]
    StatePoisoned,

    #[error("Dispatch task failed: {0}")]
    DispatchTask(String),
}

/// Vendor driver session
///
/// Device enumeration, LEDs and force feedback stay with the driver; the
/// controller only needs to open and close the session.
pub trait DeviceDriver: Send + fmt::Debug {
    fn load_library(&mut self) -> Result<(), DeviceError>;

    fn find_host_window(&mut self) -> Result<WindowHandle, DeviceError>;

    fn open(&mut self, application_name: &str, window: WindowHandle) -> Result<(), DeviceError>;

    /// Shuts the driver library down. Must be safe to call after a failed open.
    fn terminate(&mut self);
}

#[state]
#[derive(Debug, Clone)]
pub enum ControllerLifecycle {
    Detached,
    Attached,
}

#[machine]
#[derive(Debug)]
pub struct SpaceNavController<S: ControllerLifecycle> {
    settings: SpaceNavSettings,
    driver: Box<dyn DeviceDriver>,
    state: SharedControllerState,
    decoder: Arc<SpaceNavDecoder>,
    sink: Box<dyn AnalogSink>,
    handler_id: Option<HandlerId>,
}

// Available in every lifecycle state
impl<S: ControllerLifecycle> SpaceNavController<S> {
    pub fn settings(&self) -> &SpaceNavSettings {
        &self.settings
    }

    pub fn mode(&self) -> OperatingMode {
        self.decoder.mode()
    }

    /// Switches sensitivity and roll handling for subsequent events and ticks.
    ///
    /// Leaving a roll-enabled mode zeroes roll and flags new data, so the
    /// next tick releases it downstream.
    pub fn set_mode(&mut self, mode: OperatingMode) {
        info!("Switching to {} mode", mode);
        self.settings.mode = mode;
        self.decoder.set_mode(mode);

        if !mode.roll_enabled() {
            match self.lock_state() {
                Ok(mut state) => state.suppress_roll(),
                Err(e) => error!("Could not release roll: {}", e),
            }
        }
    }

    /// Replaces the outbound analog sink.
    pub fn set_message_handler(&mut self, sink: Box<dyn AnalogSink>) {
        debug!("Replacing analog sink with {:?}", sink);
        self.sink = sink;
    }

    /// Copy of the current controller state
    pub fn snapshot(&self) -> Result<ControllerState, ControllerError> {
        Ok(self.lock_state()?.clone())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ControllerState>, ControllerError> {
        self.state.lock().map_err(|e| {
            error!("Controller state lock poisoned: {}", e);
            ControllerError::StatePoisoned
        })
    }
}

impl SpaceNavController<Detached> {
    pub fn create(
        settings: SpaceNavSettings,
        driver: Box<dyn DeviceDriver>,
        sink: Box<dyn AnalogSink>,
    ) -> Self {
        info!("Input device creation with settings: {:?}", settings);

        let state: SharedControllerState = Arc::new(Mutex::new(ControllerState::new()));
        let decoder = Arc::new(SpaceNavDecoder::new(
            Arc::clone(&state),
            settings.normalizer,
            settings.mode,
        ));

        Self::new(settings, driver, state, decoder, sink, None)
    }

    /// Validates the settings, opens the device and registers the decoder
    /// with `router`.
    pub fn attach(
        mut self,
        router: &dyn MessageRouter,
    ) -> Result<SpaceNavController<Attached>, ControllerError> {
        info!("Attaching to the 3D mouse driver");

        if let Err(e) = self.settings.validate() {
            error!("Refusing to attach with invalid settings: {}", e);
            return Err(e.into());
        }

        if let Err(e) = self.driver.load_library() {
            error!("Could not load driver library: {}", e);
            return Err(e.into());
        }

        let window = match self.driver.find_host_window() {
            Ok(window) => window,
            Err(e) => {
                self.driver.terminate();
                error!("Could not find host window: {}", e);
                return Err(e.into());
            }
        };
        debug!("Host window = {:#x}", window.0);

        if let Err(e) = self.driver.open(&self.settings.application_name, window) {
            self.driver.terminate();
            error!("Could not open the 3D mouse: {}", e);
            return Err(e.into());
        }

        *self.lock_state()? = ControllerState::new();

        let handler: Arc<dyn RawEventHandler> = self.decoder.clone();
        self.handler_id = Some(router.add_handler(handler));

        info!("3D mouse attached in {} mode", self.decoder.mode());
        Ok(self.transition())
    }
}

impl SpaceNavController<Attached> {
    /// Dispatch tick: pushes pending channel values to the sink.
    ///
    /// Returns whether anything was emitted.
    pub fn send_controller_events(&mut self) -> Result<bool, ControllerError> {
        let mode = self.decoder.mode();
        let mut state = self.state.lock().map_err(|e| {
            error!("Controller state lock poisoned: {}", e);
            ControllerError::StatePoisoned
        })?;
        Ok(state.dispatch(&self.settings.response, mode, self.sink.as_mut()))
    }

    /// Latched command and button edges, reset to zero by this call
    pub fn take_discrete(&self) -> Result<DiscreteInput, ControllerError> {
        Ok(self.lock_state()?.take_discrete())
    }

    /// The registered raw event handler
    pub fn decoder(&self) -> Arc<SpaceNavDecoder> {
        Arc::clone(&self.decoder)
    }

    /// Unregisters the decoder and shuts the driver down.
    pub fn detach(mut self, router: &dyn MessageRouter) -> SpaceNavController<Detached> {
        info!("Detaching from the 3D mouse driver");
        if let Some(id) = self.handler_id.take() {
            router.remove_handler(id);
        }
        self.driver.terminate();
        self.transition()
    }
}
