//! Scripted device input
//!
//! A replay script stands in for the platform message queue: events are read
//! from TOML and routed from a dedicated message thread, the way the vendor
//! driver delivers them on the UI thread. [`ScriptedDriver`] plays the part of
//! the vendor driver session.
//!
//! ```toml
//! [[events]]
//! delay_ms = 16
//! event = { kind = "motion", tx = 16384, tz = -5000 }
//!
//! [[events]]
//! event = { kind = "button", pressed = 3 }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::controller::controller_handle::{DeviceDriver, DeviceError, WindowHandle};
use crate::controller::event_collector::RawDeviceEvent;
use crate::routing::HandlerRegistry;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Could not read replay script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid replay script: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not start message thread: {0}")]
    Spawn(std::io::Error),
}

/// One event plus the pause before it is delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedEvent {
    #[serde(default)]
    pub delay_ms: u64,
    pub event: RawDeviceEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub events: Vec<ScriptedEvent>,
}

impl ReplayScript {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ReplayError> {
        let script: Self = toml::from_str(text)?;
        debug!("Parsed replay script with {} events", script.events.len());
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Delivers a script to a router from its own message thread
pub struct ReplaySource;

impl ReplaySource {
    /// The thread returns the number of consumed events.
    pub fn spawn(
        script: ReplayScript,
        router: Arc<HandlerRegistry>,
    ) -> Result<JoinHandle<usize>, ReplayError> {
        info!("Replaying {} device events", script.len());
        thread::Builder::new()
            .name("spacenav-messages".to_string())
            .spawn(move || {
                let mut consumed = 0;
                for scripted in &script.events {
                    if scripted.delay_ms > 0 {
                        thread::sleep(Duration::from_millis(scripted.delay_ms));
                    }
                    if router.route(&scripted.event) {
                        consumed += 1;
                    } else {
                        warn!("Event not consumed: {:?}", scripted.event);
                    }
                }
                info!("Replay finished, {} events consumed", consumed);
                consumed
            })
            .map_err(ReplayError::Spawn)
    }
}

/// Driver steps that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStage {
    LoadLibrary,
    FindHostWindow,
    Open,
}

/// Calls observed by a [`ScriptedDriver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCall {
    LoadLibrary,
    FindHostWindow,
    Open,
    Terminate,
}

/// Shared record of the calls a [`ScriptedDriver`] received
#[derive(Debug, Clone, Default)]
pub struct DriverJournal(Arc<Mutex<Vec<DriverCall>>>);

impl DriverJournal {
    pub fn calls(&self) -> Vec<DriverCall> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, call: DriverCall) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }
}

/// Driver session without hardware
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    fail_at: Option<DriverStage>,
    journal: DriverJournal,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal() -> (Self, DriverJournal) {
        let driver = Self::default();
        let journal = driver.journal.clone();
        (driver, journal)
    }

    pub fn failing_at(mut self, stage: DriverStage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    fn fails_at(&self, stage: DriverStage) -> bool {
        self.fail_at == Some(stage)
    }
}

impl DeviceDriver for ScriptedDriver {
    fn load_library(&mut self) -> Result<(), DeviceError> {
        self.journal.record(DriverCall::LoadLibrary);
        if self.fails_at(DriverStage::LoadLibrary) {
            return Err(DeviceError::LibraryLoad("scripted failure".to_string()));
        }
        Ok(())
    }

    fn find_host_window(&mut self) -> Result<WindowHandle, DeviceError> {
        self.journal.record(DriverCall::FindHostWindow);
        if self.fails_at(DriverStage::FindHostWindow) {
            return Err(DeviceError::WindowNotFound);
        }
        Ok(WindowHandle(0x1))
    }

    fn open(&mut self, application_name: &str, window: WindowHandle) -> Result<(), DeviceError> {
        self.journal.record(DriverCall::Open);
        if self.fails_at(DriverStage::Open) {
            return Err(DeviceError::Open(format!(
                "{} on window {:#x}: scripted failure",
                application_name, window.0
            )));
        }
        debug!("Scripted device opened for {}", application_name);
        Ok(())
    }

    fn terminate(&mut self) {
        self.journal.record(DriverCall::Terminate);
    }
}
