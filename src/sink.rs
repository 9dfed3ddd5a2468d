//! Ready-made analog sinks

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::controller::controller_state::{AnalogChannel, AnalogEmission, AnalogSink};

/// Logs every emission
#[derive(Debug, Default)]
pub struct TracingSink;

impl AnalogSink for TracingSink {
    fn on_controller_analog(&mut self, channel: AnalogChannel, value: f32) {
        info!("{:>13} = {:+.3}", channel.name(), value);
    }
}

/// Forwards emissions into a tokio channel without blocking the tick
///
/// Emissions are dropped with a warning when the receiver lags behind.
#[derive(Debug)]
pub struct ChannelSink {
    sender: mpsc::Sender<AnalogEmission>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<AnalogEmission>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// Emissions lost to a full channel so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl AnalogSink for ChannelSink {
    fn on_controller_analog(&mut self, channel: AnalogChannel, value: f32) {
        match self.sender.try_send(AnalogEmission { channel, value }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(emission)) => {
                self.dropped += 1;
                warn!(
                    "Analog channel full, dropped {:?} ({} dropped so far)",
                    emission, self.dropped
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Analog receiver gone, discarding {}", channel);
            }
        }
    }
}
