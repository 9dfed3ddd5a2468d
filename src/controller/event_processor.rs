use chrono::Local;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::controller::controller_handle::{Attached, ControllerError, SpaceNavController};

// Dispatch loop settings
#[derive(Clone, Debug)]
pub struct DispatchSettings {
    pub dispatch_interval_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            dispatch_interval_ms: 16,
        }
    }
}

// Public interface for running the dispatch tick on a tokio task
pub struct DispatchHandle {
    cancel: CancellationToken,
    task: JoinHandle<SpaceNavController<Attached>>,
}

impl DispatchHandle {
    // Move the controller onto a tokio task ticking at the configured interval
    pub fn spawn(controller: SpaceNavController<Attached>, settings: Option<DispatchSettings>) -> Self {
        let settings = settings.unwrap_or(DispatchSettings {
            dispatch_interval_ms: controller.settings().dispatch_interval_ms,
        });
        info!("Spawning dispatch loop with settings: {:?}", settings);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_dispatch_loop(controller, settings, cancel.clone()));
        debug!("Dispatch task spawned");

        Self { cancel, task }
    }

    // Token that stops the loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // Stop the loop and hand the controller back
    pub async fn shutdown(self) -> Result<SpaceNavController<Attached>, ControllerError> {
        info!("Stopping dispatch loop");
        self.cancel.cancel();
        self.task.await.map_err(|e| {
            error!("Dispatch task did not finish cleanly: {}", e);
            ControllerError::DispatchTask(e.to_string())
        })
    }
}

// Run the dispatch loop until cancelled or the state lock is poisoned
async fn run_dispatch_loop(
    mut controller: SpaceNavController<Attached>,
    settings: DispatchSettings,
    cancel: CancellationToken,
) -> SpaceNavController<Attached> {
    info!(
        "Starting dispatch loop with {}ms interval",
        settings.dispatch_interval_ms
    );

    let mut interval_timer = tokio::time::interval(tokio::time::Duration::from_millis(
        settings.dispatch_interval_ms.max(1),
    ));
    interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Stats for performance monitoring
    let mut ticks: u64 = 0;
    let mut emitting_ticks: u64 = 0;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Dispatch loop cancelled after {} ticks", ticks);
                break;
            }
            _ = interval_timer.tick() => {}
        }

        match controller.send_controller_events() {
            Ok(true) => {
                emitting_ticks += 1;
                debug!("Tick {} emitted controller state", ticks);
            }
            Ok(false) => {}
            Err(e) => {
                error!("Dispatch loop stopping: {}", e);
                break;
            }
        }
        ticks += 1;

        // Log stats periodically
        let now = Local::now();
        if now - last_stats_time > stats_interval {
            let elapsed_seconds = (now - last_stats_time).num_seconds();
            info!(
                "Dispatch stats: {} ticks, {} with new data in {} seconds",
                ticks, emitting_ticks, elapsed_seconds
            );
            ticks = 0;
            emitting_ticks = 0;
            last_stats_time = now;
        }
    }

    controller
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpaceNavSettings;
    use crate::controller::controller_state::AnalogChannel;
    use crate::controller::event_collector::{RawAxisSample, RawDeviceEvent};
    use crate::replay::ScriptedDriver;
    use crate::routing::HandlerRegistry;
    use crate::sink::ChannelSink;
    use tokio::sync::mpsc;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn loop_emits_after_routed_event_and_returns_controller() {
        let registry = HandlerRegistry::new();
        let (tx, mut rx) = mpsc::channel(64);
        let controller = SpaceNavController::create(
            SpaceNavSettings::default(),
            Box::new(ScriptedDriver::new()),
            Box::new(ChannelSink::new(tx)),
        )
        .attach(&registry)
        .unwrap();

        let handle = DispatchHandle::spawn(
            controller,
            Some(DispatchSettings {
                dispatch_interval_ms: 5,
            }),
        );

        registry.route(&RawDeviceEvent::Motion(RawAxisSample {
            tx: 16384,
            ..Default::default()
        }));

        let first = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.channel, AnalogChannel::PanX);
        assert!(first.value > 0.0);

        let controller = handle.shutdown().await.unwrap();
        assert!(!controller.snapshot().unwrap().has_new_event());
        controller.detach(&registry);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn external_cancel_stops_the_loop() {
        let registry = HandlerRegistry::new();
        let (tx, mut rx) = mpsc::channel(64);
        let controller = SpaceNavController::create(
            SpaceNavSettings::default(),
            Box::new(ScriptedDriver::new()),
            Box::new(ChannelSink::new(tx)),
        )
        .attach(&registry)
        .unwrap();

        let handle = DispatchHandle::spawn(
            controller,
            Some(DispatchSettings {
                dispatch_interval_ms: 2,
            }),
        );
        handle.cancellation_token().cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;

        registry.route(&RawDeviceEvent::Zero);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        let controller = handle.shutdown().await.unwrap();
        assert!(controller.snapshot().unwrap().has_new_event());
    }

    #[tokio::test]
    async fn idle_loop_emits_nothing() {
        let registry = HandlerRegistry::new();
        let (tx, mut rx) = mpsc::channel(64);
        let controller = SpaceNavController::create(
            SpaceNavSettings::default(),
            Box::new(ScriptedDriver::new()),
            Box::new(ChannelSink::new(tx)),
        )
        .attach(&registry)
        .unwrap();

        let handle = DispatchHandle::spawn(
            controller,
            Some(DispatchSettings {
                dispatch_interval_ms: 2,
            }),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _controller = handle.shutdown().await.unwrap();

        assert!(rx.try_recv().is_err());
    }
}
