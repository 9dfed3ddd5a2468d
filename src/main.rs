use color_eyre::{eyre::eyre, eyre::WrapErr, Result};
use spacenav3d::config::SpaceNavSettings;
use spacenav3d::controller::controller_handle::SpaceNavController;
use spacenav3d::controller::event_processor::DispatchHandle;
use spacenav3d::replay::{ReplayScript, ReplaySource, ScriptedDriver};
use spacenav3d::routing::HandlerRegistry;
use spacenav3d::sink::TracingSink;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// Played when no script path is given
const DEMO_SCRIPT: &str = r#"
[[events]]
event = { kind = "motion", tx = 16384, tz = 8000 }

[[events]]
delay_ms = 50
event = { kind = "motion", ty = 12000, tz = -5000, rx = -9000 }

[[events]]
delay_ms = 50
event = { kind = "button", pressed = 1 }

[[events]]
delay_ms = 50
event = { kind = "button", released = 1 }

[[events]]
delay_ms = 50
event = { kind = "command", code = 12, pressed = true }

[[events]]
delay_ms = 50
event = { kind = "zero" }
"#;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings = SpaceNavSettings::load().wrap_err("Failed to load settings")?;
    info!("Loaded settings: {:?}", settings);

    let script = match std::env::args().nth(1) {
        Some(path) => {
            info!("Replaying script {}", path);
            ReplayScript::load(&path).wrap_err_with(|| format!("Failed to load {}", path))?
        }
        None => {
            info!("No script given, replaying built-in demo");
            ReplayScript::from_toml_str(DEMO_SCRIPT)?
        }
    };

    let registry = Arc::new(HandlerRegistry::new());

    let controller = SpaceNavController::create(
        settings,
        Box::new(ScriptedDriver::new()),
        Box::new(TracingSink),
    )
    .attach(registry.as_ref())
    .map_err(|e| eyre!("Failed to attach controller: {}", e))?;

    let dispatch = DispatchHandle::spawn(controller, None);

    // Ctrl-C stops dispatching early, the replay still runs to its end
    let stop = dispatch.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping dispatch");
            stop.cancel();
        }
    });

    let replay = ReplaySource::spawn(script, Arc::clone(&registry))?;
    let consumed = tokio::task::spawn_blocking(move || replay.join())
        .await?
        .map_err(|_| eyre!("Replay thread panicked"))?;
    info!("{} events consumed", consumed);

    // Let the last state reach the sink
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let controller = dispatch.shutdown().await?;
    let discrete = controller.take_discrete()?;
    if discrete.is_empty() {
        info!("No pending commands or button edges");
    } else {
        warn!("Unhandled discrete input left over: {:?}", discrete);
    }

    let _detached = controller.detach(registry.as_ref());
    info!("Shut down cleanly");

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
