//! Log subscriber setup for the runner.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Logs go to stderr so stdout stays free
/// for frames. `LICHEN_LOG_FORMAT=json` switches to JSON lines.
pub fn init_telemetry() -> Result<()> {
    let json = matches!(std::env::var("LICHEN_LOG_FORMAT").as_deref(), Ok("json"));

    let plain_layer = (!json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lichen_runner=debug,lichen_world=debug".into()),
        )
        .with(plain_layer)
        .with(json_layer)
        .try_init()?;

    info!(json = json, "Telemetry initialized");
    Ok(())
}
