//! Headless runner for lichen colonization runs.

mod telemetry;

use anyhow::{Context, Result};
use lichen_core::RunnerConfig;
use lichen_world::{JobResult, LichenJob, Snapshot};
use parking_lot::RwLock;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

/// Latest published state, read by the progress reporter
type SharedSnapshot = Arc<RwLock<Option<Snapshot>>>;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_telemetry()?;

    // Load configuration
    let config = load_config()?;
    let num_ticks = config.run.num_ticks;

    let job = LichenJob::new(config.run.clone())?;
    info!(
        run_id = %job.run_id,
        side = config.run.lichen.side_length,
        num_ticks = num_ticks,
        seed = config.run.seed,
        id_policy = ?config.run.lichen.id_policy,
        "Starting lichen runner"
    );

    let latest: SharedSnapshot = Arc::new(RwLock::new(None));
    let stop = Arc::new(AtomicBool::new(false));

    // The engine lives on one blocking thread for the whole run
    let worker = {
        let latest = latest.clone();
        let stop = stop.clone();
        let frame_interval = config.frame_interval;
        let emit_frames = config.emit_frames;
        tokio::task::spawn_blocking(move || {
            run_job(job, frame_interval, emit_frames, &latest, &stop)
        })
    };
    tokio::pin!(worker);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut progress = interval(Duration::from_millis(config.progress_interval_ms.max(1)));

    let result = loop {
        tokio::select! {
            joined = &mut worker => {
                break joined.context("simulation worker panicked")?;
            }
            _ = progress.tick() => {
                report_progress(&latest, num_ticks);
            }
            _ = &mut shutdown, if !stop.load(Ordering::Relaxed) => {
                info!("Stopping run after the current tick");
                stop.store(true, Ordering::Relaxed);
            }
        }
    }?;

    if !result.completed {
        warn!(
            total_ticks = result.summary.total_ticks,
            num_ticks = num_ticks,
            "Run stopped early"
        );
    }

    info!(
        event = "runner_finished",
        run_id = %result.run_id,
        total_ticks = result.summary.total_ticks,
        species_alive = result.summary.species_alive,
        dominance_edges = result.summary.dominance_edges,
        active_interactions = result.summary.active_interactions,
        elapsed_ms = (result.finished_at - result.started_at).num_milliseconds(),
        "Lichen run finished"
    );

    if !config.emit_frames {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}

fn load_config() -> Result<RunnerConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            RunnerConfig::from_json_file(&path)
                .with_context(|| format!("failed to load configuration from {}", path))
        }
        None => {
            info!("No configuration file given, using defaults");
            Ok(RunnerConfig::default())
        }
    }
}

/// Drive the job, publishing every frame and optionally writing it to
/// stdout. Returns once the run completes or within one tick of `stop`
/// being raised.
fn run_job(
    job: LichenJob,
    frame_interval: u64,
    emit_frames: bool,
    latest: &SharedSnapshot,
    stop: &AtomicBool,
) -> Result<JobResult> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut write_error: Option<anyhow::Error> = None;

    let result = job.execute_observed(frame_interval, stop, |snapshot| {
        if emit_frames {
            let written = snapshot
                .to_frame()
                .to_json_line()
                .map_err(anyhow::Error::from)
                .and_then(|line| writeln!(out, "{}", line).map_err(anyhow::Error::from));
            if let Err(e) = written {
                write_error = Some(e);
                return false;
            }
        }

        *latest.write() = Some(snapshot);
        true
    })?;

    if let Some(e) = write_error {
        return Err(e.context("failed to write frame"));
    }
    out.flush()?;
    Ok(result)
}

fn report_progress(latest: &SharedSnapshot, num_ticks: u64) {
    let guard = latest.read();
    let Some(snapshot) = guard.as_ref() else {
        return;
    };

    let stats = snapshot.stats();
    info!(
        tick = snapshot.tick,
        num_ticks = num_ticks,
        species = snapshot.graph.node_count(),
        dominance_edges = snapshot.graph.edge_count(),
        dominant_species = ?stats.dominant_species,
        dominant_share = stats.dominant_share,
        shannon = stats.shannon,
        "Progress"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
