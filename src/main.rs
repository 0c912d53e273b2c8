//! Runs the producer and a server pool for a while, then reports theory against observation.
//!
//! Usage: `queue-sim [settings-file]`. See [`Settings`] for the environment overrides.

use std::{future::Future, io, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use queue_sim::{channel, MetricsCollector, PacingLoop, RunReporter, ServerPool, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = Settings::load(path.as_deref()).context("Failed to load settings")?;

    let store = Arc::new(settings.store()?);
    let metrics = Arc::new(MetricsCollector::new());
    let (sink, stream) = channel(settings.channel_capacity);

    let config = store.get();
    info!(%config, run_secs = settings.run_secs, "Starting run");

    let servers = ServerPool::builder()
        .server_count(config.server_count)
        .stream(stream.clone())
        .metrics(metrics.clone())
        .maybe_seed(settings.seed)
        .build()
        .spawn();

    let pacing = PacingLoop::builder()
        .store(store.clone())
        .sink(sink)
        .metrics(metrics.clone())
        .maybe_seed(settings.seed)
        .hint_mode(settings.hint_mode)
        .customers(settings.customers.clone())
        .build()
        .spawn();

    let started = Instant::now();

    run_until_interrupted(Duration::from_secs(settings.run_secs), tokio::signal::ctrl_c()).await;

    // Stop the producer first so it is never left waiting on a full channel.
    pacing.shut_down();
    pacing.wait_for_shutdown().await;
    servers.shut_down();
    servers.wait_for_shutdown().await;

    let run_time = started.elapsed();
    info!(backlog = stream.backlog().await, "Run finished");

    RunReporter::new(&metrics, store.get(), run_time).print_summary();

    Ok(())
}

/// Wait for `run_for` to pass or `interrupt` to fire. If listening for the interrupt fails the
/// full run still takes place.
async fn run_until_interrupted<F>(run_for: Duration, interrupt: F)
where
    F: Future<Output = io::Result<()>>,
{
    let run = tokio::time::sleep(run_for);
    tokio::pin!(run);

    tokio::select! {
        _ = &mut run => {}
        result = interrupt => match result {
            Ok(()) => info!("Interrupted"),
            Err(err) => {
                warn!(error = %err, "Unable to listen for ctrl-c");
                run.await;
            }
        },
    }
}
