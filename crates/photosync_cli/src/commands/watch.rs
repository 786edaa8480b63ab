//! Periodic sync.
//!
//! The engine is blocking, so each pass runs on the blocking pool while the
//! runtime waits for the next tick or Ctrl-C.

use super::sync::print_sync;
use super::{CliEngine, Settings};
use photosync_engine::SyncError;
use photosync_protocol::Strategy;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Syncs every `interval` until interrupted.
pub fn run(
    settings: &Settings,
    strategy: Strategy,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    // The blocking HTTP client owns its own runtime, so the engine is built
    // before ours starts and dropped after it shuts down.
    let engine = Arc::new(settings.engine()?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(watch(Arc::clone(&engine), settings, strategy, interval));
    runtime.shutdown_timeout(Duration::from_secs(5));
    result
}

async fn watch(
    engine: Arc<CliEngine>,
    settings: &Settings,
    strategy: Strategy,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(%strategy, interval_secs = interval.as_secs(), "watching for changes");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                engine.cancel();
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let pass_engine = Arc::clone(&engine);
        let mut pass = tokio::task::spawn_blocking(move || pass_engine.sync(strategy));

        let outcome = tokio::select! {
            joined = &mut pass => joined?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, cancelling the running pass");
                engine.cancel();
                // Remaining items are skipped; the pass still writes its log entry.
                if let Ok(Ok(report)) = pass.await {
                    settings.emit(&report, || print_sync(&report))?;
                }
                return Ok(());
            }
        };

        match outcome {
            Ok(report) => settings.emit(&report, || print_sync(&report))?,
            Err(SyncError::Busy) => warn!("previous pass still running, skipping tick"),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => warn!(error = %e, "sync pass failed, retrying next tick"),
        }
    }
}
