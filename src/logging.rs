//! Tracing initialization for binaries embedding this crate.
//!
//! The core itself never calls `init_logging`; it only emits `tracing`
//! events and spans from the scheduler, worker and GC modules. This
//! helper reads its defaults from the same `Config` that governs the
//! rest of the pipeline, so a deployment wiring up a `Scheduler` and a
//! `WorkerPool` configures logging the same way it configures them.

use crate::config::Config;
use crate::error::{MhConfigError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes a global `tracing` subscriber filtered by
/// `config.log_level` (an `EnvFilter` directive string, e.g.
/// `"mhconfig_core=debug,warn"`). Also emits one startup line recording
/// the worker/queue sizing `config` chose, since that's usually the
/// first thing worth knowing when reading a deployment's logs.
pub fn init_logging(config: &Config) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level)
                .map_err(|e| MhConfigError::InvalidArguments(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| MhConfigError::InvalidArguments("logging already initialized".into()))?;

    tracing::info!(
        num_workers = config.num_workers,
        queue_capacity_log2 = config.queue_capacity_log2,
        gc_interval_secs = config.gc_interval.as_secs(),
        "logging initialized"
    );
    Ok(())
}
