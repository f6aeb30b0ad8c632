//! Runtime tunables for the scheduler/worker pipeline and GC engine.

use std::time::Duration;

/// Saturation watermark for `next_raw_config_id`; crossing it forces a
/// namespace softdelete (`spec.md` §3 Lifecycle, §4.D Update).
pub const RAW_CONFIG_ID_SATURATION: u32 = 0xff00_0000;

/// Saturation watermark for `current_version`.
pub const VERSION_SATURATION: u32 = 0xffff_fff0;

/// Configuration for a running `Scheduler` + `WorkerPool` pair.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of worker threads. Defaults to one per available CPU.
    pub num_workers: usize,
    /// `log2` of each MPSC/SPMC ring buffer's capacity.
    pub queue_capacity_log2: u32,
    /// How often the GC timer fires for each `RunGc` type.
    pub gc_interval: Duration,
    /// `max_live_in_seconds` threshold passed to cache-generation GC passes.
    pub gc_max_live_in_seconds: u32,
    /// `max_live_in_seconds` threshold passed to the namespace-reaping GC pass.
    pub gc_namespace_max_live_in_seconds: u32,
    /// `max_live_in_seconds` threshold passed to the version-reaping GC pass.
    pub gc_version_max_live_in_seconds: u32,
    /// `EnvFilter` directive `logging::init_logging` uses when a
    /// deployment doesn't override it some other way.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            queue_capacity_log2: 10,
            gc_interval: Duration::from_secs(30),
            gc_max_live_in_seconds: 300,
            gc_namespace_max_live_in_seconds: 3600,
            gc_version_max_live_in_seconds: 3600,
            log_level: "mhconfig_core=info,warn".into(),
        }
    }
}

impl Config {
    /// A configuration tuned for deterministic tests: a single worker,
    /// small queues, and GC thresholds expressed in seconds so tests can
    /// fast-forward them explicitly rather than sleeping.
    pub fn for_tests() -> Self {
        Self {
            num_workers: 1,
            queue_capacity_log2: 4,
            gc_interval: Duration::from_millis(10),
            gc_max_live_in_seconds: 1,
            gc_namespace_max_live_in_seconds: 1,
            gc_version_max_live_in_seconds: 1,
            log_level: "mhconfig_core=debug,warn".into(),
        }
    }

    /// A configuration tuned for throughput: many workers, large queues.
    pub fn production(num_workers: usize) -> Self {
        Self {
            num_workers,
            queue_capacity_log2: 14,
            ..Self::default()
        }
    }
}
