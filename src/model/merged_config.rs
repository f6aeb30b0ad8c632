//! The built, composable artifact keyed by an overrides fingerprint.
//!
//! See `spec.md` §3 `merged_config` and §4.D Get/SetDocuments.

use super::element::Element;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifecycle of a [`MergedConfig`]. While `Building`, no reader may
/// observe `value` (`spec.md` §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergedConfigStatus {
    Building,
    OkConfigNoOptimized,
    OkConfigOptimizing,
    OkConfigOptimized,
    OkTemplate,
}

impl MergedConfigStatus {
    /// Statuses eligible for cache-generation GC (`spec.md` §4.F).
    pub fn is_gc_eligible(self) -> bool {
        !matches!(self, MergedConfigStatus::Building)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One composed configuration document, shared between the scheduler
/// thread (the only writer) and worker threads that read `value` to
/// serialize a reply while status transitions through
/// `OkConfigOptimizing`. Always reached through an `Arc<Mutex<..>>` so
/// both sides see a consistent snapshot.
#[derive(Debug)]
pub struct MergedConfig {
    pub status: MergedConfigStatus,
    pub value: Element,
    /// Cached bytes from `worker::build::serialize_preprocessed`, filled
    /// in once a `SetOptimizedConfig` lands while status is
    /// `OkConfigOptimizing` (`spec.md` §4.D).
    pub preprocessed_value: Option<Arc<Vec<u8>>>,
    pub creation_timestamp: u64,
    pub last_access_timestamp: u64,
}

impl MergedConfig {
    pub fn building() -> Self {
        let now = now_secs();
        Self {
            status: MergedConfigStatus::Building,
            value: Element::Null,
            preprocessed_value: None,
            creation_timestamp: now,
            last_access_timestamp: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_access_timestamp = now_secs();
    }

    /// Panics on an internal invariant violation: a reader observed
    /// `Building` or an otherwise-undefined status, which `spec.md` §7
    /// classifies as a programmer bug rather than a recoverable error.
    pub fn assert_readable(&self) {
        assert_ne!(
            self.status,
            MergedConfigStatus::Building,
            "observed a BUILDING merged_config where a finished value was required"
        );
    }
}
