//! `SetOptimizedConfig`: a worker finished serializing a
//! `merged_config`'s cached byte form (`spec.md` §4.D).

use crate::model::{MergedConfigStatus, OverridesFingerprint};
use crate::scheduler::{CommandResult, Scheduler};
use std::sync::Arc;

impl Scheduler {
    pub(crate) fn handle_set_optimized_config(
        &mut self,
        namespace: String,
        fingerprint: OverridesFingerprint,
        preprocessed: Arc<Vec<u8>>,
    ) -> CommandResult {
        let Some(ns) = self.namespace_by_path.get(&namespace) else {
            return CommandResult::Ok;
        };
        let Some(merged) = ns.lookup_merged(&fingerprint) else {
            return CommandResult::Ok;
        };

        let mut guard = merged.lock();
        // Only flips the entry still waiting on this exact optimize
        // cycle; a concurrent GC eviction or a fresher build landing in
        // the meantime leaves the stale bytes unapplied.
        if guard.status == MergedConfigStatus::OkConfigOptimizing {
            guard.preprocessed_value = Some(preprocessed);
            guard.status = MergedConfigStatus::OkConfigOptimized;
            guard.touch();
        }
        CommandResult::Ok
    }
}
