//! Garbage collection over the document/version graph and the cache
//! generations, ported from the original `RunGcCommand` (`spec.md`
//! §4.F). Runs on the scheduler thread: every pass mutates namespace
//! state directly, no locking needed.

use crate::config::Config;
use crate::model::namespace::ConfigNamespace;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One GC sweep kind, each independently schedulable
/// (`spec.md` §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcType {
    CacheGeneration0,
    CacheGeneration1,
    CacheGeneration2,
    DeadPointers,
    Namespaces,
    Versions,
}

/// Tallies a sweep reports back through `Metrics::inc_gc_sweep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GcReport {
    pub removed: u64,
    pub processed: u64,
}

/// Stateless driver; every method takes the namespace table by
/// `&mut` and a `Config` for the retention windows.
pub struct GcEngine;

impl GcEngine {
    pub fn run(
        namespaces: &mut HashMap<String, ConfigNamespace>,
        gc_type: GcType,
        config: &Config,
    ) -> GcReport {
        match gc_type {
            GcType::CacheGeneration0 => remove_merge_configs(namespaces, 0, config.gc_max_live_in_seconds as u64),
            GcType::CacheGeneration1 => remove_merge_configs(namespaces, 1, config.gc_max_live_in_seconds as u64),
            GcType::CacheGeneration2 => remove_merge_configs(namespaces, 2, config.gc_max_live_in_seconds as u64),
            GcType::DeadPointers => remove_dead_pointers(namespaces),
            GcType::Namespaces => remove_namespaces(namespaces, config.gc_namespace_max_live_in_seconds as u64),
            GcType::Versions => remove_versions(namespaces, config.gc_version_max_live_in_seconds as u64),
        }
    }
}

/// Swap-removes element `i` from `v`, moving the last element into its
/// place; matches `jmutils::swap_delete` in the original so index
/// order inside a generation is explicitly not preserved.
fn swap_delete<T>(v: &mut Vec<T>, i: usize) {
    v.swap_remove(i);
}

fn remove_merge_configs(
    namespaces: &mut HashMap<String, ConfigNamespace>,
    generation: usize,
    max_live_in_seconds: u64,
) -> GcReport {
    let current_timestamp = now_secs();
    let mut report = GcReport::default();

    for ns in namespaces.values_mut() {
        let from_len = ns.generations[generation].len();
        report.processed += from_len as u64;

        match generation {
            0 => {
                let mut i = 0;
                while i < ns.generations[0].len() {
                    let config = ns.generations[0][i].clone();
                    let guard = config.lock();
                    let promote = guard.status.is_gc_eligible()
                        && guard.creation_timestamp + max_live_in_seconds <= current_timestamp;
                    let evict = promote && guard.last_access_timestamp + max_live_in_seconds <= current_timestamp;
                    drop(guard);

                    if promote {
                        if evict {
                            report.removed += 1;
                        } else {
                            ns.generations[1].push(config);
                        }
                        swap_delete(&mut ns.generations[0], i);
                    } else {
                        i += 1;
                    }
                }
            }
            1 => {
                let mut i = ns.generations[1].len();
                while i > 0 {
                    i -= 1;
                    let config = ns.generations[1][i].clone();
                    let evict = config.lock().last_access_timestamp + max_live_in_seconds <= current_timestamp;
                    if evict {
                        report.removed += 1;
                    } else {
                        ns.generations[2].push(config);
                    }
                }
                ns.generations[1].clear();
            }
            2 => {
                let mut i = 0;
                while i < ns.generations[2].len() {
                    let evict = ns.generations[2][i].lock().last_access_timestamp + max_live_in_seconds
                        <= current_timestamp;
                    if evict {
                        swap_delete(&mut ns.generations[2], i);
                        report.removed += 1;
                    } else {
                        i += 1;
                    }
                }
            }
            _ => unreachable!("only three cache generations exist"),
        }
    }

    tracing::debug!(generation, removed = report.removed, processed = report.processed, "gc: cache generation sweep");
    report
}

fn remove_dead_pointers(namespaces: &mut HashMap<String, ConfigNamespace>) -> GcReport {
    let mut report = GcReport::default();

    for ns in namespaces.values_mut() {
        report.processed += ns.namespace_watchers.len() as u64;
        report.removed += ns.prune_expired_watchers() as u64;

        for doc in ns.document_metadata.values_mut() {
            for over in doc.override_by_key.values_mut() {
                report.processed += over.watchers.len() as u64;
                report.removed += over.prune_expired_watchers() as u64;
            }
        }

        report.processed += ns.merged_by_fingerprint.len() as u64;
        let before = ns.merged_by_fingerprint.len();
        ns.merged_by_fingerprint.retain(|_, weak| weak.strong_count() > 0);
        report.removed += (before - ns.merged_by_fingerprint.len()) as u64;
    }

    tracing::debug!(removed = report.removed, processed = report.processed, "gc: dead pointer sweep");
    report
}

fn remove_namespaces(namespaces: &mut HashMap<String, ConfigNamespace>, max_live_in_seconds: u64) -> GcReport {
    let current_timestamp = now_secs();
    let mut report = GcReport {
        processed: namespaces.len() as u64,
        removed: 0,
    };

    let mut to_remove = Vec::new();
    for (name, ns) in namespaces.iter_mut() {
        ns.prune_expired_watchers();
        if ns.last_access_timestamp + max_live_in_seconds <= current_timestamp && ns.namespace_watchers.is_empty() {
            to_remove.push(name.clone());
        }
    }
    for name in &to_remove {
        namespaces.remove(name);
    }
    report.removed = to_remove.len() as u64;

    tracing::debug!(removed = report.removed, processed = report.processed, "gc: namespace sweep");
    report
}

fn remove_versions(namespaces: &mut HashMap<String, ConfigNamespace>, max_live_in_seconds: u64) -> GcReport {
    let current_timestamp = now_secs();
    let mut report = GcReport::default();

    for ns in namespaces.values_mut() {
        let deque = &mut ns.stored_versions_by_deprecation_timestamp;
        if deque.len() <= 1 {
            continue;
        }
        if deque.front().map(|(ts, _)| ts + max_live_in_seconds > current_timestamp).unwrap_or(true) {
            continue;
        }

        while deque.len() > 1 && deque.front().map(|(ts, _)| ts + max_live_in_seconds <= current_timestamp).unwrap_or(false) {
            deque.pop_front();
        }
        let remove_till_version = deque.front().map(|(_, v)| *v).unwrap_or(0);

        let mut documents_to_remove = Vec::new();
        for (doc_name, doc_meta) in ns.document_metadata.iter_mut() {
            let mut overrides_to_remove = Vec::new();
            for (override_key, over_meta) in doc_meta.override_by_key.iter_mut() {
                over_meta.prune_expired_watchers();

                // Always keeps at least one entry: drops every version
                // strictly older than `remove_till_version`, then the
                // one entry that's left is also dropped if it's a
                // tombstone (nothing before it could still be live).
                while over_meta.raw_config_by_version.len() > 1 {
                    let Some(&oldest) = over_meta.raw_config_by_version.keys().next() else {
                        break;
                    };
                    if oldest >= remove_till_version {
                        break;
                    }
                    over_meta.raw_config_by_version.remove(&oldest);
                    report.removed += 1;
                }

                // A deleted-at-version entry is either the bare `None`
                // marker or a `Some` wrapping a tombstone `RawConfig` —
                // `Update` always produces the latter, but both forms
                // mean the same thing here.
                let oldest_is_tombstone = over_meta
                    .raw_config_by_version
                    .iter()
                    .next()
                    .map(|(_, v)| match v {
                        None => true,
                        Some(rc) => rc.is_tombstone(),
                    })
                    .unwrap_or(false);
                if oldest_is_tombstone {
                    if let Some(&oldest) = over_meta.raw_config_by_version.keys().next() {
                        over_meta.raw_config_by_version.remove(&oldest);
                        report.removed += 1;
                    }
                }

                if over_meta.raw_config_by_version.is_empty() && over_meta.watchers.is_empty() {
                    overrides_to_remove.push(override_key.clone());
                }
            }
            for key in &overrides_to_remove {
                doc_meta.override_by_key.remove(key);
            }
            if doc_meta.override_by_key.is_empty() {
                documents_to_remove.push(doc_name.clone());
            }
        }
        for name in documents_to_remove {
            ns.document_metadata.remove(&name);
        }
    }

    tracing::debug!(removed = report.removed, "gc: version sweep");
    report
}
