//! The per-namespace state the scheduler thread owns exclusively.
//!
//! See `spec.md` §3 `config_namespace` and §4.F (GC generations).

use super::fingerprint::OverridesFingerprint;
use super::merged_config::MergedConfig;
use super::raw_config::{DocumentMetadata, RawConfigId};
use super::request::DocumentName;
use super::watcher::Watcher;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

fn weak_points_at(weak: &Weak<Watcher>, watcher: &Arc<Watcher>) -> bool {
    weak.upgrade().map(|w| Arc::ptr_eq(&w, watcher)).unwrap_or(false)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Lifecycle of a namespace. `Removing` means a client asked for it to
/// go away but some document in it is still referenced by another live
/// namespace's documents, so the GC reaps it lazily (`spec.md` §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceStatus {
    Ok,
    Removing,
}

/// The three cache generations a `merged_config` is promoted through as
/// it survives successive GC sweeps, and demoted out of (freed) when it
/// doesn't survive the oldest one. Mirrors the young/senior/guru scheme
/// in the original `run_gc_command` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Young,
    Senior,
    Guru,
}

/// All state for one configuration namespace. Owned by the scheduler
/// thread alone: every mutation in `spec.md` §4 happens there, so this
/// type uses plain (non-atomic) interior mutability rather than paying
/// for synchronization nothing else needs.
pub struct ConfigNamespace {
    /// Assigned by the scheduler's `namespace_by_id` index when the
    /// namespace is created; `0` until then (e.g. namespaces built
    /// directly by tests that bypass the scheduler).
    pub id: u64,
    pub name: String,
    pub status: NamespaceStatus,
    pub document_metadata: HashMap<DocumentName, DocumentMetadata>,
    pub next_raw_config_id: RawConfigId,
    pub current_version: u32,
    pub num_watchers: u64,
    pub last_access_timestamp: u64,
    /// Front is the oldest deprecated version still tracked; GC
    /// `Versions` drains entries older than the retention window and
    /// prunes every override's history up to what's left.
    pub stored_versions_by_deprecation_timestamp: VecDeque<(u64, u32)>,

    /// Cache generations, oldest-last. Entries are swap-deleted in
    /// place during GC, so indices inside a generation are not stable
    /// across a sweep.
    pub generations: [Vec<Arc<Mutex<MergedConfig>>>; 3],
    /// Fast path for "is there already a merged_config for this
    /// fingerprint" independent of which generation it currently lives
    /// in; holds weakly so an evicted entry disappears on its own.
    pub merged_by_fingerprint: FxHashMap<OverridesFingerprint, Weak<Mutex<MergedConfig>>>,

    pub namespace_watchers: Vec<Weak<Watcher>>,
}

impl ConfigNamespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            status: NamespaceStatus::Ok,
            document_metadata: HashMap::new(),
            next_raw_config_id: 1,
            current_version: 1,
            num_watchers: 0,
            last_access_timestamp: 0,
            stored_versions_by_deprecation_timestamp: VecDeque::new(),
            generations: [Vec::new(), Vec::new(), Vec::new()],
            merged_by_fingerprint: FxHashMap::default(),
            namespace_watchers: Vec::new(),
        }
    }

    pub fn alloc_raw_config_id(&mut self) -> RawConfigId {
        let id = self.next_raw_config_id;
        self.next_raw_config_id += 1;
        id
    }

    pub fn bump_version(&mut self) -> u32 {
        let deprecated = self.current_version;
        self.current_version += 1;
        self.stored_versions_by_deprecation_timestamp
            .push_back((now_secs(), deprecated));
        self.current_version
    }

    pub fn touch(&mut self) {
        self.last_access_timestamp = now_secs();
    }

    pub fn lookup_merged(&self, fp: &OverridesFingerprint) -> Option<Arc<Mutex<MergedConfig>>> {
        self.merged_by_fingerprint.get(fp).and_then(Weak::upgrade)
    }

    /// Inserts a freshly-built `merged_config` into the youngest
    /// generation and the fingerprint lookup table.
    pub fn insert_merged(&mut self, fp: OverridesFingerprint, config: Arc<Mutex<MergedConfig>>) {
        self.merged_by_fingerprint.insert(fp, Arc::downgrade(&config));
        self.generations[Generation::Young as usize].push(config);
    }

    pub fn prune_expired_watchers(&mut self) -> usize {
        let before = self.namespace_watchers.len();
        self.namespace_watchers.retain(|w| w.strong_count() > 0);
        let reaped = before - self.namespace_watchers.len();
        self.num_watchers = self.num_watchers.saturating_sub(reaped as u64);
        reaped
    }

    /// Actively unlinks `watcher`'s entries — the namespace-level list
    /// and every override layer its view named — instead of leaving the
    /// weak handle to be noticed by a later GC `DeadPointers` sweep.
    /// Called from `UnwatchClient` while the caller still holds the
    /// last strong reference, so `num_watchers` accounts for this
    /// departure exactly once rather than being decremented again when
    /// the now-dangling weak is eventually pruned.
    pub fn remove_watcher(&mut self, watcher: &Arc<Watcher>) {
        let before = self.namespace_watchers.len();
        self.namespace_watchers.retain(|w| !weak_points_at(w, watcher));
        let removed = before - self.namespace_watchers.len();
        self.num_watchers = self.num_watchers.saturating_sub(removed as u64);

        if let Some(doc_meta) = self.document_metadata.get_mut(&watcher.view.document) {
            for over in doc_meta.override_by_key.values_mut() {
                over.watchers.retain(|w| !weak_points_at(w, watcher));
            }
        }
    }

    pub fn is_empty_of_documents(&self) -> bool {
        self.document_metadata.is_empty()
    }
}
