//! The single-writer scheduler thread: the only place `ConfigNamespace`
//! state is mutated (`spec.md` §4.D).

pub mod command;
pub mod handlers;

pub use command::{CommandResult, SchedulerCommand};

use crate::config::Config;
use crate::interfaces::{Builder, Metrics};
use crate::model::namespace::ConfigNamespace;
use crate::model::{OverridesFingerprint, WaitBuilt, Watcher};
use crate::queue::{Mpsc, Spmc};
use crate::string_pool::StringPool;
use crate::worker::WorkerCommand;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Keys a `WaitBuilt` uniquely across every namespace.
pub(crate) type WaitBuiltKey = (String, OverridesFingerprint);

pub struct Scheduler {
    pub(crate) config: Config,
    pub(crate) pool: StringPool,
    pub(crate) builder: Arc<dyn Builder>,
    pub(crate) metrics: Arc<dyn Metrics>,
    /// Live namespaces, keyed by `root_path` — the `ADD_NAMESPACE` /
    /// `GET_NAMESPACE_BY_PATH` lookup table `spec.md` §4.C names.
    pub(crate) namespace_by_path: HashMap<String, ConfigNamespace>,
    /// `id -> root_path` for every namespace still reachable through
    /// `namespace_by_path`; a `GET_NAMESPACE_BY_ID` lookup resolves
    /// through here first, then falls back to `removed_namespaces` for
    /// one that's been softdeleted but not yet GC'd (`spec.md` §3
    /// Lifecycle invariant I4).
    pub(crate) namespace_by_id: HashMap<u64, String>,
    /// Namespaces unlinked from `namespace_by_path` by a softdelete but
    /// not yet collected — reachable by id only.
    pub(crate) removed_namespaces: HashMap<u64, ConfigNamespace>,
    pub(crate) next_namespace_id: u64,
    pub(crate) wait_builts: HashMap<WaitBuiltKey, WaitBuilt>,
    pub(crate) watcher_registry: HashMap<u64, Arc<Watcher>>,
    pub(crate) next_watcher_id: u64,
    pub(crate) worker_jobs: Arc<Spmc<WorkerCommand>>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        pool: StringPool,
        builder: Arc<dyn Builder>,
        metrics: Arc<dyn Metrics>,
        worker_jobs: Arc<Spmc<WorkerCommand>>,
    ) -> Self {
        Self {
            config,
            pool,
            builder,
            metrics,
            namespace_by_path: HashMap::new(),
            namespace_by_id: HashMap::new(),
            removed_namespaces: HashMap::new(),
            next_namespace_id: 1,
            wait_builts: HashMap::new(),
            watcher_registry: HashMap::new(),
            next_watcher_id: 1,
            worker_jobs,
        }
    }

    /// Drains `commands` until the channel is closed. Each namespace's
    /// state is touched only from this loop, so every handler below
    /// takes `&mut self` freely.
    pub fn run(&mut self, commands: Arc<Mpsc<SchedulerCommand>>) {
        loop {
            let command = commands.pop();
            self.dispatch(command);
        }
    }

    pub fn dispatch(&mut self, command: SchedulerCommand) -> CommandResult {
        match command {
            SchedulerCommand::Get { view, reply_token } => self.handle_get(view, reply_token),
            SchedulerCommand::Watch { view, reply_token } => self.handle_watch(view, reply_token),
            SchedulerCommand::Trace { view, reply_token } => self.handle_get(view, reply_token),
            SchedulerCommand::UnwatchClient { watcher_id } => self.handle_unwatch(watcher_id),
            SchedulerCommand::UpdateDocuments {
                namespace,
                root_path,
                version,
                updates,
                reply_token: _,
            } => self.handle_update(namespace, root_path, version, updates),
            SchedulerCommand::SetDocuments { namespace, built } => self.handle_set_documents(namespace, built),
            SchedulerCommand::SetOptimizedConfig {
                namespace,
                fingerprint,
                preprocessed,
            } => self.handle_set_optimized_config(namespace, fingerprint, preprocessed),
            SchedulerCommand::AddNamespace { root_path } => {
                self.ensure_namespace(&root_path);
                CommandResult::Ok
            }
            SchedulerCommand::GetNamespaceByPath { root_path, reply_token: _ } => {
                self.handle_get_namespace_by_path(&root_path)
            }
            SchedulerCommand::GetNamespaceById { id, reply_token: _ } => self.handle_get_namespace_by_id(id),
            SchedulerCommand::RemoveNamespace { namespace, reply_token: _ } => self.handle_remove_namespace(namespace),
            SchedulerCommand::RunGc { gc_type, reply_token: _ } => self.handle_run_gc(gc_type),
        }
    }

    /// `ADD_NAMESPACE`: idempotent lookup-or-create. Creating triggers a
    /// worker `Setup` job that scans the namespace's root for documents
    /// to ingest (`spec.md` §3 Lifecycle, §4.E).
    pub(crate) fn ensure_namespace(&mut self, root_path: &str) -> &mut ConfigNamespace {
        if !self.namespace_by_path.contains_key(root_path) {
            let id = self.next_namespace_id;
            self.next_namespace_id += 1;
            let mut ns = ConfigNamespace::new(root_path);
            ns.id = id;
            self.namespace_by_path.insert(root_path.to_string(), ns);
            self.namespace_by_id.insert(id, root_path.to_string());
            self.worker_jobs.dispatch(WorkerCommand::Setup {
                namespace: root_path.to_string(),
            });
        }
        self.namespace_by_path.get_mut(root_path).expect("just ensured")
    }

    /// `GET_NAMESPACE_BY_PATH`: the lookup-failure path `spec.md` §4.C
    /// calls `on_get_namespace_error` — no implicit creation here,
    /// unlike `ensure_namespace`.
    fn handle_get_namespace_by_path(&mut self, root_path: &str) -> CommandResult {
        match self.namespace_by_path.get(root_path) {
            Some(_) => CommandResult::Ok,
            None => self.on_get_namespace_error(format!("no namespace at path {root_path:?}")),
        }
    }

    fn handle_get_namespace_by_id(&mut self, id: u64) -> CommandResult {
        let found = self
            .namespace_by_id
            .get(&id)
            .and_then(|path| self.namespace_by_path.get(path))
            .is_some()
            || self.removed_namespaces.contains_key(&id);
        if found {
            CommandResult::Ok
        } else {
            self.on_get_namespace_error(format!("no namespace with id {id}"))
        }
    }

    fn on_get_namespace_error(&self, message: String) -> CommandResult {
        CommandResult::Error(message)
    }

    fn handle_remove_namespace(&mut self, namespace: String) -> CommandResult {
        self.softdelete_namespace(&namespace)
    }

    /// Unlinks `root_path` from `namespace_by_path` so a fresh `Get` on
    /// the same path mints a brand new namespace, while the removed
    /// entry stays reachable by id in `removed_namespaces` until a GC
    /// `Namespaces` sweep collects it (`spec.md` §4.D/§7, I4).
    pub(crate) fn softdelete_namespace(&mut self, root_path: &str) -> CommandResult {
        match self.namespace_by_path.remove(root_path) {
            Some(mut ns) => {
                ns.status = crate::model::NamespaceStatus::Removing;
                ns.touch();
                self.namespace_by_id.remove(&ns.id);
                self.removed_namespaces.insert(ns.id, ns);
                CommandResult::SoftDeleteNamespace
            }
            None => CommandResult::Error(format!("unknown namespace {root_path:?}")),
        }
    }

    fn handle_run_gc(&mut self, gc_type: crate::gc::GcType) -> CommandResult {
        let report = crate::gc::GcEngine::run(&mut self.namespace_by_path, gc_type, &self.config);
        self.metrics.inc_gc_sweep(report.removed);
        if gc_type == crate::gc::GcType::Namespaces {
            self.collect_removed_namespaces();
        }
        CommandResult::Ok
    }

    /// `removed_namespaces` isn't visited by `GcEngine` (its signature
    /// is keyed on `namespace_by_path` alone), so the same retention
    /// window is applied here directly.
    fn collect_removed_namespaces(&mut self) {
        let max_live = self.config.gc_namespace_max_live_in_seconds as u64;
        let now = now_secs();
        self.removed_namespaces
            .retain(|_, ns| ns.last_access_timestamp + max_live > now);
    }

    fn alloc_watcher_id(&mut self) -> u64 {
        let id = self.next_watcher_id;
        self.next_watcher_id += 1;
        id
    }
}
