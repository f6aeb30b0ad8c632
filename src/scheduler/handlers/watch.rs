//! `Watch`: like `Get`, but additionally registers a weak watcher so
//! future updates can push a fresh value (`spec.md` §4.D, §5).

use crate::model::{DocumentView, Watcher};
use crate::scheduler::{CommandResult, Scheduler};
use crate::worker::WorkerCommand;
use std::sync::Arc;

impl Scheduler {
    pub(crate) fn handle_watch(&mut self, view: DocumentView, reply_token: u64) -> CommandResult {
        let watcher_id = self.alloc_watcher_id();
        let watcher = Arc::new(Watcher::new(watcher_id, view.clone(), reply_token));
        self.register_watcher(&view, &watcher);
        self.watcher_registry.insert(watcher_id, watcher);

        self.resolve_or_build(
            view,
            crate::model::Waiter::Watch {
                watcher_id,
                reply_token,
            },
        )
    }

    pub(crate) fn handle_unwatch(&mut self, watcher_id: u64) -> CommandResult {
        if let Some(watcher) = self.watcher_registry.remove(&watcher_id) {
            if let Some(ns) = self.namespace_by_path.get_mut(&watcher.view.root_path) {
                ns.remove_watcher(&watcher);
            }
            self.worker_jobs
                .dispatch(WorkerCommand::UnregisterWatchers(vec![watcher_id]));
            CommandResult::Ok
        } else {
            CommandResult::Error(format!("unknown watcher {watcher_id}"))
        }
    }

    /// Indexes a `Weak<Watcher>` everywhere a future `Update` would need
    /// to find it: each requested override layer's history, and the
    /// namespace itself (for namespace-level GC liveness).
    fn register_watcher(&mut self, view: &DocumentView, watcher: &Arc<Watcher>) {
        let namespace_name = view.root_path.clone();

        let mut keys = Vec::new();
        for over in &view.overrides {
            let mut layer_keys = vec![crate::model::override_key_string(over, None)];
            layer_keys.extend(view.flavors.iter().map(|f| crate::model::override_key_string(over, Some(f))));
            for layer_key in layer_keys {
                keys.push(self.pool.add_str(&layer_key));
            }
        }

        let namespace = self.ensure_namespace(&namespace_name);

        namespace.namespace_watchers.push(Arc::downgrade(watcher));
        namespace.num_watchers += 1;

        let doc_meta = namespace
            .document_metadata
            .entry(view.document.clone())
            .or_default();
        for key in keys {
            doc_meta
                .override_by_key
                .entry(key)
                .or_default()
                .watchers
                .push(Arc::downgrade(watcher));
        }
    }
}
