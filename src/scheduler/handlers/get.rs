//! `Get`: cache lookup, build coalescing, and the layer-resolution walk
//! shared with `Watch` (`spec.md` §4.D).

use crate::interfaces::ApiReply;
use crate::model::namespace::ConfigNamespace;
use crate::model::{
    validate_document_view, DocumentView, ElementToBuild, MergedConfig, MergedConfigStatus, OverridesFingerprint,
    WaitBuilt, Waiter,
};
use crate::scheduler::{CommandResult, Scheduler, WaitBuiltKey};
use crate::worker::command::BuildJob;
use crate::worker::WorkerCommand;
use parking_lot::Mutex;
use std::sync::Arc;

impl Scheduler {
    pub(crate) fn handle_get(&mut self, view: DocumentView, reply_token: u64) -> CommandResult {
        self.resolve_or_build(view, Waiter::Get { reply_token })
    }

    /// Shared by `Get`, `Watch`, and the post-`Update` watcher refresh:
    /// resolves a view against the cache, joins an in-flight build if
    /// one already covers this fingerprint, or starts a new one.
    pub(crate) fn resolve_or_build(&mut self, view: DocumentView, waiter: Waiter) -> CommandResult {
        if let Err(e) = validate_document_view(&view) {
            self.reply_error(&waiter, e.to_string());
            return CommandResult::Error(e.to_string());
        }

        let namespace_name = view.root_path.clone();
        self.ensure_namespace(&namespace_name).touch();

        let version = if view.version == 0 {
            self.namespace_by_path.get(&namespace_name).unwrap().current_version
        } else {
            view.version
        };
        let fingerprint = OverridesFingerprint::compute(&self.pool, &view, version);
        let key: WaitBuiltKey = (namespace_name.clone(), fingerprint.clone());

        let namespace = self.namespace_by_path.get_mut(&namespace_name).unwrap();
        if let Some(merged) = namespace.lookup_merged(&fingerprint) {
            let mut guard = merged.lock();
            match guard.status {
                MergedConfigStatus::Building => {
                    // Falls through to the coalesce-or-build path below.
                }
                MergedConfigStatus::OkConfigOptimized => {
                    guard.touch();
                    let value = guard.value.clone();
                    let preprocessed = guard.preprocessed_value.clone();
                    drop(guard);
                    self.metrics.inc_cache_hit();
                    self.reply_value_with_preprocessed(&waiter, version, value, preprocessed);
                    return CommandResult::Ok;
                }
                MergedConfigStatus::OkConfigNoOptimized => {
                    guard.touch();
                    let value = guard.value.clone();
                    guard.status = MergedConfigStatus::OkConfigOptimizing;
                    drop(guard);
                    self.metrics.inc_cache_hit();
                    self.reply_value(&waiter, version, value.clone());
                    self.worker_jobs.dispatch(WorkerCommand::SerializeAndCache {
                        namespace: namespace_name.clone(),
                        fingerprint: fingerprint.clone(),
                        value,
                    });
                    return CommandResult::Ok;
                }
                MergedConfigStatus::OkConfigOptimizing | MergedConfigStatus::OkTemplate => {
                    guard.touch();
                    let value = guard.value.clone();
                    drop(guard);
                    self.metrics.inc_cache_hit();
                    self.reply_value(&waiter, version, value);
                    return CommandResult::Ok;
                }
            }
        }

        if let Some(wait_built) = self.wait_builts.get_mut(&key) {
            wait_built.add_waiter(waiter);
            self.metrics.inc_build_coalesced();
            return CommandResult::Ok;
        }

        self.metrics.inc_cache_miss();
        let elements_to_build = gather_elements_to_build(
            &self.pool,
            self.namespace_by_path.get(&namespace_name).unwrap(),
            &view,
            version,
        );
        let namespace = self.namespace_by_path.get_mut(&namespace_name).unwrap();
        let merged = Arc::new(Mutex::new(MergedConfig::building()));
        namespace.insert_merged(fingerprint.clone(), merged);

        let mut jobs = Vec::with_capacity(elements_to_build.len());
        for element in &elements_to_build {
            jobs.push(BuildJob {
                namespace: namespace_name.clone(),
                fingerprint: fingerprint.clone(),
                document: element.document.clone(),
                raw_configs: element.raw_configs.iter().cloned().collect(),
            });
        }

        let mut wait_built = WaitBuilt::new(fingerprint, view.template.clone(), elements_to_build);
        wait_built.add_waiter(waiter);
        self.wait_builts.insert(key, wait_built);

        for job in jobs {
            self.worker_jobs.dispatch(WorkerCommand::Build(job));
        }

        CommandResult::Ok
    }

    pub(crate) fn reply_value(&self, waiter: &Waiter, version: u32, value: crate::model::Element) {
        self.reply_value_with_preprocessed(waiter, version, value, None);
    }

    pub(crate) fn reply_value_with_preprocessed(
        &self,
        waiter: &Waiter,
        version: u32,
        value: crate::model::Element,
        preprocessed: Option<Arc<Vec<u8>>>,
    ) {
        let reply = ApiReply::Value {
            version,
            value,
            preprocessed,
        };
        self.dispatch_reply(waiter, reply);
    }

    pub(crate) fn reply_error(&self, waiter: &Waiter, message: String) {
        self.dispatch_reply(waiter, ApiReply::Error(message));
    }

    pub(crate) fn dispatch_reply(&self, waiter: &Waiter, reply: ApiReply) {
        match waiter {
            Waiter::Get { reply_token } => {
                self.worker_jobs.dispatch(WorkerCommand::ApiGetReply {
                    reply_token: *reply_token,
                    reply,
                });
            }
            Waiter::Watch { watcher_id, reply_token } => {
                self.worker_jobs.dispatch(WorkerCommand::ApiReply {
                    watcher_id: *watcher_id,
                    reply_token: *reply_token,
                    reply,
                });
            }
        }
    }
}

/// Resolves the primary document's layers plus, one level deep, every
/// document it references, matching the `reference_to` set recorded on
/// each raw config (`spec.md` §3 `raw_config.reference_to`).
fn gather_elements_to_build(
    pool: &crate::string_pool::StringPool,
    namespace: &ConfigNamespace,
    view: &DocumentView,
    version: u32,
) -> Vec<ElementToBuild> {
    let primary = resolve_document_layers(pool, namespace, &view.document, &view.overrides, &view.flavors, version);
    let mut referenced_docs = std::collections::BTreeSet::new();
    for rc in &primary {
        referenced_docs.extend(rc.reference_to.iter().cloned());
    }

    let mut elements = vec![ElementToBuild::new(view.document.clone(), primary)];
    for doc in referenced_docs {
        let layers = resolve_document_layers(pool, namespace, &doc, &view.overrides, &view.flavors, version);
        elements.push(ElementToBuild::new(doc, layers));
    }
    elements
}

/// Interns each `(override, flavor)` combination through the same pool
/// `Update` used, so the two sides' `override_by_key` lookups agree.
/// Layers are applied in order: each requested override's base, then
/// that same override under each requested flavor in turn.
fn resolve_document_layers(
    pool: &crate::string_pool::StringPool,
    namespace: &ConfigNamespace,
    document: &str,
    overrides: &[String],
    flavors: &[String],
    version: u32,
) -> Vec<Arc<crate::model::RawConfig>> {
    let Some(doc_meta) = namespace.document_metadata.get(document) else {
        return Vec::new();
    };

    let mut layer_keys = Vec::with_capacity(overrides.len() * (flavors.len() + 1));
    for over in overrides {
        layer_keys.push(crate::model::override_key_string(over, None));
        for flavor in flavors {
            layer_keys.push(crate::model::override_key_string(over, Some(flavor)));
        }
    }

    layer_keys
        .iter()
        .filter_map(|layer| {
            let key = pool.add_str(layer);
            doc_meta
                .override_by_key
                .get(&key)
                .and_then(|om| om.latest_at(version))
                .flatten()
                .cloned()
        })
        .collect()
}
