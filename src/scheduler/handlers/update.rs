//! `UpdateDocuments`: publishes a new version of zero or more
//! `(document, override, flavor)` layers and refreshes any watcher
//! whose view could be affected (`spec.md` §4.D, §4.F saturation).

use crate::config::{RAW_CONFIG_ID_SATURATION, VERSION_SATURATION};
use crate::error::MhConfigError;
use crate::model::{override_key_string, DocumentUpdate, RawConfig};
use crate::scheduler::{CommandResult, Scheduler};
use std::sync::Arc;

impl Scheduler {
    pub(crate) fn handle_update(
        &mut self,
        namespace: String,
        _root_path: String,
        version: Option<u32>,
        updates: Vec<DocumentUpdate>,
    ) -> CommandResult {
        let namespace_name = namespace.clone();
        self.ensure_namespace(&namespace_name).touch();

        let ns = self.namespace_by_path.get_mut(&namespace_name).unwrap();
        let target_version = match version {
            Some(v) if v <= ns.current_version => {
                return CommandResult::Error(
                    MhConfigError::UpdateRejected(format!(
                        "requested version {v} is not after current version {}",
                        ns.current_version
                    ))
                    .to_string(),
                );
            }
            Some(v) => v,
            None => ns.bump_version(),
        };
        if version.is_some() {
            ns.current_version = target_version;
        }

        let mut touched_overrides: Vec<(String, crate::string_pool::MhString)> = Vec::new();

        for update in &updates {
            let override_key_str = override_key_string(&update.r#override, update.flavor.as_deref());
            let key = self.pool.add_str(&override_key_str);
            touched_overrides.push((update.document.clone(), key.clone()));

            let ns = self.namespace_by_path.get_mut(&namespace_name).unwrap();
            let raw_config_id = ns.alloc_raw_config_id();
            let raw_config = match &update.value {
                Some(value) => Arc::new(RawConfig {
                    id: raw_config_id,
                    value: value.clone(),
                    reference_to: update.reference_to.iter().cloned().collect(),
                }),
                None => Arc::new(RawConfig::tombstone(raw_config_id)),
            };

            for referenced in &update.reference_to {
                ns.document_metadata
                    .entry(referenced.clone())
                    .or_default()
                    .incref(&update.document);
            }

            let doc_meta = ns.document_metadata.entry(update.document.clone()).or_default();
            doc_meta
                .override_by_key
                .entry(key.clone())
                .or_default()
                .raw_config_by_version
                .insert(target_version, Some(raw_config));
        }

        let ns = self.namespace_by_path.get_mut(&namespace_name).unwrap();
        let saturated =
            ns.next_raw_config_id >= RAW_CONFIG_ID_SATURATION || ns.current_version >= VERSION_SATURATION;

        self.refresh_watchers(&namespace, &touched_overrides);

        if saturated {
            self.softdelete_namespace(&namespace)
        } else {
            CommandResult::Ok
        }
    }

    /// For every override layer an update just touched, re-resolves
    /// every still-alive watcher registered against it, starting a
    /// fresh coalesced build exactly the way a `Watch` would.
    fn refresh_watchers(&mut self, namespace: &str, touched: &[(String, crate::string_pool::MhString)]) {
        let mut views = Vec::new();
        if let Some(ns) = self.namespace_by_path.get_mut(namespace) {
            for (document, key) in touched {
                let Some(doc_meta) = ns.document_metadata.get_mut(document) else {
                    continue;
                };
                let Some(over) = doc_meta.override_by_key.get_mut(key) else {
                    continue;
                };
                over.prune_expired_watchers();
                for weak in &over.watchers {
                    if let Some(watcher) = weak.upgrade() {
                        views.push((watcher.id, watcher.reply_token, watcher.view.clone()));
                    }
                }
            }
        }

        views.sort_by_key(|(id, _, _)| *id);
        views.dedup_by_key(|(id, _, _)| *id);

        for (watcher_id, reply_token, view) in views {
            self.resolve_or_build(view, crate::model::Waiter::Watch { watcher_id, reply_token });
        }
    }
}
