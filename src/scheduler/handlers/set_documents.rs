//! A worker finished composing one document; match it against the
//! `WaitBuilt`s it can complete and release their waiters
//! (`spec.md` §4.D, §4.E).

use crate::scheduler::command::BuiltElement;
use crate::scheduler::{CommandResult, Scheduler};

impl Scheduler {
    pub(crate) fn handle_set_documents(&mut self, namespace: String, built: Vec<BuiltElement>) -> CommandResult {
        for element in built {
            let key = (namespace.clone(), element.fingerprint.clone());
            let done = match self.wait_builts.get_mut(&key) {
                Some(wb) => wb.mark_built(&element.document, element.value),
                None => continue,
            };
            if done {
                self.complete_wait_built(&namespace, key);
            }
        }
        CommandResult::Ok
    }

    fn complete_wait_built(&mut self, namespace: &str, key: crate::scheduler::WaitBuiltKey) {
        let Some(wait_built) = self.wait_builts.remove(&key) else {
            return;
        };
        let value = wait_built.compose();

        if let Some(ns) = self.namespace_by_path.get(namespace) {
            if let Some(merged) = ns.lookup_merged(&wait_built.fingerprint) {
                let mut guard = merged.lock();
                guard.value = value.clone();
                guard.status = if wait_built.template.is_some() {
                    crate::model::MergedConfigStatus::OkTemplate
                } else {
                    crate::model::MergedConfigStatus::OkConfigNoOptimized
                };
                guard.touch();
            }
        }

        let version = self
            .namespace_by_path
            .get(namespace)
            .map(|ns| ns.current_version)
            .unwrap_or(0);

        for waiter in &wait_built.waiters {
            self.reply_value(waiter, version, value.clone());
        }
    }
}
