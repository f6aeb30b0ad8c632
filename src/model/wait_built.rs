//! Coalesces every requester blocked on the same build.
//!
//! A `Get` that misses the cache, and every other `Get`/`Watch` that
//! names the same overrides fingerprint before the build finishes,
//! share exactly one `WaitBuilt` (`spec.md` §4.D, "at most one build in
//! flight per fingerprint").

use super::element::Element;
use super::fingerprint::OverridesFingerprint;
use super::raw_config::RawConfig;
use super::request::DocumentName;
use std::sync::Arc;

/// One requester parked on a `WaitBuilt`, identified by the opaque
/// reply token the API layer gave us; the scheduler never interprets
/// it, only hands it back via `ReplyAPI`/`WorkerCommand::ApiGetReply`.
#[derive(Clone, Debug)]
pub enum Waiter {
    Get { reply_token: u64 },
    Watch { watcher_id: u64, reply_token: u64 },
}

/// One document that must be (re)composed before the fingerprint's
/// final value is ready. A document can require building its own
/// layered raw configs even when it's only pulled in because the
/// primary document `reference_to`s it.
pub struct ElementToBuild {
    pub document: DocumentName,
    pub raw_configs: Vec<Arc<RawConfig>>,
    pub built: Option<Element>,
}

impl ElementToBuild {
    pub fn new(document: DocumentName, raw_configs: Vec<Arc<RawConfig>>) -> Self {
        Self {
            document,
            raw_configs,
            built: None,
        }
    }
}

/// The coalescing record for one overrides fingerprint's in-flight
/// build.
pub struct WaitBuilt {
    pub fingerprint: OverridesFingerprint,
    pub template: Option<DocumentName>,
    pub waiters: Vec<Waiter>,
    pub elements_to_build: Vec<ElementToBuild>,
}

impl WaitBuilt {
    pub fn new(
        fingerprint: OverridesFingerprint,
        template: Option<DocumentName>,
        elements_to_build: Vec<ElementToBuild>,
    ) -> Self {
        Self {
            fingerprint,
            template,
            waiters: Vec::new(),
            elements_to_build,
        }
    }

    pub fn add_waiter(&mut self, waiter: Waiter) {
        self.waiters.push(waiter);
    }

    /// Records a worker's `SetDocuments` result for `document`. Returns
    /// `true` once every element this fingerprint needed has arrived,
    /// meaning the scheduler may now compose the final value and
    /// release every waiter.
    pub fn mark_built(&mut self, document: &str, value: Element) -> bool {
        if let Some(entry) = self
            .elements_to_build
            .iter_mut()
            .find(|e| e.document == document)
        {
            entry.built = Some(value);
        }
        self.is_fully_built()
    }

    pub fn is_fully_built(&self) -> bool {
        self.elements_to_build.iter().all(|e| e.built.is_some())
    }

    /// Composes the primary document (first entry) over every
    /// referenced document's built value, in `reference_to` order, via
    /// `Element::override_with`.
    pub fn compose(&self) -> Element {
        self.elements_to_build
            .iter()
            .filter_map(|e| e.built.clone())
            .reduce(|base, overlay| Element::override_with(&base, &overlay))
            .unwrap_or(Element::Null)
    }
}
