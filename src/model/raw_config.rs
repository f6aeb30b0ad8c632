//! One parsed document version, and the indices built over it.
//!
//! See `spec.md` §3: `raw_config`, `override_metadata`,
//! `document_metadata`.

use super::element::Element;
use super::request::DocumentName;
use crate::string_pool::MhString;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Weak};

/// Identifier assigned by `config_namespace.next_raw_config_id`.
pub type RawConfigId = u32;

/// One parsed document version. Immutable once published; shared by
/// `Arc` so worker threads can hold it independently of the owning
/// namespace's lifetime.
#[derive(Debug)]
pub struct RawConfig {
    pub id: RawConfigId,
    pub value: Element,
    pub reference_to: BTreeSet<DocumentName>,
}

impl RawConfig {
    /// A tombstone raw config: present in the version history but
    /// carrying no value, used to mark a document deleted at a version.
    pub fn tombstone(id: RawConfigId) -> Self {
        Self {
            id,
            value: Element::Null,
            reference_to: BTreeSet::new(),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_tombstone()
    }
}

/// The history of one override path's raw configs, plus the watchers
/// registered against it.
#[derive(Default)]
pub struct OverrideMetadata {
    /// Strictly increasing by key. A `None` at a version means "deleted
    /// at this version".
    pub raw_config_by_version: BTreeMap<u32, Option<Arc<RawConfig>>>,
    pub watchers: Vec<Weak<super::watcher::Watcher>>,
}

impl OverrideMetadata {
    /// The most recent raw config at or before `version`, skipping
    /// tombstones only if the caller asks for the live value.
    pub fn latest_at(&self, version: u32) -> Option<Option<&Arc<RawConfig>>> {
        self.raw_config_by_version
            .range(..=version)
            .next_back()
            .map(|(_, v)| v.as_ref())
    }

    /// The most recent entry regardless of version, used when cloning
    /// forward during an `Update`.
    pub fn most_recent(&self) -> Option<&Option<Arc<RawConfig>>> {
        self.raw_config_by_version.values().next_back()
    }

    pub fn prune_expired_watchers(&mut self) -> usize {
        let before = self.watchers.len();
        self.watchers.retain(|w| w.strong_count() > 0);
        before - self.watchers.len()
    }
}

/// Per-document index: its overrides and the reverse reference count
/// used to compute "what else is affected" on update.
#[derive(Default)]
pub struct DocumentMetadata {
    pub override_by_key: HashMap<MhString, OverrideMetadata>,
    pub referenced_by: HashMap<DocumentName, u32>,
}

impl DocumentMetadata {
    pub fn incref(&mut self, referencing_document: &DocumentName) {
        *self
            .referenced_by
            .entry(referencing_document.clone())
            .or_insert(0) += 1;
    }

    pub fn decref(&mut self, referencing_document: &DocumentName) {
        if let Some(count) = self.referenced_by.get_mut(referencing_document) {
            *count -= 1;
            if *count == 0 {
                self.referenced_by.remove(referencing_document);
            }
        }
    }
}
