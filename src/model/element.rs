//! A minimal structured value tree.
//!
//! YAML ingestion, tag expansion and the actual override-merge algorithm
//! belong to the external `Builder` (`spec.md` §6); this type is just the
//! shape every raw/merged config carries so the scheduler and queues have
//! something concrete to move around and so tests can exercise merging
//! without a real YAML front end.

use crate::string_pool::MhString;
use std::collections::BTreeMap;

/// A parsed or composed configuration value.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    /// Absence of a value (also used as a delete-tombstone marker).
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(MhString),
    Sequence(Vec<Element>),
    /// Ordered by key so two maps built from the same inputs compare equal
    /// and serialize deterministically.
    Map(BTreeMap<String, Element>),
}

impl Element {
    /// `true` for the tombstone value used to mark a document deleted at
    /// a given version (`spec.md` §3, `override_metadata`).
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Element::Null)
    }

    /// Reference implementation of `Builder::override_with`: maps merge
    /// key-by-key (the overlay wins on conflict, recursing into nested
    /// maps); every other combination replaces the base outright. Real
    /// deployments supply their own `Builder` with tag-aware semantics.
    pub fn override_with(base: &Element, overlay: &Element) -> Element {
        match (base, overlay) {
            (Element::Map(base_map), Element::Map(overlay_map)) => {
                let mut merged = base_map.clone();
                for (k, v) in overlay_map {
                    let next = match merged.get(k) {
                        Some(existing) => Element::override_with(existing, v),
                        None => v.clone(),
                    };
                    merged.insert(k.clone(), next);
                }
                Element::Map(merged)
            }
            _ => overlay.clone(),
        }
    }
}
