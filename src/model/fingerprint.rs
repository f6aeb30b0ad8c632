//! Canonicalizes a request's override/flavor stack into the stable key
//! used to coalesce builds and to index `merged_config` (`spec.md` §3,
//! "overrides fingerprint").

use super::request::DocumentView;
use crate::string_pool::{MhString, StringPool};

/// A canonical, content-addressed key for one `(root_path, overrides,
/// flavors, document, template, version)` tuple. Two requests that name
/// the same layers at the same resolved version always produce an equal
/// fingerprint, which is exactly the property `wait_built` coalescing
/// and the `merged_config` lookup table depend on.
///
/// The resolved version (never `0`, the "current" sentinel — callers
/// resolve that before computing) is part of the key: a `merged_config`
/// built for version N must never be handed back once the namespace has
/// moved to N+1, so an `Update` that bumps the version makes every
/// fingerprint naming the old version a distinct, no-longer-looked-up
/// key rather than something that needs active invalidation. Cache
/// generation GC reclaims the orphaned entry the same way it reclaims
/// any other cold `merged_config`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OverridesFingerprint(MhString);

impl OverridesFingerprint {
    /// Builds the fingerprint by interning a delimited join of every
    /// layer name plus the document, optional template, and resolved
    /// version. Delimiters are ASCII unit separators so no legal
    /// override/document name can collide with the joiner.
    pub fn compute(pool: &StringPool, view: &DocumentView, version: u32) -> Self {
        const SEP: char = '\u{1f}';
        let mut key = String::new();
        key.push_str(&view.root_path);
        key.push(SEP);
        for o in &view.overrides {
            key.push_str(o);
            key.push(SEP);
        }
        for f in &view.flavors {
            key.push_str(f);
            key.push(SEP);
        }
        key.push_str(&view.document);
        key.push(SEP);
        if let Some(t) = &view.template {
            key.push_str(t);
        }
        key.push(SEP);
        key.push_str(&version.to_string());
        Self(pool.add_str(&key))
    }

    pub fn as_mh_string(&self) -> &MhString {
        &self.0
    }
}
