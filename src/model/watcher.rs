//! Long-lived clients interested in future versions of a document view.
//!
//! A watcher is held weakly everywhere in the namespace; the strong
//! reference lives with the API layer's client connection, so a client
//! disconnect naturally expires every weak pointer to it (`spec.md` §5,
//! "Cancellation and timeouts").

use super::request::DocumentView;

/// A registered watch. The scheduler never owns a strong reference to
/// one: every index (`override_metadata.watchers`,
/// `config_namespace.watchers`) stores a `Weak<Watcher>`.
#[derive(Debug)]
pub struct Watcher {
    pub id: u64,
    pub view: DocumentView,
    /// The token the registering client gave us; every future push
    /// for this watch is delivered tagged with it, unchanged.
    pub reply_token: u64,
}

impl Watcher {
    pub fn new(id: u64, view: DocumentView, reply_token: u64) -> Self {
        Self { id, view, reply_token }
    }
}
