//! Messages the scheduler thread consumes, one `Mpsc` lane per sender
//! (`spec.md` §4.C).

use crate::model::{DocumentUpdate, DocumentView, Element, OverridesFingerprint};

/// Identifies which `ElementToBuild` a finished build result belongs
/// to, so a `SetDocuments` command can be matched back against every
/// `WaitBuilt` it completes.
#[derive(Debug, Clone)]
pub struct BuiltElement {
    pub fingerprint: OverridesFingerprint,
    pub document: String,
    pub value: Element,
}

#[derive(Debug)]
pub enum SchedulerCommand {
    Get {
        view: DocumentView,
        reply_token: u64,
    },
    Watch {
        view: DocumentView,
        reply_token: u64,
    },
    /// Resolved identically to `Get` today; kept distinct because a
    /// tracing deployment's reply path (span propagation, sampling
    /// decisions) differs from a plain `Get`'s even though the
    /// namespace/build resolution is the same (`spec.md` §6).
    Trace {
        view: DocumentView,
        reply_token: u64,
    },
    UnwatchClient {
        watcher_id: u64,
    },
    UpdateDocuments {
        namespace: String,
        root_path: String,
        version: Option<u32>,
        updates: Vec<DocumentUpdate>,
        reply_token: u64,
    },
    /// A worker finished composing one document for a `WaitBuilt`.
    SetDocuments {
        namespace: String,
        built: Vec<BuiltElement>,
    },
    /// A worker finished serializing a `merged_config`'s optimized byte
    /// form; flips it from `OkConfigOptimizing` to `OkConfigOptimized`
    /// if it's still the same entry (`spec.md` §4.D).
    SetOptimizedConfig {
        namespace: String,
        fingerprint: OverridesFingerprint,
        preprocessed: std::sync::Arc<Vec<u8>>,
    },
    /// GENERIC's namespace-lifecycle sibling: ensures a namespace
    /// exists for `root_path`, creating it (and triggering worker
    /// `Setup`) on first mention (`spec.md` §3 Lifecycle, §4.C).
    AddNamespace {
        root_path: String,
    },
    GetNamespaceByPath {
        root_path: String,
        reply_token: u64,
    },
    GetNamespaceById {
        id: u64,
        reply_token: u64,
    },
    RemoveNamespace {
        namespace: String,
        reply_token: u64,
    },
    RunGc {
        gc_type: crate::gc::GcType,
        reply_token: Option<u64>,
    },
}

/// What the scheduler tells the caller synchronously for commands that
/// don't defer to a worker (`spec.md` §4.C `CommandResult`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Ok,
    SoftDeleteNamespace,
    Error(String),
}
