//! Messages dispatched round-robin to the worker pool (`spec.md` §4.E).

use crate::interfaces::ApiReply;
use crate::model::{Element, OverridesFingerprint, RawConfig};
use smallvec::SmallVec;
use std::sync::Arc;

/// One document's build job: the layered raw configs to fold with
/// `Builder::override_with`, in override-then-flavor order. Most views
/// name only a handful of override/flavor layers, so this stays on the
/// stack for the common case instead of allocating.
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub namespace: String,
    pub fingerprint: OverridesFingerprint,
    pub document: String,
    pub raw_configs: SmallVec<[Arc<RawConfig>; 4]>,
}

#[derive(Debug)]
pub enum WorkerCommand {
    /// Compose one document's layers and report the result back to the
    /// scheduler as `SchedulerCommand::SetDocuments`.
    Build(BuildJob),
    /// Serialize and deliver a reply for a single-document `Get`.
    ApiGetReply {
        reply_token: u64,
        reply: ApiReply,
    },
    /// Serialize and deliver a reply to a registered watch.
    ApiReply {
        watcher_id: u64,
        reply_token: u64,
        reply: ApiReply,
    },
    /// Deliver the same finished value to several waiters at once
    /// (coalesced `Get`s on one fingerprint).
    ApiBatchReply {
        reply_tokens: Vec<u64>,
        reply: ApiReply,
    },
    /// Parse an ingested update outside the scheduler's single thread
    /// and submit the result as `SchedulerCommand::UpdateDocuments`.
    Update {
        namespace: String,
        document: String,
        bytes: Vec<u8>,
    },
    /// First-touch initialization for a namespace just created by
    /// `AddNamespace`: lists every document under `namespace` through
    /// `Files` and submits one `Update` per file found (`spec.md` §3
    /// Lifecycle, §4.E).
    Setup {
        namespace: String,
    },
    /// Drop the registry's strong references for watchers whose client
    /// connection went away, letting every weak index entry expire.
    UnregisterWatchers(Vec<u64>),
    /// Serialize a finished `merged_config`'s value into its cached
    /// byte form and report it back as `SchedulerCommand::SetOptimizedConfig`
    /// (`spec.md` §4.D, the `OK_CONFIG_OPTIMIZING` -> `OK_CONFIG_OPTIMIZED`
    /// transition).
    SerializeAndCache {
        namespace: String,
        fingerprint: OverridesFingerprint,
        value: Element,
    },
}
