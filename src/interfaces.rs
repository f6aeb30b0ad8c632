//! Trait seams for the collaborators `spec.md` treats as external:
//! ingestion submission, the override-merge algorithm, the wire reply
//! path, metrics export and file discovery (`spec.md` §6, Non-goals).
//! The core depends only on these traits, never on a concrete
//! gRPC/YAML/fs implementation.

use crate::error::Result;
use crate::gc::GcType;
use crate::model::{DocumentName, DocumentUpdate, DocumentView, Element};
use crate::queue::MpscSender;
use crate::scheduler::SchedulerCommand;
use crate::string_pool::StringPool;
use std::sync::Arc;

/// The client-facing submission surface: every method wraps a
/// thread-safe push into the scheduler's `Mpsc<SchedulerCommand>` inbox
/// and returns immediately, the reply arriving later through
/// `ReplyAPI` (`spec.md` §6).
pub trait IngestAPI: Send + Sync {
    fn submit_get(&self, view: DocumentView, reply_token: u64);
    fn submit_watch(&self, view: DocumentView, reply_token: u64);
    fn submit_trace(&self, view: DocumentView, reply_token: u64);
    fn submit_update(
        &self,
        namespace: String,
        root_path: String,
        version: Option<u32>,
        updates: Vec<DocumentUpdate>,
        reply_token: u64,
    );
    fn submit_run_gc(&self, gc_type: GcType, reply_token: Option<u64>);
}

/// The only `IngestAPI` implementation this crate ships: a thin
/// wrapper around a scheduler-queue `Sender`. A deployment's gRPC
/// front end holds one of these per connection.
pub struct SchedulerIngest {
    sender: MpscSender<SchedulerCommand>,
}

impl SchedulerIngest {
    pub fn new(sender: MpscSender<SchedulerCommand>) -> Self {
        Self { sender }
    }
}

impl IngestAPI for SchedulerIngest {
    fn submit_get(&self, view: DocumentView, reply_token: u64) {
        self.sender.send(SchedulerCommand::Get { view, reply_token });
    }

    fn submit_watch(&self, view: DocumentView, reply_token: u64) {
        self.sender.send(SchedulerCommand::Watch { view, reply_token });
    }

    fn submit_trace(&self, view: DocumentView, reply_token: u64) {
        self.sender.send(SchedulerCommand::Trace { view, reply_token });
    }

    fn submit_update(
        &self,
        namespace: String,
        root_path: String,
        version: Option<u32>,
        updates: Vec<DocumentUpdate>,
        reply_token: u64,
    ) {
        self.sender.send(SchedulerCommand::UpdateDocuments {
            namespace,
            root_path,
            version,
            updates,
            reply_token,
        });
    }

    fn submit_run_gc(&self, gc_type: GcType, reply_token: Option<u64>) {
        self.sender.send(SchedulerCommand::RunGc { gc_type, reply_token });
    }
}

/// The override-merge algorithm, plus the ingestion-time parse step a
/// real deployment does with YAML + tag expansion. `Element`'s own
/// `override_with` and this trait's default `parse_bytes` are
/// reference implementations good enough for tests; a production
/// `Builder` additionally expands tags (`!ref`, `!env`, ...) and
/// enforces document-specific schema.
pub trait Builder: Send + Sync {
    fn override_with(&self, base: &Element, overlay: &Element) -> Element {
        Element::override_with(base, overlay)
    }

    fn is_a_valid_document_name(&self, name: &str) -> bool {
        !name.is_empty() && !name.contains('/') && !name.contains('\\')
    }

    /// Parses one ingested document's raw bytes into its composed
    /// `Element`, the way `worker::WorkerCommand::Update`/`Setup`
    /// prepare a `DocumentUpdate` (`spec.md` §4.E). The default treats
    /// `bytes` as UTF-8 text and wraps it in `Element::Str`; a real
    /// `Builder` parses YAML instead.
    fn parse_bytes(&self, pool: &StringPool, _document: &DocumentName, bytes: &[u8]) -> Result<Element> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        Ok(Element::Str(pool.add_str(&text)))
    }
}

/// What the scheduler hands back to a client: a finished value, a
/// not-found, or a deferred watch registration. The wire encoding
/// (protobuf/gRPC) lives entirely outside the core.
#[derive(Debug, Clone)]
pub enum ApiReply {
    Value {
        version: u32,
        value: Element,
        preprocessed: Option<Arc<Vec<u8>>>,
    },
    NotFound,
    Error(String),
}

/// Delivers a finished reply back to whatever's holding the client
/// connection open. One `reply_token` per in-flight request/watch,
/// opaque to the core.
pub trait ReplyAPI: Send + Sync {
    fn reply(&self, reply_token: u64, reply: ApiReply);
    fn reply_watch(&self, watcher_id: u64, reply_token: u64, reply: ApiReply);
}

/// Counters the core increments; a real deployment wires this to
/// Prometheus, tests use an in-memory accumulator.
pub trait Metrics: Send + Sync {
    fn inc_build(&self) {}
    fn inc_build_coalesced(&self) {}
    fn inc_cache_hit(&self) {}
    fn inc_cache_miss(&self) {}
    fn inc_gc_sweep(&self, freed: u64) {
        let _ = freed;
    }
    fn observe_watchers(&self, count: u64) {
        let _ = count;
    }
}

/// Where documents live on disk and how to watch for changes; file
/// discovery and inotify-style plumbing are both external to the core
/// (`spec.md` §6, Non-goals).
pub trait Files: Send + Sync {
    fn read(&self, relative_path: &str) -> Result<Vec<u8>>;
    fn list_documents(&self, root_path: &str) -> Result<Vec<DocumentName>>;
}

/// In-memory fakes used across the test suite; never compiled into a
/// production binary.
#[cfg(any(test, feature = "test-util"))]
pub mod fakes {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeBuilder;
    impl Builder for FakeBuilder {}

    #[derive(Default)]
    pub struct RecordingReply {
        pub replies: Mutex<Vec<(u64, ApiReply)>>,
        pub watch_replies: Mutex<Vec<(u64, u64, ApiReply)>>,
    }

    impl ReplyAPI for RecordingReply {
        fn reply(&self, reply_token: u64, reply: ApiReply) {
            self.replies.lock().push((reply_token, reply));
        }

        fn reply_watch(&self, watcher_id: u64, reply_token: u64, reply: ApiReply) {
            self.watch_replies.lock().push((watcher_id, reply_token, reply));
        }
    }

    #[derive(Default)]
    pub struct CountingMetrics {
        pub builds: std::sync::atomic::AtomicU64,
        pub coalesced: std::sync::atomic::AtomicU64,
        pub cache_hits: std::sync::atomic::AtomicU64,
        pub cache_misses: std::sync::atomic::AtomicU64,
    }

    impl Metrics for CountingMetrics {
        fn inc_build(&self) {
            self.builds.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        fn inc_build_coalesced(&self) {
            self.coalesced.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        fn inc_cache_hit(&self) {
            self.cache_hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        fn inc_cache_miss(&self) {
            self.cache_misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    #[derive(Default)]
    pub struct FakeFiles {
        pub files: HashMap<String, Vec<u8>>,
    }

    impl Files for FakeFiles {
        fn read(&self, relative_path: &str) -> Result<Vec<u8>> {
            self.files
                .get(relative_path)
                .cloned()
                .ok_or_else(|| crate::error::MhConfigError::MissingDocument(relative_path.into()))
        }

        fn list_documents(&self, _root_path: &str) -> Result<Vec<DocumentName>> {
            Ok(self.files.keys().cloned().collect())
        }
    }
}
