//! The worker pool: stateless threads that do everything the scheduler
//! thread must not block on — composing documents, serializing
//! replies, parsing ingested bytes (`spec.md` §4.E).

pub mod build;
pub mod command;

pub use command::WorkerCommand;

use crate::interfaces::{Builder, Files, Metrics, ReplyAPI};
use crate::model::DocumentUpdate;
use crate::queue::{Mpsc, MpscSender, SpmcReceiver};
use crate::scheduler::command::{BuiltElement, SchedulerCommand};
use crate::string_pool::StringPool;
use std::sync::Arc;
use std::thread::JoinHandle;

/// A running pool of worker threads sharing one job queue. Dropping
/// this joins every thread, which requires the scheduler to stop
/// dispatching jobs (the `Spmc` has no explicit shutdown signal; tests
/// that spin up a pool keep it alive for the test's duration only).
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        num_workers: usize,
        jobs: SpmcReceiver<WorkerCommand>,
        scheduler_commands: Arc<Mpsc<SchedulerCommand>>,
        builder: Arc<dyn Builder>,
        reply_api: Arc<dyn ReplyAPI>,
        metrics: Arc<dyn Metrics>,
        files: Arc<dyn Files>,
        pool: StringPool,
    ) -> Self {
        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let jobs = jobs.clone();
            let sched_sender = scheduler_commands.new_sender();
            let builder = builder.clone();
            let reply_api = reply_api.clone();
            let metrics = metrics.clone();
            let files = files.clone();
            let pool = pool.clone();
            let handle = std::thread::Builder::new()
                .name(format!("mhconfig-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, jobs, sched_sender, builder, reply_api, metrics, files, pool))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        Self { handles }
    }

    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    worker_id: usize,
    jobs: SpmcReceiver<WorkerCommand>,
    scheduler_commands: MpscSender<SchedulerCommand>,
    builder: Arc<dyn Builder>,
    reply_api: Arc<dyn ReplyAPI>,
    metrics: Arc<dyn Metrics>,
    files: Arc<dyn Files>,
    pool: StringPool,
) {
    tracing::debug!(worker_id, "worker starting");
    loop {
        let command = jobs.recv();
        match command {
            WorkerCommand::Build(job) => {
                let namespace = job.namespace.clone();
                let fingerprint = job.fingerprint.clone();
                let document = job.document.clone();
                let value = build::build_document(&builder, &job);
                metrics.inc_build();
                scheduler_commands.send(SchedulerCommand::SetDocuments {
                    namespace,
                    built: vec![BuiltElement {
                        fingerprint,
                        document,
                        value,
                    }],
                });
            }
            WorkerCommand::ApiGetReply { reply_token, reply } => {
                reply_api.reply(reply_token, reply);
            }
            WorkerCommand::ApiReply {
                watcher_id,
                reply_token,
                reply,
            } => {
                reply_api.reply_watch(watcher_id, reply_token, reply);
            }
            WorkerCommand::ApiBatchReply { reply_tokens, reply } => {
                for token in reply_tokens {
                    reply_api.reply(token, reply.clone());
                }
            }
            WorkerCommand::Update { namespace, document, bytes } => {
                submit_parsed_update(&builder, &pool, &scheduler_commands, &namespace, &document, bytes);
            }
            WorkerCommand::Setup { namespace } => {
                match files.list_documents(&namespace) {
                    Ok(documents) => {
                        for document in documents {
                            match files.read(&document) {
                                Ok(bytes) => {
                                    submit_parsed_update(&builder, &pool, &scheduler_commands, &namespace, &document, bytes);
                                }
                                Err(e) => {
                                    tracing::warn!(worker_id, namespace, document, error = %e, "failed to read document during setup");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(worker_id, namespace, error = %e, "failed to list documents during setup");
                    }
                }
            }
            WorkerCommand::UnregisterWatchers(ids) => {
                tracing::debug!(worker_id, count = ids.len(), "dropping watcher registrations");
            }
            WorkerCommand::SerializeAndCache {
                namespace,
                fingerprint,
                value,
            } => {
                let preprocessed = Arc::new(build::serialize_preprocessed(&value));
                scheduler_commands.send(SchedulerCommand::SetOptimizedConfig {
                    namespace,
                    fingerprint,
                    preprocessed,
                });
            }
        }
    }
}

/// Shared by `Update` and `Setup`: parses one document's bytes through
/// `Builder::parse_bytes` and submits the result as a single-layer
/// `UpdateDocuments` (`spec.md` §4.E). `reply_token` is `0` since
/// nothing is waiting on this submission directly.
fn submit_parsed_update(
    builder: &Arc<dyn Builder>,
    pool: &StringPool,
    scheduler_commands: &MpscSender<SchedulerCommand>,
    namespace: &str,
    document: &str,
    bytes: Vec<u8>,
) {
    match builder.parse_bytes(pool, &document.to_string(), &bytes) {
        Ok(value) => {
            scheduler_commands.send(SchedulerCommand::UpdateDocuments {
                namespace: namespace.to_string(),
                root_path: namespace.to_string(),
                version: None,
                updates: vec![DocumentUpdate {
                    document: document.to_string(),
                    r#override: String::new(),
                    flavor: None,
                    value: Some(value),
                    reference_to: Vec::new(),
                }],
                reply_token: 0,
            });
        }
        Err(e) => {
            tracing::warn!(namespace, document, error = %e, "failed to parse ingested document");
        }
    }
}
