//! A registered `Watch` gets pushed a fresh value once an `Update`
//! touches an override layer in its view (`spec.md` §4.D "watch", §5).

use mhconfig_core::config::Config;
use mhconfig_core::interfaces::fakes::{CountingMetrics, FakeBuilder};
use mhconfig_core::interfaces::ApiReply;
use mhconfig_core::model::{DocumentUpdate, DocumentView, Element};
use mhconfig_core::queue::Spmc;
use mhconfig_core::scheduler::command::BuiltElement;
use mhconfig_core::scheduler::{CommandResult, SchedulerCommand};
use mhconfig_core::string_pool::StringPool;
use mhconfig_core::worker::WorkerCommand;
use mhconfig_core::Scheduler;
use std::sync::Arc;

fn view() -> DocumentView {
    DocumentView {
        root_path: "default".into(),
        overrides: vec!["base".into()],
        flavors: vec![],
        document: "app".into(),
        template: None,
        version: 0,
    }
}

fn drain_build(jobs_rx: &mhconfig_core::queue::SpmcReceiver<WorkerCommand>) -> mhconfig_core::worker::command::BuildJob {
    match jobs_rx.recv() {
        WorkerCommand::Build(job) => job,
        other => panic!("expected a Build job, got {other:?}"),
    }
}

#[test]
fn update_pushes_a_fresh_value_to_every_watcher_of_the_touched_override() {
    let worker_jobs = Arc::new(Spmc::<WorkerCommand>::new(16));
    let jobs_rx = worker_jobs.new_receiver();
    let metrics = Arc::new(CountingMetrics::default());
    let mut scheduler = Scheduler::new(
        Config::for_tests(),
        StringPool::new(),
        Arc::new(FakeBuilder),
        metrics,
        worker_jobs,
    );

    let watch_result = scheduler.dispatch(SchedulerCommand::Watch {
        view: view(),
        reply_token: 10,
    });
    assert_eq!(watch_result, CommandResult::Ok);

    // Initial build triggered by registering the watch.
    let initial_job = drain_build(&jobs_rx);
    let initial_value = Element::Int(1);
    scheduler.dispatch(SchedulerCommand::SetDocuments {
        namespace: "default".into(),
        built: vec![BuiltElement {
            fingerprint: initial_job.fingerprint.clone(),
            document: "app".into(),
            value: initial_value.clone(),
        }],
    });

    let watcher_id = match jobs_rx.recv() {
        WorkerCommand::ApiReply {
            watcher_id,
            reply_token,
            reply,
        } => {
            assert_eq!(reply_token, 10);
            match reply {
                ApiReply::Value { value, .. } => assert_eq!(value, initial_value),
                other => panic!("expected a Value reply, got {other:?}"),
            }
            watcher_id
        }
        other => panic!("expected an ApiReply for the watch, got {other:?}"),
    };

    // An update to the same override the watch named pushes a second,
    // fresh build for that watcher — not a replay of the stale cached
    // value, since the namespace's version just moved.
    let update_result = scheduler.dispatch(SchedulerCommand::UpdateDocuments {
        namespace: "default".into(),
        root_path: "default".into(),
        version: None,
        updates: vec![DocumentUpdate {
            document: "app".into(),
            r#override: "base".into(),
            flavor: None,
            value: Some(Element::Int(2)),
            reference_to: Vec::new(),
        }],
        reply_token: 999,
    });
    assert_eq!(update_result, CommandResult::Ok);

    let refresh_job = drain_build(&jobs_rx);
    assert_ne!(
        refresh_job.fingerprint, initial_job.fingerprint,
        "a version bump must mint a new fingerprint rather than reuse the stale one"
    );
    let refreshed_value = Element::Int(2);
    scheduler.dispatch(SchedulerCommand::SetDocuments {
        namespace: "default".into(),
        built: vec![BuiltElement {
            fingerprint: refresh_job.fingerprint,
            document: "app".into(),
            value: refreshed_value.clone(),
        }],
    });

    match jobs_rx.recv() {
        WorkerCommand::ApiReply {
            watcher_id: replayed_watcher_id,
            reply_token,
            reply,
        } => {
            assert_eq!(replayed_watcher_id, watcher_id);
            assert_eq!(reply_token, 10);
            match reply {
                ApiReply::Value { value, .. } => assert_eq!(value, refreshed_value),
                other => panic!("expected a Value reply, got {other:?}"),
            }
        }
        other => panic!("expected the watcher's refreshed reply, got {other:?}"),
    }
}

#[test]
fn unwatch_stops_further_pushes_and_drops_the_strong_registration() {
    let worker_jobs = Arc::new(Spmc::<WorkerCommand>::new(16));
    let jobs_rx = worker_jobs.new_receiver();
    let metrics = Arc::new(CountingMetrics::default());
    let mut scheduler = Scheduler::new(
        Config::for_tests(),
        StringPool::new(),
        Arc::new(FakeBuilder),
        metrics,
        worker_jobs,
    );

    scheduler.dispatch(SchedulerCommand::Watch {
        view: view(),
        reply_token: 10,
    });
    let job = drain_build(&jobs_rx);
    scheduler.dispatch(SchedulerCommand::SetDocuments {
        namespace: "default".into(),
        built: vec![BuiltElement {
            fingerprint: job.fingerprint,
            document: "app".into(),
            value: Element::Int(1),
        }],
    });
    let watcher_id = match jobs_rx.recv() {
        WorkerCommand::ApiReply { watcher_id, .. } => watcher_id,
        other => panic!("expected an ApiReply, got {other:?}"),
    };

    let unwatch_result = scheduler.dispatch(SchedulerCommand::UnwatchClient { watcher_id });
    assert_eq!(unwatch_result, CommandResult::Ok);
    match jobs_rx.recv() {
        WorkerCommand::UnregisterWatchers(ids) => assert_eq!(ids, vec![watcher_id]),
        other => panic!("expected UnregisterWatchers, got {other:?}"),
    }

    let second = scheduler.dispatch(SchedulerCommand::UnwatchClient { watcher_id });
    assert_eq!(second, CommandResult::Error(format!("unknown watcher {watcher_id}")));
}
