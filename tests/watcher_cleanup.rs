//! Property 7: after watchers are dropped (`UnwatchClient`, or a client
//! simply disconnecting and its `Weak` expiring), every referenced weak
//! handle fails to upgrade and `num_watchers` equals the count of
//! watchers still alive (`spec.md` §8 property 7).

use mhconfig_core::model::namespace::ConfigNamespace;
use mhconfig_core::model::{DocumentView, Watcher};
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

#[test]
fn explicit_unwatch_and_later_reaping_both_keep_num_watchers_in_sync() {
    let mut ns = ConfigNamespace::new("default");

    // `a` is unwatched explicitly; `b` will simply disconnect without
    // one; `c` stays alive throughout.
    let a = Arc::new(Watcher::new(1, view(), 1));
    let b = Arc::new(Watcher::new(2, view(), 2));
    let c = Arc::new(Watcher::new(3, view(), 3));
    ns.namespace_watchers.push(Arc::downgrade(&a));
    ns.namespace_watchers.push(Arc::downgrade(&b));
    ns.namespace_watchers.push(Arc::downgrade(&c));
    ns.num_watchers = 3;

    // Mirrors `Scheduler::handle_unwatch`: called while the caller
    // still holds `a`'s last strong reference, so the dangling weak
    // left behind is already unlinked before it could ever reach a GC
    // sweep and be double-counted.
    ns.remove_watcher(&a);
    drop(a);
    assert_eq!(ns.num_watchers, 2);
    assert_eq!(ns.namespace_watchers.len(), 2);

    // `b` disconnects without an explicit `UnwatchClient`; only a later
    // GC `DeadPointers` pass notices and reconciles the counter.
    drop(b);
    let reaped = ns.prune_expired_watchers();
    assert_eq!(reaped, 1);
    assert_eq!(ns.num_watchers, 1);
    assert_eq!(ns.namespace_watchers.len(), 1);
    assert!(ns.namespace_watchers[0].upgrade().is_some());

    drop(c);
}
