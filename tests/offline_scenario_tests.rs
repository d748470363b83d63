//! End-to-end offline scenarios
//!
//! Runs the whole runtime on an in-memory store with a scripted backend:
//! - A ride created offline is synced once connectivity returns
//! - Reconnect triggers exactly one drain
//! - An outage seen by the background monitor stops a running drain
//! - A one-shot drain reports everything it synced
//! - Cached reads stay available throughout

mod common;

use common::{wait_until, MockApi};
use ridesync::cache::EntityKind;
use ridesync::clock::ManualClock;
use ridesync::error::ActionError;
use ridesync::queue::ActionType;
use ridesync::storage::MemoryStore;
use ridesync::sync::{DrainOutcome, Submission, SyncEvent};
use ridesync::{Config, OfflineRuntime};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn runtime(api: Arc<MockApi>) -> OfflineRuntime {
    OfflineRuntime::new(
        Arc::new(MemoryStore::new()),
        api,
        Arc::new(ManualClock::new(1_700_000_000_000)),
        Config::default(),
    )
}

#[tokio::test]
async fn test_ride_created_offline_syncs_on_reconnect() {
    let api = MockApi::new();
    api.set_reachable(false);
    let runtime = runtime(api.clone());
    let engine = runtime.sync_engine();
    let cache = runtime.cache();

    assert!(!runtime.connectivity().refresh().await);

    let ride = json!({"id": "r1", "distance": 5000});
    cache.upsert(EntityKind::Rides, ride.clone());
    let submission = engine.submit(ActionType::CreateRide, ride.clone()).await;
    assert!(matches!(submission, Submission::Queued(_)));
    assert_eq!(engine.state().await.queue_size, 1);
    assert_eq!(cache.get(EntityKind::Rides, "r1"), Some(ride.clone()));
    assert_eq!(api.call_count(), 0);

    api.set_reachable(true);
    assert!(runtime.connectivity().refresh().await);

    assert_eq!(engine.state().await.queue_size, 0);
    assert_eq!(api.call_types(), vec![ActionType::CreateRide]);
    assert_eq!(api.calls()[0].payload, ride);
    assert_eq!(cache.get(EntityKind::Rides, "r1"), Some(ride));
}

#[tokio::test]
async fn test_reconnect_drains_once_per_transition() {
    let api = MockApi::new();
    api.set_reachable(false);
    let runtime = runtime(api.clone());
    let mut events = runtime.sync_engine().subscribe();

    runtime.connectivity().refresh().await;
    runtime
        .sync_engine()
        .enqueue(ActionType::TogglePostLike, json!({"post_id": "p1"}))
        .await
        .unwrap();

    api.set_reachable(true);
    runtime.connectivity().refresh().await;
    runtime.connectivity().refresh().await;
    runtime.connectivity().refresh().await;

    let mut drains = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SyncEvent::DrainFinished(_)) {
            drains += 1;
        }
    }
    assert_eq!(drains, 1);
    assert_eq!(api.call_count(), 1);
}

#[tokio::test]
async fn test_link_down_keeps_actions_queued() {
    let api = MockApi::new();
    let runtime = runtime(api.clone());
    assert!(runtime.connectivity().refresh().await);

    assert!(!runtime.connectivity().set_link_state(false).await);
    let submission = runtime
        .sync_engine()
        .submit(ActionType::LeaveGroup, json!({"group_id": "g1"}))
        .await;
    assert!(matches!(submission, Submission::Queued(_)));
    assert_eq!(api.call_count(), 0);

    assert!(runtime.connectivity().set_link_state(true).await);
    assert_eq!(runtime.sync_engine().queue().len().await, 0);
}

#[tokio::test]
async fn test_offline_read_through_serves_cache() {
    let api = MockApi::new();
    api.set_reachable(false);
    let runtime = runtime(api);
    runtime.connectivity().refresh().await;
    runtime.cache().upsert(EntityKind::Groups, json!({"id": "g1", "name": "Sunday riders"}));

    let online = runtime.connectivity().check_connection();
    let read = runtime
        .cache()
        .read_through(EntityKind::Groups, online, Duration::from_millis(100), || async {
            Ok::<_, ActionError>(Vec::new())
        })
        .await;

    assert!(read.from_cache);
    assert_eq!(read.items[0]["name"], "Sunday riders");
}

#[tokio::test]
async fn test_health_surface_reports_pending_work() {
    let api = MockApi::new();
    api.set_reachable(false);
    let runtime = runtime(api);
    runtime.connectivity().refresh().await;

    runtime
        .capture_task()
        .run(Ok(vec![common::raw_sample(0), common::raw_sample(1)]))
        .await;
    runtime
        .sync_engine()
        .enqueue(ActionType::CreateComment, json!({"post_id": "p1", "body": "nice"}))
        .await
        .unwrap();

    let report = runtime.health_report().await;
    assert!(report.healthy);
    assert!(report.samples_flowing);
    assert_eq!(report.location_queue_size, 2);
    assert_eq!(report.sync.queue_size, 1);
    assert!(!report.sync.is_online);
}

#[tokio::test]
async fn test_outage_during_reconnect_drain_stops_dispatch() {
    let api = MockApi::new();
    api.set_reachable(false);
    let runtime = runtime(api.clone());
    let engine = runtime.sync_engine().clone();
    let connectivity = runtime.connectivity().clone();

    connectivity.refresh().await;
    for id in ["r1", "r2", "r3"] {
        engine.enqueue(ActionType::UpdateRide, json!({"id": id})).await.unwrap();
    }

    api.hold();
    api.set_reachable(true);
    let monitor = tokio::spawn(connectivity.clone().run(Duration::from_millis(5)));
    wait_until(|| api.call_count() == 1).await;

    // The backend answers the first call slowly, then disappears
    api.set_reachable(false);
    wait_until(|| !connectivity.check_connection()).await;
    api.release();
    wait_until(|| !engine.is_syncing()).await;
    monitor.abort();

    assert_eq!(api.call_count(), 1);
    let pending = engine.queue().snapshot().await;
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|action| action.retry_count == 0));
}

#[tokio::test]
async fn test_drain_once_reports_large_backlog() {
    let api = MockApi::new();
    api.set_reachable(false);
    let runtime = runtime(api.clone());
    runtime.connectivity().refresh().await;
    for i in 0..300 {
        runtime
            .sync_engine()
            .enqueue(ActionType::UpdateRide, json!({"id": format!("r{}", i)}))
            .await
            .unwrap();
    }

    api.set_reachable(true);
    match runtime.drain_once().await {
        DrainOutcome::Completed(report) => {
            assert_eq!(report.synced, 300);
            assert_eq!(report.remaining, 0);
        }
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(api.call_count(), 300);
}

#[tokio::test]
async fn test_drain_once_offline_leaves_queue() {
    let api = MockApi::new();
    api.set_reachable(false);
    let runtime = runtime(api.clone());
    runtime
        .sync_engine()
        .enqueue(ActionType::DeleteRide, json!({"id": "r1"}))
        .await
        .unwrap();

    assert_eq!(runtime.drain_once().await, DrainOutcome::Offline);
    assert_eq!(runtime.sync_engine().queue().len().await, 1);
    assert_eq!(api.call_count(), 0);
}
