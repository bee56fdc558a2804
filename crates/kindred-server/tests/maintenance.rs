mod common;

use std::sync::Arc;

use common::{RecordingGateway, counter, days_ago, dyn_store, fields, put, user};
use kindred_core::{Counter, Value, now_utc};
use kindred_db_memory::MemoryStore;
use kindred_server::Handlers;
use kindred_server::handlers::HandlerContext;
use kindred_server::maintenance::{CounterMaintenance, MaintenanceError};
use kindred_server::retention::{RetentionSweeper, SweepPolicy, SweepTarget};

async fn seeded() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for (id, interests, requests) in [("bob", 5_i64, 1_i64), ("carol", 0, 0), ("dave", 3, 2)] {
        put(
            &store,
            "users",
            id,
            fields([
                ("totalInterestsCount", Value::from(interests)),
                ("totalFriendRequestsCount", Value::from(requests)),
            ]),
        )
        .await;
    }
    store
}

#[tokio::test]
async fn reset_is_refused_unless_enabled() {
    let store = seeded().await;
    let maintenance = CounterMaintenance::new(dyn_store(&store), false, 500);

    let err = maintenance
        .reset(Counter::TotalInterests, "reset totalInterestsCount")
        .await
        .unwrap_err();

    assert!(matches!(err, MaintenanceError::ResetDisabled));
    assert_eq!(counter(&store, "bob", "totalInterestsCount").await, Some(5));
}

#[tokio::test]
async fn reset_requires_the_exact_confirmation() {
    let store = seeded().await;
    let maintenance = CounterMaintenance::new(dyn_store(&store), true, 500);

    let err = maintenance
        .reset(Counter::TotalInterests, "reset totalFriendRequestsCount")
        .await
        .unwrap_err();

    assert!(matches!(err, MaintenanceError::ConfirmationMismatch { .. }));
    assert_eq!(counter(&store, "dave", "totalInterestsCount").await, Some(3));
}

#[tokio::test]
async fn reset_zeroes_only_the_named_counter() {
    let store = seeded().await;
    let maintenance = CounterMaintenance::new(dyn_store(&store), true, 2);

    let report = maintenance
        .reset(Counter::TotalInterests, "  reset totalInterestsCount ")
        .await
        .unwrap();

    assert_eq!(report.users_scanned, 3);
    assert_eq!(report.users_updated, 3);
    assert_eq!(report.chunks_failed, 0);
    for id in ["bob", "carol", "dave"] {
        assert_eq!(counter(&store, id, "totalInterestsCount").await, Some(0));
    }
    assert_eq!(counter(&store, "dave", "totalFriendRequestsCount").await, Some(2));
}

#[tokio::test]
async fn recount_repairs_drifted_counters() {
    let store = seeded().await;
    for (id, to) in [("i1", "bob"), ("i2", "bob"), ("i3", "dave"), ("i4", "dave"), ("i5", "dave")] {
        put(
            &store,
            "interests",
            id,
            fields([("fromUserId", Value::from("x")), ("toUserId", Value::from(to))]),
        )
        .await;
    }
    // Interest for a user that no longer exists.
    put(
        &store,
        "interests",
        "i6",
        fields([("fromUserId", Value::from("x")), ("toUserId", Value::from("gone"))]),
    )
    .await;
    let maintenance = CounterMaintenance::new(dyn_store(&store), false, 500);

    let report = maintenance.recount(Counter::TotalInterests).await.unwrap();

    assert_eq!(report.users_scanned, 3);
    assert_eq!(report.users_updated, 1);
    assert_eq!(counter(&store, "bob", "totalInterestsCount").await, Some(2));
    assert_eq!(counter(&store, "carol", "totalInterestsCount").await, Some(0));
    assert_eq!(counter(&store, "dave", "totalInterestsCount").await, Some(3));
    assert!(!store.contains(&common::path("users", "gone")));
}

#[tokio::test]
async fn recount_agrees_with_handler_and_sweep() {
    let store = Arc::new(MemoryStore::new());
    user(&store, "x", "Xena", Some("tok-x")).await;
    user(&store, "y", "Yuri", None).await;
    let gateway = RecordingGateway::new();
    let handlers = Handlers::new(Arc::new(HandlerContext::new(dyn_store(&store), gateway)));
    let handler = handlers.for_collection("friendships").unwrap();

    let now = now_utc();
    let request = |status: &str, age: Value| {
        fields([
            ("senderId", Value::from("x")),
            ("receiverId", Value::from("y")),
            ("status", Value::from(status)),
            ("createdAt", age),
        ])
    };
    for (id, record) in [
        ("old-accepted", request("accepted", days_ago(now, 31))),
        ("old-pending", request("pending", days_ago(now, 31))),
        ("new-pending", request("pending", days_ago(now, 2))),
    ] {
        put(&store, "friendships", id, record.clone()).await;
        handler.handle(id, &record).await.unwrap();
    }
    assert_eq!(counter(&store, "y", "totalFriendRequestsCount").await, Some(3));

    let sweeper = RetentionSweeper::new(
        dyn_store(&store),
        SweepTarget::Friendships,
        SweepPolicy {
            window: time::Duration::days(30),
            compensate: true,
        },
        500,
    );
    let swept = sweeper.run_at(now).await.unwrap();
    assert_eq!(swept.deleted, 1);
    assert_eq!(counter(&store, "y", "totalFriendRequestsCount").await, Some(2));

    let maintenance = CounterMaintenance::new(dyn_store(&store), false, 500);
    let report = maintenance.recount(Counter::TotalFriendRequests).await.unwrap();

    assert_eq!(report.users_updated, 0);
    assert_eq!(counter(&store, "y", "totalFriendRequestsCount").await, Some(2));
    assert_eq!(store.count("friendships"), 2);
}

#[tokio::test]
async fn recount_of_friend_requests_counts_every_retained_request() {
    let store = seeded().await;
    let request = |sender: &str, receiver: &str, status: &str| {
        fields([
            ("senderId", Value::from(sender)),
            ("receiverId", Value::from(receiver)),
            ("status", Value::from(status)),
        ])
    };
    put(&store, "friendships", "f1", request("carol", "dave", "pending")).await;
    put(&store, "friendships", "f2", request("bob", "dave", "accepted")).await;
    put(&store, "friendships", "f3", request("dave", "bob", "declined")).await;

    let maintenance = CounterMaintenance::new(dyn_store(&store), false, 500);
    let report = maintenance.recount(Counter::TotalFriendRequests).await.unwrap();

    assert_eq!(report.users_updated, 0);
    assert_eq!(counter(&store, "dave", "totalFriendRequestsCount").await, Some(2));
    assert_eq!(counter(&store, "bob", "totalFriendRequestsCount").await, Some(1));
}
