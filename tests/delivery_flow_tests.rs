//! End-to-end delivery and fallback scenarios against the wired service
//! graph: in-memory storage, channel-backed transport.

use realtime_notify_service::events::handlers::{register_thread_handlers, THREAD_POST_CREATED};
use realtime_notify_service::models::{NewNotification, NotificationKind, ThreadKey};
use realtime_notify_service::{AppState, Config, EventDispatcher, LocalTransport, MemoryStore};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    transport: LocalTransport,
    state: AppState,
}

fn harness() -> Harness {
    let transport = LocalTransport::new();
    let state = AppState::new(
        Config::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(transport.clone()),
    );
    Harness { transport, state }
}

fn reply_notification() -> NewNotification {
    NewNotification {
        kind: NotificationKind::Reply,
        payload: json!({ "thread": "general/t-1" }),
    }
}

/// Thread T has subscribers {connA/userX, connB/userY} and followers
/// {userX, userY, userZ}; author userA posts.
///
/// Expected: userX gets the live push only; userY's push fails as gone, so
/// userY gets a persisted notification and connB plus its subscription are
/// removed; userZ gets a persisted notification; userA gets nothing.
#[tokio::test]
async fn test_thread_post_fans_out_live_with_durable_fallback() {
    let h = harness();
    let thread = ThreadKey::new("general", "t-1");
    let user_a = Uuid::new_v4();
    let user_x = Uuid::new_v4();
    let user_y = Uuid::new_v4();
    let user_z = Uuid::new_v4();

    for user in [user_x, user_y, user_z] {
        h.state.follows.follow(&thread, user).await.unwrap();
    }

    h.state.connections.open("connA", user_x).await.unwrap();
    let ref_a = h
        .state
        .subscriptions
        .subscribe(&thread, "connA", user_x)
        .await
        .unwrap();
    h.state
        .connections
        .attach_subscription("connA", ref_a)
        .await
        .unwrap();
    let mut rx_a = h.transport.register("connA").await;

    h.state.connections.open("connB", user_y).await.unwrap();
    let ref_b = h
        .state
        .subscriptions
        .subscribe(&thread, "connB", user_y)
        .await
        .unwrap();
    h.state
        .connections
        .attach_subscription("connB", ref_b)
        .await
        .unwrap();
    h.transport.mark_gone("connB").await;

    h.state
        .notify
        .notify_thread_event(
            &thread,
            user_a,
            &json!({ "type": "thread_post", "post": "hello" }),
            reply_notification(),
        )
        .await
        .unwrap();

    // userX: live push only.
    assert!(rx_a.recv().await.is_some());
    assert!(h.state.notifications.list(user_x, 10).await.unwrap().is_empty());

    // userY: durable fallback, connection and subscription reclaimed.
    assert_eq!(h.state.notifications.list(user_y, 10).await.unwrap().len(), 1);
    assert!(h
        .state
        .connections
        .list_by_user(user_y)
        .await
        .unwrap()
        .is_empty());
    let remaining = h.state.subscriptions.list_subscribers(&thread).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].connection_id, "connA");

    // userZ: durable only. userA: nothing.
    assert_eq!(h.state.notifications.list(user_z, 10).await.unwrap().len(), 1);
    assert!(h.state.notifications.list(user_a, 10).await.unwrap().is_empty());
}

/// The same policy driven through the event dispatcher instead of a direct
/// service call.
#[tokio::test]
async fn test_post_created_event_end_to_end() {
    let h = harness();
    let mut dispatcher = EventDispatcher::new();
    register_thread_handlers(&mut dispatcher, h.state.clone());

    let thread = ThreadKey::new("general", "t-9");
    let author = Uuid::new_v4();
    let follower = Uuid::new_v4();
    h.state.follows.follow(&thread, author).await.unwrap();
    h.state.follows.follow(&thread, follower).await.unwrap();

    dispatcher
        .dispatch(json!({
            "version": "1.0",
            "type": THREAD_POST_CREATED,
            "source": "content-service",
            "instance": "i-1",
            "time": Utc::now().to_rfc3339(),
            "requestId": "req-9",
            "payload": {
                "thread": { "board": "general", "thread_id": "t-9" },
                "authorId": author,
                "postId": "p-1",
                "preview": "first!",
            },
        }))
        .await;

    assert_eq!(
        h.state.notifications.list(follower, 10).await.unwrap().len(),
        1
    );
    assert!(h
        .state
        .notifications
        .list(author, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_notify_user_is_durable_under_total_push_failure() {
    let h = harness();
    let user = Uuid::new_v4();
    h.state.connections.open("c-1", user).await.unwrap();
    h.state.connections.open("c-2", user).await.unwrap();
    h.transport.mark_gone("c-1").await;
    let _rx = h.transport.register("c-2").await;
    h.transport.mark_flaky("c-2").await;

    let id = h
        .state
        .notify
        .notify_user(user, reply_notification())
        .await
        .unwrap();

    let stored = h.state.notifications.list(user, 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);

    // Gone connection reclaimed, flaky one left alone.
    assert_eq!(
        h.state.connections.list_by_user(user).await.unwrap(),
        vec!["c-2".to_string()]
    );
}

#[tokio::test]
async fn test_read_state_round_trip_through_listing() {
    let h = harness();
    let user = Uuid::new_v4();
    let id = h
        .state
        .notify
        .notify_user(user, reply_notification())
        .await
        .unwrap();

    let read_at = Utc::now();
    h.state
        .notifications
        .set_read_state(user, &id, Some(read_at))
        .await
        .unwrap();
    assert_eq!(
        h.state.notifications.list(user, 10).await.unwrap()[0].read_at,
        Some(read_at)
    );

    h.state
        .notifications
        .set_read_state(user, &id, None)
        .await
        .unwrap();
    assert!(h.state.notifications.list(user, 10).await.unwrap()[0]
        .read_at
        .is_none());
}
