//! Domain event handlers for the thread lifecycle.
//!
//! Wires the dispatcher to the delivery services: a new post fans out live
//! and falls back to durable notifications; thread inactivity schedules
//! follower cleanup, reactivation cancels it.

use super::{handler, EventDispatcher, EventEnvelope, HandlerOptions};
use crate::error::{AppError, Result};
use crate::models::{NewNotification, NotificationKind, ThreadKey};
use crate::state::AppState;
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

pub const THREAD_POST_CREATED: &str = "thread.post.created";
pub const THREAD_INACTIVE: &str = "thread.inactive";
pub const THREAD_REACTIVATED: &str = "thread.reactivated";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostCreatedPayload {
    thread: ThreadKey,
    author_id: Uuid,
    post_id: String,
    preview: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadLifecyclePayload {
    thread: ThreadKey,
}

fn parse_payload<T: serde::de::DeserializeOwned>(envelope: &EventEnvelope) -> Result<T> {
    serde_json::from_value(envelope.payload.clone())
        .map_err(|e| AppError::Validation(format!("bad {} payload: {}", envelope.event_type, e)))
}

/// Register all thread-lifecycle handlers against `dispatcher`.
pub fn register_thread_handlers(dispatcher: &mut EventDispatcher, state: AppState) {
    let v1 = HandlerOptions {
        supported_major_version: 1,
    };

    dispatcher.register(|d| {
        let on_post = state.clone();
        d.on(
            THREAD_POST_CREATED,
            handler(move |envelope| {
                let state = on_post.clone();
                async move {
                    let payload: PostCreatedPayload = parse_payload(&envelope)?;
                    let message = json!({
                        "type": "thread_post",
                        "thread": payload.thread,
                        "postId": payload.post_id,
                        "preview": payload.preview,
                    });
                    let fallback = NewNotification {
                        kind: NotificationKind::Reply,
                        payload: json!({
                            "thread": payload.thread,
                            "postId": payload.post_id,
                            "preview": payload.preview,
                        }),
                    };
                    state
                        .notify
                        .notify_thread_event(&payload.thread, payload.author_id, &message, fallback)
                        .await?;
                    Ok(())
                }
            }),
            v1,
        );

        let on_inactive = state.clone();
        d.on(
            THREAD_INACTIVE,
            handler(move |envelope| {
                let state = on_inactive.clone();
                async move {
                    let payload: ThreadLifecyclePayload = parse_payload(&envelope)?;
                    let ttl = Duration::seconds(state.config.follower_cleanup_ttl_secs as i64);
                    state
                        .follows
                        .set_ttl_for_all_followers(&payload.thread, ttl)
                        .await
                }
            }),
            v1,
        );

        let on_reactivated = state.clone();
        d.on(
            THREAD_REACTIVATED,
            handler(move |envelope| {
                let state = on_reactivated.clone();
                async move {
                    let payload: ThreadLifecyclePayload = parse_payload(&envelope)?;
                    let kept = state
                        .follows
                        .clear_ttl_for_all_followers(&payload.thread)
                        .await?;
                    info!(thread = %payload.thread, followers = kept.len(), "thread reactivated");
                    Ok(())
                }
            }),
            v1,
        );
    });
}
