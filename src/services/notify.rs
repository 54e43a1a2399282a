//! Fallback orchestration: live push when possible, durable storage always.
//!
//! The durability guarantee lives here. Every notify call persists the
//! notification independently of connectivity; the live push runs alongside
//! it and its failure is invisible to end users because the stored record is
//! written regardless.

use crate::error::Result;
use crate::models::{NewNotification, NotificationId, ThreadKey};
use crate::registry::{ConnectionRegistry, FollowRegistry, SubscriptionRegistry};
use crate::services::broadcast::BroadcastCoordinator;
use crate::services::notifications::NotificationStore;
use futures::future::join_all;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct NotifyService {
    connections: Arc<ConnectionRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
    follows: Arc<FollowRegistry>,
    notifications: Arc<NotificationStore>,
    coordinator: Arc<BroadcastCoordinator>,
}

impl NotifyService {
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        subscriptions: Arc<SubscriptionRegistry>,
        follows: Arc<FollowRegistry>,
        notifications: Arc<NotificationStore>,
        coordinator: Arc<BroadcastCoordinator>,
    ) -> Self {
        Self {
            connections,
            subscriptions,
            follows,
            notifications,
            coordinator,
        }
    }

    /// Persist the notification and, concurrently, push it to any live
    /// connections the user has. The persisted write is first-class: a live
    /// push failure never undoes or blocks it.
    pub async fn notify_user(&self, user_id: Uuid, new: NewNotification) -> Result<NotificationId> {
        let wire = live_frame(&new);
        let (stored, _) = tokio::join!(
            self.notifications.create(user_id, new),
            self.push_live(user_id, wire)
        );
        stored
    }

    async fn push_live(&self, user_id: Uuid, frame: serde_json::Value) {
        match self.connections.list_by_user(user_id).await {
            Ok(connection_ids) if !connection_ids.is_empty() => {
                let report = self
                    .coordinator
                    .broadcast_and_cleanup(connection_ids, |id| id.as_str(), &frame)
                    .await;
                debug!(%user_id, delivered = report.delivered.len(), "live push");
            }
            Ok(_) => {}
            Err(e) => warn!(%user_id, error = %e, "live connection lookup failed"),
        }
    }

    /// Fully parallel fan-out of `notify_user`, one identity per user,
    /// returned as (user, identity) pairs so callers can attribute them.
    /// Per-user storage faults are logged and skipped so one bad recipient
    /// cannot fail the batch.
    pub async fn notify_users(
        &self,
        user_ids: Vec<Uuid>,
        new: NewNotification,
    ) -> Vec<(Uuid, NotificationId)> {
        let attempts = user_ids.into_iter().map(|user_id| {
            let new = new.clone();
            async move { (user_id, self.notify_user(user_id, new).await) }
        });

        join_all(attempts)
            .await
            .into_iter()
            .filter_map(|(user_id, result)| match result {
                Ok(id) => Some((user_id, id)),
                Err(e) => {
                    warn!(%user_id, error = %e, "durable notification failed");
                    None
                }
            })
            .collect()
    }

    /// Thread-message broadcast with follower fallback.
    ///
    /// Fans `message` live to every active subscription on the thread while
    /// fetching the follower list, then stores durable notifications for
    /// every follower except the author and the users whose live push
    /// actually succeeded. A follower whose subscription existed but whose
    /// connection turned out gone stays in the durable set.
    ///
    /// The thread event itself is persisted by the message store before this
    /// is invoked.
    pub async fn notify_thread_event(
        &self,
        thread: &ThreadKey,
        author: Uuid,
        message: &serde_json::Value,
        fallback: NewNotification,
    ) -> Result<Vec<(Uuid, NotificationId)>> {
        let (delivered_users, followers) = tokio::join!(
            self.push_to_subscribers(thread, message),
            self.follows.list_followers(thread)
        );
        let followers = followers?;

        let notify_set: Vec<Uuid> = followers
            .into_iter()
            .filter(|user_id| *user_id != author && !delivered_users.contains(user_id))
            .collect();

        debug!(
            %thread,
            live = delivered_users.len(),
            durable = notify_set.len(),
            "thread event fan-out"
        );
        Ok(self.notify_users(notify_set, fallback).await)
    }

    /// Live fan-out to the thread's subscribers; returns the users whose
    /// push actually succeeded.
    async fn push_to_subscribers(
        &self,
        thread: &ThreadKey,
        message: &serde_json::Value,
    ) -> HashSet<Uuid> {
        let subscribers = match self.subscriptions.list_subscribers(thread).await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                warn!(%thread, error = %e, "subscriber lookup failed");
                return HashSet::new();
            }
        };
        if subscribers.is_empty() {
            return HashSet::new();
        }

        let report = self
            .coordinator
            .broadcast_and_cleanup(subscribers, |s| s.connection_id.as_str(), message)
            .await;

        report.delivered.into_iter().map(|s| s.user_id).collect()
    }
}

fn live_frame(new: &NewNotification) -> serde_json::Value {
    json!({
        "type": "notification",
        "kind": new.kind.as_str(),
        "payload": new.payload,
    })
}
