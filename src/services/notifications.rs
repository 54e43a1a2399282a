//! Durable per-user notification log.
//!
//! The sort key is derived from creation time so a reversed range query is
//! a most-recent-first listing. Same-millisecond creates are disambiguated
//! with a process-local counter; identity uniqueness per user is a
//! correctness prerequisite for every caller.

use crate::error::{AppError, Result};
use crate::models::{NewNotification, Notification, NotificationId};
use crate::storage::{KeyValueStore, QueryOptions, Row};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct NotificationStore {
    store: Arc<dyn KeyValueStore>,
    sequence: AtomicU64,
}

impl NotificationStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            sequence: AtomicU64::new(0),
        }
    }

    fn user_pk(user_id: Uuid) -> String {
        format!("NOTIF#{}", user_id)
    }

    /// Zero-padded unix millis plus a wrapping counter: lexicographic order
    /// equals creation order, and two creates in the same millisecond from
    /// this process cannot collide.
    fn next_id(&self, created_at: DateTime<Utc>) -> NotificationId {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) % 10_000;
        format!("{:013}-{:04}", created_at.timestamp_millis(), seq)
    }

    pub async fn create(&self, user_id: Uuid, new: NewNotification) -> Result<NotificationId> {
        let created_at = Utc::now();
        let notification = Notification {
            user_id,
            id: self.next_id(created_at),
            kind: new.kind,
            payload: new.payload,
            created_at,
            read_at: None,
        };

        self.store
            .put(Row {
                pk: Self::user_pk(user_id),
                sk: notification.id.clone(),
                body: serde_json::to_value(&notification)
                    .map_err(|e| AppError::Storage(e.to_string()))?,
                expires_at: None,
            })
            .await?;

        debug!(%user_id, id = %notification.id, kind = notification.kind.as_str(), "notification stored");
        Ok(notification.id)
    }

    /// Up to `limit` notifications, most recent first.
    pub async fn list(&self, user_id: Uuid, limit: usize) -> Result<Vec<Notification>> {
        let rows = self
            .store
            .query(&Self::user_pk(user_id), QueryOptions::reversed(Some(limit)))
            .await?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row.body).map_err(|e| AppError::Storage(e.to_string()))
            })
            .collect()
    }

    /// Set or clear the read time. Toggling an absent notification is a
    /// normal no-op; the row may have been deleted concurrently.
    pub async fn set_read_state(
        &self,
        user_id: Uuid,
        id: &str,
        read_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let pk = Self::user_pk(user_id);
        let Some(row) = self.store.get(&pk, id).await? else {
            debug!(%user_id, id, "read-state toggle on absent notification");
            return Ok(());
        };

        let mut notification: Notification =
            serde_json::from_value(row.body).map_err(|e| AppError::Storage(e.to_string()))?;
        notification.read_at = read_at;

        self.store
            .put(Row {
                pk,
                sk: id.to_string(),
                body: serde_json::to_value(&notification)
                    .map_err(|e| AppError::Storage(e.to_string()))?,
                expires_at: row.expires_at,
            })
            .await
    }

    pub async fn delete(&self, user_id: Uuid, id: &str) -> Result<()> {
        self.store.delete(&Self::user_pk(user_id), id).await?;
        Ok(())
    }

    pub async fn delete_all(&self, user_id: Uuid) -> Result<()> {
        let pk = Self::user_pk(user_id);
        let rows = self.store.query(&pk, QueryOptions::default()).await?;
        let count = rows.len();
        for row in rows {
            self.store.delete(&pk, &row.sk).await?;
        }
        debug!(%user_id, count, "notifications cleared");
        Ok(())
    }
}
