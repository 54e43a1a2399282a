//! Persistent user-to-thread interest.
//!
//! Follow rows normally carry no TTL. When a thread goes inactive its
//! follower rows are TTL-stamped for deferred cleanup; if the thread
//! reactivates before expiry the stamp is cleared again.

use crate::error::{AppError, Result};
use crate::models::{Follow, ThreadKey};
use crate::storage::{KeyValueStore, QueryOptions, Row};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct FollowRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl FollowRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn thread_pk(thread: &ThreadKey) -> String {
        format!("FOLLOW#{}#{}", thread.board, thread.thread_id)
    }

    fn user_sk(user_id: Uuid) -> String {
        format!("USER#{}", user_id)
    }

    /// Re-following clears any pending cleanup TTL on the row.
    pub async fn follow(&self, thread: &ThreadKey, user_id: Uuid) -> Result<()> {
        let follow = Follow {
            thread: thread.clone(),
            user_id,
            created_at: Utc::now(),
        };

        self.store
            .put(Row {
                pk: Self::thread_pk(thread),
                sk: Self::user_sk(user_id),
                body: serde_json::to_value(&follow)
                    .map_err(|e| AppError::Storage(e.to_string()))?,
                expires_at: None,
            })
            .await?;

        debug!(%thread, %user_id, "followed");
        Ok(())
    }

    pub async fn unfollow(&self, thread: &ThreadKey, user_id: Uuid) -> Result<()> {
        self.store
            .delete(&Self::thread_pk(thread), &Self::user_sk(user_id))
            .await?;
        Ok(())
    }

    pub async fn list_followers(&self, thread: &ThreadKey) -> Result<Vec<Uuid>> {
        let rows = self
            .store
            .query(&Self::thread_pk(thread), QueryOptions::default())
            .await?;

        rows.into_iter()
            .map(|row| {
                let follow: Follow = serde_json::from_value(row.body)
                    .map_err(|e| AppError::Storage(e.to_string()))?;
                Ok(follow.user_id)
            })
            .collect()
    }

    /// Thread went inactive: stamp every follower row for deferred cleanup.
    pub async fn set_ttl_for_all_followers(&self, thread: &ThreadKey, ttl: Duration) -> Result<()> {
        let expires_at = Some(Utc::now() + ttl);
        let rows = self
            .store
            .query(&Self::thread_pk(thread), QueryOptions::default())
            .await?;

        let count = rows.len();
        for mut row in rows {
            row.expires_at = expires_at;
            self.store.put(row).await?;
        }

        debug!(%thread, count, "follower cleanup scheduled");
        Ok(())
    }

    /// Thread reactivated: cancel the scheduled cleanup. Returns the ids of
    /// the followers whose rows were still live.
    pub async fn clear_ttl_for_all_followers(&self, thread: &ThreadKey) -> Result<Vec<Uuid>> {
        let rows = self
            .store
            .query(&Self::thread_pk(thread), QueryOptions::default())
            .await?;

        let mut affected = Vec::with_capacity(rows.len());
        for mut row in rows {
            let follow: Follow = serde_json::from_value(row.body.clone())
                .map_err(|e| AppError::Storage(e.to_string()))?;
            row.expires_at = None;
            self.store.put(row).await?;
            affected.push(follow.user_id);
        }

        debug!(%thread, count = affected.len(), "follower cleanup cancelled");
        Ok(affected)
    }
}
