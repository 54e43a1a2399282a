//! Ephemeral connection-to-thread live interest.
//!
//! Subscription rows are TTL-bounded by the maximum transport session
//! lifetime and are deleted on explicit unsubscribe, connection close, or
//! stale-delivery detection. `subscribe` hands back an opaque ref so any of
//! those paths can delete the row directly without re-querying.

use crate::error::{AppError, Result};
use crate::models::{Subscription, SubscriptionRef, ThreadKey, ThreadSubscriber};
use crate::storage::{KeyValueStore, QueryOptions, Row};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct SubscriptionRegistry {
    store: Arc<dyn KeyValueStore>,
    session_ttl: Duration,
}

impl SubscriptionRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, session_ttl_secs: u64) -> Self {
        Self {
            store,
            session_ttl: Duration::seconds(session_ttl_secs as i64),
        }
    }

    fn thread_pk(thread: &ThreadKey) -> String {
        format!("SUB#{}#{}", thread.board, thread.thread_id)
    }

    fn conn_sk(connection_id: &str) -> String {
        format!("CONN#{}", connection_id)
    }

    pub async fn subscribe(
        &self,
        thread: &ThreadKey,
        connection_id: &str,
        user_id: Uuid,
    ) -> Result<SubscriptionRef> {
        let subscription = Subscription {
            thread: thread.clone(),
            connection_id: connection_id.to_string(),
            user_id,
            created_at: Utc::now(),
        };
        let subscription_ref = SubscriptionRef {
            pk: Self::thread_pk(thread),
            sk: Self::conn_sk(connection_id),
        };

        self.store
            .put(Row {
                pk: subscription_ref.pk.clone(),
                sk: subscription_ref.sk.clone(),
                body: serde_json::to_value(&subscription)
                    .map_err(|e| AppError::Storage(e.to_string()))?,
                expires_at: Some(subscription.created_at + self.session_ttl),
            })
            .await?;

        debug!(%thread, connection_id, %user_id, "subscribed");
        Ok(subscription_ref)
    }

    /// All live subscribers of `thread`.
    pub async fn list_subscribers(&self, thread: &ThreadKey) -> Result<Vec<ThreadSubscriber>> {
        let pk = Self::thread_pk(thread);
        let rows = self.store.query(&pk, QueryOptions::default()).await?;

        rows.into_iter()
            .map(|row| {
                let subscription: Subscription = serde_json::from_value(row.body)
                    .map_err(|e| AppError::Storage(e.to_string()))?;
                Ok(ThreadSubscriber {
                    connection_id: subscription.connection_id,
                    user_id: subscription.user_id,
                    subscription_ref: SubscriptionRef {
                        pk: row.pk,
                        sk: row.sk,
                    },
                })
            })
            .collect()
    }

    /// Direct deletion through the ref handed out by `subscribe`. Absent
    /// rows are success.
    pub async fn unsubscribe_by_ref(&self, subscription_ref: &SubscriptionRef) -> Result<()> {
        self.store
            .delete(&subscription_ref.pk, &subscription_ref.sk)
            .await?;
        Ok(())
    }

    /// Fallback for callers that only know the thread and connection.
    /// Harmless when racing other cleanup paths.
    pub async fn unsubscribe_by_connection(
        &self,
        thread: &ThreadKey,
        connection_id: &str,
    ) -> Result<()> {
        self.store
            .delete(&Self::thread_pk(thread), &Self::conn_sk(connection_id))
            .await?;
        Ok(())
    }
}
