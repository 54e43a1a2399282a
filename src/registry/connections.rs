//! Live connection <-> user mapping.
//!
//! One row per connection plus a per-user index row, both stamped with the
//! session TTL so they vanish together. `close` is idempotent: the row may
//! already be gone through TTL expiry or a concurrent close, and that is
//! success, not an error.

use crate::error::{AppError, Result};
use crate::models::{Connection, ConnectionId, SubscriptionRef};
use crate::storage::{KeyValueStore, QueryOptions, Row};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const META_SK: &str = "META";

pub struct ConnectionRegistry {
    store: Arc<dyn KeyValueStore>,
    session_ttl: Duration,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, session_ttl_secs: u64) -> Self {
        Self {
            store,
            session_ttl: Duration::seconds(session_ttl_secs as i64),
        }
    }

    fn conn_pk(connection_id: &str) -> String {
        format!("CONN#{}", connection_id)
    }

    fn user_pk(user_id: Uuid) -> String {
        format!("USERCONN#{}", user_id)
    }

    fn index_sk(connection_id: &str) -> String {
        format!("CONN#{}", connection_id)
    }

    /// Register a new connection for `user_id`. Fails only on a storage
    /// fault.
    pub async fn open(&self, connection_id: &str, user_id: Uuid) -> Result<Connection> {
        let now = Utc::now();
        let expires_at = Some(now + self.session_ttl);
        let connection = Connection {
            connection_id: connection_id.to_string(),
            user_id,
            created_at: now,
            subscription: None,
        };

        self.store
            .put(Row {
                pk: Self::conn_pk(connection_id),
                sk: META_SK.to_string(),
                body: to_body(&connection)?,
                expires_at,
            })
            .await?;

        self.store
            .put(Row {
                pk: Self::user_pk(user_id),
                sk: Self::index_sk(connection_id),
                body: serde_json::json!({ "connection_id": connection_id }),
                expires_at,
            })
            .await?;

        debug!(%user_id, connection_id, "connection opened");
        Ok(connection)
    }

    /// Remove the connection and return its final state, or `None` if the
    /// row was already gone.
    pub async fn close(&self, connection_id: &str) -> Result<Option<Connection>> {
        let removed = self
            .store
            .delete(&Self::conn_pk(connection_id), META_SK)
            .await?;

        let Some(row) = removed else {
            debug!(connection_id, "close on absent connection");
            return Ok(None);
        };

        let connection: Connection = from_body(row.body)?;
        self.store
            .delete(
                &Self::user_pk(connection.user_id),
                &Self::index_sk(connection_id),
            )
            .await?;

        debug!(user_id = %connection.user_id, connection_id, "connection closed");
        Ok(Some(connection))
    }

    /// All live connection ids owned by `user_id`. Empty if none.
    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<ConnectionId>> {
        let rows = self
            .store
            .query(&Self::user_pk(user_id), QueryOptions::default())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.sk.strip_prefix("CONN#").map(str::to_string))
            .collect())
    }

    /// Record the subscription currently held by this connection.
    ///
    /// Best-effort: the connection row can have expired or closed between
    /// the subscribe and this write, which is an expected race and a no-op.
    pub async fn attach_subscription(
        &self,
        connection_id: &str,
        subscription_ref: SubscriptionRef,
    ) -> Result<()> {
        let pk = Self::conn_pk(connection_id);
        let Some(row) = self.store.get(&pk, META_SK).await? else {
            debug!(connection_id, "attach on absent connection, skipping");
            return Ok(());
        };

        let mut connection: Connection = from_body(row.body)?;
        connection.subscription = Some(subscription_ref);

        self.store
            .put(Row {
                pk,
                sk: META_SK.to_string(),
                body: to_body(&connection)?,
                expires_at: row.expires_at,
            })
            .await
    }
}

fn to_body(connection: &Connection) -> Result<serde_json::Value> {
    serde_json::to_value(connection).map_err(|e| AppError::Storage(e.to_string()))
}

fn from_body(body: serde_json::Value) -> Result<Connection> {
    serde_json::from_value(body).map_err(|e| AppError::Storage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(Arc::new(MemoryStore::new()), 3600)
    }

    #[tokio::test]
    async fn test_open_then_list_by_user() {
        let registry = registry();
        let user = Uuid::new_v4();

        registry.open("c-1", user).await.unwrap();
        registry.open("c-2", user).await.unwrap();

        let mut ids = registry.list_by_user(user).await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["c-1", "c-2"]);
    }

    #[tokio::test]
    async fn test_close_returns_state_and_clears_index() {
        let registry = registry();
        let user = Uuid::new_v4();
        registry.open("c-1", user).await.unwrap();

        let closed = registry.close("c-1").await.unwrap().unwrap();
        assert_eq!(closed.user_id, user);
        assert!(closed.subscription.is_none());

        assert!(registry.list_by_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let registry = registry();
        let user = Uuid::new_v4();
        registry.open("c-1", user).await.unwrap();

        assert!(registry.close("c-1").await.unwrap().is_some());
        assert!(registry.close("c-1").await.unwrap().is_none());
        assert!(registry.close("never-existed").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_racing_closes_leave_no_index_entry() {
        let registry = registry();
        let user = Uuid::new_v4();
        registry.open("c-1", user).await.unwrap();

        // Disconnect handling and gone-endpoint reclaim can close the same
        // id; exactly one wins and that one clears the index row.
        let (a, b) = tokio::join!(registry.close("c-1"), registry.close("c-1"));
        let removed = [a.unwrap(), b.unwrap()].into_iter().flatten().count();
        assert_eq!(removed, 1);
        assert!(registry.list_by_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_subscription_round_trip() {
        let registry = registry();
        let user = Uuid::new_v4();
        registry.open("c-1", user).await.unwrap();

        let sub_ref = SubscriptionRef {
            pk: "SUB#general#t-1".to_string(),
            sk: "CONN#c-1".to_string(),
        };
        registry
            .attach_subscription("c-1", sub_ref.clone())
            .await
            .unwrap();

        let closed = registry.close("c-1").await.unwrap().unwrap();
        assert_eq!(closed.subscription, Some(sub_ref));
    }

    #[tokio::test]
    async fn test_attach_subscription_on_absent_connection_is_noop() {
        let registry = registry();
        let sub_ref = SubscriptionRef {
            pk: "SUB#general#t-1".to_string(),
            sk: "CONN#c-1".to_string(),
        };

        registry
            .attach_subscription("c-1", sub_ref)
            .await
            .unwrap();
    }
}
