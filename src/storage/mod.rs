//! Storage collaborator seam.
//!
//! All shared state in this crate lives behind [`KeyValueStore`]: rows
//! addressed by (partition key, sort key) with optional TTL expiry, the
//! contract the production backend provides. Concurrent writers rely on the
//! backend's single-row atomicity; there are no application-level locks
//! above this seam.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod memory;

pub use memory::MemoryStore;

/// One stored row. `body` carries the serialized domain record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    pub pk: String,
    pub sk: String,
    pub body: serde_json::Value,
    /// TTL: the backend drops the row some time after this instant. Rows may
    /// vanish without any delete call, so consumers treat "not found" as a
    /// normal outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Return rows in descending sort-key order.
    pub reverse: bool,
    pub limit: Option<usize>,
    /// Restrict to sort keys starting with this prefix.
    pub sk_prefix: Option<String>,
}

impl QueryOptions {
    pub fn reversed(limit: Option<usize>) -> Self {
        Self {
            reverse: true,
            limit,
            sk_prefix: None,
        }
    }
}

/// Key-value storage backend.
///
/// Known backend quirk callers must not assume away: when a *non-key*
/// attribute filter is combined with `limit`, the backend may apply the
/// limit before the filter. `QueryOptions` therefore only exposes key-level
/// options; anything else is filtered client-side after the query returns.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Full-row upsert.
    async fn put(&self, row: Row) -> Result<()>;

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Row>>;

    /// Removes and returns the row. Deleting an absent key is success.
    async fn delete(&self, pk: &str, sk: &str) -> Result<Option<Row>>;

    /// All live rows under `pk`, in sort-key order.
    async fn query(&self, pk: &str, opts: QueryOptions) -> Result<Vec<Row>>;
}
