use super::{KeyValueStore, QueryOptions, Row};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory [`KeyValueStore`] for tests and local runs.
///
/// Rows past their `expires_at` are invisible to every read path and are
/// dropped lazily, which mirrors how TTL'd rows silently vanish from the
/// production backend.
#[derive(Default, Clone)]
pub struct MemoryStore {
    rows: Arc<RwLock<BTreeMap<(String, String), Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_expired(row: &Row) -> bool {
        row.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn put(&self, row: Row) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.insert((row.pk.clone(), row.sk.clone()), row);
        Ok(())
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Row>> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&(pk.to_string(), sk.to_string()))
            .filter(|row| !Self::is_expired(row))
            .cloned())
    }

    async fn delete(&self, pk: &str, sk: &str) -> Result<Option<Row>> {
        let mut rows = self.rows.write().await;
        Ok(rows
            .remove(&(pk.to_string(), sk.to_string()))
            .filter(|row| !Self::is_expired(row)))
    }

    async fn query(&self, pk: &str, opts: QueryOptions) -> Result<Vec<Row>> {
        let rows = self.rows.read().await;

        let lower = Bound::Included((pk.to_string(), String::new()));
        let mut matched: Vec<Row> = rows
            .range((lower, Bound::Unbounded))
            .take_while(|((row_pk, _), _)| row_pk == pk)
            .map(|(_, row)| row)
            .filter(|row| !Self::is_expired(row))
            .filter(|row| {
                opts.sk_prefix
                    .as_deref()
                    .map_or(true, |prefix| row.sk.starts_with(prefix))
            })
            .cloned()
            .collect();

        if opts.reverse {
            matched.reverse();
        }
        if let Some(limit) = opts.limit {
            matched.truncate(limit);
        }

        Ok(matched)
    }
}
