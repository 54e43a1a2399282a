//! In-process [`PushTransport`] over per-connection channels.
//!
//! Backs local runs and the test suites. Each registered connection gets an
//! unbounded receiver; a dropped receiver shows up as a gone endpoint, and
//! failures can be forced per connection to exercise both failure classes.

use super::{PushTransport, SendError, SendOutcome};
use crate::models::ConnectionId;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

#[derive(Default, Clone)]
pub struct LocalTransport {
    senders: Arc<RwLock<HashMap<ConnectionId, UnboundedSender<serde_json::Value>>>>,
    gone: Arc<RwLock<HashSet<ConnectionId>>>,
    flaky: Arc<RwLock<HashSet<ConnectionId>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a receiver for `connection_id`. Messages sent to the id arrive
    /// on the returned channel until it is dropped or marked gone.
    pub async fn register(
        &self,
        connection_id: impl Into<ConnectionId>,
    ) -> UnboundedReceiver<serde_json::Value> {
        let (tx, rx) = unbounded_channel();
        self.senders.write().await.insert(connection_id.into(), tx);
        rx
    }

    /// Force the stable gone signal for this id from now on.
    pub async fn mark_gone(&self, connection_id: &str) {
        self.gone.write().await.insert(connection_id.to_string());
    }

    /// Force transient failures for this id from now on.
    pub async fn mark_flaky(&self, connection_id: &str) {
        self.flaky.write().await.insert(connection_id.to_string());
    }

    async fn attempt(&self, connection_id: &str, message: &serde_json::Value) -> SendOutcome {
        if self.gone.read().await.contains(connection_id) {
            return SendOutcome::failed(connection_id, SendError::Gone);
        }
        if self.flaky.read().await.contains(connection_id) {
            return SendOutcome::failed(
                connection_id,
                SendError::Transient("simulated delivery timeout".to_string()),
            );
        }

        let senders = self.senders.read().await;
        match senders.get(connection_id) {
            Some(sender) if sender.send(message.clone()).is_ok() => {
                SendOutcome::delivered(connection_id)
            }
            // Unknown id or dropped receiver: the endpoint is gone.
            _ => SendOutcome::failed(connection_id, SendError::Gone),
        }
    }
}

#[async_trait]
impl PushTransport for LocalTransport {
    async fn send(
        &self,
        connection_ids: &[ConnectionId],
        message: &serde_json::Value,
    ) -> Vec<SendOutcome> {
        let attempts = connection_ids.iter().map(|id| self.attempt(id, message));
        futures::future::join_all(attempts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_registered_connection_receives_message() {
        let transport = LocalTransport::new();
        let mut rx = transport.register("c-1").await;

        let outcomes = transport.send(&["c-1".to_string()], &json!({"n": 1})).await;
        assert!(outcomes[0].result.is_ok());
        assert_eq!(rx.recv().await, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_unknown_connection_is_gone() {
        let transport = LocalTransport::new();
        let outcomes = transport.send(&["nope".to_string()], &json!({})).await;
        assert_eq!(outcomes[0].result, Err(SendError::Gone));
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_gone() {
        let transport = LocalTransport::new();
        let rx = transport.register("c-1").await;
        drop(rx);

        let outcomes = transport.send(&["c-1".to_string()], &json!({})).await;
        assert_eq!(outcomes[0].result, Err(SendError::Gone));
    }

    #[tokio::test]
    async fn test_forced_failures() {
        let transport = LocalTransport::new();
        let _rx_a = transport.register("a").await;
        let _rx_b = transport.register("b").await;
        transport.mark_gone("a").await;
        transport.mark_flaky("b").await;

        let outcomes = transport
            .send(&["a".to_string(), "b".to_string()], &json!({}))
            .await;
        assert_eq!(outcomes[0].result, Err(SendError::Gone));
        assert!(matches!(
            outcomes[1].result,
            Err(SendError::Transient(_))
        ));
    }
}
