//! Fan-out delivery with gone-endpoint reconciliation.
//!
//! The coordinator sends to a recipient set, then repairs registry state for
//! every endpoint the transport confirms gone: close the connection row and,
//! if it carried a subscription reference, delete that subscription too.
//! Reconciling through the connection row keeps a single source of truth for
//! thread-scoped callers (who know a subscription) and user-scoped callers
//! (who only know a raw connection id).
//!
//! Partial delivery failure is the expected common case here, so the fan-out
//! join collects every outcome and never short-circuits, and this call never
//! errors regardless of transport results.

use crate::models::ConnectionId;
use crate::registry::{ConnectionRegistry, SubscriptionRegistry};
use crate::transport::PushTransport;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Recipients whose connection actually received the message.
#[derive(Debug)]
pub struct DeliveryReport<R> {
    pub delivered: Vec<R>,
}

pub struct BroadcastCoordinator {
    transport: Arc<dyn PushTransport>,
    connections: Arc<ConnectionRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
}

impl BroadcastCoordinator {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        connections: Arc<ConnectionRegistry>,
        subscriptions: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            transport,
            connections,
            subscriptions,
        }
    }

    /// Send `message` to every recipient's connection and reconcile gone
    /// endpoints before returning.
    ///
    /// Connection ids are deduplicated: one transport attempt per unique id
    /// even when several recipients share it. Transient failures are logged
    /// and the recipient is neither cleaned up nor counted delivered.
    pub async fn broadcast_and_cleanup<R>(
        &self,
        recipients: Vec<R>,
        to_connection_id: impl Fn(&R) -> &str,
        message: &serde_json::Value,
    ) -> DeliveryReport<R> {
        if recipients.is_empty() {
            return DeliveryReport {
                delivered: Vec::new(),
            };
        }

        let mut seen = HashSet::new();
        let unique_ids: Vec<ConnectionId> = recipients
            .iter()
            .map(|r| to_connection_id(r).to_string())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let outcomes = self.transport.send(&unique_ids, message).await;

        let mut delivered_ids: HashSet<ConnectionId> = HashSet::new();
        let mut gone_ids: Vec<ConnectionId> = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(()) => {
                    delivered_ids.insert(outcome.connection_id);
                }
                Err(err) if err.is_gone() => gone_ids.push(outcome.connection_id),
                Err(err) => {
                    warn!(
                        connection_id = %outcome.connection_id,
                        error = %err,
                        "transient delivery failure, leaving connection in place"
                    );
                }
            }
        }

        if !gone_ids.is_empty() {
            debug!(count = gone_ids.len(), "reclaiming gone connections");
            join_all(gone_ids.iter().map(|id| self.reclaim_connection(id))).await;
        }

        let delivered = recipients
            .into_iter()
            .filter(|r| delivered_ids.contains(to_connection_id(r)))
            .collect();
        DeliveryReport { delivered }
    }

    /// Remove the dead connection row and any subscription it referenced.
    /// Storage faults here are logged, not retried, and never block the
    /// broadcast result.
    async fn reclaim_connection(&self, connection_id: &str) {
        match self.connections.close(connection_id).await {
            Ok(Some(connection)) => {
                if let Some(sub_ref) = connection.subscription {
                    if let Err(e) = self.subscriptions.unsubscribe_by_ref(&sub_ref).await {
                        warn!(connection_id, error = %e, "failed to drop stale subscription");
                    }
                }
            }
            // Already removed by TTL or a concurrent close.
            Ok(None) => {}
            Err(e) => warn!(connection_id, error = %e, "failed to close gone connection"),
        }
    }
}
