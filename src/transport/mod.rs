//! Push transport seam.
//!
//! The transport never fails as a whole: every send resolves to one
//! [`SendOutcome`] per requested connection id. A confirmed-dead endpoint is
//! the stable [`SendError::Gone`] signal, distinguishable from transient
//! failures so callers can reconcile registry state for gone endpoints only.

use crate::models::ConnectionId;
use async_trait::async_trait;
use thiserror::Error;

pub mod local;

pub use local::LocalTransport;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    /// The endpoint no longer exists. Triggers reconciliation; never
    /// surfaced as a caller error.
    #[error("endpoint gone")]
    Gone,

    /// Anything else: logged, no cleanup, no retry here.
    #[error("transient delivery failure: {0}")]
    Transient(String),
}

impl SendError {
    pub fn is_gone(&self) -> bool {
        matches!(self, SendError::Gone)
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub connection_id: ConnectionId,
    pub result: std::result::Result<(), SendError>,
}

impl SendOutcome {
    pub fn delivered(connection_id: impl Into<ConnectionId>) -> Self {
        Self {
            connection_id: connection_id.into(),
            result: Ok(()),
        }
    }

    pub fn failed(connection_id: impl Into<ConnectionId>, error: SendError) -> Self {
        Self {
            connection_id: connection_id.into(),
            result: Err(error),
        }
    }
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver `message` to every listed connection, attempts running
    /// independently. Returns exactly one outcome per id, in no particular
    /// order.
    async fn send(
        &self,
        connection_ids: &[ConnectionId],
        message: &serde_json::Value,
    ) -> Vec<SendOutcome>;
}
