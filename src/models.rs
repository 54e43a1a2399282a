use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transport-assigned connection identifier (opaque string).
pub type ConnectionId = String;

/// Sort key of a stored notification. Derived from creation time, so
/// lexicographic order equals creation order (see `NotificationStore`).
pub type NotificationId = String;

/// Composite key identifying one thread. Scopes subscriptions and follows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadKey {
    pub board: String,
    pub thread_id: String,
}

impl ThreadKey {
    pub fn new(board: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            board: board.into(),
            thread_id: thread_id.into(),
        }
    }
}

impl std::fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.board, self.thread_id)
    }
}

/// Opaque key of a stored subscription row, handed out on subscribe so later
/// cleanup can delete the row directly without a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRef {
    pub(crate) pk: String,
    pub(crate) sk: String,
}

/// One live push session tied to a single user.
///
/// Holds at most one subscription reference at a time. The reference is a
/// weak foreign key: deleting the subscription does not touch this record,
/// deleting this record triggers (but does not require) subscription cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: ConnectionId,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionRef>,
}

/// Ephemeral per-connection interest in one thread's live updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub thread: ThreadKey,
    pub connection_id: ConnectionId,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A subscriber as returned from a thread listing: enough to address the
/// transport (connection), attribute delivery (user), and clean up (ref).
#[derive(Debug, Clone)]
pub struct ThreadSubscriber {
    pub connection_id: ConnectionId,
    pub user_id: Uuid,
    pub subscription_ref: SubscriptionRef,
}

/// Persistent per-user interest in a thread's eventual updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub thread: ThreadKey,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Notification type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationKind {
    /// Someone replied in a followed thread
    Reply,
    /// User mentioned in a post
    Mention,
    /// Followed thread changed state (locked, moved, ...)
    ThreadUpdate,
    /// System notification
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reply => "reply",
            NotificationKind::Mention => "mention",
            NotificationKind::ThreadUpdate => "thread_update",
            NotificationKind::System => "system",
        }
    }
}

/// Durable per-user notification record.
///
/// Mutated only by setting or clearing `read_at`; deleted individually or in
/// bulk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Request to create a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
}
