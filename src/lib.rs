pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod registry;
pub mod services;
pub mod state;
pub mod storage;
pub mod transport;

pub use config::Config;
pub use error::{AppError, Result};
pub use events::{EventDispatcher, EventEnvelope, HandlerOptions};
pub use registry::{ConnectionRegistry, FollowRegistry, SubscriptionRegistry};
pub use services::{BroadcastCoordinator, NotificationStore, NotifyService};
pub use state::AppState;
pub use storage::{KeyValueStore, MemoryStore};
pub use transport::{LocalTransport, PushTransport, SendError, SendOutcome};
