pub mod connections;
pub mod follows;
pub mod subscriptions;

pub use connections::ConnectionRegistry;
pub use follows::FollowRegistry;
pub use subscriptions::SubscriptionRegistry;
