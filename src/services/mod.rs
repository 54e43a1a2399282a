pub mod broadcast;
pub mod notifications;
pub mod notify;

pub use broadcast::{BroadcastCoordinator, DeliveryReport};
pub use notifications::NotificationStore;
pub use notify::NotifyService;
