use crate::config::Config;
use crate::registry::{ConnectionRegistry, FollowRegistry, SubscriptionRegistry};
use crate::services::{BroadcastCoordinator, NotificationStore, NotifyService};
use crate::storage::KeyValueStore;
use crate::transport::PushTransport;
use std::sync::Arc;

/// Wired service graph. Registries and services are explicitly injected
/// (never ambient globals) so the storage backend and transport stay
/// swappable and every piece is unit-testable.
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionRegistry>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub follows: Arc<FollowRegistry>,
    pub notifications: Arc<NotificationStore>,
    pub coordinator: Arc<BroadcastCoordinator>,
    pub notify: Arc<NotifyService>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let connections = Arc::new(ConnectionRegistry::new(
            store.clone(),
            config.session_ttl_secs,
        ));
        let subscriptions = Arc::new(SubscriptionRegistry::new(
            store.clone(),
            config.session_ttl_secs,
        ));
        let follows = Arc::new(FollowRegistry::new(store.clone()));
        let notifications = Arc::new(NotificationStore::new(store));
        let coordinator = Arc::new(BroadcastCoordinator::new(
            transport,
            connections.clone(),
            subscriptions.clone(),
        ));
        let notify = Arc::new(NotifyService::new(
            connections.clone(),
            subscriptions.clone(),
            follows.clone(),
            notifications.clone(),
            coordinator.clone(),
        ));

        Self {
            connections,
            subscriptions,
            follows,
            notifications,
            coordinator,
            notify,
            config,
        }
    }
}
