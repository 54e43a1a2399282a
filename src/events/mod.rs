//! Versioned event envelope and handler fan-out.
//!
//! Every inbound event arrives as one JSON envelope. Parsing failures are
//! logged and dropped here, never retried; at-least-once redelivery is the
//! event source's responsibility. Handlers declare the highest major payload
//! version they understand and are skipped for anything newer, so older
//! handlers safely ignore breaking payload changes instead of crashing.

use crate::error::Result;
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod handlers;

/// Fixed wrapper around every domain event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// `"major.minor"` schema version of the payload.
    pub version: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Source service that emitted the event.
    pub source: String,
    /// Emitting instance, for tracing.
    pub instance: String,
    pub time: DateTime<Utc>,
    pub request_id: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Integer major version, 0 when unparseable.
    pub fn major_version(&self) -> u32 {
        self.version
            .split('.')
            .next()
            .and_then(|major| major.parse().ok())
            .unwrap_or(0)
    }
}

pub type EventHandler = Arc<dyn Fn(EventEnvelope) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wrap an async fn as an [`EventHandler`].
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |envelope| Box::pin(f(envelope)))
}

#[derive(Debug, Clone, Copy)]
pub struct HandlerOptions {
    /// Highest payload major version this handler understands.
    pub supported_major_version: u32,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            supported_major_version: 0,
        }
    }
}

struct RegisteredHandler {
    handler: EventHandler,
    supported_major_version: u32,
}

/// Routes parsed envelopes to the handlers registered for their type.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<String, Vec<RegisteredHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, event_type: impl Into<String>, handler: EventHandler, opts: HandlerOptions) {
        self.handlers
            .entry(event_type.into())
            .or_default()
            .push(RegisteredHandler {
                handler,
                supported_major_version: opts.supported_major_version,
            });
    }

    /// Group related `on` calls.
    pub fn register(&mut self, group: impl FnOnce(&mut Self)) {
        group(self);
    }

    /// Parse and fan out one raw event.
    ///
    /// Matching handlers run concurrently; each failure is caught and logged
    /// individually and does not cancel siblings. No retries at this layer.
    pub async fn dispatch(&self, raw: serde_json::Value) {
        let envelope: EventEnvelope = match serde_json::from_value(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed event envelope");
                return;
            }
        };

        let Some(registered) = self.handlers.get(&envelope.event_type) else {
            debug!(event_type = %envelope.event_type, "no handlers registered");
            return;
        };

        let event_major = envelope.major_version();
        let invocations: Vec<_> = registered
            .iter()
            .filter(|entry| {
                if event_major > entry.supported_major_version {
                    info!(
                        event_type = %envelope.event_type,
                        event_major,
                        supported = entry.supported_major_version,
                        "skipping handler for newer payload version"
                    );
                    false
                } else {
                    true
                }
            })
            .map(|entry| (entry.handler)(envelope.clone()))
            .collect();

        for result in join_all(invocations).await {
            if let Err(e) = result {
                error!(
                    event_type = %envelope.event_type,
                    request_id = %envelope.request_id,
                    error = %e,
                    "event handler failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn raw_event(event_type: &str, version: &str) -> serde_json::Value {
        json!({
            "version": version,
            "type": event_type,
            "source": "content-service",
            "instance": "i-1",
            "time": Utc::now().to_rfc3339(),
            "requestId": "req-1",
            "payload": { "n": 1 },
        })
    }

    fn counting_handler(counter: Arc<AtomicUsize>) -> EventHandler {
        handler(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[test]
    fn test_major_version_extraction() {
        let mut envelope: EventEnvelope =
            serde_json::from_value(raw_event("x", "2.1")).unwrap();
        assert_eq!(envelope.major_version(), 2);

        envelope.version = "garbage".to_string();
        assert_eq!(envelope.major_version(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_invokes_matching_handlers() {
        let mut dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.on(
            "thread.post.created",
            counting_handler(count.clone()),
            HandlerOptions {
                supported_major_version: 1,
            },
        );
        dispatcher.on(
            "thread.post.created",
            counting_handler(count.clone()),
            HandlerOptions {
                supported_major_version: 1,
            },
        );

        dispatcher
            .dispatch(raw_event("thread.post.created", "1.0"))
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_newer_major_version_skips_handler() {
        let mut dispatcher = EventDispatcher::new();
        let old = Arc::new(AtomicUsize::new(0));
        let new = Arc::new(AtomicUsize::new(0));
        dispatcher.on(
            "thread.post.created",
            counting_handler(old.clone()),
            HandlerOptions {
                supported_major_version: 1,
            },
        );
        dispatcher.on(
            "thread.post.created",
            counting_handler(new.clone()),
            HandlerOptions {
                supported_major_version: 2,
            },
        );

        dispatcher
            .dispatch(raw_event("thread.post.created", "2.0"))
            .await;

        assert_eq!(old.load(Ordering::SeqCst), 0);
        assert_eq!(new.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_envelope_runs_no_handlers() {
        let mut dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.on(
            "thread.post.created",
            counting_handler(count.clone()),
            HandlerOptions::default(),
        );

        dispatcher.dispatch(json!({ "type": 42 })).await;
        dispatcher.dispatch(json!("not an object")).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_cancel_siblings() {
        let mut dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.register(|d| {
            d.on(
                "thread.post.created",
                handler(|_| async {
                    Err(crate::error::AppError::Validation("bad payload".to_string()))
                }),
                HandlerOptions::default(),
            );
            d.on(
                "thread.post.created",
                counting_handler(count.clone()),
                HandlerOptions::default(),
            );
        });

        dispatcher
            .dispatch(raw_event("thread.post.created", "0.1"))
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_ignored() {
        let dispatcher = EventDispatcher::new();
        dispatcher.dispatch(raw_event("nobody.cares", "1.0")).await;
    }
}
