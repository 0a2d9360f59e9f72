//! The publisher seam for mutation events.
//!
//! Publishing is best-effort and fire-and-forget: a committed write whose
//! event is lost stays committed. Implementations log their own failures
//! and never raise to the caller.

use async_trait::async_trait;
use serde_json::Value;

use verge_core::events::{MessageAttributes, MutationEvent, Operation};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver one event. Never fails the caller; implementations log
    /// delivery problems.
    async fn publish(&self, destination: &str, payload: &Value, attributes: &MessageAttributes);
}

/// Publishes events as structured log records.
///
/// Serves as the injected observability path when no message bus is wired
/// up; the log record carries the full envelope.
#[derive(Debug, Clone, Default)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, destination: &str, payload: &Value, attributes: &MessageAttributes) {
        let operation = attributes
            .get("operation")
            .and_then(|attribute| attribute.string_value.parse::<Operation>().ok());

        match operation {
            Some(operation) => {
                let event = MutationEvent::new(operation, payload.clone());
                tracing::info!(
                    destination,
                    operation = %event.operation,
                    event_id = %event.id,
                    payload = %event.payload,
                    "Published mutation event"
                );
            }
            None => {
                tracing::warn!(destination, payload = %payload, "Published event without operation tag");
            }
        }
    }
}

/// Discards every event. Selectable by callers that want mutations
/// without any event side-call.
#[derive(Debug, Clone, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _destination: &str, _payload: &Value, _attributes: &MessageAttributes) {}
}
