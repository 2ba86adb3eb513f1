//! Publishes committed domain events to NATS when a connection is configured.

use tracing::{debug, warn};
use crate::domain::events::DomainEvent;

const SUBJECT_PREFIX: &str = "marketplace";

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    /// Best effort: events describe state that is already committed, so a
    /// failed publish is logged and never fails the caller.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        let Some(client) = &self.nats else {
            for event in &events {
                debug!(subject = event.subject(), "event not published, no broker configured");
            }
            return;
        };
        for event in events {
            let subject = format!("{}.{}", SUBJECT_PREFIX, event.subject());
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => { warn!(%subject, error = %e, "failed to encode event"); continue; }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, error = %e, "failed to publish event");
            }
        }
    }
}
