//! Fire-and-forget delivery.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use kennel_core::SubscriptionId;
use kennel_protocol::{WebhookEnvelope, WebhookEvent};
use kennel_settings::WebhookSettings;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use crate::error::WebhookError;
use crate::registry::{DeliveryTarget, WebhookRegistry};
use crate::signer;

/// Delivers envelopes to subscribed URLs.
///
/// Every delivery is an independent spawned task: one POST, no retry, no
/// ordering, no fan-in. A slow or dead subscriber never blocks the event
/// producer or other subscribers.
pub struct WebhookDispatcher {
    http: reqwest::Client,
    registry: Arc<WebhookRegistry>,
    signature_header: String,
    delivery_timeout: Duration,
}

impl WebhookDispatcher {
    /// Dispatcher over `registry`, configured from settings.
    #[must_use]
    pub fn new(registry: Arc<WebhookRegistry>, settings: &WebhookSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            registry,
            signature_header: settings.signature_header.clone(),
            delivery_timeout: Duration::from_millis(settings.delivery_timeout_ms),
        }
    }

    /// The registry this dispatcher reads and records outcomes in.
    #[must_use]
    pub fn registry(&self) -> &Arc<WebhookRegistry> {
        &self.registry
    }

    /// Fan `event` out to every active subscription whose event set
    /// contains it.
    ///
    /// Returns once every delivery task is spawned — before any delivery
    /// completes. The count is how many were spawned.
    pub async fn trigger(&self, event: WebhookEvent, data: Value) -> usize {
        let targets = self.registry.targets_for(event).await;
        if targets.is_empty() {
            trace!(event = %event, "no active subscriptions for event");
            return 0;
        }
        let envelope = WebhookEnvelope::new(event, data);
        let Some(body) = encode(&envelope) else {
            return 0;
        };
        let count = targets.len();
        for target in targets {
            self.spawn_delivery(target, event, body.clone());
        }
        debug!(event = %event, deliveries = count, "webhook fan-out spawned");
        count
    }

    /// Deliver a diagnostic `webhook.test` envelope to one subscription,
    /// through the exact path real events take. The subscription's event
    /// set is not consulted.
    ///
    /// # Errors
    /// Unknown subscription id.
    pub async fn test_subscription(&self, id: &SubscriptionId) -> Result<(), WebhookError> {
        let target = self.registry.target(id).await?;
        let envelope = WebhookEnvelope::new(
            WebhookEvent::Test,
            json!({
                "subscriptionId": id,
                "message": "test delivery requested",
            }),
        );
        let Some(body) = encode(&envelope) else {
            return Err(WebhookError::Delivery("envelope did not serialize".into()));
        };
        self.spawn_delivery(target, WebhookEvent::Test, body);
        Ok(())
    }

    fn spawn_delivery(&self, target: DeliveryTarget, event: WebhookEvent, body: Bytes) {
        let http = self.http.clone();
        let registry = Arc::clone(&self.registry);
        let signature_header = self.signature_header.clone();
        let timeout = self.delivery_timeout;
        let _ = tokio::spawn(async move {
            deliver(&http, &registry, &signature_header, timeout, &target, event, body).await;
        });
    }
}

/// Serialize the envelope exactly once; signatures cover these bytes.
fn encode(envelope: &WebhookEnvelope) -> Option<Bytes> {
    match serde_json::to_vec(envelope) {
        Ok(raw) => Some(Bytes::from(raw)),
        Err(e) => {
            warn!(error = %e, "webhook envelope did not serialize");
            None
        }
    }
}

async fn deliver(
    http: &reqwest::Client,
    registry: &WebhookRegistry,
    signature_header: &str,
    timeout: Duration,
    target: &DeliveryTarget,
    event: WebhookEvent,
    body: Bytes,
) {
    let mut request = http
        .post(&target.url)
        .timeout(timeout)
        .header(CONTENT_TYPE, "application/json");
    if let Some(secret) = &target.secret {
        request = request.header(signature_header, signer::sign(secret, &body));
    }

    match request.body(body).send().await {
        Ok(response) if response.status().is_success() => {
            registry.record_success(&target.id).await;
            debug!(subscription = %target.id, event = %event, "webhook delivered");
        }
        Ok(response) => {
            registry.record_failure(&target.id).await;
            warn!(
                subscription = %target.id,
                event = %event,
                status = %response.status(),
                "webhook delivery rejected"
            );
        }
        Err(e) => {
            registry.record_failure(&target.id).await;
            warn!(
                subscription = %target.id,
                event = %event,
                error = %e,
                "webhook delivery failed"
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
