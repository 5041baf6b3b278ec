//! Subscription registry.
//!
//! In-memory store of webhook subscriptions behind a [`tokio::sync::RwLock`].
//! All mutation goes through registry methods; delivery bookkeeping
//! (`record_success` / `record_failure`) is crate-internal, everything else
//! is the management surface. Responses never carry secrets — every public
//! read returns a [`SubscriptionView`] with the secret redacted to
//! `hasSecret`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kennel_core::SubscriptionId;
use kennel_protocol::WebhookEvent;
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::WebhookError;

/// One registered webhook subscription.
///
/// Created by registration, mutated per delivery attempt, removed only by
/// explicit deletion.
#[derive(Clone, Debug)]
pub struct WebhookSubscription {
    /// Subscription id.
    pub id: SubscriptionId,
    /// Absolute http(s) URL deliveries POST to.
    pub url: String,
    /// Events this subscription receives.
    pub events: Vec<WebhookEvent>,
    /// Shared signing secret.
    pub secret: Option<String>,
    /// Inactive subscriptions are skipped by the dispatcher.
    pub active: bool,
    /// Cumulative failed-delivery count.
    pub error_count: u64,
    /// When the last successful delivery completed.
    pub last_triggered: Option<DateTime<Utc>>,
    /// When the last delivery failure was recorded.
    pub last_failure: Option<DateTime<Utc>>,
    /// When the subscription was registered.
    pub created_at: DateTime<Utc>,
}

impl WebhookSubscription {
    /// Redacted representation for management responses.
    #[must_use]
    pub fn view(&self) -> SubscriptionView {
        SubscriptionView {
            id: self.id.clone(),
            url: self.url.clone(),
            events: self.events.clone(),
            has_secret: self.secret.is_some(),
            active: self.active,
            error_count: self.error_count,
            last_triggered: self.last_triggered,
            last_failure: self.last_failure,
            created_at: self.created_at,
        }
    }

    fn matches(&self, event: WebhookEvent) -> bool {
        self.active && self.events.contains(&event)
    }
}

/// Subscription as returned by every management call — the secret is
/// collapsed to a boolean.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    /// Subscription id.
    pub id: SubscriptionId,
    /// Target URL.
    pub url: String,
    /// Subscribed events.
    pub events: Vec<WebhookEvent>,
    /// Whether a signing secret is configured.
    pub has_secret: bool,
    /// Whether the dispatcher considers this subscription.
    pub active: bool,
    /// Cumulative failed-delivery count.
    pub error_count: u64,
    /// When the last successful delivery completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,
    /// When the last delivery failure was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// Registration request.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    /// Absolute http(s) URL to deliver to.
    pub url: String,
    /// Event names; each must be in the fixed enumeration.
    pub events: Vec<String>,
    /// Optional signing secret.
    #[serde(default)]
    pub secret: Option<String>,
}

/// Partial update; absent fields keep their value.
///
/// `secret` distinguishes absent (keep) from explicit `null` (clear),
/// which is why it is doubly optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    /// Replacement target URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Replacement event set.
    #[serde(default)]
    pub events: Option<Vec<String>>,
    /// Replacement secret; `Some(None)` clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub secret: Option<Option<String>>,
    /// Replacement active flag.
    #[serde(default)]
    pub active: Option<bool>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// What a spawned delivery needs from a subscription.
#[derive(Clone, Debug)]
pub(crate) struct DeliveryTarget {
    pub id: SubscriptionId,
    pub url: String,
    pub secret: Option<String>,
}

impl From<&WebhookSubscription> for DeliveryTarget {
    fn from(subscription: &WebhookSubscription) -> Self {
        Self {
            id: subscription.id.clone(),
            url: subscription.url.clone(),
            secret: subscription.secret.clone(),
        }
    }
}

/// In-memory subscription store.
#[derive(Default)]
pub struct WebhookRegistry {
    subscriptions: RwLock<HashMap<SubscriptionId, WebhookSubscription>>,
}

impl WebhookRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription. Starts active with a zeroed error count.
    ///
    /// # Errors
    /// Rejects URLs that are not absolute http(s) and event names outside
    /// the fixed enumeration.
    pub async fn register(
        &self,
        params: NewSubscription,
    ) -> Result<SubscriptionView, WebhookError> {
        validate_url(&params.url)?;
        let events = validate_events(&params.events)?;
        let subscription = WebhookSubscription {
            id: SubscriptionId::new(),
            url: params.url,
            events,
            secret: params.secret,
            active: true,
            error_count: 0,
            last_triggered: None,
            last_failure: None,
            created_at: Utc::now(),
        };
        let view = subscription.view();
        let _ = self
            .subscriptions
            .write()
            .await
            .insert(subscription.id.clone(), subscription);
        debug!(id = %view.id, url = %view.url, "webhook subscription registered");
        Ok(view)
    }

    /// Look up one subscription.
    ///
    /// # Errors
    /// Unknown id.
    pub async fn get(&self, id: &SubscriptionId) -> Result<SubscriptionView, WebhookError> {
        self.subscriptions
            .read()
            .await
            .get(id)
            .map(WebhookSubscription::view)
            .ok_or_else(|| WebhookError::NotFound(id.to_string()))
    }

    /// All subscriptions in registration order.
    pub async fn list(&self) -> Vec<SubscriptionView> {
        let mut views: Vec<_> = self
            .subscriptions
            .read()
            .await
            .values()
            .map(WebhookSubscription::view)
            .collect();
        views.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        views
    }

    /// Apply a partial update.
    ///
    /// # Errors
    /// Unknown id, or the same validation failures as registration.
    pub async fn update(
        &self,
        id: &SubscriptionId,
        update: SubscriptionUpdate,
    ) -> Result<SubscriptionView, WebhookError> {
        // Validate before taking the write lock.
        if let Some(url) = &update.url {
            validate_url(url)?;
        }
        let events = match &update.events {
            Some(names) => Some(validate_events(names)?),
            None => None,
        };

        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(id)
            .ok_or_else(|| WebhookError::NotFound(id.to_string()))?;
        if let Some(url) = update.url {
            subscription.url = url;
        }
        if let Some(events) = events {
            subscription.events = events;
        }
        if let Some(secret) = update.secret {
            subscription.secret = secret;
        }
        if let Some(active) = update.active {
            subscription.active = active;
        }
        Ok(subscription.view())
    }

    /// Delete a subscription.
    ///
    /// # Errors
    /// Unknown id.
    pub async fn remove(&self, id: &SubscriptionId) -> Result<(), WebhookError> {
        self.subscriptions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| WebhookError::NotFound(id.to_string()))
    }

    /// Number of registered subscriptions.
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Whether the registry holds no subscriptions.
    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }

    // ── Dispatcher support ──────────────────────────────────────────

    /// Snapshot of active subscriptions whose event set contains `event`.
    pub(crate) async fn targets_for(&self, event: WebhookEvent) -> Vec<DeliveryTarget> {
        self.subscriptions
            .read()
            .await
            .values()
            .filter(|s| s.matches(event))
            .map(DeliveryTarget::from)
            .collect()
    }

    /// Delivery target for one subscription, ignoring its event set.
    pub(crate) async fn target(
        &self,
        id: &SubscriptionId,
    ) -> Result<DeliveryTarget, WebhookError> {
        self.subscriptions
            .read()
            .await
            .get(id)
            .map(DeliveryTarget::from)
            .ok_or_else(|| WebhookError::NotFound(id.to_string()))
    }

    /// A delivery completed; stamp `lastTriggered`.
    pub(crate) async fn record_success(&self, id: &SubscriptionId) {
        if let Some(subscription) = self.subscriptions.write().await.get_mut(id) {
            subscription.last_triggered = Some(Utc::now());
        }
    }

    /// A delivery failed; bump `errorCount` and stamp `lastFailure`.
    pub(crate) async fn record_failure(&self, id: &SubscriptionId) {
        if let Some(subscription) = self.subscriptions.write().await.get_mut(id) {
            subscription.error_count += 1;
            subscription.last_failure = Some(Utc::now());
        }
    }
}

fn validate_url(url: &str) -> Result<(), WebhookError> {
    let parsed = Url::parse(url).map_err(|_| WebhookError::InvalidUrl(url.to_owned()))?;
    let scheme_ok = parsed.scheme() == "http" || parsed.scheme() == "https";
    if !scheme_ok || parsed.host_str().is_none() {
        return Err(WebhookError::InvalidUrl(url.to_owned()));
    }
    Ok(())
}

fn validate_events(names: &[String]) -> Result<Vec<WebhookEvent>, WebhookError> {
    names
        .iter()
        .map(|name| {
            WebhookEvent::parse(name).ok_or_else(|| WebhookError::UnknownEvent(name.clone()))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
