//! Axum management surface for webhook subscriptions.
//!
//! Mounted under `/api/webhooks`:
//!
//! - `POST /api/webhooks` — create subscription
//! - `GET /api/webhooks` — list subscriptions
//! - `GET /api/webhooks/{id}` — get one
//! - `PUT /api/webhooks/{id}` — partial update
//! - `DELETE /api/webhooks/{id}` — delete
//! - `POST /api/webhooks/{id}/test` — queue a diagnostic delivery
//! - `GET /api/webhooks/events` — list the event vocabulary
//!
//! Failures respond with an [`ErrorBody`] — 400 for validation, 404 for an
//! unknown id. Secrets never appear in responses.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use kennel_core::SubscriptionId;
use kennel_protocol::{ErrorBody, WebhookEvent, ALL_WEBHOOK_EVENTS};
use serde_json::{json, Value};

use crate::dispatcher::WebhookDispatcher;
use crate::error::WebhookError;
use crate::registry::{NewSubscription, SubscriptionUpdate, SubscriptionView};

/// Shared state accessible from the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    /// Dispatcher, and through it the registry.
    pub dispatcher: Arc<WebhookDispatcher>,
}

/// Build the webhook management router.
#[must_use]
pub fn webhook_routes(dispatcher: Arc<WebhookDispatcher>) -> Router {
    let state = WebhookState { dispatcher };
    Router::new()
        .route(
            "/api/webhooks",
            post(create_subscription).get(list_subscriptions),
        )
        .route("/api/webhooks/events", get(list_event_types))
        .route(
            "/api/webhooks/{id}",
            get(get_subscription)
                .put(update_subscription)
                .delete(delete_subscription),
        )
        .route("/api/webhooks/{id}/test", post(test_subscription))
        .with_state(state)
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            WebhookError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "INVALID_URL"),
            WebhookError::UnknownEvent(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_EVENT"),
            WebhookError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            WebhookError::Delivery(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DELIVERY_FAILED"),
        };
        let body = ErrorBody {
            code: code.to_owned(),
            message: self.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

/// POST /api/webhooks
async fn create_subscription(
    State(state): State<WebhookState>,
    Json(params): Json<NewSubscription>,
) -> Result<(StatusCode, Json<SubscriptionView>), WebhookError> {
    let view = state.dispatcher.registry().register(params).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/webhooks
async fn list_subscriptions(State(state): State<WebhookState>) -> Json<Vec<SubscriptionView>> {
    Json(state.dispatcher.registry().list().await)
}

/// GET /api/webhooks/{id}
async fn get_subscription(
    State(state): State<WebhookState>,
    Path(id): Path<String>,
) -> Result<Json<SubscriptionView>, WebhookError> {
    let view = state
        .dispatcher
        .registry()
        .get(&SubscriptionId::from(id))
        .await?;
    Ok(Json(view))
}

/// PUT /api/webhooks/{id}
async fn update_subscription(
    State(state): State<WebhookState>,
    Path(id): Path<String>,
    Json(update): Json<SubscriptionUpdate>,
) -> Result<Json<SubscriptionView>, WebhookError> {
    let view = state
        .dispatcher
        .registry()
        .update(&SubscriptionId::from(id), update)
        .await?;
    Ok(Json(view))
}

/// DELETE /api/webhooks/{id}
async fn delete_subscription(
    State(state): State<WebhookState>,
    Path(id): Path<String>,
) -> Result<StatusCode, WebhookError> {
    state
        .dispatcher
        .registry()
        .remove(&SubscriptionId::from(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/webhooks/{id}/test
async fn test_subscription(
    State(state): State<WebhookState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Value>), WebhookError> {
    let id = SubscriptionId::from(id);
    state.dispatcher.test_subscription(&id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"status": "queued", "id": id})),
    ))
}

/// GET /api/webhooks/events
async fn list_event_types() -> Json<Vec<WebhookEvent>> {
    Json(ALL_WEBHOOK_EVENTS.to_vec())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
