//! # kennel-server
//!
//! Webhook management server binary — wires settings, tracing, the
//! subscription registry, and the Axum management surface.

#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use serde_json::{json, Value};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kennel_settings::KennelSettings;
use kennel_webhooks::{webhook_routes, WebhookDispatcher, WebhookRegistry};

/// Kennel webhook management server.
#[derive(Parser, Debug)]
#[command(name = "kennel-server", about = "Kennel webhook management server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Management routes plus `/health`. Permissive CORS so a dashboard served
/// from another origin can manage subscriptions.
fn build_app(registry: Arc<WebhookRegistry>, dispatcher: Arc<WebhookDispatcher>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(registry)
        .merge(webhook_routes(dispatcher))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// GET /health
async fn health_handler(State(registry): State<Arc<WebhookRegistry>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "subscriptions": registry.len().await,
    }))
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let settings = kennel_settings::load_settings().unwrap_or_else(|e| {
        warn!(error = %e, "settings load failed, continuing with defaults");
        KennelSettings::default()
    });
    let host = cli.host.unwrap_or_else(|| settings.server.host.clone());
    let port = cli.port.unwrap_or(settings.server.port);

    let registry = Arc::new(WebhookRegistry::new());
    let dispatcher = Arc::new(WebhookDispatcher::new(
        Arc::clone(&registry),
        &settings.webhooks,
    ));
    let _ = kennel_settings::init_settings(settings);

    let app = build_app(registry, dispatcher);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(%addr, "kennel-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    info!("shutdown complete");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn make_app() -> Router {
        let settings = KennelSettings::default();
        let registry = Arc::new(WebhookRegistry::new());
        let dispatcher = Arc::new(WebhookDispatcher::new(
            Arc::clone(&registry),
            &settings.webhooks,
        ));
        build_app(registry, dispatcher)
    }

    #[test]
    fn cli_defaults_defer_to_settings() {
        let cli = Cli::parse_from(["kennel-server"]);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(!cli.log_json);
    }

    #[test]
    fn cli_overrides_bind_address() {
        let cli = Cli::parse_from(["kennel-server", "--host", "0.0.0.0", "--port", "8080"]);
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(8080));
    }

    #[tokio::test]
    async fn health_reports_status_and_count() {
        let app = make_app();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 10_000).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["subscriptions"], 0);
    }

    #[tokio::test]
    async fn webhook_routes_are_mounted() {
        let app = make_app();
        let request = Request::builder()
            .uri("/api/webhooks")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_app();
        let request = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
