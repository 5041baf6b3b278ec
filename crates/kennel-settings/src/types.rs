//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON wire
//! format. Each type implements [`Default`] with production default values.
//! Types marked with `#[serde(default)]` allow partial JSON — missing fields
//! get their default value during deserialization.

use kennel_core::ReconnectPolicy;
use serde::{Deserialize, Serialize};

/// Root settings type for the Kennel realtime layer.
///
/// Loaded from `~/.kennel/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KennelSettings {
    /// Settings schema version.
    pub version: String,
    /// Booking API (fallback path) settings.
    pub api: ApiSettings,
    /// Persistent transport and streaming settings.
    pub realtime: RealtimeSettings,
    /// Stream reconnect policy.
    pub reconnect: ReconnectPolicy,
    /// Webhook delivery settings.
    pub webhooks: WebhookSettings,
    /// Credential verification settings.
    pub auth: AuthSettings,
    /// Management server network settings.
    pub server: ServerSettings,
}

impl Default for KennelSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            api: ApiSettings::default(),
            realtime: RealtimeSettings::default(),
            reconnect: ReconnectPolicy::default(),
            webhooks: WebhookSettings::default(),
            auth: AuthSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

/// Booking API settings for the one-shot fallback path.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL of the booking API.
    pub base_url: String,
    /// API key sent with streaming and fallback calls, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            api_key: None,
        }
    }
}

/// Persistent transport and streaming settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// WebSocket URL of the persistent transport.
    pub ws_url: String,
    /// URL of the context streaming endpoint.
    pub stream_url: String,
    /// Deadline for an invoke over the persistent transport, in ms.
    pub invoke_timeout_ms: u64,
    /// Deadline for a one-shot context fetch, in ms.
    pub fetch_timeout_ms: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:3001/ws".to_string(),
            stream_url: "http://localhost:3001/api/stream".to_string(),
            invoke_timeout_ms: 30_000,
            fetch_timeout_ms: 10_000,
        }
    }
}

/// Webhook delivery settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookSettings {
    /// Header carrying the hex HMAC-SHA256 signature of the raw body.
    pub signature_header: String,
    /// Per-delivery HTTP timeout, in ms.
    pub delivery_timeout_ms: u64,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            signature_header: "X-Kennel-Signature".to_string(),
            delivery_timeout_ms: 10_000,
        }
    }
}

/// Credential verification settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Shared admin key recognized by the static verifier.
    ///
    /// The compiled default is a demo placeholder; deployments override it
    /// via file or `KENNEL_ADMIN_KEY`.
    pub admin_key: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            admin_key: "admin123".to_string(),
        }
    }
}

/// Management server network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Host to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3002,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let settings = KennelSettings::default();
        assert_eq!(settings.version, "0.1.0");
        assert_eq!(settings.api.base_url, "http://localhost:3001");
        assert!(settings.api.api_key.is_none());
        assert_eq!(settings.realtime.ws_url, "ws://localhost:3001/ws");
        assert_eq!(
            settings.realtime.stream_url,
            "http://localhost:3001/api/stream"
        );
        assert_eq!(settings.realtime.invoke_timeout_ms, 30_000);
        assert_eq!(settings.realtime.fetch_timeout_ms, 10_000);
        assert_eq!(settings.reconnect.max_attempts, 5);
        assert_eq!(settings.reconnect.backoff_ms, 3000);
        assert_eq!(settings.webhooks.delivery_timeout_ms, 10_000);
        assert_eq!(settings.auth.admin_key, "admin123");
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{"api": {"baseUrl": "https://pets.example.com"}}"#;
        let settings: KennelSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.api.base_url, "https://pets.example.com");
        // Untouched sections keep their defaults.
        assert_eq!(settings.realtime.invoke_timeout_ms, 30_000);
        assert_eq!(settings.reconnect.max_attempts, 5);
    }

    #[test]
    fn camel_case_field_names() {
        let settings = KennelSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"baseUrl\""));
        assert!(json.contains("\"wsUrl\""));
        assert!(json.contains("\"invokeTimeoutMs\""));
        assert!(json.contains("\"signatureHeader\""));
        assert!(json.contains("\"adminKey\""));
        assert!(!json.contains("base_url"));
    }

    #[test]
    fn absent_api_key_omitted_from_json() {
        let json = serde_json::to_string(&ApiSettings::default()).unwrap();
        assert!(!json.contains("apiKey"));
    }

    #[test]
    fn roundtrip_preserves_values() {
        let mut settings = KennelSettings::default();
        settings.api.api_key = Some("key_123".into());
        settings.server.port = 4000;
        let json = serde_json::to_string(&settings).unwrap();
        let back: KennelSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.api.api_key.as_deref(), Some("key_123"));
        assert_eq!(back.server.port, 4000);
    }
}
