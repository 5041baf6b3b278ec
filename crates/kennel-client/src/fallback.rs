//! One-shot HTTP degradation of the operation catalog.
//!
//! When the persistent transport is down, operations turn into the fixed
//! HTTP calls defined by [`Operation::fallback_call`] and the raw results
//! are reshaped into the same envelopes the persistent path produces.
//! Authorization-class rejections (401/403) get exactly one credential
//! replay and one retry; any other failure degrades to the operation's
//! safe default, flagged as [`InvokeOutcome::Unknown`].

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use kennel_core::Credential;
use kennel_protocol::{FallbackCall, FallbackMethod, Operation};
use kennel_settings::KennelSettings;

use crate::correlator::InvokeOutcome;
use crate::error::{ClientError, ClientResult};

/// Header carrying the api key on one-shot and chunked-stream calls.
pub(crate) const API_KEY_HEADER: &str = "x-api-key";

/// Executes operations as one-shot HTTP calls against the API base URL.
pub struct FallbackExecutor {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    /// Refreshed when a reauthentication rotates the key.
    api_key: Mutex<Option<String>>,
}

enum CallFailure {
    /// 401 or 403 — a credential replay may recover this.
    Auth(u16),
    /// Anything else: connect error, non-auth HTTP status, bad body.
    Other(String),
}

impl FallbackExecutor {
    /// Build an executor from settings.
    #[must_use]
    pub fn new(settings: &KennelSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.api.base_url.trim_end_matches('/').to_owned(),
            timeout: Duration::from_millis(settings.realtime.invoke_timeout_ms),
            api_key: Mutex::new(settings.api.api_key.clone()),
        }
    }

    /// Execute one operation over the one-shot path.
    ///
    /// Returns `Confirmed` with the enveloped result on success. On total
    /// failure returns `Unknown` with the operation's safe default instead
    /// of erroring; only caller-side validation rejects outright.
    pub async fn execute(
        &self,
        operation: Operation,
        data: &Value,
        credential: Option<&Credential>,
    ) -> ClientResult<InvokeOutcome> {
        let call = operation
            .fallback_call(data)
            .map_err(|e| ClientError::Remote(e.into_body()))?;

        match self.execute_call(&call).await {
            Ok(raw) => Ok(InvokeOutcome::Confirmed(operation.reshape(raw))),
            Err(CallFailure::Auth(status)) => {
                if let Some(credential) = credential {
                    debug!(status, operation = %operation, "authorization rejected, replaying credential once");
                    if self.reauthenticate(credential).await.is_ok() {
                        if let Ok(raw) = self.execute_call(&call).await {
                            return Ok(InvokeOutcome::Confirmed(operation.reshape(raw)));
                        }
                    }
                }
                warn!(status, operation = %operation, "fallback authorization failed, degrading to safe default");
                Ok(InvokeOutcome::Unknown(operation.safe_default()))
            }
            Err(CallFailure::Other(reason)) => {
                warn!(operation = %operation, reason, "fallback call failed, degrading to safe default");
                Ok(InvokeOutcome::Unknown(operation.safe_default()))
            }
        }
    }

    async fn execute_call(&self, call: &FallbackCall) -> Result<Value, CallFailure> {
        let url = format!("{}{}", self.base_url, call.path);
        let mut request = match call.method {
            FallbackMethod::Get => self.http.get(&url),
            FallbackMethod::Post => self.http.post(&url),
            FallbackMethod::Put => self.http.put(&url),
            FallbackMethod::Patch => self.http.patch(&url),
        };
        request = request.timeout(self.timeout);
        if let Some(body) = &call.body {
            request = request.json(body);
        }
        let api_key = self.api_key.lock().clone();
        if let Some(key) = api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CallFailure::Other(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CallFailure::Auth(status.as_u16()));
        }
        if !status.is_success() {
            return Err(CallFailure::Other(format!("HTTP {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| CallFailure::Other(e.to_string()))
    }

    /// Replay a credential against the auth endpoint.
    ///
    /// A successful exchange may rotate the api key used by later calls.
    async fn reauthenticate(&self, credential: &Credential) -> ClientResult<()> {
        let url = format!("{}/api/auth", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(credential)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Auth(format!(
                "auth endpoint returned {status}"
            )));
        }
        if let Ok(body) = response.json::<Value>().await {
            if let Some(key) = body.get("apiKey").and_then(Value::as_str) {
                *self.api_key.lock() = Some(key.to_owned());
                debug!("api key rotated by reauthentication");
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
