//! Incremental context delivery.
//!
//! A [`ContextStreamer`] opens one stream at a time against the context
//! endpoint and fans the arriving [`ContextFrame`]s out to subscribers.
//! Two transport paths produce identical frames:
//!
//! - **native**: the response is parsed as a server-sent event stream
//! - **chunked**: when the intent carries custom headers (which the native
//!   event-source mechanism cannot send) the body is read as a raw chunked
//!   stream and split into frames by [`parser`]
//!
//! A dropped connection is retried on a fixed backoff until the reconnect
//! budget is spent; a successful open refreshes the budget. A `complete`
//! frame ends the stream quietly, returning the streamer to idle.

use std::sync::Arc;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use kennel_core::ReconnectPolicy;
use kennel_protocol::ContextFrame;
use kennel_settings::KennelSettings;

use crate::error::{ClientError, ClientResult};
use crate::fallback::API_KEY_HEADER;

mod parser;

/// Buffered notices per subscriber before laggards start losing frames.
const NOTICE_BUFFER: usize = 256;

// ─────────────────────────────────────────────────────────────────────────────
// Intent
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable description of one stream connection.
///
/// Built once, then moved into the streamer; reconnect attempts replay
/// exactly this intent. Deriving a variant means building a new intent,
/// never mutating a shared one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamIntent {
    url: String,
    parameters: Vec<(String, String)>,
    headers: Vec<(String, String)>,
}

impl StreamIntent {
    /// Intent for a stream endpoint with no parameters or headers.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parameters: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    /// Add a custom header. Any custom header forces the chunked path,
    /// since the native event-source mechanism cannot carry one.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Query parameters, in insertion order.
    #[must_use]
    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// Custom headers, in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Whether this intent must use the chunked path.
    #[must_use]
    pub fn wants_chunked(&self) -> bool {
        !self.headers.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State and notices
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of the streamer.
///
/// Idle is the resting state for every ending: normal completion,
/// explicit disconnect, and a spent reconnect budget (the latter two are
/// additionally announced with [`StreamNotice::Disconnected`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamState {
    /// No stream running; ready to connect.
    #[default]
    Idle,
    /// A connection attempt is in flight or waiting out its backoff.
    Connecting,
    /// Frames are flowing.
    Streaming,
}

impl StreamState {
    /// Whether a stream task is currently running.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Streaming)
    }

    /// Stable name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What subscribers receive.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamNotice {
    /// One frame from the stream.
    Frame(ContextFrame),
    /// The stream is gone and will not come back on its own. Not sent
    /// after a normal `complete` frame.
    Disconnected {
        /// Why delivery stopped.
        reason: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Streamer
// ─────────────────────────────────────────────────────────────────────────────

/// Delivers context frames from the streaming endpoint.
///
/// One stream at a time; [`connect`](Self::connect) while a stream is
/// active is rejected. Dropping the streamer tears the stream down.
pub struct ContextStreamer {
    http: reqwest::Client,
    stream_url: String,
    context_url: String,
    api_key: Option<String>,
    policy: ReconnectPolicy,
    fetch_timeout_ms: u64,
    state_tx: Arc<watch::Sender<StreamState>>,
    notice_tx: broadcast::Sender<StreamNotice>,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ContextStreamer {
    /// Build a streamer from settings.
    #[must_use]
    pub fn new(settings: &KennelSettings) -> Self {
        let (notice_tx, _) = broadcast::channel(NOTICE_BUFFER);
        Self {
            http: reqwest::Client::new(),
            stream_url: settings.realtime.stream_url.clone(),
            context_url: format!(
                "{}/api/context",
                settings.api.base_url.trim_end_matches('/')
            ),
            api_key: settings.api.api_key.clone(),
            policy: settings.reconnect,
            fetch_timeout_ms: settings.realtime.fetch_timeout_ms,
            state_tx: Arc::new(watch::Sender::new(StreamState::Idle)),
            notice_tx,
            cancel: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Intent for the configured stream endpoint.
    #[must_use]
    pub fn intent(&self) -> StreamIntent {
        StreamIntent::new(&self.stream_url)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to frames and lifecycle notices. Subscribe before
    /// connecting to see every frame.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamNotice> {
        self.notice_tx.subscribe()
    }

    /// Open a stream for `intent`.
    ///
    /// # Errors
    /// Rejects with a validation error when a stream is already active.
    pub fn connect(&self, intent: StreamIntent) -> ClientResult<()> {
        if self.state().is_active() {
            return Err(ClientError::Validation("stream already active".into()));
        }
        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());
        let _ = self.state_tx.send_replace(StreamState::Connecting);
        debug!(url = intent.url(), chunked = intent.wants_chunked(), "opening context stream");
        let task = tokio::spawn(run_stream(
            self.http.clone(),
            intent,
            self.api_key.clone(),
            self.policy,
            Arc::clone(&self.state_tx),
            self.notice_tx.clone(),
            cancel,
        ));
        *self.task.lock() = Some(task);
        Ok(())
    }

    /// Tear down the current stream, if any. Idempotent.
    pub async fn disconnect(&self) {
        let cancel = self.cancel.lock().take();
        let Some(cancel) = cancel else {
            return;
        };
        cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Fetch one named context.
    ///
    /// Tries a one-shot request first; when that fails, opens a private
    /// filtered stream and resolves on the first matching `context` frame.
    /// The whole exchange is bounded by the configured fetch deadline and
    /// any stream opened here is closed before returning, success or not.
    ///
    /// # Errors
    /// Times out, reports a context-scoped failure, or reports the stream
    /// closing without delivering the context.
    pub async fn fetch_context(&self, name: &str, parameters: &Value) -> ClientResult<Value> {
        let deadline = Duration::from_millis(self.fetch_timeout_ms);
        match tokio::time::timeout(deadline, self.fetch_context_inner(name, parameters)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout {
                operation: format!("fetch-context:{name}"),
                timeout_ms: self.fetch_timeout_ms,
            }),
        }
    }

    async fn fetch_context_inner(&self, name: &str, parameters: &Value) -> ClientResult<Value> {
        match self.fetch_once(name, parameters).await {
            Ok(data) => return Ok(data),
            Err(e) => {
                debug!(context = name, error = %e, "one-shot context fetch failed, falling back to stream");
            }
        }

        // Private streamer so an application stream is left untouched.
        let child = self.child();
        let mut notices = child.subscribe();
        let mut intent = child.intent().with_parameter("contexts", name);
        for (key, value) in parameter_pairs(parameters) {
            intent = intent.with_parameter(key, value);
        }
        child.connect(intent)?;

        let outcome = loop {
            match notices.recv().await {
                Ok(StreamNotice::Frame(ContextFrame::Context { context_name, data }))
                    if context_name == name =>
                {
                    break Ok(data);
                }
                Ok(StreamNotice::Frame(ContextFrame::Error { error, context_name }))
                    if context_name.as_deref() == Some(name) || context_name.is_none() =>
                {
                    break Err(ClientError::Context {
                        context: name.to_owned(),
                        message: error,
                    });
                }
                Ok(StreamNotice::Frame(frame)) if frame.is_terminal() => {
                    break Err(ClientError::StreamClosed(name.to_owned()));
                }
                Ok(StreamNotice::Disconnected { reason }) => {
                    break Err(ClientError::Transport(reason));
                }
                Ok(StreamNotice::Frame(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(context = name, skipped, "fetch subscriber lagged behind the stream");
                }
                Err(RecvError::Closed) => {
                    break Err(ClientError::StreamClosed(name.to_owned()));
                }
            }
        };

        child.disconnect().await;
        outcome
    }

    async fn fetch_once(&self, name: &str, parameters: &Value) -> ClientResult<Value> {
        let url = format!("{}/{name}", self.context_url);
        let mut request = self.http.get(&url);
        let pairs = parameter_pairs(parameters);
        if !pairs.is_empty() {
            request = request.query(&pairs);
        }
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "context endpoint returned {status}"
            )));
        }
        let body: Value = response.json().await?;
        // The endpoint may wrap the payload or return it bare.
        Ok(match body {
            Value::Object(mut map) if map.contains_key("data") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        })
    }

    /// Same configuration, independent lifecycle.
    fn child(&self) -> Self {
        let (notice_tx, _) = broadcast::channel(NOTICE_BUFFER);
        Self {
            http: self.http.clone(),
            stream_url: self.stream_url.clone(),
            context_url: self.context_url.clone(),
            api_key: self.api_key.clone(),
            policy: self.policy,
            fetch_timeout_ms: self.fetch_timeout_ms,
            state_tx: Arc::new(watch::Sender::new(StreamState::Idle)),
            notice_tx,
            cancel: Mutex::new(None),
            task: Mutex::new(None),
        }
    }
}

impl Drop for ContextStreamer {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream task
// ─────────────────────────────────────────────────────────────────────────────

async fn run_stream(
    http: reqwest::Client,
    intent: StreamIntent,
    api_key: Option<String>,
    policy: ReconnectPolicy,
    state_tx: Arc<watch::Sender<StreamState>>,
    notice_tx: broadcast::Sender<StreamNotice>,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;
    let reason = 'attempts: loop {
        if !policy.allows_attempt(failures) {
            break 'attempts format!("stream abandoned after {failures} failed attempts");
        }
        if failures > 0 {
            let _ = state_tx.send_replace(StreamState::Connecting);
            tokio::select! {
                () = cancel.cancelled() => break 'attempts "stream disconnected".to_owned(),
                () = tokio::time::sleep(policy.backoff()) => {}
            }
        }

        let mut frames = tokio::select! {
            () = cancel.cancelled() => break 'attempts "stream disconnected".to_owned(),
            opened = open_stream(&http, &intent, api_key.as_deref()) => match opened {
                Ok(frames) => frames,
                Err(e) => {
                    failures += 1;
                    warn!(attempt = failures, error = %e, "context stream connection failed");
                    continue;
                }
            }
        };

        // A successful open refreshes the reconnect budget.
        failures = 0;
        let _ = state_tx.send_replace(StreamState::Streaming);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break 'attempts "stream disconnected".to_owned(),
                frame = frames.next() => match frame {
                    Some(frame) => {
                        let terminal = frame.is_terminal();
                        let _ = notice_tx.send(StreamNotice::Frame(frame));
                        if terminal {
                            debug!("context stream completed");
                            let _ = state_tx.send_replace(StreamState::Idle);
                            return;
                        }
                    }
                    None => {
                        failures += 1;
                        warn!(attempt = failures, "context stream ended before completion");
                        break;
                    }
                }
            }
        }
    };

    let _ = state_tx.send_replace(StreamState::Idle);
    let _ = notice_tx.send(StreamNotice::Disconnected { reason });
}

async fn open_stream(
    http: &reqwest::Client,
    intent: &StreamIntent,
    api_key: Option<&str>,
) -> ClientResult<BoxStream<'static, ContextFrame>> {
    let mut request = http.get(intent.url());
    if !intent.parameters().is_empty() {
        request = request.query(intent.parameters());
    }
    if intent.wants_chunked() {
        for (name, value) in intent.headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(key) = api_key {
            request = request.header(API_KEY_HEADER, key);
        }
    } else if let Some(key) = api_key {
        // The native path cannot set headers, so the key rides the query.
        request = request.query(&[("apiKey", key)]);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Transport(format!(
            "stream endpoint returned {status}"
        )));
    }

    if intent.wants_chunked() {
        Ok(parser::frame_payloads(response.bytes_stream())
            .filter_map(|payload| async move { parser::parse_frame(&payload) })
            .boxed())
    } else {
        Ok(response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => parser::parse_frame(&event.data),
                    Err(e) => {
                        warn!(error = %e, "event stream read error");
                        None
                    }
                }
            })
            .boxed())
    }
}

fn parameter_pairs(parameters: &Value) -> Vec<(String, String)> {
    match parameters {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect(),
        _ => Vec::new(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn intent_accumulates_parameters_and_headers() {
        let intent = StreamIntent::new("http://localhost:3001/api/stream")
            .with_parameter("contexts", "services,pets")
            .with_header("X-Request-Source", "kennel-dashboard");
        assert_eq!(intent.url(), "http://localhost:3001/api/stream");
        assert_eq!(
            intent.parameters(),
            &[("contexts".to_owned(), "services,pets".to_owned())]
        );
        assert!(intent.wants_chunked());
    }

    #[test]
    fn intent_without_headers_uses_native_path() {
        let intent = StreamIntent::new("http://localhost:3001/api/stream");
        assert!(!intent.wants_chunked());
        assert!(intent.headers().is_empty());
    }

    #[test]
    fn derived_intent_leaves_the_original_alone() {
        let base = StreamIntent::new("http://localhost:3001/api/stream");
        let derived = base.clone().with_parameter("contexts", "owners");
        assert!(base.parameters().is_empty());
        assert_eq!(derived.parameters().len(), 1);
        assert_ne!(base, derived);
    }

    #[test]
    fn streamer_starts_idle() {
        let streamer = ContextStreamer::new(&KennelSettings::default());
        assert_eq!(streamer.state(), StreamState::Idle);
        assert!(!streamer.state().is_active());
    }

    #[test]
    fn state_names_for_logs() {
        assert_eq!(StreamState::Idle.as_str(), "idle");
        assert_eq!(StreamState::Streaming.to_string(), "streaming");
        assert!(StreamState::Connecting.is_active());
        assert!(!StreamState::Idle.is_active());
    }

    #[test]
    fn parameter_pairs_render_scalars() {
        let pairs = parameter_pairs(&json!({"date": "2026-09-01", "limit": 5, "active": true}));
        assert_eq!(pairs.len(), 3);
        assert!(pairs.contains(&("date".to_owned(), "2026-09-01".to_owned())));
        assert!(pairs.contains(&("limit".to_owned(), "5".to_owned())));
        assert!(pairs.contains(&("active".to_owned(), "true".to_owned())));
        assert!(parameter_pairs(&Value::Null).is_empty());
    }

    #[tokio::test]
    async fn connect_while_active_is_rejected() {
        let mut settings = KennelSettings::default();
        // Nothing listens here; attempts fail fast and back off briefly.
        settings.realtime.stream_url = "http://127.0.0.1:9/api/stream".into();
        settings.reconnect.backoff_ms = 50;
        settings.reconnect.max_attempts = 3;
        let streamer = ContextStreamer::new(&settings);

        streamer.connect(streamer.intent()).unwrap();
        assert!(streamer.state().is_active());

        let err = streamer.connect(streamer.intent()).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        streamer.disconnect().await;
        assert_eq!(streamer.state(), StreamState::Idle);
    }

    #[tokio::test]
    async fn exhausted_budget_emits_disconnected_notice() {
        let mut settings = KennelSettings::default();
        settings.realtime.stream_url = "http://127.0.0.1:9/api/stream".into();
        settings.reconnect.backoff_ms = 5;
        settings.reconnect.max_attempts = 2;
        let streamer = ContextStreamer::new(&settings);
        let mut notices = streamer.subscribe();

        streamer.connect(streamer.intent()).unwrap();
        let notice = notices.recv().await.unwrap();
        assert!(
            matches!(notice, StreamNotice::Disconnected { ref reason } if reason.contains("2 failed attempts")),
            "unexpected notice: {notice:?}"
        );
        assert_eq!(streamer.state(), StreamState::Idle);
    }

    #[tokio::test]
    async fn disconnect_without_stream_is_a_no_op() {
        let streamer = ContextStreamer::new(&KennelSettings::default());
        streamer.disconnect().await;
        streamer.disconnect().await;
        assert_eq!(streamer.state(), StreamState::Idle);
    }
}
