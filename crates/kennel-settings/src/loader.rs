//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`KennelSettings::default()`]
//! 2. If `~/.kennel/settings.json` exists, deep-merge user values over
//!    defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::KennelSettings;

/// Resolve the path to the settings file (`~/.kennel/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".kennel").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<KennelSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<KennelSettings> {
    let defaults = serde_json::to_value(KennelSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: KennelSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules: integers must be valid and within
/// the specified range; invalid values are silently ignored (fall back to
/// file/default).
pub fn apply_env_overrides(settings: &mut KennelSettings) {
    // ── API ─────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("KENNEL_BASE_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = read_env_string("KENNEL_API_KEY") {
        settings.api.api_key = Some(v);
    }

    // ── Realtime ────────────────────────────────────────────────────
    if let Some(v) = read_env_string("KENNEL_WS_URL") {
        settings.realtime.ws_url = v;
    }
    if let Some(v) = read_env_string("KENNEL_STREAM_URL") {
        settings.realtime.stream_url = v;
    }
    if let Some(v) = read_env_u64("KENNEL_INVOKE_TIMEOUT_MS", 100, 600_000) {
        settings.realtime.invoke_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("KENNEL_FETCH_TIMEOUT_MS", 100, 600_000) {
        settings.realtime.fetch_timeout_ms = v;
    }

    // ── Reconnect ───────────────────────────────────────────────────
    if let Some(v) = read_env_u32("KENNEL_RECONNECT_ATTEMPTS", 1, 100) {
        settings.reconnect.max_attempts = v;
    }
    if let Some(v) = read_env_u64("KENNEL_RECONNECT_BACKOFF_MS", 0, 600_000) {
        settings.reconnect.backoff_ms = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("KENNEL_ADMIN_KEY") {
        settings.auth.admin_key = v;
    }

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("KENNEL_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("KENNEL_PORT", 1, 65535) {
        settings.server.port = v;
    }
}

// ── Pure parsers (testable without touching the process env) ────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
