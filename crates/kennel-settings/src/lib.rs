//! # kennel-settings
//!
//! Configuration management with layered sources for the Kennel realtime
//! layer.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`KennelSettings::default()`]
//! 2. **User file** — `~/.kennel/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `KENNEL_*` overrides (highest priority)
//!
//! The protocol timeouts carried here (30 s invoke, 10 s one-shot fetch,
//! 3 s reconnect backoff with 5 attempts) are contract values; overriding
//! them is for tests and unusual deployments, not tuning.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`]. The settings are loaded
/// from `~/.kennel/settings.json` with env var overrides, or fall back to
/// compiled defaults if loading fails.
static SETTINGS: OnceLock<KennelSettings> = OnceLock::new();

/// Get the global settings instance.
pub fn get_settings() -> &'static KennelSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
pub fn init_settings(settings: KennelSettings) -> std::result::Result<(), KennelSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
