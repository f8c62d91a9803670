//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LightboardSettings::default()`]
//! 2. If `~/.lightboard/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `LIGHTBOARD_*` environment variable overrides
//! 4. Clamp out-of-range values via [`LightboardSettings::validate`]
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::LightboardSettings;

/// Resolve the path to the settings file (`~/.lightboard/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".lightboard").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LightboardSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, or its root is not an object, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<LightboardSettings> {
    load_with(path, |name| std::env::var(name).ok())
}

fn load_with<F>(path: &Path, env: F) -> Result<LightboardSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(LightboardSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        if !user.is_object() {
            return Err(SettingsError::InvalidValue(format!(
                "{} must contain a JSON object",
                path.display()
            )));
        }
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: LightboardSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, env);
    settings.validate();
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
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `LIGHTBOARD_*` overrides read through `env` to loaded settings.
///
/// Integers must parse and fall within range; anything else is logged and
/// ignored so the file/default value stands.
fn apply_overrides<F>(settings: &mut LightboardSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let reader = EnvReader { env };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = reader.string("LIGHTBOARD_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = reader.u16("LIGHTBOARD_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = reader.usize("LIGHTBOARD_MAX_SUBSCRIBERS", 1, 100_000) {
        settings.server.max_subscribers = v;
    }

    // ── Stream ──────────────────────────────────────────────────────
    if let Some(v) = reader.u64("LIGHTBOARD_HEARTBEAT_INTERVAL_MS", 100, 3_600_000) {
        settings.stream.heartbeat_interval_ms = v;
    }

    // ── Client ──────────────────────────────────────────────────────
    if let Some(v) = reader.string("LIGHTBOARD_SERVER_URL") {
        settings.client.base_url = v;
    }
    if let Some(v) = reader.u64("LIGHTBOARD_RETRY_DELAY_MS", 100, 600_000) {
        settings.client.retry_delay_ms = v;
    }
    if let Some(v) = reader.u64("LIGHTBOARD_REQUEST_TIMEOUT_MS", 100, 600_000) {
        settings.client.request_timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = reader.string("LIGHTBOARD_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = reader.string("LIGHTBOARD_LOG_FORMAT") {
        match v.parse() {
            Ok(format) => settings.logging.format = format,
            Err(_) => {
                tracing::warn!(key = "LIGHTBOARD_LOG_FORMAT", value = %v, "invalid log format env var, ignoring");
            }
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    env: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|v| !v.is_empty())
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.env)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.env)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.env)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
