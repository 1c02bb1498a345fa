//! Environment-driven configuration helpers.
//!
//! Service configs (`sortie-commander`, `sortie-worker`) are plain structs
//! assembled from these helpers in their own `Config::from_env`.

use crate::error::{CoreError, CoreResult};
use std::str::FromStr;

/// Read `key`, falling back to `default` when unset or empty.
pub fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

/// Read an optional variable; empty counts as unset.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `key` as `T`, falling back to `default` when unset.
///
/// A value that is present but does not parse is an error rather than a
/// silent fallback.
pub fn env_parse<T>(key: &str, default: T) -> CoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CoreError::Config(format!("{key}={raw:?}: {e}"))),
    }
}
