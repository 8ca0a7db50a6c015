// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, positive limits, and unique auth tokens.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::BookzoneConfig;

/// Longest typing timeout accepted, in milliseconds.
const MAX_TYPING_TIMEOUT_MS: u64 = 60_000;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure rather than stopping at the first.
pub fn validate_config(config: &BookzoneConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if let Some(url) = &config.server.public_url {
        let scheme_ok = url.starts_with("http://") || url.starts_with("https://");
        if !scheme_ok {
            errors.push(ConfigError::validation(format!(
                "server.public_url `{url}` must start with http:// or https://"
            )));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let chat = &config.chat;
    if chat.max_message_chars == 0 {
        errors.push(ConfigError::validation(
            "chat.max_message_chars must be at least 1",
        ));
    }
    if chat.recent_books_limit == 0 {
        errors.push(ConfigError::validation(
            "chat.recent_books_limit must be at least 1",
        ));
    }
    if chat.session_buffer == 0 {
        errors.push(ConfigError::validation(
            "chat.session_buffer must be at least 1",
        ));
    }
    if chat.typing_timeout_ms == 0 || chat.typing_timeout_ms > MAX_TYPING_TIMEOUT_MS {
        errors.push(ConfigError::validation(format!(
            "chat.typing_timeout_ms must be between 1 and {MAX_TYPING_TIMEOUT_MS}, got {}",
            chat.typing_timeout_ms
        )));
    }

    if config.client.reconnect_delay_ms == 0 {
        errors.push(ConfigError::validation(
            "client.reconnect_delay_ms must be at least 1",
        ));
    }
    if config.client.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "client.request_timeout_secs must be at least 1",
        ));
    }

    let mut tokens = HashSet::new();
    let mut users = HashSet::new();
    for (index, entry) in config.auth.users.iter().enumerate() {
        if entry.token.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "auth.users[{index}].token must not be empty"
            )));
        } else if !tokens.insert(entry.token.as_str()) {
            errors.push(ConfigError::validation(format!(
                "auth.users[{index}].token duplicates an earlier entry"
            )));
        }
        if let Err(e) = bookzone_core::limits::validate_id("user", &entry.user_id) {
            errors.push(ConfigError::validation(format!("auth.users[{index}]: {e}")));
        } else if !users.insert(entry.user_id.as_str()) {
            errors.push(ConfigError::validation(format!(
                "auth.users[{index}].user_id `{}` appears more than once",
                entry.user_id
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
