// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use bookzone_core::ChatLimits;
use serde::{Deserialize, Serialize};

/// Top-level BookZone messaging configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BookzoneConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP/WebSocket listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Conversation store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message limits and live channel tuning.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Conversation client behavior.
    #[serde(default)]
    pub client: ClientConfig,

    /// Static identity table.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service, used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error) or a full `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "bookzone-chat".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP/WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally visible base URL (e.g. `https://chat.example.com`).
    /// When unset, WebSocket URLs are derived from the request's Host header.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("bookzone").join("chat.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("bookzone-chat.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Message limits and live channel tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Maximum message length in characters.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Capacity of a conversation's recent-books list.
    #[serde(default = "default_recent_books_limit")]
    pub recent_books_limit: usize,

    /// Inactivity window after which a typing indicator expires.
    #[serde(default = "default_typing_timeout_ms")]
    pub typing_timeout_ms: u64,

    /// Per-session outbound event buffer. A session whose buffer overflows is torn down.
    #[serde(default = "default_session_buffer")]
    pub session_buffer: usize,

    /// Length of the last-message preview in conversation lists.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
            recent_books_limit: default_recent_books_limit(),
            typing_timeout_ms: default_typing_timeout_ms(),
            session_buffer: default_session_buffer(),
            preview_chars: default_preview_chars(),
        }
    }
}

impl ChatConfig {
    /// The content bounds enforced by the conversation store.
    pub fn limits(&self) -> ChatLimits {
        ChatLimits {
            max_message_chars: self.max_message_chars,
            recent_books_limit: self.recent_books_limit,
            preview_chars: self.preview_chars,
        }
    }

    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }
}

fn default_max_message_chars() -> usize {
    5000
}

fn default_recent_books_limit() -> usize {
    10
}

fn default_typing_timeout_ms() -> u64 {
    2500
}

fn default_session_buffer() -> usize {
    64
}

fn default_preview_chars() -> usize {
    100
}

/// Conversation client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Fixed delay between live channel reconnect attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Give up reconnecting after this many consecutive failures. Unlimited when unset.
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    /// Timeout for fallback requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Static identity table standing in for the external identity provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Known callers and their bearer tokens.
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

/// One caller in the identity table.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    /// Bearer token presented by the caller.
    pub token: String,

    /// Stable user id.
    pub user_id: String,

    /// Name shown to the other participant (typing indicators).
    #[serde(default)]
    pub display_name: Option<String>,
}

impl std::fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserEntry")
            .field("token", &"[redacted]")
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = BookzoneConfig::default();
        assert_eq!(config.chat.recent_books_limit, 10);
        assert_eq!(config.chat.typing_timeout(), Duration::from_millis(2500));
        assert_eq!(config.client.reconnect_delay(), Duration::from_secs(3));
        assert!(config.client.max_reconnect_attempts.is_none());
        assert!(config.auth.users.is_empty());
    }

    #[test]
    fn chat_limits_mirror_chat_section() {
        let chat = ChatConfig {
            max_message_chars: 42,
            recent_books_limit: 3,
            preview_chars: 7,
            ..ChatConfig::default()
        };
        let limits = chat.limits();
        assert_eq!(limits.max_message_chars, 42);
        assert_eq!(limits.recent_books_limit, 3);
        assert_eq!(limits.preview_chars, 7);
    }

    #[test]
    fn user_entry_debug_redacts_token() {
        let entry = UserEntry {
            token: "secret-token".into(),
            user_id: "alice".into(),
            display_name: None,
        };
        let debug = format!("{entry:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[redacted]"));
    }
}
