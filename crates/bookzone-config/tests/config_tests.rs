// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the BookZone configuration system.

use bookzone_config::diagnostic::ConfigError;
use bookzone_config::{load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_bookzone_config() {
    let toml = r#"
[service]
name = "chat-test"
log_level = "debug"

[server]
host = "0.0.0.0"
port = 9000
public_url = "https://chat.example.com"

[storage]
database_path = "/tmp/chat.db"
wal_mode = false

[chat]
max_message_chars = 2000
recent_books_limit = 5
typing_timeout_ms = 1500
session_buffer = 16
preview_chars = 40

[client]
reconnect_delay_ms = 1000
max_reconnect_attempts = 7
request_timeout_secs = 3

[[auth.users]]
token = "tok-alice"
user_id = "alice"
display_name = "Alice"

[[auth.users]]
token = "tok-bob"
user_id = "bob"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.server.port, 9000);
    assert_eq!(
        config.server.public_url.as_deref(),
        Some("https://chat.example.com")
    );
    assert!(!config.storage.wal_mode);
    assert_eq!(config.chat.recent_books_limit, 5);
    assert_eq!(config.chat.typing_timeout_ms, 1500);
    assert_eq!(config.client.max_reconnect_attempts, Some(7));
    assert_eq!(config.auth.users.len(), 2);
    assert_eq!(config.auth.users[0].display_name.as_deref(), Some("Alice"));
    assert!(config.auth.users[1].display_name.is_none());
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.chat.max_message_chars, 5000);
    assert_eq!(config.client.reconnect_delay_ms, 3000);
}

#[test]
fn unknown_key_in_chat_suggests_correction() {
    let toml = r#"
[chat]
typing_timout_ms = 2000
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "typing_timout_ms");
            assert_eq!(suggestion.as_deref(), Some("typing_timeout_ms"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[agent]
name = "nope"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_reports_invalid_type() {
    let toml = r#"
[server]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert!(key.contains("port")),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

#[test]
fn auth_user_without_token_reports_missing_key() {
    let toml = r#"
[[auth.users]]
user_id = "alice"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingKey { key } if key.ends_with("token")))
    );
}

#[test]
fn semantic_errors_are_collected() {
    let toml = r#"
[storage]
database_path = ""

[chat]
session_buffer = 0

[[auth.users]]
token = "same"
user_id = "alice"

[[auth.users]]
token = "same"
user_id = "bob"
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 3);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}
