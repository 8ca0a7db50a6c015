// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./bookzone.toml` > `~/.config/bookzone/bookzone.toml` >
//! `/etc/bookzone/bookzone.toml` with environment variable overrides via `BOOKZONE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BookzoneConfig;

pub(crate) const LOCAL_CONFIG: &str = "bookzone.toml";
pub(crate) const SYSTEM_CONFIG: &str = "/etc/bookzone/bookzone.toml";

/// Path of the per-user config file, if the platform has a config directory.
pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bookzone").join(LOCAL_CONFIG))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/bookzone/bookzone.toml` (system-wide)
/// 3. `~/.config/bookzone/bookzone.toml` (user XDG config)
/// 4. `./bookzone.toml` (local directory)
/// 5. `BOOKZONE_*` environment variables
pub fn load_config() -> Result<BookzoneConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<BookzoneConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BookzoneConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BookzoneConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BookzoneConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(BookzoneConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider with an explicit section mapping.
///
/// Keys keep their underscores: `BOOKZONE_CHAT_TYPING_TIMEOUT_MS` maps to
/// `chat.typing_timeout_ms`, not `chat.typing.timeout.ms`.
fn env_provider() -> Env {
    Env::prefixed("BOOKZONE_").map(|key| {
        let key_str = key.as_str();
        let mapped = ["service", "server", "storage", "chat", "client"]
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_override_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                LOCAL_CONFIG,
                r#"
[chat]
typing_timeout_ms = 2000
"#,
            )?;
            jail.set_env("BOOKZONE_CHAT_TYPING_TIMEOUT_MS", "3000");
            jail.set_env("BOOKZONE_SERVER_PORT", "9090");

            let config = load_config_from_path(Path::new(LOCAL_CONFIG))?;
            assert_eq!(config.chat.typing_timeout_ms, 3000);
            assert_eq!(config.server.port, 9090);
            Ok(())
        });
    }

    #[test]
    fn underscore_keys_survive_env_mapping() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BOOKZONE_CLIENT_RECONNECT_DELAY_MS", "500");
            jail.set_env("BOOKZONE_STORAGE_DATABASE_PATH", "/tmp/jail.db");

            let config: BookzoneConfig = Figment::new()
                .merge(Serialized::defaults(BookzoneConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.client.reconnect_delay_ms, 500);
            assert_eq!(config.storage.database_path, "/tmp/jail.db");
            Ok(())
        });
    }
}
