// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `bookzone config` subcommands.

use bookzone_config::model::BookzoneConfig;

const REDACTED: &str = "<redacted>";

/// Render the effective configuration as TOML with tokens redacted.
pub fn render_effective(config: &BookzoneConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    for user in &mut shown.auth.users {
        user.token = REDACTED.to_string();
    }
    toml::to_string_pretty(&shown)
}

/// One-line summary printed by `config validate`.
pub fn summary(config: &BookzoneConfig) -> String {
    format!(
        "config OK: {}:{} store={} users={}",
        config.server.host,
        config.server.port,
        config.storage.database_path,
        config.auth.users.len()
    )
}
