// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `bookzone serve` command implementation.
//!
//! Opens the SQLite conversation store, assembles the chat core and the
//! static-token identity table, and serves the gateway until SIGINT/SIGTERM.

use std::sync::Arc;

use bookzone_chat::ChatService;
use bookzone_config::model::BookzoneConfig;
use bookzone_core::{BookzoneError, ConversationStore, HealthStatus, PluginAdapter};
use bookzone_gateway::{GatewayState, StaticTokenAuth, start_server};
use bookzone_storage::SqliteStorage;
use tracing::{error, info, warn};

use crate::shutdown;

/// Crates whose spans and events follow `service.log_level`.
const LOG_TARGETS: &[&str] = &[
    "bookzone",
    "bookzone_core",
    "bookzone_config",
    "bookzone_storage",
    "bookzone_chat",
    "bookzone_gateway",
];

/// Runs the `bookzone serve` command.
pub async fn run_serve(config: BookzoneConfig) -> Result<(), BookzoneError> {
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        "starting bookzone messaging"
    );

    let storage = SqliteStorage::open(config.storage.clone(), config.chat.limits()).await?;
    let store: Arc<dyn ConversationStore> = Arc::new(storage);
    match store.health_check().await? {
        HealthStatus::Healthy => info!(path = %config.storage.database_path, "conversation store ready"),
        other => warn!(path = %config.storage.database_path, status = ?other, "conversation store not healthy"),
    }

    let auth = StaticTokenAuth::from_config(&config.auth);
    if auth.is_empty() {
        warn!("no [[auth.users]] configured, every API request will be rejected");
    }

    let chat = Arc::new(ChatService::new(Arc::clone(&store), &config.chat));
    let state = GatewayState {
        chat,
        auth: Arc::new(auth),
        public_url: config.server.public_url.clone(),
    };

    let cancel = shutdown::install_signal_handler();
    let result = start_server(&config.server.host, config.server.port, state, cancel.clone()).await;
    cancel.cancel();

    if let Err(e) = store.close().await {
        error!(error = %e, "failed to checkpoint conversation store");
    }
    if let Err(e) = store.shutdown().await {
        error!(error = %e, "conversation store shutdown failed");
    }
    info!("bookzone stopped");
    result
}

/// Default filter directive for a configured level.
///
/// A value that already looks like a directive (`target=level` or a
/// comma-separated list) is used verbatim.
fn filter_directive(log_level: &str) -> String {
    if log_level.contains('=') || log_level.contains(',') {
        return log_level.to_string();
    }
    let mut directive: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={log_level}"))
        .collect();
    directive.push("tower_http=info".to_string());
    directive.push("warn".to_string());
    directive.join(",")
}

/// Initialize the tracing subscriber; `RUST_LOG` wins over the config.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_level_expands_to_workspace_targets() {
        let directive = filter_directive("debug");
        assert!(directive.starts_with("bookzone=debug,"));
        assert!(directive.contains("bookzone_chat=debug"));
        assert!(directive.ends_with(",warn"));
    }

    #[test]
    fn full_directive_is_kept() {
        assert_eq!(
            filter_directive("bookzone_chat=trace,info"),
            "bookzone_chat=trace,info"
        );
    }
}
