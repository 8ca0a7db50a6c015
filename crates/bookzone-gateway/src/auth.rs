// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication for the gateway.
//!
//! Callers present a bearer token, either as `Authorization: Bearer <token>`
//! or as a `token` query parameter (browsers cannot set headers on a
//! WebSocket handshake). The token is resolved to an [`Identity`] through the
//! configured [`AuthAdapter`] and attached to the request as an extension.
//!
//! When the identity table is empty, all requests are rejected (fail-closed).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use bookzone_config::model::AuthConfig;
use bookzone_core::{
    AdapterType, AuthAdapter, BookzoneError, HealthStatus, Identity, PluginAdapter,
};

/// The raw token a request authenticated with.
///
/// Kept so the ws-url endpoint can hand the same credential back to the client.
#[derive(Clone)]
pub struct CallerToken(pub String);

impl std::fmt::Debug for CallerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CallerToken([redacted])")
    }
}

/// Identity adapter backed by the static `[[auth.users]]` table.
pub struct StaticTokenAuth {
    users: HashMap<String, Identity>,
}

impl StaticTokenAuth {
    pub fn from_config(config: &AuthConfig) -> Self {
        let users = config
            .users
            .iter()
            .map(|entry| {
                let display_name = entry
                    .display_name
                    .clone()
                    .unwrap_or_else(|| entry.user_id.clone());
                (
                    entry.token.clone(),
                    Identity::new(entry.user_id.clone(), display_name),
                )
            })
            .collect();
        Self { users }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl std::fmt::Debug for StaticTokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuth")
            .field("users", &self.users.len())
            .finish()
    }
}

#[async_trait]
impl PluginAdapter for StaticTokenAuth {
    fn name(&self) -> &str {
        "static-token"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Auth
    }

    async fn health_check(&self) -> Result<HealthStatus, BookzoneError> {
        if self.users.is_empty() {
            Ok(HealthStatus::Degraded("no users configured".to_string()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), BookzoneError> {
        Ok(())
    }
}

#[async_trait]
impl AuthAdapter for StaticTokenAuth {
    async fn authenticate(&self, token: &str) -> Result<Identity, BookzoneError> {
        self.users
            .get(token)
            .cloned()
            .ok_or_else(|| BookzoneError::Forbidden("unknown token".to_string()))
    }
}

/// Pull the caller's token from the `Authorization` header or the `token` query parameter.
fn request_token(request: &Request) -> Option<String> {
    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    header.or_else(|| {
        request.uri().query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
        })
    })
}

/// Middleware that resolves the caller and inserts `Extension<Identity>`.
pub async fn auth_middleware(
    State(auth): State<Arc<dyn AuthAdapter>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(token) = request_token(&request) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    match auth.authenticate(&token).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            request.extensions_mut().insert(CallerToken(token));
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::debug!(error = %e, "authentication rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookzone_config::model::UserEntry;

    fn config() -> AuthConfig {
        AuthConfig {
            users: vec![
                UserEntry {
                    token: "tok-alice".into(),
                    user_id: "alice".into(),
                    display_name: Some("Alice".into()),
                },
                UserEntry {
                    token: "tok-bob".into(),
                    user_id: "bob".into(),
                    display_name: None,
                },
            ],
        }
    }

    #[tokio::test]
    async fn known_token_resolves_identity() {
        let auth = StaticTokenAuth::from_config(&config());
        let alice = auth.authenticate("tok-alice").await.unwrap();
        assert_eq!(alice, Identity::new("alice", "Alice"));

        // Display name falls back to the user id.
        let bob = auth.authenticate("tok-bob").await.unwrap();
        assert_eq!(bob.display_name, "bob");
    }

    #[tokio::test]
    async fn unknown_token_is_forbidden() {
        let auth = StaticTokenAuth::from_config(&config());
        let err = auth.authenticate("nope").await.unwrap_err();
        assert!(matches!(err, BookzoneError::Forbidden(_)));
    }

    #[tokio::test]
    async fn empty_table_reports_degraded() {
        let auth = StaticTokenAuth::from_config(&AuthConfig::default());
        assert!(auth.is_empty());
        assert!(matches!(
            auth.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }

    #[test]
    fn token_from_header_or_query() {
        let request = Request::builder()
            .uri("/v1/conversations")
            .header("authorization", "Bearer tok-alice")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(request_token(&request).as_deref(), Some("tok-alice"));

        let request = Request::builder()
            .uri("/ws/chat/c1?token=tok%20bob")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(request_token(&request).as_deref(), Some("tok bob"));

        let request = Request::builder()
            .uri("/ws/chat/c1")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(request_token(&request).is_none());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let auth = StaticTokenAuth::from_config(&config());
        let debug = format!("{auth:?} {:?}", CallerToken("tok-alice".into()));
        assert!(!debug.contains("tok-alice"));
    }
}
