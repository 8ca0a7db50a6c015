// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the fallback request/response surface.
//!
//! Every handler runs behind the auth middleware and receives the caller's
//! [`Identity`] as an extension; participant checks happen in the chat core.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use bookzone_chat::{StartConversation, StartedConversation};
use bookzone_core::{
    BookzoneError, Conversation, ConversationDetail, ConversationId, ConversationSummary,
    HealthStatus, Identity, Message, MessageId, MessagePage, NewMessage, ReadCursor,
};

use crate::auth::CallerToken;
use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`BookzoneError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BookzoneError);

impl From<BookzoneError> for ApiError {
    fn from(err: BookzoneError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BookzoneError::Validation(_) => StatusCode::BAD_REQUEST,
            BookzoneError::NotParticipant { .. } | BookzoneError::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            BookzoneError::NotFound { .. } => StatusCode::NOT_FOUND,
            BookzoneError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub live_sessions: usize,
}

/// Query parameters for POST /v1/conversations/{id}/read.
#[derive(Debug, Default, Deserialize)]
pub struct MarkReadParams {
    /// Advance the cursor to this message instead of the newest one.
    #[serde(default)]
    pub up_to: Option<MessageId>,
}

/// Response body for GET /v1/conversations/{id}/ws-url.
#[derive(Debug, Serialize, Deserialize)]
pub struct WsUrlResponse {
    pub websocket_url: String,
    pub conversation_id: ConversationId,
}

/// GET /health
///
/// Unauthenticated. Reports the store's health.
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    let (status_code, status) = match state.chat.store().health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (StatusCode::OK, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("unhealthy: {reason}"),
        ),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {e}")),
    };
    (
        status_code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            live_sessions: state.chat.delivery().total_sessions(),
        }),
    )
        .into_response()
}

/// GET /v1/conversations
pub async fn list_conversations(
    State(state): State<GatewayState>,
    Extension(caller): Extension<Identity>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.chat.list_conversations(&caller).await?))
}

/// POST /v1/conversations
///
/// 201 when the conversation was created, 200 when an existing one was reused.
pub async fn start_conversation(
    State(state): State<GatewayState>,
    Extension(caller): Extension<Identity>,
    Json(body): Json<StartConversation>,
) -> ApiResult<(StatusCode, Json<StartedConversation>)> {
    let started = state.chat.start_conversation(&caller, body).await?;
    let status = if started.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(started)))
}

/// GET /v1/conversations/{id}
pub async fn get_conversation(
    State(state): State<GatewayState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConversationDetail>> {
    let id = ConversationId(id);
    Ok(Json(state.chat.get_conversation(&caller, &id).await?))
}

/// GET /v1/conversations/{id}/messages?after=&limit=
pub async fn list_messages(
    State(state): State<GatewayState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
    Query(page): Query<MessagePage>,
) -> ApiResult<Json<Vec<Message>>> {
    let id = ConversationId(id);
    Ok(Json(state.chat.list_messages(&caller, &id, page).await?))
}

/// POST /v1/conversations/{id}/messages
pub async fn send_message(
    State(state): State<GatewayState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<NewMessage>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let id = ConversationId(id);
    let message = state.chat.send_message(&caller, &id, body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /v1/conversations/{id}/read?up_to=
pub async fn mark_read(
    State(state): State<GatewayState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
    Query(params): Query<MarkReadParams>,
) -> ApiResult<Json<ReadCursor>> {
    let id = ConversationId(id);
    Ok(Json(state.chat.mark_read(&caller, &id, params.up_to).await?))
}

/// POST /v1/conversations/{id}/archive
pub async fn archive_conversation(
    State(state): State<GatewayState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    let id = ConversationId(id);
    Ok(Json(state.chat.archive(&caller, &id).await?))
}

/// GET /v1/conversations/{id}/ws-url
///
/// Hands the caller a ready-to-dial live channel URL carrying their token.
pub async fn get_ws_url(
    State(state): State<GatewayState>,
    Extension(caller): Extension<Identity>,
    Extension(token): Extension<CallerToken>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<WsUrlResponse>> {
    let id = ConversationId(id);
    let conversation = state
        .chat
        .store()
        .get_conversation(&id)
        .await?
        .ok_or_else(|| BookzoneError::NotFound {
            entity: "conversation",
            id: id.to_string(),
        })?;
    if !conversation.is_participant(&caller.user_id) {
        return Err(BookzoneError::not_participant(&id, &caller.user_id).into());
    }

    let base = match &state.public_url {
        Some(public_url) => websocket_base(public_url),
        None => {
            let host = headers
                .get("host")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| BookzoneError::Validation("missing Host header".to_string()))?;
            format!("ws://{host}")
        }
    };
    let token: String = url::form_urlencoded::byte_serialize(token.0.as_bytes()).collect();
    Ok(Json(WsUrlResponse {
        websocket_url: format!("{base}/ws/chat/{id}?token={token}"),
        conversation_id: id,
    }))
}

/// Map an http(s) base URL onto the matching ws(s) scheme.
fn websocket_base(public_url: &str) -> String {
    let trimmed = public_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_status_codes() {
        let cases = [
            (BookzoneError::Validation("empty".into()), StatusCode::BAD_REQUEST),
            (BookzoneError::not_participant("c1", "eve"), StatusCode::FORBIDDEN),
            (BookzoneError::Forbidden("archived".into()), StatusCode::FORBIDDEN),
            (
                BookzoneError::NotFound {
                    entity: "conversation",
                    id: "c1".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                BookzoneError::StoreUnavailable {
                    source: "disk gone".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (BookzoneError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn websocket_base_switches_scheme() {
        assert_eq!(websocket_base("https://chat.example.com/"), "wss://chat.example.com");
        assert_eq!(websocket_base("http://localhost:8080"), "ws://localhost:8080");
        assert_eq!(websocket_base("wss://already"), "wss://already");
    }

    #[test]
    fn mark_read_params_default_to_newest() {
        let params: MarkReadParams = serde_json::from_str("{}").unwrap();
        assert!(params.up_to.is_none());
        let params: MarkReadParams = serde_json::from_str(r#"{"up_to": 7}"#).unwrap();
        assert_eq!(params.up_to, Some(MessageId(7)));
    }
}
