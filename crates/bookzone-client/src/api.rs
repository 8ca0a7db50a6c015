// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fallback request/response surface as seen from the client.
//!
//! [`ChatApi`] is the seam the [`ConversationClient`](crate::ConversationClient)
//! talks to; [`HttpChatApi`] implements it against the gateway's REST routes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use bookzone_core::{
    BookzoneError, ConversationDetail, ConversationId, ConversationSummary, Message, MessagePage,
    NewMessage, ReadCursor, StartConversation, StartedConversation,
};

/// Durable operations a conversation view needs.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// The caller's inbox.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, BookzoneError>;

    /// Open or reuse a conversation about a book, as either buyer or seller.
    async fn start_conversation(
        &self,
        request: StartConversation,
    ) -> Result<StartedConversation, BookzoneError>;

    /// A conversation with its full history.
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<ConversationDetail, BookzoneError>;

    /// A window of the conversation's history.
    async fn list_messages(
        &self,
        id: &ConversationId,
        page: MessagePage,
    ) -> Result<Vec<Message>, BookzoneError>;

    /// The authoritative send path.
    async fn send_message(
        &self,
        id: &ConversationId,
        message: NewMessage,
    ) -> Result<Message, BookzoneError>;

    /// Advance the caller's read cursor to the newest message.
    async fn mark_read(&self, id: &ConversationId) -> Result<ReadCursor, BookzoneError>;

    /// A dialable live channel URL for the conversation.
    async fn ws_url(&self, id: &ConversationId) -> Result<String, BookzoneError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct WsUrlBody {
    websocket_url: String,
}

/// [`ChatApi`] over the gateway's HTTP routes.
#[derive(Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

impl std::fmt::Debug for HttpChatApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChatApi")
            .field("base_url", &self.base_url)
            .field("token", &"[redacted]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpChatApi {
    /// Creates a client for the gateway at `base_url` acting as the holder of `token`.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BookzoneError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BookzoneError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timeout,
        })
    }

    fn conversation_url(&self, id: &ConversationId, suffix: &str) -> String {
        format!("{}/v1/conversations/{id}{suffix}", self.base_url)
    }

    fn request_error(&self, e: reqwest::Error) -> BookzoneError {
        if e.is_timeout() {
            BookzoneError::Timeout {
                duration: self.timeout,
            }
        } else {
            BookzoneError::Transport {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        resource: &str,
    ) -> Result<T, BookzoneError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let status = response.status();
        debug!(status = %status, resource, "gateway response");

        if status.is_success() {
            return response.json::<T>().await.map_err(|e| self.request_error(e));
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        Err(status_error(status, message, resource))
    }
}

/// Rebuild the error taxonomy from the gateway's status mapping.
fn status_error(status: StatusCode, message: String, resource: &str) -> BookzoneError {
    match status {
        StatusCode::BAD_REQUEST => BookzoneError::Validation(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BookzoneError::Forbidden(message),
        StatusCode::NOT_FOUND => BookzoneError::NotFound {
            entity: "conversation",
            id: resource.to_string(),
        },
        StatusCode::SERVICE_UNAVAILABLE => BookzoneError::StoreUnavailable {
            source: message.into(),
        },
        _ => BookzoneError::Internal(format!("gateway returned {status}: {message}")),
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, BookzoneError> {
        let url = format!("{}/v1/conversations", self.base_url);
        self.send(self.client.get(url), "conversations").await
    }

    async fn start_conversation(
        &self,
        request: StartConversation,
    ) -> Result<StartedConversation, BookzoneError> {
        let url = format!("{}/v1/conversations", self.base_url);
        self.send(self.client.post(url).json(&request), "conversations")
            .await
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<ConversationDetail, BookzoneError> {
        self.send(self.client.get(self.conversation_url(id, "")), id.as_str())
            .await
    }

    async fn list_messages(
        &self,
        id: &ConversationId,
        page: MessagePage,
    ) -> Result<Vec<Message>, BookzoneError> {
        let mut url = url::Url::parse(&self.conversation_url(id, "/messages"))
            .map_err(|e| BookzoneError::Validation(format!("invalid gateway url: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(after) = page.after {
                query.append_pair("after", &after.to_string());
            }
            if let Some(limit) = page.limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        self.send(self.client.get(url), id.as_str()).await
    }

    async fn send_message(
        &self,
        id: &ConversationId,
        message: NewMessage,
    ) -> Result<Message, BookzoneError> {
        self.send(
            self.client
                .post(self.conversation_url(id, "/messages"))
                .json(&message),
            id.as_str(),
        )
        .await
    }

    async fn mark_read(&self, id: &ConversationId) -> Result<ReadCursor, BookzoneError> {
        self.send(self.client.post(self.conversation_url(id, "/read")), id.as_str())
            .await
    }

    async fn ws_url(&self, id: &ConversationId) -> Result<String, BookzoneError> {
        let body: WsUrlBody = self
            .send(self.client.get(self.conversation_url(id, "/ws-url")), id.as_str())
            .await?;
        Ok(body.websocket_url)
    }
}
