// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live channel wire events.
//!
//! Client -> Server (JSON):
//! ```json
//! {"type": "chat_message", "content": "Is it still available?", "book_id": "optional"}
//! {"type": "typing"}
//! {"type": "stop_typing"}
//! {"type": "mark_read"}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "connection_established", "message": "Connected to chat room"}
//! {"type": "chat_message", "message": {"id": 7, "content": "...", ...}}
//! {"type": "user_typing", "user_id": "...", "user_name": "..."}
//! {"type": "user_stop_typing", "user_id": "...", "user_name": "..."}
//! {"type": "error", "error": "..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{BookId, Message, UserId};

/// Event sent by a client over its live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    ChatMessage {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        book_id: Option<BookId>,
    },
    Typing,
    StopTyping,
    MarkRead,
}

/// Event pushed by the server to a live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ConnectionEstablished { message: String },
    ChatMessage { message: Message },
    UserTyping { user_id: UserId, user_name: String },
    UserStopTyping { user_id: UserId, user_name: String },
    /// Rejection of a client event, delivered to the offending session only.
    Error { error: String },
}

impl ServerEvent {
    pub fn connection_established() -> Self {
        ServerEvent::ConnectionEstablished {
            message: "Connected to chat room".to_string(),
        }
    }

    /// The wire `type` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::ConnectionEstablished { .. } => "connection_established",
            ServerEvent::ChatMessage { .. } => "chat_message",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::UserStopTyping { .. } => "user_stop_typing",
            ServerEvent::Error { .. } => "error",
        }
    }
}
