// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules for conversations, messages, and read cursors.

pub mod conversations;
pub mod messages;
pub mod read_cursors;

use bookzone_core::{BookzoneError, Conversation, ConversationId, UserId};
use rusqlite::{OptionalExtension, params};

use crate::database::StoreError;
use crate::models::{CONVERSATION_COLUMNS, conversation_from_row};

/// Load a conversation inside a database-thread closure.
pub(crate) fn load_conversation(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<Conversation>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        params![id],
        conversation_from_row,
    )
    .optional()
}

/// Load a conversation and verify `user` takes part in it.
pub(crate) fn load_for_participant(
    conn: &rusqlite::Connection,
    id: &ConversationId,
    user: &UserId,
) -> Result<Conversation, StoreError> {
    let conversation = load_conversation(conn, id.as_str())?.ok_or_else(|| {
        BookzoneError::NotFound {
            entity: "conversation",
            id: id.to_string(),
        }
    })?;
    if !conversation.is_participant(user) {
        return Err(BookzoneError::not_participant(id, user).into());
    }
    Ok(conversation)
}
