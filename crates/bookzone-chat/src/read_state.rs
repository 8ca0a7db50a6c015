// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-State Tracker: per-user read cursors over the conversation store.
//!
//! Cursors only move forward and only by the owning user's own action.
//! Marking read does not notify the other participant.

use std::sync::Arc;

use tracing::debug;

use bookzone_core::{
    BookzoneError, ConversationId, ConversationStore, MessageId, ReadCursor, UserId,
};

#[derive(Clone)]
pub struct ReadStateTracker {
    store: Arc<dyn ConversationStore>,
}

impl ReadStateTracker {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Move the user's cursor to the newest message in the conversation.
    pub async fn mark_read(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> Result<ReadCursor, BookzoneError> {
        let cursor = self
            .store
            .advance_read_cursor(conversation_id, user_id, None)
            .await?;
        debug!(
            conversation_id = %conversation_id,
            user_id = %user_id,
            cursor = ?cursor.last_read_message_id,
            "marked read"
        );
        Ok(cursor)
    }

    /// Move the user's cursor to `message_id`. Earlier positions are a no-op.
    pub async fn mark_read_up_to(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
        message_id: MessageId,
    ) -> Result<ReadCursor, BookzoneError> {
        self.store
            .advance_read_cursor(conversation_id, user_id, Some(message_id))
            .await
    }

    pub async fn unread_count(
        &self,
        conversation_id: &ConversationId,
        user_id: &UserId,
    ) -> Result<u64, BookzoneError> {
        self.store.unread_count(conversation_id, user_id).await
    }
}
