// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation store trait: the durable source of truth for conversations,
//! messages and read cursors.

use async_trait::async_trait;

use crate::error::BookzoneError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    BookId, Conversation, ConversationId, ConversationSummary, Message, MessageId, MessagePage,
    NewMessage, ReadCursor, UserId,
};

/// Durable record of conversations, participants, messages and read cursors.
///
/// Implementations must make every append atomic and assign message ids and
/// timestamps so that, within one conversation, `(created_at, id)` is
/// non-decreasing in arrival order. Every failure of the backing engine is
/// reported as [`BookzoneError::StoreUnavailable`].
#[async_trait]
pub trait ConversationStore: PluginAdapter {
    /// Opens the backend (connection, migrations).
    async fn initialize(&self) -> Result<(), BookzoneError>;

    /// Flushes pending writes and releases the backend.
    async fn close(&self) -> Result<(), BookzoneError>;

    /// Returns the active conversation between the two users, creating it when absent.
    ///
    /// The pair is matched regardless of which user is the buyer. `book` is moved
    /// to the front of the recent-books list. The flag is `true` when the
    /// conversation was created by this call.
    async fn get_or_create_conversation(
        &self,
        buyer: &UserId,
        seller: &UserId,
        book: &BookId,
    ) -> Result<(Conversation, bool), BookzoneError>;

    /// Looks a conversation up by id, active or archived.
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, BookzoneError>;

    /// Validates and persists a message, bumping the conversation's `updated_at`.
    async fn append_message(
        &self,
        conversation: &ConversationId,
        sender: &UserId,
        message: NewMessage,
    ) -> Result<Message, BookzoneError>;

    /// Ordered history of a conversation, visible to participants only.
    async fn list_messages(
        &self,
        conversation: &ConversationId,
        requester: &UserId,
        page: MessagePage,
    ) -> Result<Vec<Message>, BookzoneError>;

    /// Active conversations of `user`, most recently updated first.
    async fn list_conversations(
        &self,
        user: &UserId,
    ) -> Result<Vec<ConversationSummary>, BookzoneError>;

    /// Moves the user's read cursor forward to `up_to`, or to the newest message
    /// when `None`. Never moves it backward.
    async fn advance_read_cursor(
        &self,
        conversation: &ConversationId,
        user: &UserId,
        up_to: Option<MessageId>,
    ) -> Result<ReadCursor, BookzoneError>;

    /// The user's current read cursor, if one was ever recorded.
    async fn read_cursor(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Result<Option<ReadCursor>, BookzoneError>;

    /// Messages from the other participant newer than the user's read cursor.
    async fn unread_count(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Result<u64, BookzoneError>;

    /// Soft-disables a conversation. Participant-only.
    async fn archive_conversation(
        &self,
        conversation: &ConversationId,
        requester: &UserId,
    ) -> Result<Conversation, BookzoneError>;

    /// Deletes a conversation with its messages and cursors. Returns whether it existed.
    async fn delete_conversation(&self, conversation: &ConversationId)
    -> Result<bool, BookzoneError>;
}
