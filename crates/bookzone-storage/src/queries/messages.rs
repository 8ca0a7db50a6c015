// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message append and history queries.

use bookzone_core::limits::validate_id;
use bookzone_core::{
    BookzoneError, ChatLimits, ConversationId, Message, MessageId, MessagePage, NewMessage,
    UserId,
};
use rusqlite::params;

use crate::database::{Database, StoreError, map_tr_err};
use crate::models::{
    MESSAGE_COLUMNS, books_to_json, message_from_row, now, parse_time, to_db_time,
};
use crate::queries::load_for_participant;

/// Validate and persist a message, bumping the conversation's `updated_at`.
///
/// `created_at` is never earlier than the newest message already stored in
/// the conversation, so `(created_at, id)` stays non-decreasing even if the
/// wall clock steps backward.
pub async fn append(
    db: &Database,
    limits: ChatLimits,
    conversation: &ConversationId,
    sender: &UserId,
    message: NewMessage,
) -> Result<Message, BookzoneError> {
    limits.validate_content(&message.content)?;
    if let Some(book) = &message.book_id {
        validate_id("book", &book.0)?;
    }

    let (conversation_id, sender) = (conversation.clone(), sender.clone());
    db.connection()
        .call(move |conn| -> Result<Message, StoreError> {
            let tx = conn.transaction()?;
            let mut conversation = load_for_participant(&tx, &conversation_id, &sender)?;
            if !conversation.is_active {
                return Err(BookzoneError::Forbidden(format!(
                    "conversation {conversation_id} is archived"
                ))
                .into());
            }

            let newest: Option<String> = tx.query_row(
                "SELECT MAX(created_at) FROM messages WHERE conversation_id = ?1",
                params![conversation_id.as_str()],
                |row| row.get(0),
            )?;
            let mut created_at = now();
            if let Some(raw) = newest {
                created_at = created_at.max(parse_time(0, &raw)?);
            }
            let stamp = to_db_time(&created_at);

            tx.execute(
                "INSERT INTO messages (conversation_id, sender_id, content, book_id, created_at, is_read)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                params![
                    conversation_id.as_str(),
                    sender.as_str(),
                    message.content,
                    message.book_id.as_ref().map(|b| b.0.as_str()),
                    stamp,
                ],
            )?;
            let id = MessageId(tx.last_insert_rowid());

            if let Some(book) = &message.book_id {
                limits.push_recent_book(&mut conversation.recent_books, book.clone());
            }
            tx.execute(
                "UPDATE conversations SET updated_at = ?1, recent_books = ?2 WHERE id = ?3",
                params![
                    stamp,
                    books_to_json(&conversation.recent_books),
                    conversation_id.as_str()
                ],
            )?;
            tx.commit()?;

            Ok(Message {
                id,
                conversation_id,
                sender_id: sender,
                content: message.content,
                book_id: message.book_id,
                created_at,
                is_read: false,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Ordered history of a conversation, visible to participants only.
pub async fn list(
    db: &Database,
    conversation: &ConversationId,
    requester: &UserId,
    page: MessagePage,
) -> Result<Vec<Message>, BookzoneError> {
    let (conversation_id, requester) = (conversation.clone(), requester.clone());
    let after = page.after.map(|id| id.0).unwrap_or(0);
    // SQLite treats a negative LIMIT as unbounded.
    let limit = page.limit.map(i64::from).unwrap_or(-1);
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, StoreError> {
            load_for_participant(conn, &conversation_id, &requester)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1 AND id > ?2
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(
                params![conversation_id.as_str(), after, limit],
                message_from_row,
            )?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}
