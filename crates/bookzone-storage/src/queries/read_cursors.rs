// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read cursor maintenance and unread counting.

use bookzone_core::{BookzoneError, ConversationId, MessageId, ReadCursor, UserId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, StoreError, map_tr_err};
use crate::models::{cursor_from_row, now, to_db_time};
use crate::queries::load_for_participant;

const CURSOR_COLUMNS: &str = "conversation_id, user_id, last_read_message_id, updated_at";

fn select_cursor(
    conn: &rusqlite::Connection,
    conversation: &str,
    user: &str,
) -> Result<Option<ReadCursor>, rusqlite::Error> {
    conn.query_row(
        &format!(
            "SELECT {CURSOR_COLUMNS} FROM read_cursors WHERE conversation_id = ?1 AND user_id = ?2"
        ),
        params![conversation, user],
        cursor_from_row,
    )
    .optional()
}

/// Move the user's cursor to `up_to` (clamped to the newest message), or to the
/// newest message when `None`. A target behind the current cursor is a no-op.
///
/// Messages from the other participant up to the cursor are flagged `is_read`.
pub async fn advance(
    db: &Database,
    conversation: &ConversationId,
    user: &UserId,
    up_to: Option<MessageId>,
) -> Result<ReadCursor, BookzoneError> {
    let (conversation_id, user) = (conversation.clone(), user.clone());
    db.connection()
        .call(move |conn| -> Result<ReadCursor, StoreError> {
            let tx = conn.transaction()?;
            load_for_participant(&tx, &conversation_id, &user)?;

            let newest: Option<i64> = tx.query_row(
                "SELECT MAX(id) FROM messages WHERE conversation_id = ?1",
                params![conversation_id.as_str()],
                |row| row.get(0),
            )?;
            let newest = newest.map(MessageId);
            let target = match up_to {
                Some(id) => newest.map(|n| n.min(id)),
                None => newest,
            };

            let existing = select_cursor(&tx, conversation_id.as_str(), user.as_str())?;
            let current = existing.as_ref().and_then(|c| c.last_read_message_id);
            let position = current.max(target);

            let cursor = match existing {
                Some(cursor) if position == current => cursor,
                _ => {
                    let cursor = ReadCursor {
                        conversation_id: conversation_id.clone(),
                        user_id: user.clone(),
                        last_read_message_id: position,
                        updated_at: now(),
                    };
                    tx.execute(
                        "INSERT INTO read_cursors (conversation_id, user_id, last_read_message_id, updated_at)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT (conversation_id, user_id) DO UPDATE SET
                             last_read_message_id = excluded.last_read_message_id,
                             updated_at = excluded.updated_at",
                        params![
                            conversation_id.as_str(),
                            user.as_str(),
                            position.map(|id| id.0),
                            to_db_time(&cursor.updated_at),
                        ],
                    )?;
                    cursor
                }
            };

            if let Some(position) = position {
                tx.execute(
                    "UPDATE messages SET is_read = 1
                     WHERE conversation_id = ?1 AND sender_id <> ?2 AND id <= ?3 AND is_read = 0",
                    params![conversation_id.as_str(), user.as_str(), position.0],
                )?;
            }
            tx.commit()?;
            Ok(cursor)
        })
        .await
        .map_err(map_tr_err)
}

/// The user's cursor, if one was ever recorded.
pub async fn get(
    db: &Database,
    conversation: &ConversationId,
    user: &UserId,
) -> Result<Option<ReadCursor>, BookzoneError> {
    let (conversation_id, user) = (conversation.clone(), user.clone());
    db.connection()
        .call(move |conn| -> Result<Option<ReadCursor>, StoreError> {
            Ok(select_cursor(conn, conversation_id.as_str(), user.as_str())?)
        })
        .await
        .map_err(map_tr_err)
}

/// Messages from the other participant newer than the user's cursor.
pub async fn unread_count(
    db: &Database,
    conversation: &ConversationId,
    user: &UserId,
) -> Result<u64, BookzoneError> {
    let (conversation_id, user) = (conversation.clone(), user.clone());
    db.connection()
        .call(move |conn| -> Result<u64, StoreError> {
            load_for_participant(conn, &conversation_id, &user)?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages m
                 WHERE m.conversation_id = ?1
                   AND m.sender_id <> ?2
                   AND m.id > COALESCE(
                       (SELECT last_read_message_id FROM read_cursors
                         WHERE conversation_id = ?1 AND user_id = ?2), 0)",
                params![conversation_id.as_str(), user.as_str()],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{conversations, messages};
    use bookzone_core::{BookId, ChatLimits, Conversation, MessagePage, NewMessage};
    use tempfile::tempdir;

    async fn setup() -> (Database, Conversation, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let (conv, _) = conversations::get_or_create(
            &db,
            ChatLimits::default(),
            &UserId("alice".into()),
            &UserId("bob".into()),
            &BookId("b1".into()),
        )
        .await
        .unwrap();
        (db, conv, dir)
    }

    async fn send(db: &Database, conv: &Conversation, from: &str, text: &str) -> MessageId {
        messages::append(
            db,
            ChatLimits::default(),
            &conv.id,
            &UserId(from.into()),
            NewMessage::text(text),
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn own_messages_are_never_unread() {
        let (db, conv, _dir) = setup().await;
        send(&db, &conv, "alice", "hi").await;
        send(&db, &conv, "alice", "still there?").await;

        let alice = UserId("alice".into());
        let bob = UserId("bob".into());
        assert_eq!(unread_count(&db, &conv.id, &alice).await.unwrap(), 0);
        assert_eq!(unread_count(&db, &conv.id, &bob).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn cursor_never_moves_backward() {
        let (db, conv, _dir) = setup().await;
        let bob = UserId("bob".into());
        let first = send(&db, &conv, "alice", "one").await;
        let second = send(&db, &conv, "alice", "two").await;
        send(&db, &conv, "alice", "three").await;

        let cursor = advance(&db, &conv.id, &bob, Some(second)).await.unwrap();
        assert_eq!(cursor.last_read_message_id, Some(second));
        assert_eq!(unread_count(&db, &conv.id, &bob).await.unwrap(), 1);

        let cursor = advance(&db, &conv.id, &bob, Some(first)).await.unwrap();
        assert_eq!(cursor.last_read_message_id, Some(second));
        assert_eq!(unread_count(&db, &conv.id, &bob).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mark_read_flags_peer_messages() {
        let (db, conv, _dir) = setup().await;
        let bob = UserId("bob".into());
        send(&db, &conv, "alice", "one").await;
        send(&db, &conv, "bob", "reply").await;

        advance(&db, &conv.id, &bob, None).await.unwrap();
        let history = messages::list(&db, &conv.id, &bob, MessagePage::all())
            .await
            .unwrap();
        assert!(history[0].is_read);
        assert!(!history[1].is_read, "own messages are only read by the peer");
        assert_eq!(unread_count(&db, &conv.id, &bob).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn target_is_clamped_to_newest_message() {
        let (db, conv, _dir) = setup().await;
        let bob = UserId("bob".into());
        let only = send(&db, &conv, "alice", "one").await;

        let cursor = advance(&db, &conv.id, &bob, Some(MessageId(only.0 + 100)))
            .await
            .unwrap();
        assert_eq!(cursor.last_read_message_id, Some(only));

        send(&db, &conv, "alice", "two").await;
        assert_eq!(unread_count(&db, &conv.id, &bob).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_conversation_creates_empty_cursor() {
        let (db, conv, _dir) = setup().await;
        let bob = UserId("bob".into());
        assert!(get(&db, &conv.id, &bob).await.unwrap().is_none());
        let cursor = advance(&db, &conv.id, &bob, None).await.unwrap();
        assert!(cursor.last_read_message_id.is_none());
        assert!(get(&db, &conv.id, &bob).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn outsider_cannot_mark_read() {
        let (db, conv, _dir) = setup().await;
        let err = advance(&db, &conv.id, &UserId("eve".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookzoneError::NotParticipant { .. }));
    }
}
