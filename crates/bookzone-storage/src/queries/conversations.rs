// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lookup, creation, listing and lifecycle.

use bookzone_core::limits::validate_id;
use bookzone_core::{
    BookId, BookzoneError, ChatLimits, Conversation, ConversationId, ConversationSummary,
    LastMessage, UserId,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, StoreError, map_tr_err};
use crate::models::{
    CONVERSATION_COLUMNS, books_to_json, conversation_from_row, conversation_from_row_at, now,
    time_column, to_db_time,
};
use crate::queries::{load_conversation, load_for_participant};

/// Return the active conversation of the unordered pair, creating it when absent.
///
/// The flag is `true` when this call created the conversation.
pub async fn get_or_create(
    db: &Database,
    limits: ChatLimits,
    buyer: &UserId,
    seller: &UserId,
    book: &BookId,
) -> Result<(Conversation, bool), BookzoneError> {
    validate_id("buyer", buyer.as_str())?;
    validate_id("seller", seller.as_str())?;
    validate_id("book", &book.0)?;
    if buyer == seller {
        return Err(BookzoneError::Validation(
            "buyer and seller must be different users".to_string(),
        ));
    }

    let (buyer, seller, book) = (buyer.clone(), seller.clone(), book.clone());
    db.connection()
        .call(move |conn| -> Result<(Conversation, bool), StoreError> {
            let tx = conn.transaction()?;
            let existing = tx
                .query_row(
                    &format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         WHERE is_active = 1
                           AND ((buyer_id = ?1 AND seller_id = ?2)
                             OR (buyer_id = ?2 AND seller_id = ?1))"
                    ),
                    params![buyer.as_str(), seller.as_str()],
                    conversation_from_row,
                )
                .optional()?;

            let result = match existing {
                Some(mut conversation) => {
                    limits.push_recent_book(&mut conversation.recent_books, book);
                    tx.execute(
                        "UPDATE conversations SET recent_books = ?1 WHERE id = ?2",
                        params![books_to_json(&conversation.recent_books), conversation.id.as_str()],
                    )?;
                    (conversation, false)
                }
                None => {
                    let created_at = now();
                    let conversation = Conversation {
                        id: ConversationId::generate(),
                        buyer_id: buyer,
                        seller_id: seller,
                        recent_books: vec![book],
                        created_at,
                        updated_at: created_at,
                        is_active: true,
                    };
                    tx.execute(
                        "INSERT INTO conversations
                         (id, buyer_id, seller_id, recent_books, created_at, updated_at, is_active)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5, 1)",
                        params![
                            conversation.id.as_str(),
                            conversation.buyer_id.as_str(),
                            conversation.seller_id.as_str(),
                            books_to_json(&conversation.recent_books),
                            to_db_time(&created_at),
                        ],
                    )?;
                    (conversation, true)
                }
            };
            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Look a conversation up by id, active or archived.
pub async fn get(db: &Database, id: &ConversationId) -> Result<Option<Conversation>, BookzoneError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, StoreError> {
            Ok(load_conversation(conn, id.as_str())?)
        })
        .await
        .map_err(map_tr_err)
}

/// Active conversations of `user`, newest activity first, with unread counts
/// and a truncated preview of the latest message.
pub async fn list_for_user(
    db: &Database,
    limits: ChatLimits,
    user: &UserId,
) -> Result<Vec<ConversationSummary>, BookzoneError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<ConversationSummary>, StoreError> {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.buyer_id, c.seller_id, c.recent_books, c.created_at,
                        c.updated_at, c.is_active,
                        (SELECT COUNT(*) FROM messages m
                          WHERE m.conversation_id = c.id
                            AND m.sender_id <> ?1
                            AND m.id > COALESCE(
                                (SELECT rc.last_read_message_id FROM read_cursors rc
                                  WHERE rc.conversation_id = c.id AND rc.user_id = ?1), 0)),
                        lm.content, lm.sender_id, lm.created_at
                 FROM conversations c
                 LEFT JOIN messages lm
                   ON lm.id = (SELECT MAX(id) FROM messages WHERE conversation_id = c.id)
                 WHERE c.is_active = 1 AND (c.buyer_id = ?1 OR c.seller_id = ?1)
                 ORDER BY c.updated_at DESC, c.id ASC",
            )?;
            let rows = stmt.query_map(params![user.as_str()], |row| {
                let conversation = conversation_from_row_at(row, 0)?;
                let unread: i64 = row.get(7)?;
                let last_message = match row.get::<_, Option<String>>(8)? {
                    Some(content) => Some(LastMessage {
                        content: limits.preview(&content),
                        sender_id: UserId(row.get(9)?),
                        created_at: time_column(row, 10)?,
                    }),
                    None => None,
                };
                Ok((conversation, unread, last_message))
            })?;

            let mut summaries = Vec::new();
            for row in rows {
                let (conversation, unread, last_message) = row?;
                let other_user = conversation
                    .other_participant(&user)
                    .cloned()
                    .unwrap_or_else(|| user.clone());
                summaries.push(ConversationSummary {
                    id: conversation.id,
                    other_user,
                    buyer_id: conversation.buyer_id,
                    seller_id: conversation.seller_id,
                    unread_count: u64::try_from(unread).unwrap_or_default(),
                    last_message,
                    recent_books: conversation.recent_books,
                    created_at: conversation.created_at,
                    updated_at: conversation.updated_at,
                    is_active: conversation.is_active,
                });
            }
            Ok(summaries)
        })
        .await
        .map_err(map_tr_err)
}

/// Soft-disable a conversation. Participant-only.
pub async fn archive(
    db: &Database,
    id: &ConversationId,
    requester: &UserId,
) -> Result<Conversation, BookzoneError> {
    let (id, requester) = (id.clone(), requester.clone());
    db.connection()
        .call(move |conn| -> Result<Conversation, StoreError> {
            let mut conversation = load_for_participant(conn, &id, &requester)?;
            conn.execute(
                "UPDATE conversations SET is_active = 0 WHERE id = ?1",
                params![id.as_str()],
            )?;
            conversation.is_active = false;
            Ok(conversation)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a conversation. Messages and read cursors cascade.
pub async fn delete(db: &Database, id: &ConversationId) -> Result<bool, BookzoneError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| -> Result<bool, StoreError> {
            let removed = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id.as_str()])?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn user(id: &str) -> UserId {
        UserId(id.to_string())
    }

    fn book(id: &str) -> BookId {
        BookId(id.to_string())
    }

    #[tokio::test]
    async fn same_pair_reuses_conversation_in_either_order() {
        let (db, _dir) = setup().await;
        let limits = ChatLimits::default();

        let (first, created) = get_or_create(&db, limits, &user("a"), &user("b"), &book("b1"))
            .await
            .unwrap();
        assert!(created);
        let (second, created) = get_or_create(&db, limits, &user("b"), &user("a"), &book("b2"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.buyer_id, user("a"));
        assert_eq!(second.recent_books, vec![book("b2"), book("b1")]);
    }

    #[tokio::test]
    async fn self_conversation_is_rejected() {
        let (db, _dir) = setup().await;
        let err = get_or_create(&db, ChatLimits::default(), &user("a"), &user("a"), &book("b1"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookzoneError::Validation(_)));
    }

    #[tokio::test]
    async fn archived_pair_gets_fresh_conversation() {
        let (db, _dir) = setup().await;
        let limits = ChatLimits::default();
        let (first, _) = get_or_create(&db, limits, &user("a"), &user("b"), &book("b1"))
            .await
            .unwrap();
        let archived = archive(&db, &first.id, &user("b")).await.unwrap();
        assert!(!archived.is_active);

        let (second, created) = get_or_create(&db, limits, &user("a"), &user("b"), &book("b1"))
            .await
            .unwrap();
        assert!(created);
        assert_ne!(first.id, second.id);
        assert!(list_for_user(&db, limits, &user("a")).await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn outsider_cannot_archive() {
        let (db, _dir) = setup().await;
        let (conv, _) = get_or_create(&db, ChatLimits::default(), &user("a"), &user("b"), &book("b1"))
            .await
            .unwrap();
        let err = archive(&db, &conv.id, &user("eve")).await.unwrap_err();
        assert!(matches!(err, BookzoneError::NotParticipant { .. }));
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (db, _dir) = setup().await;
        let (conv, _) = get_or_create(&db, ChatLimits::default(), &user("a"), &user("b"), &book("b1"))
            .await
            .unwrap();
        assert!(delete(&db, &conv.id).await.unwrap());
        assert!(!delete(&db, &conv.id).await.unwrap());
        assert!(get(&db, &conv.id).await.unwrap().is_none());
    }
}
