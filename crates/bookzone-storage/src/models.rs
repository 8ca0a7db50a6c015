// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite columns and domain types.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`),
//! so lexicographic order in SQL matches chronological order.

use bookzone_core::{
    BookId, Conversation, ConversationId, Message, MessageId, ReadCursor, UserId,
};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

pub use bookzone_core::types::{ConversationSummary, LastMessage};

/// Column list matching [`conversation_from_row`].
pub const CONVERSATION_COLUMNS: &str =
    "id, buyer_id, seller_id, recent_books, created_at, updated_at, is_active";

/// Column list matching [`message_from_row`].
pub const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, book_id, created_at, is_read";

/// Current time at the precision the database keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn to_db_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_time(idx, &raw)
}

pub fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn books_to_json(books: &[BookId]) -> String {
    let raw: Vec<&str> = books.iter().map(|b| b.0.as_str()).collect();
    serde_json::to_string(&raw).unwrap_or_else(|_| "[]".to_string())
}

fn books_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<BookId>> {
    let raw: String = row.get(idx)?;
    let ids: Vec<String> = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))?;
    Ok(ids.into_iter().map(BookId).collect())
}

/// Map a row selected with [`CONVERSATION_COLUMNS`] starting at column `base`.
pub fn conversation_from_row_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: ConversationId(row.get(base)?),
        buyer_id: UserId(row.get(base + 1)?),
        seller_id: UserId(row.get(base + 2)?),
        recent_books: books_column(row, base + 3)?,
        created_at: time_column(row, base + 4)?,
        updated_at: time_column(row, base + 5)?,
        is_active: row.get(base + 6)?,
    })
}

pub fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    conversation_from_row_at(row, 0)
}

pub fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(row.get(0)?),
        conversation_id: ConversationId(row.get(1)?),
        sender_id: UserId(row.get(2)?),
        content: row.get(3)?,
        book_id: row.get::<_, Option<String>>(4)?.map(BookId),
        created_at: time_column(row, 5)?,
        is_read: row.get(6)?,
    })
}

pub fn cursor_from_row(row: &Row<'_>) -> rusqlite::Result<ReadCursor> {
    Ok(ReadCursor {
        conversation_id: ConversationId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        last_read_message_id: row.get::<_, Option<i64>>(2)?.map(MessageId),
        updated_at: time_column(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn db_time_is_fixed_width_and_sortable() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::microseconds(7);
        let (sa, sb) = (to_db_time(&a), to_db_time(&b));
        assert_eq!(sa, "2026-01-02T03:04:05.000000Z");
        assert_eq!(sa.len(), sb.len());
        assert!(sa < sb);
        assert_eq!(parse_time(0, &sb).unwrap(), b);
    }

    #[test]
    fn books_json_preserves_order() {
        let books = vec![BookId("b2".into()), BookId("b1".into())];
        assert_eq!(books_to_json(&books), r#"["b2","b1"]"#);
    }
}
