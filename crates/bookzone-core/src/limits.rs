// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content rules shared by every [`ConversationStore`](crate::ConversationStore) implementation.

use crate::error::BookzoneError;
use crate::types::BookId;

/// Bounds applied to conversations and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLimits {
    /// Maximum message length in characters.
    pub max_message_chars: usize,
    /// Capacity of a conversation's recent-books list.
    pub recent_books_limit: usize,
    /// Length of the last-message preview in conversation summaries.
    pub preview_chars: usize,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_message_chars: 5000,
            recent_books_limit: 10,
            preview_chars: 100,
        }
    }
}

impl ChatLimits {
    /// Reject empty, whitespace-only and oversize message content.
    pub fn validate_content(&self, content: &str) -> Result<(), BookzoneError> {
        if content.trim().is_empty() {
            return Err(BookzoneError::Validation(
                "message content must not be empty".to_string(),
            ));
        }
        let chars = content.chars().count();
        if chars > self.max_message_chars {
            return Err(BookzoneError::Validation(format!(
                "message content is {chars} characters, limit is {}",
                self.max_message_chars
            )));
        }
        Ok(())
    }

    /// Truncate `content` for a list preview, appending `...` when cut.
    pub fn preview(&self, content: &str) -> String {
        if content.chars().count() <= self.preview_chars {
            return content.to_string();
        }
        let mut out: String = content.chars().take(self.preview_chars).collect();
        out.push_str("...");
        out
    }

    /// Move `book` to the front of `books`, dropping the oldest entries past the cap.
    pub fn push_recent_book(&self, books: &mut Vec<BookId>, book: BookId) {
        books.retain(|b| b != &book);
        books.insert(0, book);
        books.truncate(self.recent_books_limit.max(1));
    }
}

/// Reject ids that are blank or carry surrounding whitespace.
pub fn validate_id(kind: &str, value: &str) -> Result<(), BookzoneError> {
    if value.is_empty() || value.trim() != value {
        return Err(BookzoneError::Validation(format!("malformed {kind} id `{value}`")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn book(id: &str) -> BookId {
        BookId(id.to_string())
    }

    #[test]
    fn empty_and_blank_content_is_rejected() {
        let limits = ChatLimits::default();
        assert!(matches!(
            limits.validate_content(""),
            Err(BookzoneError::Validation(_))
        ));
        assert!(matches!(
            limits.validate_content("   \n\t"),
            Err(BookzoneError::Validation(_))
        ));
        assert!(limits.validate_content("Hi! Interested in your book").is_ok());
    }

    #[test]
    fn oversize_content_is_rejected_by_char_count() {
        let limits = ChatLimits {
            max_message_chars: 3,
            ..ChatLimits::default()
        };
        assert!(limits.validate_content("äöü").is_ok());
        assert!(limits.validate_content("äöüß").is_err());
    }

    #[test]
    fn preview_truncates_long_content() {
        let limits = ChatLimits {
            preview_chars: 5,
            ..ChatLimits::default()
        };
        assert_eq!(limits.preview("hello"), "hello");
        assert_eq!(limits.preview("hello world"), "hello...");
    }

    #[test]
    fn recent_book_moves_to_front() {
        let limits = ChatLimits::default();
        let mut books = vec![book("b1"), book("b2"), book("b3")];
        limits.push_recent_book(&mut books, book("b3"));
        assert_eq!(books, vec![book("b3"), book("b1"), book("b2")]);
    }

    #[test]
    fn recent_books_are_capped() {
        let limits = ChatLimits {
            recent_books_limit: 2,
            ..ChatLimits::default()
        };
        let mut books = Vec::new();
        for id in ["b1", "b2", "b3"] {
            limits.push_recent_book(&mut books, book(id));
        }
        assert_eq!(books, vec![book("b3"), book("b2")]);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(validate_id("book", "").is_err());
        assert!(validate_id("book", " b1").is_err());
        assert!(validate_id("book", "b1").is_ok());
    }

    proptest! {
        #[test]
        fn recent_books_stay_unique_bounded_and_newest_first(
            ids in proptest::collection::vec(0u8..8, 0..40),
            cap in 1usize..6,
        ) {
            let limits = ChatLimits { recent_books_limit: cap, ..ChatLimits::default() };
            let mut books = Vec::new();
            for id in &ids {
                limits.push_recent_book(&mut books, book(&id.to_string()));
            }
            prop_assert!(books.len() <= cap);
            let mut seen = std::collections::HashSet::new();
            for b in &books {
                prop_assert!(seen.insert(b.clone()));
            }
            if let Some(last) = ids.last() {
                prop_assert_eq!(&books[0], &book(&last.to_string()));
            }
        }
    }
}
