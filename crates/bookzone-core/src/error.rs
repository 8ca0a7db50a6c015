// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for BookZone messaging.

use thiserror::Error;

/// The primary error type used across all BookZone adapter traits and chat operations.
#[derive(Debug, Error)]
pub enum BookzoneError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed caller input (empty or oversize content, malformed ids).
    #[error("validation error: {0}")]
    Validation(String),

    /// The caller is not one of the two participants of the conversation.
    #[error("user {user_id} is not a participant of conversation {conversation_id}")]
    NotParticipant {
        conversation_id: String,
        user_id: String,
    },

    /// The caller is not allowed to perform the operation (live channel handshake, auth).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Live channel failures (disconnect, malformed frame, send to closed socket).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Durable persistence failure. Fatal to a message submit.
    #[error("store unavailable: {source}")]
    StoreUnavailable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BookzoneError {
    /// Shorthand for a [`BookzoneError::Transport`] without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        BookzoneError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`BookzoneError::NotParticipant`].
    pub fn not_participant(conversation_id: impl ToString, user_id: impl ToString) -> Self {
        BookzoneError::NotParticipant {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Errors caused by the caller's input or identity. These are never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BookzoneError::Validation(_)
                | BookzoneError::NotParticipant { .. }
                | BookzoneError::Forbidden(_)
                | BookzoneError::NotFound { .. }
        )
    }

    /// Errors where repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookzoneError::Transport { .. }
                | BookzoneError::StoreUnavailable { .. }
                | BookzoneError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_not_retryable() {
        let errors = [
            BookzoneError::Validation("empty".into()),
            BookzoneError::not_participant("c1", "u9"),
            BookzoneError::Forbidden("nope".into()),
            BookzoneError::NotFound {
                entity: "conversation",
                id: "c1".into(),
            },
        ];
        for err in &errors {
            assert!(err.is_client_error(), "{err} should be a client error");
            assert!(!err.is_retryable(), "{err} should not be retryable");
        }
    }

    #[test]
    fn store_and_transport_failures_are_retryable() {
        let store = BookzoneError::StoreUnavailable {
            source: "disk full".into(),
        };
        assert!(store.is_retryable());
        assert!(!store.is_client_error());
        assert!(BookzoneError::transport("socket closed").is_retryable());
    }

    #[test]
    fn not_participant_message_names_both_ids() {
        let err = BookzoneError::not_participant("conv-1", "mallory");
        let text = err.to_string();
        assert!(text.contains("conv-1"));
        assert!(text.contains("mallory"));
    }
}
