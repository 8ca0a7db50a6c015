// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for BookZone buyer-seller messaging.
//!
//! This crate provides the error taxonomy, domain types, live channel wire
//! events and adapter traits used throughout the workspace.

pub mod error;
pub mod events;
pub mod limits;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BookzoneError;
pub use events::{ClientEvent, ServerEvent};
pub use limits::ChatLimits;
pub use traits::{AuthAdapter, ConversationStore, PluginAdapter};
pub use types::{
    AdapterType, BookId, Conversation, ConversationDetail, ConversationId, ConversationSummary,
    HealthStatus, Identity, LastMessage, Message, MessageId, MessagePage, NewMessage,
    ParticipantRole, ReadCursor, StartConversation, StartedConversation, UserId,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [AdapterType::Store, AdapterType::Auth, AdapterType::Channel] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        assert_ne!(HealthStatus::Degraded("slow".into()), healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), healthy);
    }

    #[test]
    fn traits_are_object_safe() {
        fn _store(_: &dyn ConversationStore) {}
        fn _auth(_: &dyn AuthAdapter) {}
    }
}
