// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the store, the chat core, the gateway and the client.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::BookzoneError;

/// Opaque conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        ConversationId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque user identifier issued by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque book identifier from the external catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub String);

/// Server-assigned message identifier.
///
/// Ids are allocated in arrival order, so within one conversation
/// `(created_at, id)` and `id` alone give the same total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        })*
    };
}

display_inner!(ConversationId, UserId, BookId, MessageId);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Store,
    Auth,
    Channel,
}

/// The role a participant plays in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantRole {
    Buyer,
    Seller,
}

/// A durable two-party conversation between a buyer and a seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// Books discussed, most recent first. UI context only.
    pub recent_books: Vec<BookId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Conversation {
    /// Whether `user` is the buyer or the seller of this conversation.
    pub fn is_participant(&self, user: &UserId) -> bool {
        &self.buyer_id == user || &self.seller_id == user
    }

    /// The role `user` plays, or `None` for outsiders.
    pub fn role_of(&self, user: &UserId) -> Option<ParticipantRole> {
        if &self.buyer_id == user {
            Some(ParticipantRole::Buyer)
        } else if &self.seller_id == user {
            Some(ParticipantRole::Seller)
        } else {
            None
        }
    }

    /// The counterpart of `user`, or `None` for outsiders.
    pub fn other_participant(&self, user: &UserId) -> Option<&UserId> {
        match self.role_of(user)? {
            ParticipantRole::Buyer => Some(&self.seller_id),
            ParticipantRole::Seller => Some(&self.buyer_id),
        }
    }
}

/// A single immutable chat entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    #[serde(default)]
    pub book_id: Option<BookId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

/// Sender-supplied fields of a message about to be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub content: String,
    #[serde(default)]
    pub book_id: Option<BookId>,
}

impl NewMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            book_id: None,
        }
    }

    pub fn about_book(content: impl Into<String>, book_id: BookId) -> Self {
        Self {
            content: content.into(),
            book_id: Some(book_id),
        }
    }
}

/// Window into a conversation's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePage {
    /// Only return messages with an id strictly greater than this one.
    #[serde(default)]
    pub after: Option<MessageId>,
    /// Maximum number of messages to return.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl MessagePage {
    /// The full ordered history.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn after(id: MessageId) -> Self {
        Self {
            after: Some(id),
            limit: None,
        }
    }
}

/// Preview of the newest message, used in conversation lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub sender_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A conversation as seen from one participant's inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub other_user: UserId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub unread_count: u64,
    pub last_message: Option<LastMessage>,
    pub recent_books: Vec<BookId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

/// A conversation together with its full ordered history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub unread_count: u64,
}

/// Per-user watermark of how far into a conversation the user has read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadCursor {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    /// Newest message the user has seen. `None` until the first message is read.
    pub last_read_message_id: Option<MessageId>,
    pub updated_at: DateTime<Utc>,
}

/// A verified caller identity from the external identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            display_name: display_name.into(),
        }
    }
}

/// Request to open (or reuse) a conversation about a book.
///
/// Exactly one counterpart must be named: `seller_id` when the caller is the
/// buyer, `buyer_id` when the caller is the seller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConversation {
    pub book_id: BookId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_id: Option<UserId>,
    /// Optional first message, sent with the book attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StartConversation {
    /// Caller is the buyer contacting `seller` about `book`.
    pub fn with_seller(book: BookId, seller: UserId) -> Self {
        Self {
            book_id: book,
            seller_id: Some(seller),
            buyer_id: None,
            message: None,
        }
    }

    /// Caller is the seller contacting `buyer` about `book`.
    pub fn with_buyer(book: BookId, buyer: UserId) -> Self {
        Self {
            book_id: book,
            seller_id: None,
            buyer_id: Some(buyer),
            message: None,
        }
    }

    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.message = Some(text.into());
        self
    }

    /// Resolve the canonical (buyer, seller) pair for `caller`.
    pub fn participants(&self, caller: &UserId) -> Result<(UserId, UserId), BookzoneError> {
        match (&self.seller_id, &self.buyer_id) {
            (Some(seller), None) => Ok((caller.clone(), seller.clone())),
            (None, Some(buyer)) => Ok((buyer.clone(), caller.clone())),
            _ => Err(BookzoneError::Validation(
                "exactly one of seller_id or buyer_id is required".to_string(),
            )),
        }
    }
}

/// Outcome of starting a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedConversation {
    pub conversation: Conversation,
    pub created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}
