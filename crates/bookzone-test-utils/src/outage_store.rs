// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store wrapper with a switchable outage.
//!
//! While the outage is on, every operation fails with
//! [`BookzoneError::StoreUnavailable`] without reaching the wrapped store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use bookzone_core::{
    AdapterType, BookId, BookzoneError, Conversation, ConversationId, ConversationStore,
    ConversationSummary, HealthStatus, Message, MessageId, MessagePage, NewMessage,
    PluginAdapter, ReadCursor, UserId,
};

pub struct OutageStore {
    inner: Arc<dyn ConversationStore>,
    down: AtomicBool,
}

impl OutageStore {
    pub fn new(inner: Arc<dyn ConversationStore>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
        }
    }

    /// Switch the outage on or off.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), BookzoneError> {
        if self.is_down() {
            Err(BookzoneError::StoreUnavailable {
                source: "simulated outage".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PluginAdapter for OutageStore {
    fn name(&self) -> &str {
        "outage"
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, BookzoneError> {
        if self.is_down() {
            return Ok(HealthStatus::Unhealthy("simulated outage".to_string()));
        }
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), BookzoneError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl ConversationStore for OutageStore {
    async fn initialize(&self) -> Result<(), BookzoneError> {
        self.check()?;
        self.inner.initialize().await
    }

    async fn close(&self) -> Result<(), BookzoneError> {
        self.inner.close().await
    }

    async fn get_or_create_conversation(
        &self,
        buyer: &UserId,
        seller: &UserId,
        book: &BookId,
    ) -> Result<(Conversation, bool), BookzoneError> {
        self.check()?;
        self.inner.get_or_create_conversation(buyer, seller, book).await
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, BookzoneError> {
        self.check()?;
        self.inner.get_conversation(id).await
    }

    async fn append_message(
        &self,
        conversation: &ConversationId,
        sender: &UserId,
        message: NewMessage,
    ) -> Result<Message, BookzoneError> {
        self.check()?;
        self.inner.append_message(conversation, sender, message).await
    }

    async fn list_messages(
        &self,
        conversation: &ConversationId,
        requester: &UserId,
        page: MessagePage,
    ) -> Result<Vec<Message>, BookzoneError> {
        self.check()?;
        self.inner.list_messages(conversation, requester, page).await
    }

    async fn list_conversations(
        &self,
        user: &UserId,
    ) -> Result<Vec<ConversationSummary>, BookzoneError> {
        self.check()?;
        self.inner.list_conversations(user).await
    }

    async fn advance_read_cursor(
        &self,
        conversation: &ConversationId,
        user: &UserId,
        up_to: Option<MessageId>,
    ) -> Result<ReadCursor, BookzoneError> {
        self.check()?;
        self.inner.advance_read_cursor(conversation, user, up_to).await
    }

    async fn read_cursor(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Result<Option<ReadCursor>, BookzoneError> {
        self.check()?;
        self.inner.read_cursor(conversation, user).await
    }

    async fn unread_count(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Result<u64, BookzoneError> {
        self.check()?;
        self.inner.unread_count(conversation, user).await
    }

    async fn archive_conversation(
        &self,
        conversation: &ConversationId,
        requester: &UserId,
    ) -> Result<Conversation, BookzoneError> {
        self.check()?;
        self.inner.archive_conversation(conversation, requester).await
    }

    async fn delete_conversation(
        &self,
        conversation: &ConversationId,
    ) -> Result<bool, BookzoneError> {
        self.check()?;
        self.inner.delete_conversation(conversation).await
    }
}
