// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the complete messaging stack over a temp SQLite
//! database: store (behind a switchable outage), delivery manager, ingress,
//! typing and read-state trackers. Every broadcast passes through a
//! [`RecordingFanout`] so tests can assert on it.

use std::sync::Arc;
use std::time::Duration;

use bookzone_chat::{ChatService, DeliveryChannelManager, EventFanout, StartConversation};
use bookzone_client::{ClientOptions, ConversationClient};
use bookzone_config::model::{ChatConfig, StorageConfig};
use bookzone_core::{
    BookId, BookzoneError, Conversation, ConversationId, ConversationStore, Identity, UserId,
};
use bookzone_storage::SqliteStorage;

use crate::loopback::{LoopbackApi, LoopbackConnector};
use crate::mock_fanout::{FailingFanout, RecordingFanout};
use crate::outage_store::OutageStore;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    chat: ChatConfig,
    failing_fanout: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            chat: ChatConfig::default(),
            failing_fanout: false,
        }
    }

    /// Override the chat limits and timers.
    pub fn with_chat_config(mut self, chat: ChatConfig) -> Self {
        self.chat = chat;
        self
    }

    pub fn with_typing_timeout(mut self, timeout: Duration) -> Self {
        self.chat.typing_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Make every broadcast fail after it is recorded.
    pub fn with_failing_fanout(mut self) -> Self {
        self.failing_fanout = true;
        self
    }

    /// Build the harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, BookzoneError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| BookzoneError::StoreUnavailable {
            source: Box::new(e),
        })?;
        let storage_config = StorageConfig {
            database_path: temp_dir.path().join("test.db").display().to_string(),
            wal_mode: true,
        };
        let sqlite = SqliteStorage::open(storage_config, self.chat.limits()).await?;
        let store = Arc::new(OutageStore::new(Arc::new(sqlite)));
        let store_dyn: Arc<dyn ConversationStore> = store.clone();

        let delivery = Arc::new(DeliveryChannelManager::new(
            Arc::clone(&store_dyn),
            self.chat.session_buffer,
        ));
        let downstream: Arc<dyn EventFanout> = if self.failing_fanout {
            Arc::new(FailingFanout)
        } else {
            delivery.clone()
        };
        let fanout = Arc::new(RecordingFanout::forwarding(downstream));
        let chat = Arc::new(ChatService::with_fanout(
            store_dyn,
            delivery,
            fanout.clone(),
            &self.chat,
        ));

        Ok(TestHarness {
            chat,
            store,
            fanout,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete messaging stack over a temp database.
pub struct TestHarness {
    /// The service under test.
    pub chat: Arc<ChatService>,
    /// The store, with a switchable outage.
    pub store: Arc<OutageStore>,
    /// Every broadcast made by the service.
    pub fanout: Arc<RecordingFanout>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings.
    pub async fn new() -> Result<Self, BookzoneError> {
        Self::builder().build().await
    }

    /// Identity whose display name is the capitalised user id.
    pub fn user(&self, id: &str) -> Identity {
        let mut chars = id.chars();
        let display = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Identity::new(id, display)
    }

    /// Open (or reuse) the conversation between `buyer` and `seller` about `book`.
    pub async fn conversation(
        &self,
        buyer: &Identity,
        seller: &UserId,
        book: &str,
    ) -> Result<Conversation, BookzoneError> {
        let request = StartConversation::with_seller(BookId(book.to_string()), seller.clone());
        Ok(self.chat.start_conversation(buyer, request).await?.conversation)
    }

    pub fn api_for(&self, caller: &Identity) -> LoopbackApi {
        LoopbackApi::new(Arc::clone(&self.chat), caller.clone())
    }

    pub fn connector_for(&self, caller: &Identity) -> LoopbackConnector {
        LoopbackConnector::new(Arc::clone(&self.chat), caller.clone())
    }

    /// Open a [`ConversationClient`] for `caller` over the loopback transports.
    pub async fn client(
        &self,
        caller: &Identity,
        conversation_id: &ConversationId,
        options: ClientOptions,
    ) -> Result<ConversationClient, BookzoneError> {
        ConversationClient::open(
            conversation_id.clone(),
            caller.user_id.clone(),
            Arc::new(self.api_for(caller)),
            Arc::new(self.connector_for(caller)),
            options,
        )
        .await
    }
}
