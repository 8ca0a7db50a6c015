// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the ConversationStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use bookzone_config::model::StorageConfig;
use bookzone_core::{
    AdapterType, BookId, BookzoneError, ChatLimits, Conversation, ConversationId,
    ConversationStore, ConversationSummary, HealthStatus, Message, MessageId, MessagePage,
    NewMessage, PluginAdapter, ReadCursor, UserId,
};

use crate::database::{Database, StoreError, map_tr_err};
use crate::queries;

/// SQLite-backed conversation store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened on the first call to [`ConversationStore::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    limits: ChatLimits,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a store with the given storage settings and content limits.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig, limits: ChatLimits) -> Self {
        Self {
            config,
            limits,
            db: OnceCell::new(),
        }
    }

    /// Create and initialize a store in one step.
    pub async fn open(config: StorageConfig, limits: ChatLimits) -> Result<Self, BookzoneError> {
        let storage = Self::new(config, limits);
        storage.initialize().await?;
        Ok(storage)
    }

    fn db(&self) -> Result<&Database, BookzoneError> {
        self.db.get().ok_or_else(|| BookzoneError::StoreUnavailable {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, BookzoneError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), StoreError> {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BookzoneError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStorage {
    async fn initialize(&self) -> Result<(), BookzoneError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| BookzoneError::StoreUnavailable {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite conversation store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), BookzoneError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn get_or_create_conversation(
        &self,
        buyer: &UserId,
        seller: &UserId,
        book: &BookId,
    ) -> Result<(Conversation, bool), BookzoneError> {
        queries::conversations::get_or_create(self.db()?, self.limits, buyer, seller, book).await
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, BookzoneError> {
        queries::conversations::get(self.db()?, id).await
    }

    async fn append_message(
        &self,
        conversation: &ConversationId,
        sender: &UserId,
        message: NewMessage,
    ) -> Result<Message, BookzoneError> {
        queries::messages::append(self.db()?, self.limits, conversation, sender, message).await
    }

    async fn list_messages(
        &self,
        conversation: &ConversationId,
        requester: &UserId,
        page: MessagePage,
    ) -> Result<Vec<Message>, BookzoneError> {
        queries::messages::list(self.db()?, conversation, requester, page).await
    }

    async fn list_conversations(
        &self,
        user: &UserId,
    ) -> Result<Vec<ConversationSummary>, BookzoneError> {
        queries::conversations::list_for_user(self.db()?, self.limits, user).await
    }

    async fn advance_read_cursor(
        &self,
        conversation: &ConversationId,
        user: &UserId,
        up_to: Option<MessageId>,
    ) -> Result<ReadCursor, BookzoneError> {
        queries::read_cursors::advance(self.db()?, conversation, user, up_to).await
    }

    async fn read_cursor(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Result<Option<ReadCursor>, BookzoneError> {
        queries::read_cursors::get(self.db()?, conversation, user).await
    }

    async fn unread_count(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Result<u64, BookzoneError> {
        queries::read_cursors::unread_count(self.db()?, conversation, user).await
    }

    async fn archive_conversation(
        &self,
        conversation: &ConversationId,
        requester: &UserId,
    ) -> Result<Conversation, BookzoneError> {
        queries::conversations::archive(self.db()?, conversation, requester).await
    }

    async fn delete_conversation(
        &self,
        conversation: &ConversationId,
    ) -> Result<bool, BookzoneError> {
        queries::conversations::delete(self.db()?, conversation).await
    }
}
