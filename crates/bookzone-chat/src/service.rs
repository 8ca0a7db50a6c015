// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ChatService` bundles the messaging components behind caller-scoped operations.
//!
//! Every operation takes the verified caller [`Identity`]; participant checks
//! happen in the store so both the REST surface and the live channel share them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use bookzone_config::model::ChatConfig;
use bookzone_core::{
    BookzoneError, ClientEvent, Conversation, ConversationDetail, ConversationId,
    ConversationStore, ConversationSummary, Identity, Message, MessageId, MessagePage,
    NewMessage, ReadCursor, ServerEvent, StartConversation, StartedConversation,
};

use crate::delivery::{DeliveryChannelManager, EventFanout, SessionHandle};
use crate::ingress::MessageIngress;
use crate::read_state::ReadStateTracker;
use crate::typing::TypingTracker;

pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    delivery: Arc<DeliveryChannelManager>,
    ingress: MessageIngress,
    typing: TypingTracker,
    read_state: ReadStateTracker,
}

impl ChatService {
    /// Assemble the chat core over `store`, fanning out through a fresh
    /// [`DeliveryChannelManager`].
    pub fn new(store: Arc<dyn ConversationStore>, config: &ChatConfig) -> Self {
        let delivery = Arc::new(DeliveryChannelManager::new(
            Arc::clone(&store),
            config.session_buffer,
        ));
        let fanout: Arc<dyn EventFanout> = delivery.clone();
        Self::with_fanout(store, delivery, fanout, config)
    }

    /// Assemble the chat core with a custom fan-out in front of `delivery`.
    pub fn with_fanout(
        store: Arc<dyn ConversationStore>,
        delivery: Arc<DeliveryChannelManager>,
        fanout: Arc<dyn EventFanout>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            ingress: MessageIngress::new(Arc::clone(&store), Arc::clone(&fanout)),
            typing: TypingTracker::new(fanout, config.typing_timeout()),
            read_state: ReadStateTracker::new(Arc::clone(&store)),
            delivery,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn delivery(&self) -> &Arc<DeliveryChannelManager> {
        &self.delivery
    }

    pub fn ingress(&self) -> &MessageIngress {
        &self.ingress
    }

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    pub fn read_state(&self) -> &ReadStateTracker {
        &self.read_state
    }

    /// Open or reuse the conversation between the caller and the named
    /// counterpart, optionally sending a first message.
    pub async fn start_conversation(
        &self,
        caller: &Identity,
        request: StartConversation,
    ) -> Result<StartedConversation, BookzoneError> {
        let (buyer, seller) = request.participants(&caller.user_id)?;
        if buyer == seller {
            return Err(BookzoneError::Validation(
                "cannot start a conversation with yourself".to_string(),
            ));
        }

        let (conversation, created) = self
            .store
            .get_or_create_conversation(&buyer, &seller, &request.book_id)
            .await?;
        if created {
            info!(
                conversation_id = %conversation.id,
                buyer_id = %buyer,
                seller_id = %seller,
                "conversation created"
            );
        }

        let message = match request.message.filter(|text| !text.trim().is_empty()) {
            Some(text) => Some(
                self.ingress
                    .submit(
                        &conversation.id,
                        &caller.user_id,
                        NewMessage::about_book(text, request.book_id.clone()),
                    )
                    .await?,
            ),
            None => None,
        };

        // Reflect the message's bump of updated_at.
        let conversation = match &message {
            Some(_) => self
                .store
                .get_conversation(&conversation.id)
                .await?
                .unwrap_or(conversation),
            None => conversation,
        };

        Ok(StartedConversation {
            conversation,
            created,
            message,
        })
    }

    /// The caller's active conversations, most recent activity first.
    pub async fn list_conversations(
        &self,
        caller: &Identity,
    ) -> Result<Vec<ConversationSummary>, BookzoneError> {
        self.store.list_conversations(&caller.user_id).await
    }

    /// A conversation with its full history. Does not mark anything read.
    pub async fn get_conversation(
        &self,
        caller: &Identity,
        conversation_id: &ConversationId,
    ) -> Result<ConversationDetail, BookzoneError> {
        let messages = self
            .store
            .list_messages(conversation_id, &caller.user_id, MessagePage::all())
            .await?;
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| BookzoneError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            })?;
        let unread_count = self
            .read_state
            .unread_count(conversation_id, &caller.user_id)
            .await?;
        Ok(ConversationDetail {
            conversation,
            messages,
            unread_count,
        })
    }

    /// A window of the conversation's history.
    pub async fn list_messages(
        &self,
        caller: &Identity,
        conversation_id: &ConversationId,
        page: MessagePage,
    ) -> Result<Vec<Message>, BookzoneError> {
        self.store
            .list_messages(conversation_id, &caller.user_id, page)
            .await
    }

    /// Durable send. The returned message is authoritative.
    pub async fn send_message(
        &self,
        caller: &Identity,
        conversation_id: &ConversationId,
        message: NewMessage,
    ) -> Result<Message, BookzoneError> {
        let message = self
            .ingress
            .submit(conversation_id, &caller.user_id, message)
            .await?;
        self.typing.on_stop_typing(conversation_id, &caller.user_id);
        Ok(message)
    }

    /// Advance the caller's read cursor, to `up_to` or to the newest message.
    pub async fn mark_read(
        &self,
        caller: &Identity,
        conversation_id: &ConversationId,
        up_to: Option<MessageId>,
    ) -> Result<ReadCursor, BookzoneError> {
        match up_to {
            Some(id) => {
                self.read_state
                    .mark_read_up_to(conversation_id, &caller.user_id, id)
                    .await
            }
            None => self.read_state.mark_read(conversation_id, &caller.user_id).await,
        }
    }

    /// Archive a conversation and drop its live sessions.
    pub async fn archive(
        &self,
        caller: &Identity,
        conversation_id: &ConversationId,
    ) -> Result<Conversation, BookzoneError> {
        let conversation = self
            .store
            .archive_conversation(conversation_id, &caller.user_id)
            .await?;
        let closed = self.delivery.close_conversation(conversation_id);
        info!(conversation_id = %conversation_id, closed, "conversation archived");
        Ok(conversation)
    }

    /// Open a live session for the caller.
    pub async fn connect(
        &self,
        caller: &Identity,
        conversation_id: &ConversationId,
    ) -> Result<(SessionHandle, mpsc::Receiver<ServerEvent>), BookzoneError> {
        self.delivery.register_session(conversation_id, caller).await
    }

    /// Apply one event received on a live session.
    ///
    /// Rejections are reported to that session only as an `error` event.
    pub async fn handle_client_event(&self, session: &SessionHandle, event: ClientEvent) {
        let conversation_id = &session.conversation_id;
        let result = match event {
            ClientEvent::ChatMessage { content, book_id } => self
                .send_message(
                    &session.identity,
                    conversation_id,
                    NewMessage { content, book_id },
                )
                .await
                .map(|_| ()),
            ClientEvent::Typing => {
                self.typing.on_typing(conversation_id, &session.identity);
                Ok(())
            }
            ClientEvent::StopTyping => {
                self.typing.on_stop_typing(conversation_id, session.user_id());
                Ok(())
            }
            ClientEvent::MarkRead => self
                .mark_read(&session.identity, conversation_id, None)
                .await
                .map(|_| ()),
        };

        if let Err(e) = result {
            debug!(session_id = %session.id, error = %e, "client event rejected");
            self.delivery.send(
                session,
                ServerEvent::Error {
                    error: e.to_string(),
                },
            );
        }
    }

    /// Close a live session and clear the user's typing state.
    pub fn disconnect(&self, session: &SessionHandle) {
        self.delivery.unregister_session(session);
        if !self
            .delivery
            .is_connected(&session.conversation_id, session.user_id())
        {
            self.typing
                .on_stop_typing(&session.conversation_id, session.user_id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookzone_config::model::StorageConfig;
    use bookzone_core::{BookId, ChatLimits};
    use bookzone_storage::SqliteStorage;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn service() -> (ChatService, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("chat.db").display().to_string(),
            wal_mode: true,
        };
        let store = Arc::new(SqliteStorage::open(config, ChatLimits::default()).await.unwrap());
        (ChatService::new(store, &ChatConfig::default()), dir)
    }

    fn alice() -> Identity {
        Identity::new("alice", "Alice")
    }

    fn bob() -> Identity {
        Identity::new("bob", "Bob")
    }

    async fn next_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("event within 100ms")
            .expect("session open")
    }

    #[tokio::test]
    async fn start_conversation_detects_role() {
        let (svc, _dir) = service().await;
        let book = BookId("b1".into());

        let started = svc
            .start_conversation(&alice(), StartConversation::with_seller(book.clone(), bob().user_id))
            .await
            .unwrap();
        assert!(started.created);
        assert_eq!(started.conversation.buyer_id, alice().user_id);
        assert_eq!(started.conversation.seller_id, bob().user_id);

        // The seller reaching out to the same buyer lands in the same conversation.
        let again = svc
            .start_conversation(&bob(), StartConversation::with_buyer(book, alice().user_id))
            .await
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.conversation.id, started.conversation.id);
    }

    #[tokio::test]
    async fn start_conversation_requires_exactly_one_counterpart() {
        let (svc, _dir) = service().await;
        let request = StartConversation {
            book_id: BookId("b1".into()),
            seller_id: Some(bob().user_id),
            buyer_id: Some(bob().user_id),
            message: None,
        };
        let err = svc.start_conversation(&alice(), request).await.unwrap_err();
        assert!(matches!(err, BookzoneError::Validation(_)));

        let err = svc
            .start_conversation(
                &alice(),
                StartConversation::with_seller(BookId("b1".into()), alice().user_id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookzoneError::Validation(_)));
    }

    #[tokio::test]
    async fn initial_message_carries_book_and_bumps_activity() {
        let (svc, _dir) = service().await;
        let book = BookId("b7".into());
        let started = svc
            .start_conversation(
                &alice(),
                StartConversation::with_seller(book.clone(), bob().user_id)
                    .message("Hi! Interested in your book"),
            )
            .await
            .unwrap();
        let message = started.message.unwrap();
        assert_eq!(message.book_id, Some(book));
        assert_eq!(started.conversation.updated_at, message.created_at);

        let inbox = svc.list_conversations(&bob()).await.unwrap();
        assert_eq!(inbox[0].unread_count, 1);
    }

    #[tokio::test]
    async fn live_chat_message_reaches_peer_and_echoes_to_sender() {
        let (svc, _dir) = service().await;
        let conv = svc
            .start_conversation(&alice(), StartConversation::with_seller(BookId("b1".into()), bob().user_id))
            .await
            .unwrap()
            .conversation;

        let (a, mut rx_a) = svc.connect(&alice(), &conv.id).await.unwrap();
        let (_b, mut rx_b) = svc.connect(&bob(), &conv.id).await.unwrap();
        next_event(&mut rx_a).await;
        next_event(&mut rx_b).await;

        svc.handle_client_event(
            &a,
            ClientEvent::ChatMessage {
                content: "Is it still available?".into(),
                book_id: None,
            },
        )
        .await;

        let ServerEvent::ChatMessage { message } = next_event(&mut rx_b).await else {
            panic!("expected chat_message");
        };
        assert_eq!(message.content, "Is it still available?");
        assert!(matches!(next_event(&mut rx_a).await, ServerEvent::ChatMessage { .. }));

        // Receiving does not mark read.
        assert_eq!(svc.read_state().unread_count(&conv.id, &bob().user_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejected_live_event_reports_error_to_sender_only() {
        let (svc, _dir) = service().await;
        let conv = svc
            .start_conversation(&alice(), StartConversation::with_seller(BookId("b1".into()), bob().user_id))
            .await
            .unwrap()
            .conversation;
        let (a, mut rx_a) = svc.connect(&alice(), &conv.id).await.unwrap();
        let (_b, mut rx_b) = svc.connect(&bob(), &conv.id).await.unwrap();
        next_event(&mut rx_a).await;
        next_event(&mut rx_b).await;

        svc.handle_client_event(
            &a,
            ClientEvent::ChatMessage {
                content: "   ".into(),
                book_id: None,
            },
        )
        .await;

        assert!(matches!(next_event(&mut rx_a).await, ServerEvent::Error { .. }));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn get_conversation_does_not_mark_read() {
        let (svc, _dir) = service().await;
        let conv = svc
            .start_conversation(
                &alice(),
                StartConversation::with_seller(BookId("b1".into()), bob().user_id).message("hello"),
            )
            .await
            .unwrap()
            .conversation;

        let detail = svc.get_conversation(&bob(), &conv.id).await.unwrap();
        assert_eq!(detail.messages.len(), 1);
        assert_eq!(detail.unread_count, 1);

        svc.mark_read(&bob(), &conv.id, None).await.unwrap();
        let detail = svc.get_conversation(&bob(), &conv.id).await.unwrap();
        assert_eq!(detail.unread_count, 0);

        let err = svc
            .get_conversation(&Identity::new("eve", "Eve"), &conv.id)
            .await
            .unwrap_err();
        assert!(matches!(err, BookzoneError::NotParticipant { .. }));
    }

    #[tokio::test]
    async fn archive_closes_live_sessions() {
        let (svc, _dir) = service().await;
        let conv = svc
            .start_conversation(&alice(), StartConversation::with_seller(BookId("b1".into()), bob().user_id))
            .await
            .unwrap()
            .conversation;
        let (_a, mut rx_a) = svc.connect(&alice(), &conv.id).await.unwrap();
        next_event(&mut rx_a).await;

        svc.archive(&bob(), &conv.id).await.unwrap();
        assert!(rx_a.recv().await.is_none(), "session channel closes");
        assert!(svc.list_conversations(&alice()).await.unwrap().is_empty());
        assert!(matches!(
            svc.connect(&alice(), &conv.id).await.unwrap_err(),
            BookzoneError::Forbidden(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn archive_racing_connect_leaves_no_session() {
        let (svc, _dir) = service().await;
        let svc = Arc::new(svc);

        for round in 0..25 {
            let book = BookId(format!("b{round}"));
            let conv = svc
                .start_conversation(&alice(), StartConversation::with_seller(book, bob().user_id))
                .await
                .unwrap()
                .conversation;

            let archiver = {
                let svc = Arc::clone(&svc);
                let id = conv.id.clone();
                tokio::spawn(async move { svc.archive(&alice(), &id).await })
            };
            let connected = svc.connect(&bob(), &conv.id).await;
            archiver.await.unwrap().unwrap();

            if let Ok((_handle, mut rx)) = connected {
                assert_eq!(
                    rx.recv().await,
                    Some(ServerEvent::connection_established())
                );
                let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
                assert_eq!(closed, Ok(None), "session on archived conversation");
            }
            assert_eq!(svc.delivery().session_count(&conv.id), 0);
        }
    }

    #[tokio::test]
    async fn disconnect_clears_typing() {
        let (svc, _dir) = service().await;
        let conv = svc
            .start_conversation(&alice(), StartConversation::with_seller(BookId("b1".into()), bob().user_id))
            .await
            .unwrap()
            .conversation;
        let (a, _rx_a) = svc.connect(&alice(), &conv.id).await.unwrap();
        let (_b, mut rx_b) = svc.connect(&bob(), &conv.id).await.unwrap();
        next_event(&mut rx_b).await;

        svc.handle_client_event(&a, ClientEvent::Typing).await;
        assert!(matches!(next_event(&mut rx_b).await, ServerEvent::UserTyping { .. }));

        svc.disconnect(&a);
        assert!(matches!(next_event(&mut rx_b).await, ServerEvent::UserStopTyping { .. }));
        assert!(!svc.typing().is_typing(&conv.id, &alice().user_id));
    }
}
