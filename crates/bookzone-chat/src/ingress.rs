// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message Ingress: the single entry point for new messages.
//!
//! Both the live channel and the fallback request path call [`MessageIngress::submit`].
//! The message is persisted first; only a persisted message is broadcast.

use std::sync::Arc;

use tracing::{debug, error, warn};

use bookzone_core::{
    BookzoneError, ConversationId, ConversationStore, Message, NewMessage, ServerEvent, UserId,
};

use crate::delivery::EventFanout;

#[derive(Clone)]
pub struct MessageIngress {
    store: Arc<dyn ConversationStore>,
    fanout: Arc<dyn EventFanout>,
}

impl MessageIngress {
    pub fn new(store: Arc<dyn ConversationStore>, fanout: Arc<dyn EventFanout>) -> Self {
        Self { store, fanout }
    }

    /// Persist `message` and fan it out to every live session of the conversation.
    ///
    /// The returned message is the authoritative record. Fan-out failures are
    /// logged and swallowed; store failures are returned to the sender.
    pub async fn submit(
        &self,
        conversation_id: &ConversationId,
        sender: &UserId,
        message: NewMessage,
    ) -> Result<Message, BookzoneError> {
        let message = self
            .store
            .append_message(conversation_id, sender, message)
            .await
            .inspect_err(|e| {
                if let BookzoneError::StoreUnavailable { .. } = e {
                    error!(
                        conversation_id = %conversation_id,
                        user_id = %sender,
                        error = %e,
                        "message could not be persisted"
                    );
                }
            })?;

        let event = ServerEvent::ChatMessage {
            message: message.clone(),
        };
        match self.fanout.broadcast(conversation_id, event, None) {
            Ok(delivered) => debug!(
                conversation_id = %conversation_id,
                message_id = %message.id,
                delivered,
                "message submitted"
            ),
            Err(e) => warn!(
                conversation_id = %conversation_id,
                message_id = %message.id,
                error = %e,
                "fan-out failed for persisted message"
            ),
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use bookzone_config::model::StorageConfig;
    use bookzone_core::{BookId, ChatLimits, Conversation, MessagePage};
    use bookzone_storage::SqliteStorage;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ServerEvent>>,
        fail: bool,
    }

    impl EventFanout for Recorder {
        fn broadcast(
            &self,
            _conversation: &ConversationId,
            event: ServerEvent,
            _exclude: Option<&UserId>,
        ) -> Result<usize, BookzoneError> {
            if self.fail {
                return Err(BookzoneError::transport("fan-out offline"));
            }
            self.events.lock().unwrap().push(event);
            Ok(1)
        }
    }

    async fn setup(fail: bool) -> (MessageIngress, Arc<Recorder>, Arc<SqliteStorage>, Conversation, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("chat.db").display().to_string(),
            wal_mode: true,
        };
        let store = Arc::new(SqliteStorage::open(config, ChatLimits::default()).await.unwrap());
        let (conversation, _) = store
            .get_or_create_conversation(
                &UserId("alice".into()),
                &UserId("bob".into()),
                &BookId("b1".into()),
            )
            .await
            .unwrap();
        let recorder = Arc::new(Recorder {
            fail,
            ..Recorder::default()
        });
        let ingress = MessageIngress::new(store.clone(), recorder.clone());
        (ingress, recorder, store, conversation, dir)
    }

    #[tokio::test]
    async fn persisted_message_is_broadcast_with_server_fields() {
        let (ingress, recorder, _store, conv, _dir) = setup(false).await;
        let sent = ingress
            .submit(&conv.id, &UserId("alice".into()), NewMessage::text("Is it still available?"))
            .await
            .unwrap();

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::ChatMessage { message } => {
                assert_eq!(message, &sent);
                assert_eq!(message.content, "Is it still available?");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_message_is_never_broadcast() {
        let (ingress, recorder, _store, conv, _dir) = setup(false).await;
        let err = ingress
            .submit(&conv.id, &UserId("alice".into()), NewMessage::text(""))
            .await
            .unwrap_err();
        assert!(matches!(err, BookzoneError::Validation(_)));

        let err = ingress
            .submit(&conv.id, &UserId("eve".into()), NewMessage::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookzoneError::NotParticipant { .. }));
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn fan_out_failure_keeps_message_durable() {
        let (ingress, _recorder, store, conv, _dir) = setup(true).await;
        let alice = UserId("alice".into());
        let sent = ingress
            .submit(&conv.id, &alice, NewMessage::text("still saved"))
            .await
            .unwrap();

        let history = store
            .list_messages(&conv.id, &alice, MessagePage::all())
            .await
            .unwrap();
        assert_eq!(history, vec![sent]);
        assert!(logs_contain("fan-out failed for persisted message"));
    }
}
