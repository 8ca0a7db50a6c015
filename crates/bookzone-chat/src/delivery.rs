// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery Channel Manager: the registry of live channel sessions.
//!
//! Each session owns a bounded outbound queue. The transport task on the other
//! end drains it into the socket. A session whose queue is full or closed is
//! torn down on the spot; the client resynchronises from the store when it
//! reconnects, so nothing durable is lost.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

use bookzone_core::{
    BookzoneError, ConversationId, ConversationStore, Identity, ServerEvent, UserId,
};

/// Process-unique identifier of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

/// Binding of one connected client to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: SessionId,
    pub conversation_id: ConversationId,
    pub identity: Identity,
}

impl SessionHandle {
    pub fn user_id(&self) -> &UserId {
        &self.identity.user_id
    }
}

/// Fan-out seam used by message ingress and the typing tracker.
///
/// Delivery is best-effort. An `Err` means the fan-out machinery itself
/// failed, never that a single peer was unreachable.
pub trait EventFanout: Send + Sync {
    /// Deliver `event` to every live session of `conversation`, skipping
    /// sessions owned by `exclude`. Returns the number of sessions reached.
    fn broadcast(
        &self,
        conversation: &ConversationId,
        event: ServerEvent,
        exclude: Option<&UserId>,
    ) -> Result<usize, BookzoneError>;
}

struct SessionEntry {
    user_id: UserId,
    tx: mpsc::Sender<ServerEvent>,
}

/// Registry of live sessions keyed by conversation.
pub struct DeliveryChannelManager {
    store: Arc<dyn ConversationStore>,
    rooms: DashMap<ConversationId, HashMap<SessionId, SessionEntry>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl DeliveryChannelManager {
    /// `buffer` is the per-session outbound queue capacity (at least 1).
    pub fn new(store: Arc<dyn ConversationStore>, buffer: usize) -> Self {
        Self {
            store,
            rooms: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Open a session for `identity` on `conversation_id`.
    ///
    /// Only participants of an active conversation may connect. The new
    /// session, and only it, starts with a `connection_established` event.
    pub async fn register_session(
        &self,
        conversation_id: &ConversationId,
        identity: &Identity,
    ) -> Result<(SessionHandle, mpsc::Receiver<ServerEvent>), BookzoneError> {
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| BookzoneError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            })?;
        if !conversation.is_participant(&identity.user_id) {
            return Err(BookzoneError::Forbidden(format!(
                "user {} may not join conversation {conversation_id}",
                identity.user_id
            )));
        }
        if !conversation.is_active {
            return Err(BookzoneError::Forbidden(format!(
                "conversation {conversation_id} is archived"
            )));
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        tx.try_send(ServerEvent::connection_established())
            .map_err(|_| BookzoneError::transport("session queue rejected handshake"))?;

        let handle = SessionHandle {
            id: SessionId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            conversation_id: conversation_id.clone(),
            identity: identity.clone(),
        };
        self.rooms
            .entry(conversation_id.clone())
            .or_default()
            .insert(
                handle.id,
                SessionEntry {
                    user_id: identity.user_id.clone(),
                    tx,
                },
            );

        // An archive may have closed the room between the check above and the insert.
        let still_active = match self.store.get_conversation(conversation_id).await {
            Ok(current) => current.is_some_and(|c| c.is_active),
            Err(e) => {
                self.remove(conversation_id, handle.id);
                return Err(e);
            }
        };
        if !still_active {
            self.remove(conversation_id, handle.id);
            return Err(BookzoneError::Forbidden(format!(
                "conversation {conversation_id} is archived"
            )));
        }
        info!(
            conversation_id = %conversation_id,
            user_id = %identity.user_id,
            session_id = %handle.id,
            "live session registered"
        );
        Ok((handle, rx))
    }

    /// Queue `event` for one session. Returns whether it was queued.
    ///
    /// A closed or saturated session is torn down instead of reporting an error.
    pub fn send(&self, handle: &SessionHandle, event: ServerEvent) -> bool {
        let tx = self
            .rooms
            .get(&handle.conversation_id)
            .and_then(|room| room.get(&handle.id).map(|entry| entry.tx.clone()));
        let Some(tx) = tx else {
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                debug!(session_id = %handle.id, error = %e, "send failed, tearing session down");
                self.remove(&handle.conversation_id, handle.id);
                false
            }
        }
    }

    /// Close a session. Safe to call repeatedly or after the transport died.
    pub fn unregister_session(&self, handle: &SessionHandle) -> bool {
        let removed = self.remove(&handle.conversation_id, handle.id);
        if removed {
            info!(
                conversation_id = %handle.conversation_id,
                session_id = %handle.id,
                "live session unregistered"
            );
        }
        removed
    }

    /// Drop every session of a conversation (e.g. after it was archived).
    pub fn close_conversation(&self, conversation_id: &ConversationId) -> usize {
        self.rooms
            .remove(conversation_id)
            .map(|(_, room)| room.len())
            .unwrap_or(0)
    }

    /// Drop every session on every conversation. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let closed = self.total_sessions();
        self.rooms.clear();
        closed
    }

    /// Number of live sessions on a conversation.
    pub fn session_count(&self, conversation_id: &ConversationId) -> usize {
        self.rooms
            .get(conversation_id)
            .map(|room| room.len())
            .unwrap_or(0)
    }

    /// Whether `user` holds at least one live session on the conversation.
    pub fn is_connected(&self, conversation_id: &ConversationId, user: &UserId) -> bool {
        self.rooms
            .get(conversation_id)
            .is_some_and(|room| room.values().any(|entry| &entry.user_id == user))
    }

    /// Total live sessions across all conversations.
    pub fn total_sessions(&self) -> usize {
        self.rooms.iter().map(|room| room.len()).sum()
    }

    fn remove(&self, conversation_id: &ConversationId, id: SessionId) -> bool {
        let removed = match self.rooms.get_mut(conversation_id) {
            Some(mut room) => room.remove(&id).is_some(),
            None => false,
        };
        self.rooms.remove_if(conversation_id, |_, room| room.is_empty());
        removed
    }

    fn fan_out(
        &self,
        conversation_id: &ConversationId,
        event: ServerEvent,
        exclude: Option<&UserId>,
    ) -> usize {
        // Snapshot the targets so no shard lock is held while sending.
        let targets: Vec<(SessionId, mpsc::Sender<ServerEvent>)> = match self.rooms.get(conversation_id) {
            Some(room) => room
                .iter()
                .filter(|(_, entry)| exclude != Some(&entry.user_id))
                .map(|(id, entry)| (*id, entry.tx.clone()))
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(
                        conversation_id = %conversation_id,
                        session_id = %id,
                        error = %e,
                        "dropping unreachable session"
                    );
                    self.remove(conversation_id, id);
                }
            }
        }
        debug!(
            conversation_id = %conversation_id,
            event = event.kind(),
            delivered,
            "broadcast"
        );
        delivered
    }
}

impl EventFanout for DeliveryChannelManager {
    fn broadcast(
        &self,
        conversation: &ConversationId,
        event: ServerEvent,
        exclude: Option<&UserId>,
    ) -> Result<usize, BookzoneError> {
        Ok(self.fan_out(conversation, event, exclude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookzone_config::model::StorageConfig;
    use bookzone_core::{BookId, ChatLimits, Conversation};
    use bookzone_storage::SqliteStorage;
    use tempfile::TempDir;

    struct Fixture {
        manager: DeliveryChannelManager,
        conversation: Conversation,
        alice: Identity,
        bob: Identity,
        _dir: TempDir,
    }

    async fn fixture(buffer: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("chat.db").display().to_string(),
            wal_mode: true,
        };
        let store = Arc::new(SqliteStorage::open(config, ChatLimits::default()).await.unwrap());
        let alice = Identity::new("alice", "Alice");
        let bob = Identity::new("bob", "Bob");
        let (conversation, _) = store
            .get_or_create_conversation(&alice.user_id, &bob.user_id, &BookId("b1".into()))
            .await
            .unwrap();
        Fixture {
            manager: DeliveryChannelManager::new(store, buffer),
            conversation,
            alice,
            bob,
            _dir: dir,
        }
    }

    fn typing(user: &Identity) -> ServerEvent {
        ServerEvent::UserTyping {
            user_id: user.user_id.clone(),
            user_name: user.display_name.clone(),
        }
    }

    #[tokio::test]
    async fn register_sends_handshake_to_new_session_only() {
        let f = fixture(8).await;
        let cid = &f.conversation.id;
        let (_a, mut rx_a) = f.manager.register_session(cid, &f.alice).await.unwrap();
        assert_eq!(rx_a.recv().await.unwrap(), ServerEvent::connection_established());

        let (_b, mut rx_b) = f.manager.register_session(cid, &f.bob).await.unwrap();
        assert_eq!(rx_b.recv().await.unwrap(), ServerEvent::connection_established());
        assert!(rx_a.try_recv().is_err(), "existing session must not see the handshake");
        assert_eq!(f.manager.session_count(cid), 2);
    }

    #[tokio::test]
    async fn outsider_is_forbidden() {
        let f = fixture(8).await;
        let eve = Identity::new("eve", "Eve");
        let err = f
            .manager
            .register_session(&f.conversation.id, &eve)
            .await
            .unwrap_err();
        assert!(matches!(err, BookzoneError::Forbidden(_)));
        assert_eq!(f.manager.total_sessions(), 0);
    }

    #[tokio::test]
    async fn broadcast_skips_excluded_user() {
        let f = fixture(8).await;
        let cid = &f.conversation.id;
        let (_a, mut rx_a) = f.manager.register_session(cid, &f.alice).await.unwrap();
        let (_b, mut rx_b) = f.manager.register_session(cid, &f.bob).await.unwrap();
        rx_a.recv().await.unwrap();
        rx_b.recv().await.unwrap();

        let reached = f
            .manager
            .broadcast(cid, typing(&f.alice), Some(&f.alice.user_id))
            .unwrap();
        assert_eq!(reached, 1);
        assert_eq!(rx_b.recv().await.unwrap(), typing(&f.alice));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn every_session_of_a_user_receives_fan_out() {
        let f = fixture(8).await;
        let cid = &f.conversation.id;
        let (_b1, mut rx1) = f.manager.register_session(cid, &f.bob).await.unwrap();
        let (_b2, mut rx2) = f.manager.register_session(cid, &f.bob).await.unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();

        let reached = f.manager.broadcast(cid, typing(&f.alice), None).unwrap();
        assert_eq!(reached, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn closed_transport_is_torn_down_on_broadcast() {
        let f = fixture(8).await;
        let cid = &f.conversation.id;
        let (_a, rx_a) = f.manager.register_session(cid, &f.alice).await.unwrap();
        let (_b, mut rx_b) = f.manager.register_session(cid, &f.bob).await.unwrap();
        rx_b.recv().await.unwrap();
        drop(rx_a);

        let reached = f.manager.broadcast(cid, typing(&f.bob), None).unwrap();
        assert_eq!(reached, 1);
        assert_eq!(f.manager.session_count(cid), 1);
        assert!(!f.manager.is_connected(cid, &f.alice.user_id));
    }

    #[tokio::test]
    async fn saturated_session_is_torn_down_on_send() {
        let f = fixture(1).await;
        let cid = &f.conversation.id;
        // The handshake already fills the single slot.
        let (handle, _rx) = f.manager.register_session(cid, &f.alice).await.unwrap();

        assert!(!f.manager.send(&handle, typing(&f.bob)));
        assert_eq!(f.manager.session_count(cid), 0);
        assert!(!f.manager.send(&handle, typing(&f.bob)));
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let f = fixture(8).await;
        let cid = &f.conversation.id;
        let (handle, rx) = f.manager.register_session(cid, &f.alice).await.unwrap();
        drop(rx);

        assert!(f.manager.unregister_session(&handle));
        assert!(!f.manager.unregister_session(&handle));
        assert_eq!(f.manager.total_sessions(), 0);
        assert_eq!(f.manager.broadcast(cid, typing(&f.bob), None).unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_register_and_unregister_leaves_no_sessions() {
        let f = Arc::new(fixture(8).await);
        let mut tasks = Vec::new();
        for i in 0..32 {
            let f = Arc::clone(&f);
            tasks.push(tokio::spawn(async move {
                let who = if i % 2 == 0 { &f.alice } else { &f.bob };
                let (handle, _rx) = f
                    .manager
                    .register_session(&f.conversation.id, who)
                    .await
                    .unwrap();
                f.manager.broadcast(&f.conversation.id, typing(who), None).unwrap();
                f.manager.unregister_session(&handle);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(f.manager.total_sessions(), 0);
    }
}
