// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation client: local state for one open conversation view.
//!
//! A supervisor task owns the live channel and walks it through
//! `Disconnected -> Connecting -> Connected -> Disconnected`, retrying with a
//! fixed delay while the view is open. Sending never depends on the live
//! channel: it always goes through the durable request path and the returned
//! message is merged into local state by id, so a broadcast echo of the same
//! message is ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bookzone_config::model::ClientConfig;
use bookzone_core::{
    BookzoneError, ClientEvent, ConversationId, Message, MessageId, MessagePage, NewMessage,
    ReadCursor, ServerEvent, UserId,
};

use crate::api::ChatApi;
use crate::connector::{LiveConnector, LiveLink};

/// States of the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No live channel. Sends still work over the request path.
    Disconnected,
    /// Dialing, or waiting for `connection_established`.
    Connecting,
    /// Handshake completed; live events are flowing.
    Connected,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Disconnected => write!(f, "disconnected"),
            ChannelState::Connecting => write!(f, "connecting"),
            ChannelState::Connected => write!(f, "connected"),
        }
    }
}

/// Reconnect and typing behaviour of a [`ConversationClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Fixed delay between live channel attempts.
    pub reconnect_delay: Duration,
    /// Give up after this many consecutive failed attempts. `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Silence after the last keystroke before `stop_typing` is sent.
    pub typing_idle: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: None,
            typing_idle: Duration::from_secs(2),
        }
    }
}

impl From<&ClientConfig> for ClientOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            reconnect_delay: config.reconnect_delay(),
            max_reconnect_attempts: config.max_reconnect_attempts,
            ..Self::default()
        }
    }
}

/// Change notifications for the view.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientUpdate {
    MessageAdded(Message),
    PeerTyping(Option<String>),
    ServerError(String),
}

/// A send that could not be made durable. The draft is handed back for retry.
#[derive(Debug, thiserror::Error)]
#[error("message not sent: {source}")]
pub struct SendError {
    pub draft: NewMessage,
    #[source]
    pub source: BookzoneError,
}

#[derive(Debug, Default)]
struct LocalState {
    /// Ordered by id.
    messages: Vec<Message>,
    /// Newest id up to which local history has no gaps. Only the initial
    /// load, live events and resyncs move it; messages sent over the request
    /// path do not, since peer messages may precede them.
    synced_through: Option<MessageId>,
    unread: u64,
    peer_typing: Option<String>,
    typing: bool,
}

struct Inner {
    conversation_id: ConversationId,
    me: UserId,
    api: Arc<dyn ChatApi>,
    local: Mutex<LocalState>,
    outgoing: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    typing_timer: Mutex<Option<JoinHandle<()>>>,
    updates: broadcast::Sender<ClientUpdate>,
    channel: watch::Sender<ChannelState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    /// Insert `message` unless a message with the same id is already held.
    fn merge(&self, message: Message) -> bool {
        {
            let mut local = lock(&self.local);
            let Err(pos) = local
                .messages
                .binary_search_by_key(&message.id, |m| m.id)
            else {
                return false;
            };
            if message.sender_id != self.me {
                local.unread += 1;
            }
            local.messages.insert(pos, message.clone());
        }
        let _ = self.updates.send(ClientUpdate::MessageAdded(message));
        true
    }

    fn synced_through(&self) -> Option<MessageId> {
        lock(&self.local).synced_through
    }

    fn advance_sync(&self, id: MessageId) {
        let mut local = lock(&self.local);
        if local.synced_through.is_none_or(|current| current < id) {
            local.synced_through = Some(id);
        }
    }

    fn set_peer_typing(&self, name: Option<String>) {
        let changed = {
            let mut local = lock(&self.local);
            let changed = local.peer_typing != name;
            local.peer_typing = name.clone();
            changed
        };
        if changed {
            let _ = self.updates.send(ClientUpdate::PeerTyping(name));
        }
    }

    /// Queue an event on the live channel. Returns `false` when not connected.
    fn send_live(&self, event: ClientEvent) -> bool {
        let tx = lock(&self.outgoing).clone();
        tx.is_some_and(|tx| tx.try_send(event).is_ok())
    }

    fn stop_typing(&self) {
        let was_typing = std::mem::take(&mut lock(&self.local).typing);
        if was_typing {
            self.send_live(ClientEvent::StopTyping);
        }
    }

    fn apply(&self, event: ServerEvent) {
        match event {
            ServerEvent::ChatMessage { message } => {
                if message.conversation_id == self.conversation_id {
                    let id = message.id;
                    self.merge(message);
                    self.advance_sync(id);
                }
            }
            ServerEvent::UserTyping { user_id, user_name } if user_id != self.me => {
                self.set_peer_typing(Some(user_name));
            }
            ServerEvent::UserStopTyping { user_id, .. } if user_id != self.me => {
                self.set_peer_typing(None);
            }
            ServerEvent::Error { error } => {
                warn!(conversation_id = %self.conversation_id, error = %error, "server rejected live event");
                let _ = self.updates.send(ClientUpdate::ServerError(error));
            }
            _ => {}
        }
    }

    /// Fetch whatever was missed while the live channel was down.
    async fn resync(&self) {
        let page = match self.synced_through() {
            Some(id) => MessagePage::after(id),
            None => MessagePage::all(),
        };
        match self.api.list_messages(&self.conversation_id, page).await {
            Ok(missed) => {
                if let Some(newest) = missed.iter().map(|m| m.id).max() {
                    self.advance_sync(newest);
                }
                let merged = missed.into_iter().filter(|m| self.merge(m.clone())).count();
                debug!(conversation_id = %self.conversation_id, merged, "resynced history");
            }
            Err(e) => {
                warn!(conversation_id = %self.conversation_id, error = %e, "history resync failed");
            }
        }
    }

    fn detach(&self) {
        lock(&self.outgoing).take();
        lock(&self.local).typing = false;
        self.set_peer_typing(None);
        self.channel.send_replace(ChannelState::Disconnected);
    }
}

/// Client-side state and live channel supervision for one conversation.
pub struct ConversationClient {
    inner: Arc<Inner>,
    options: ClientOptions,
    cancel: CancellationToken,
    supervisor: Option<JoinHandle<()>>,
}

impl ConversationClient {
    /// Load the conversation and start supervising its live channel.
    pub async fn open(
        conversation_id: ConversationId,
        me: UserId,
        api: Arc<dyn ChatApi>,
        connector: Arc<dyn LiveConnector>,
        options: ClientOptions,
    ) -> Result<Self, BookzoneError> {
        let detail = api.get_conversation(&conversation_id).await?;
        let mut messages = detail.messages;
        messages.sort_by_key(|m| m.id);
        let synced_through = messages.last().map(|m| m.id);

        let (updates, _) = broadcast::channel(64);
        let (channel, _) = watch::channel(ChannelState::Disconnected);
        let inner = Arc::new(Inner {
            conversation_id,
            me,
            api,
            local: Mutex::new(LocalState {
                messages,
                synced_through,
                unread: detail.unread_count,
                ..LocalState::default()
            }),
            outgoing: Mutex::new(None),
            typing_timer: Mutex::new(None),
            updates,
            channel,
        });

        let cancel = CancellationToken::new();
        let supervisor = tokio::spawn(supervise(
            Arc::clone(&inner),
            connector,
            options.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            inner,
            options,
            cancel,
            supervisor: Some(supervisor),
        })
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.inner.conversation_id
    }

    pub fn channel_state(&self) -> ChannelState {
        *self.inner.channel.borrow()
    }

    /// Watch live channel transitions.
    pub fn watch_channel(&self) -> watch::Receiver<ChannelState> {
        self.inner.channel.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientUpdate> {
        self.inner.updates.subscribe()
    }

    /// Local history, ordered by id.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.inner.local).messages.clone()
    }

    /// Messages from the peer not yet marked read. Receiving never marks read.
    pub fn unread_count(&self) -> u64 {
        lock(&self.inner.local).unread
    }

    /// Display name of the peer while they are typing.
    pub fn peer_typing(&self) -> Option<String> {
        lock(&self.inner.local).peer_typing.clone()
    }

    pub async fn send(&self, content: impl Into<String>) -> Result<Message, SendError> {
        self.send_message(NewMessage::text(content)).await
    }

    /// Durable send, independent of the live channel.
    ///
    /// On failure the draft comes back inside [`SendError`] and local state
    /// is left untouched.
    pub async fn send_message(&self, draft: NewMessage) -> Result<Message, SendError> {
        match self
            .inner
            .api
            .send_message(&self.inner.conversation_id, draft.clone())
            .await
        {
            Ok(message) => {
                // The server clears typing state on a successful send.
                self.cancel_typing_timer();
                lock(&self.inner.local).typing = false;
                self.inner.merge(message.clone());
                Ok(message)
            }
            Err(source) => {
                warn!(
                    conversation_id = %self.inner.conversation_id,
                    error = %source,
                    "send failed, keeping draft"
                );
                Err(SendError { draft, source })
            }
        }
    }

    /// Signal a keystroke. Arms a local timer that sends `stop_typing` after
    /// [`ClientOptions::typing_idle`] of silence. No-op without a live channel.
    pub fn notify_typing(&self) {
        if !self.inner.send_live(ClientEvent::Typing) {
            return;
        }
        lock(&self.inner.local).typing = true;

        let inner = Arc::clone(&self.inner);
        let idle = self.options.typing_idle;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            inner.stop_typing();
        });
        if let Some(previous) = lock(&self.inner.typing_timer).replace(timer) {
            previous.abort();
        }
    }

    /// Explicitly stop typing.
    pub fn stop_typing(&self) {
        self.cancel_typing_timer();
        self.inner.stop_typing();
    }

    /// Mark everything read on the server and reset the local unread count.
    pub async fn mark_read(&self) -> Result<ReadCursor, BookzoneError> {
        let cursor = self.inner.api.mark_read(&self.inner.conversation_id).await?;
        lock(&self.inner.local).unread = 0;
        Ok(cursor)
    }

    /// Close the view: end the live session and cancel pending timers.
    ///
    /// In-flight sends are not affected.
    pub async fn close(mut self) {
        self.cancel.cancel();
        self.cancel_typing_timer();
        if let Some(supervisor) = self.supervisor.take() {
            let _ = supervisor.await;
        }
    }

    fn cancel_typing_timer(&self) {
        if let Some(timer) = lock(&self.inner.typing_timer).take() {
            timer.abort();
        }
    }
}

impl Drop for ConversationClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.cancel_typing_timer();
    }
}

/// Keep a live channel open until cancelled or out of attempts.
async fn supervise(
    inner: Arc<Inner>,
    connector: Arc<dyn LiveConnector>,
    options: ClientOptions,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;
    loop {
        inner.channel.send_replace(ChannelState::Connecting);
        let link = tokio::select! {
            _ = cancel.cancelled() => break,
            link = connector.connect(&inner.conversation_id) => link,
        };
        match link {
            Ok(link) => {
                if run_link(&inner, link, &cancel).await {
                    failures = 0;
                } else {
                    failures += 1;
                }
            }
            Err(e) => {
                warn!(conversation_id = %inner.conversation_id, error = %e, "live channel connect failed");
                failures += 1;
            }
        }
        inner.detach();

        if cancel.is_cancelled() {
            break;
        }
        if let Some(max) = options.max_reconnect_attempts
            && failures >= max
        {
            warn!(
                conversation_id = %inner.conversation_id,
                attempts = failures,
                "giving up on live channel"
            );
            break;
        }
        debug!(delay = ?options.reconnect_delay, "reconnecting live channel");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(options.reconnect_delay) => {}
        }
    }
    inner.detach();
}

/// Drive one link until it closes. Returns whether the handshake completed.
async fn run_link(inner: &Inner, mut link: LiveLink, cancel: &CancellationToken) -> bool {
    let mut established = false;
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = link.incoming.recv() => event,
        };
        let Some(event) = event else { break };
        match event {
            ServerEvent::ConnectionEstablished { .. } => {
                established = true;
                *lock(&inner.outgoing) = Some(link.outgoing.clone());
                inner.channel.send_replace(ChannelState::Connected);
                info!(conversation_id = %inner.conversation_id, "live channel established");
                inner.resync().await;
            }
            other => inner.apply(other),
        }
    }
    established
}
