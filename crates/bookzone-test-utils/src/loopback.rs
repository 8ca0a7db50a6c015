// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process client transports.
//!
//! `LoopbackApi` and `LoopbackConnector` let a [`ConversationClient`](bookzone_client::ConversationClient)
//! drive a [`ChatService`] directly, with no HTTP or sockets in between.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use bookzone_chat::ChatService;
use bookzone_client::{ChatApi, LiveConnector, LiveLink};
use bookzone_core::{
    BookzoneError, ClientEvent, ConversationDetail, ConversationId, ConversationSummary, Identity,
    Message, MessagePage, NewMessage, ReadCursor, StartConversation, StartedConversation,
};

/// [`ChatApi`] calling straight into a [`ChatService`] as `caller`.
#[derive(Clone)]
pub struct LoopbackApi {
    chat: Arc<ChatService>,
    caller: Identity,
}

impl LoopbackApi {
    pub fn new(chat: Arc<ChatService>, caller: Identity) -> Self {
        Self { chat, caller }
    }
}

#[async_trait]
impl ChatApi for LoopbackApi {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, BookzoneError> {
        self.chat.list_conversations(&self.caller).await
    }

    async fn start_conversation(
        &self,
        request: StartConversation,
    ) -> Result<StartedConversation, BookzoneError> {
        self.chat.start_conversation(&self.caller, request).await
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<ConversationDetail, BookzoneError> {
        self.chat.get_conversation(&self.caller, id).await
    }

    async fn list_messages(
        &self,
        id: &ConversationId,
        page: MessagePage,
    ) -> Result<Vec<Message>, BookzoneError> {
        self.chat.list_messages(&self.caller, id, page).await
    }

    async fn send_message(
        &self,
        id: &ConversationId,
        message: NewMessage,
    ) -> Result<Message, BookzoneError> {
        self.chat.send_message(&self.caller, id, message).await
    }

    async fn mark_read(&self, id: &ConversationId) -> Result<ReadCursor, BookzoneError> {
        self.chat.mark_read(&self.caller, id, None).await
    }

    async fn ws_url(&self, id: &ConversationId) -> Result<String, BookzoneError> {
        Ok(format!("loopback://ws/chat/{id}"))
    }
}

/// [`LiveConnector`] registering sessions directly with the service's delivery manager.
pub struct LoopbackConnector {
    chat: Arc<ChatService>,
    caller: Identity,
    buffer: usize,
}

impl LoopbackConnector {
    pub fn new(chat: Arc<ChatService>, caller: Identity) -> Self {
        Self {
            chat,
            caller,
            buffer: 64,
        }
    }
}

#[async_trait]
impl LiveConnector for LoopbackConnector {
    async fn connect(&self, conversation_id: &ConversationId) -> Result<LiveLink, BookzoneError> {
        let (handle, incoming) = self.chat.connect(&self.caller, conversation_id).await?;
        let (outgoing, mut out_rx) = mpsc::channel::<ClientEvent>(self.buffer);

        let chat = Arc::clone(&self.chat);
        tokio::spawn(async move {
            while let Some(event) = out_rx.recv().await {
                chat.handle_client_event(&handle, event).await;
            }
            // The client dropped its end.
            chat.disconnect(&handle);
        });

        Ok(LiveLink { outgoing, incoming })
    }
}
