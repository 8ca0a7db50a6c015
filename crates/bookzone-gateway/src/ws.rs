// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket live channel for one conversation.
//!
//! Client -> Server (JSON):
//! ```json
//! {"type": "chat_message", "content": "Is it still available?", "book_id": "b1"}
//! {"type": "typing"}
//! {"type": "stop_typing"}
//! {"type": "mark_read"}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "connection_established", "message": "..."}
//! {"type": "chat_message", "message": {...}}
//! {"type": "user_typing", "user_id": "...", "user_name": "..."}
//! {"type": "user_stop_typing", "user_id": "...", "user_name": "..."}
//! {"type": "error", "error": "..."}
//! ```

use std::time::Duration;

use axum::{
    Extension,
    extract::{
        Path, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use bookzone_chat::SessionHandle;
use bookzone_core::{ClientEvent, ConversationId, Identity, ServerEvent};

use crate::handlers::ApiError;
use crate::server::GatewayState;

/// Time allowed for queued events (such as a final error) to reach the socket.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// GET /ws/chat/{id}
///
/// The session is registered before the upgrade so that outsiders and
/// archived conversations are refused with a plain HTTP error.
pub async fn ws_handler(
    State(state): State<GatewayState>,
    Extension(caller): Extension<Identity>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let conversation_id = ConversationId(id);
    let (handle, rx) = match state.chat.connect(&caller, &conversation_id).await {
        Ok(session) => session,
        Err(e) => return ApiError(e).into_response(),
    };

    let failed_state = state.clone();
    let failed_handle = handle.clone();
    ws.on_failed_upgrade(move |e| {
        tracing::debug!(session_id = %failed_handle.id, error = %e, "websocket upgrade failed");
        failed_state.chat.disconnect(&failed_handle);
    })
    .on_upgrade(move |socket| run_session(socket, state, handle, rx))
}

/// Drive one live session until either side goes away.
///
/// A sender task drains the session queue into the socket while this task
/// reads client frames. A malformed frame is answered with an `error` event
/// and ends the session.
async fn run_session(
    socket: WebSocket,
    state: GatewayState,
    handle: SessionHandle,
    mut rx: mpsc::Receiver<ServerEvent>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let session_id = handle.id;
    let mut sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "failed to encode event");
                    continue;
                }
            };
            if ws_sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.send(WsMessage::Close(None)).await;
    });
    let mut sender_done = false;

    loop {
        tokio::select! {
            frame = ws_receiver.next() => {
                let Some(Ok(frame)) = frame else { break };
                match frame {
                    WsMessage::Text(text) => {
                        let text_str: &str = &text;
                        match serde_json::from_str::<ClientEvent>(text_str) {
                            Ok(event) => state.chat.handle_client_event(&handle, event).await,
                            Err(e) => {
                                tracing::debug!(session_id = %handle.id, error = %e, "malformed frame");
                                state.chat.delivery().send(
                                    &handle,
                                    ServerEvent::Error {
                                        error: format!("malformed frame: {e}"),
                                    },
                                );
                                break;
                            }
                        }
                    }
                    WsMessage::Binary(_) => {
                        state.chat.delivery().send(
                            &handle,
                            ServerEvent::Error {
                                error: "binary frames are not supported".to_string(),
                            },
                        );
                        break;
                    }
                    WsMessage::Close(_) => break,
                    // Ping/pong are answered by the protocol layer.
                    _ => {}
                }
            }
            _ = &mut sender_task => {
                // The manager dropped the session (queue full, archived, shutdown).
                sender_done = true;
                break;
            }
        }
    }

    // Unregistering closes the queue, so the sender task ends once it is flushed.
    state.chat.disconnect(&handle);
    if !sender_done
        && tokio::time::timeout(FLUSH_TIMEOUT, &mut sender_task)
            .await
            .is_err()
    {
        sender_task.abort();
    }
    tracing::debug!(session_id = %handle.id, "live session closed");
}
