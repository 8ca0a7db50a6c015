// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live channel transports.
//!
//! A [`LiveConnector`] turns a conversation id into a [`LiveLink`]: a pair of
//! queues carrying decoded events. When the transport goes away the incoming
//! queue closes; dropping the outgoing sender closes the transport.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info};

use bookzone_core::{BookzoneError, ClientEvent, ConversationId, ServerEvent};

use crate::api::ChatApi;

/// One open live channel session.
#[derive(Debug)]
pub struct LiveLink {
    pub outgoing: mpsc::Sender<ClientEvent>,
    pub incoming: mpsc::Receiver<ServerEvent>,
}

/// Opens live channel sessions.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self, conversation_id: &ConversationId) -> Result<LiveLink, BookzoneError>;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// [`LiveConnector`] over the gateway's WebSocket route.
///
/// The URL (with the caller's token) is discovered through [`ChatApi::ws_url`].
pub struct WsConnector {
    api: Arc<dyn ChatApi>,
    buffer: usize,
}

impl WsConnector {
    pub fn new(api: Arc<dyn ChatApi>, buffer: usize) -> Self {
        Self {
            api,
            buffer: buffer.max(1),
        }
    }
}

#[async_trait]
impl LiveConnector for WsConnector {
    async fn connect(&self, conversation_id: &ConversationId) -> Result<LiveLink, BookzoneError> {
        let url = self.api.ws_url(conversation_id).await?;
        let (stream, response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| BookzoneError::Transport {
                    message: format!("WebSocket connection failed: {e}"),
                    source: Some(Box::new(e)),
                })?;
        info!(
            conversation_id = %conversation_id,
            status = %response.status(),
            "live channel connected"
        );

        let (in_tx, in_rx) = mpsc::channel(self.buffer);
        let (out_tx, out_rx) = mpsc::channel(self.buffer);
        tokio::spawn(pump(stream, in_tx, out_rx));
        Ok(LiveLink {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

/// Shuttle frames between the socket and the link queues until either side closes.
async fn pump(
    mut stream: WsStream,
    in_tx: mpsc::Sender<ServerEvent>,
    mut out_rx: mpsc::Receiver<ClientEvent>,
) {
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(event) => {
                            if in_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!(error = %e, "ignoring undecodable frame"),
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "live channel closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "live channel receive error");
                    break;
                }
                None => break,
            },
            outgoing = out_rx.recv() => match outgoing {
                Some(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            debug!(error = %e, "failed to encode client event");
                            continue;
                        }
                    };
                    if let Err(e) = stream.send(WsMessage::text(text)).await {
                        debug!(error = %e, "live channel send error");
                        break;
                    }
                }
                None => {
                    let _ = stream.close(None).await;
                    break;
                }
            },
        }
    }
}
