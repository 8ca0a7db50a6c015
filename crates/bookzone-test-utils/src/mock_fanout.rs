// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out doubles.
//!
//! `RecordingFanout` captures every broadcast (optionally forwarding it),
//! `FailingFanout` fails every broadcast.

use std::sync::{Arc, Mutex};

use bookzone_chat::EventFanout;
use bookzone_core::{BookzoneError, ConversationId, ServerEvent, UserId};

/// One captured broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    pub conversation_id: ConversationId,
    pub event: ServerEvent,
    pub exclude: Option<UserId>,
}

/// Records broadcasts, then forwards them to `inner` when one is set.
#[derive(Default)]
pub struct RecordingFanout {
    inner: Option<Arc<dyn EventFanout>>,
    recorded: Mutex<Vec<Broadcast>>,
}

impl RecordingFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and forward to `inner`.
    pub fn forwarding(inner: Arc<dyn EventFanout>) -> Self {
        Self {
            inner: Some(inner),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<Broadcast> {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Wire `type` tags of the recorded events, in order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.recorded().iter().map(|b| b.event.kind()).collect()
    }
}

impl EventFanout for RecordingFanout {
    fn broadcast(
        &self,
        conversation: &ConversationId,
        event: ServerEvent,
        exclude: Option<&UserId>,
    ) -> Result<usize, BookzoneError> {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(Broadcast {
                conversation_id: conversation.clone(),
                event: event.clone(),
                exclude: exclude.cloned(),
            });
        }
        match &self.inner {
            Some(inner) => inner.broadcast(conversation, event, exclude),
            None => Ok(0),
        }
    }
}

/// Fan-out whose every broadcast fails.
#[derive(Debug, Default)]
pub struct FailingFanout;

impl EventFanout for FailingFanout {
    fn broadcast(
        &self,
        _conversation: &ConversationId,
        _event: ServerEvent,
        _exclude: Option<&UserId>,
    ) -> Result<usize, BookzoneError> {
        Err(BookzoneError::transport("fan-out unavailable"))
    }
}
