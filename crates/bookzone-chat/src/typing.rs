// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence/Typing Tracker.
//!
//! Typing state is ephemeral and keyed by (conversation, user). Each typing
//! signal re-arms an expiry timer; when the timer fires or the user stops
//! explicitly, a `user_stop_typing` event goes to the other participants.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use bookzone_core::{ConversationId, Identity, ServerEvent, UserId};

use crate::delivery::EventFanout;

type TypingKey = (ConversationId, UserId);

struct TypingEntry {
    generation: u64,
    user_name: String,
    expiry: Option<JoinHandle<()>>,
}

pub struct TypingTracker {
    fanout: Arc<dyn EventFanout>,
    timeout: Duration,
    state: Arc<DashMap<TypingKey, TypingEntry>>,
    generation: AtomicU64,
}

impl TypingTracker {
    pub fn new(fanout: Arc<dyn EventFanout>, timeout: Duration) -> Self {
        Self {
            fanout,
            timeout,
            state: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Record typing activity and re-arm the expiry timer.
    ///
    /// `user_typing` is broadcast only when the user was not already typing.
    pub fn on_typing(&self, conversation_id: &ConversationId, identity: &Identity) {
        let key = (conversation_id.clone(), identity.user_id.clone());
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let entry = TypingEntry {
            generation,
            user_name: identity.display_name.clone(),
            expiry: None,
        };

        let started = match self.state.insert(key.clone(), entry) {
            Some(previous) => {
                if let Some(expiry) = previous.expiry {
                    expiry.abort();
                }
                false
            }
            None => true,
        };
        // The timer is armed only once the entry is in place.
        if let Some(mut current) = self.state.get_mut(&key)
            && current.generation == generation
        {
            current.expiry = Some(self.arm_expiry(key.clone(), generation));
        }
        if started {
            announce(
                self.fanout.as_ref(),
                conversation_id,
                ServerEvent::UserTyping {
                    user_id: identity.user_id.clone(),
                    user_name: identity.display_name.clone(),
                },
                &identity.user_id,
            );
        }
    }

    /// Clear typing state for the user. No event is sent if the user was not typing.
    pub fn on_stop_typing(&self, conversation_id: &ConversationId, user_id: &UserId) {
        let key = (conversation_id.clone(), user_id.clone());
        if let Some((_, entry)) = self.state.remove(&key) {
            if let Some(expiry) = entry.expiry {
                expiry.abort();
            }
            announce(
                self.fanout.as_ref(),
                conversation_id,
                ServerEvent::UserStopTyping {
                    user_id: user_id.clone(),
                    user_name: entry.user_name,
                },
                user_id,
            );
        }
    }

    pub fn is_typing(&self, conversation_id: &ConversationId, user_id: &UserId) -> bool {
        self.state
            .contains_key(&(conversation_id.clone(), user_id.clone()))
    }

    /// Number of (conversation, user) pairs currently typing.
    pub fn active(&self) -> usize {
        self.state.len()
    }

    fn arm_expiry(&self, key: TypingKey, generation: u64) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let fanout = Arc::clone(&self.fanout);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // A newer signal replaced this entry; its own timer owns expiry.
            let Some(((conversation_id, user_id), entry)) =
                state.remove_if(&key, |_, entry| entry.generation == generation)
            else {
                return;
            };
            debug!(conversation_id = %conversation_id, user_id = %user_id, "typing expired");
            announce(
                fanout.as_ref(),
                &conversation_id,
                ServerEvent::UserStopTyping {
                    user_id: user_id.clone(),
                    user_name: entry.user_name,
                },
                &user_id,
            );
        })
    }
}

impl Drop for TypingTracker {
    fn drop(&mut self) {
        for entry in self.state.iter() {
            if let Some(expiry) = &entry.expiry {
                expiry.abort();
            }
        }
    }
}

fn announce(
    fanout: &dyn EventFanout,
    conversation_id: &ConversationId,
    event: ServerEvent,
    user_id: &UserId,
) {
    if let Err(e) = fanout.broadcast(conversation_id, event, Some(user_id)) {
        warn!(conversation_id = %conversation_id, error = %e, "typing fan-out failed");
    }
}
