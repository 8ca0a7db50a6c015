// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time messaging core for BookZone.
//!
//! Messages enter through [`MessageIngress`], which persists them in the
//! [`ConversationStore`](bookzone_core::ConversationStore) before fanning them
//! out through the [`DeliveryChannelManager`]. Typing presence and read
//! cursors are tracked alongside, and [`ChatService`] bundles everything for
//! the gateway.

pub mod delivery;
pub mod ingress;
pub mod read_state;
pub mod service;
pub mod typing;

pub use delivery::{DeliveryChannelManager, EventFanout, SessionHandle, SessionId};
pub use ingress::MessageIngress;
pub use read_state::ReadStateTracker;
pub use service::ChatService;
pub use typing::TypingTracker;

pub use bookzone_core::{StartConversation, StartedConversation};
