// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client side of BookZone messaging.
//!
//! [`ConversationClient`] keeps local state for one open conversation. It
//! talks to the server through two seams: [`ChatApi`] for the durable
//! request path and [`LiveConnector`] for the live channel.

pub mod api;
pub mod client;
pub mod connector;

pub use api::{ChatApi, HttpChatApi};
pub use client::{ChannelState, ClientOptions, ClientUpdate, ConversationClient, SendError};
pub use connector::{LiveConnector, LiveLink, WsConnector};
