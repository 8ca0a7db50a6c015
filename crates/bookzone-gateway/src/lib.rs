// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for BookZone messaging.
//!
//! The REST routes are the fallback request/response surface; `/ws/chat/{id}`
//! is the live channel. Both are thin adapters over [`bookzone_chat::ChatService`],
//! so validation and ordering are identical on either path.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::{CallerToken, StaticTokenAuth, auth_middleware};
pub use handlers::{ApiError, ErrorResponse, WsUrlResponse};
pub use server::{GatewayState, build_router, serve, start_server};
