// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for BookZone messaging integration tests.
//!
//! Provides doubles and a harness for fast, deterministic tests without
//! sockets or external services.
//!
//! # Components
//!
//! - [`TestHarness`] - temp SQLite plus the full chat stack
//! - [`RecordingFanout`] / [`FailingFanout`] - broadcast capture and failure injection
//! - [`OutageStore`] - store wrapper with a switchable outage
//! - [`LoopbackApi`] / [`LoopbackConnector`] - in-process client transports

pub mod harness;
pub mod loopback;
pub mod mock_fanout;
pub mod outage_store;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use loopback::{LoopbackApi, LoopbackConnector};
pub use mock_fanout::{Broadcast, FailingFanout, RecordingFanout};
pub use outage_store::OutageStore;
