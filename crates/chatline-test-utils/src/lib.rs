// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Chatline integration tests.
//!
//! Provides mock adapters and a harness for fast, deterministic tests
//! without a real server.
//!
//! # Components
//!
//! - [`MockTransport`] - scripted connection failures, frame injection, write capture
//! - [`ScriptedSender`] - frame sender with scripted per-send results
//! - [`TestHarness`] - a running pipeline over the mock transport and an in-memory store

pub mod harness;
pub mod mock_transport;
pub mod scripted_sender;

pub use harness::{TestHarness, TestHarnessBuilder, fast_config};
pub use mock_transport::MockTransport;
pub use scripted_sender::{ScriptedResult, ScriptedSender};
