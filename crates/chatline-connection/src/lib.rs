// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle for the Chatline pipeline.
//!
//! [`ConnectionCoordinator`] owns the duplex link through a background task,
//! publishes [`ConnectionSnapshot`](chatline_core::ConnectionSnapshot)s, and
//! reconnects with exponential backoff. [`WebSocketTransport`] is the default
//! transport.

pub mod coordinator;
pub mod websocket;

pub use coordinator::{ConnectionCoordinator, CoordinatorEvent, CoordinatorSettings};
pub use websocket::WebSocketTransport;
