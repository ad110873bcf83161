// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline sync for outbound Chatline actions.
//!
//! [`OfflineSyncManager`] forwards actions while connected and buffers them
//! in a durable, ordered queue otherwise. Once the connection returns the
//! queue is replayed per message id in enqueue order.

pub mod manager;

pub use manager::{OfflineSyncManager, ReplayReport, SyncEvent, SyncSettings};
