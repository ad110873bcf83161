// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the pluggable edges of the pipeline.
//!
//! Transport and storage adapters extend the [`PluginAdapter`] base trait and
//! use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod sender;
pub mod storage;
pub mod transport;

pub use adapter::PluginAdapter;
pub use sender::FrameSender;
pub use storage::{MessageStore, QueueStore, StorageAdapter};
pub use transport::{Credentials, FrameWriter, Transport, TransportEvent, TransportLink};
