// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming assembly for the Chatline pipeline.
//!
//! [`StreamingAssembler`] merges chunk events keyed by message id into growing
//! content and emits coalesced [`StreamUpdate`]s; [`spawn_flush_ticker`]
//! drives its flush cadence from a separate task.

pub mod assembler;
pub mod session;
pub mod ticker;

pub use assembler::{AssemblerSettings, StreamUpdate, StreamingAssembler};
pub use session::{StreamMetadata, StreamingSession};
pub use ticker::{FlushTick, spawn_flush_ticker};
