// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits for the message log and the outbound action queue.

use async_trait::async_trait;

use crate::error::ChatlineError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{DeadLetter, Message, QueuedAction};

/// Adapter for storage and persistence backends.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ChatlineError>;

    /// Closes the storage backend, flushing pending writes and releasing connections.
    async fn close(&self) -> Result<(), ChatlineError>;
}

/// Durable copy of the message log.
#[async_trait]
pub trait MessageStore: StorageAdapter {
    /// Returns every stored message in insertion order.
    async fn load_messages(&self) -> Result<Vec<Message>, ChatlineError>;

    /// Appends a new message at the end of the log.
    async fn append_message(&self, message: &Message) -> Result<(), ChatlineError>;

    /// Overwrites content, status, and tombstone of an existing message.
    async fn update_message(&self, message: &Message) -> Result<(), ChatlineError>;
}

/// Durable copy of the pending action queue and its dead letters.
///
/// Saves replace the whole list so the stored order always matches memory.
#[async_trait]
pub trait QueueStore: StorageAdapter {
    async fn load_queue(&self) -> Result<Vec<QueuedAction>, ChatlineError>;

    async fn save_queue(&self, actions: &[QueuedAction]) -> Result<(), ChatlineError>;

    async fn load_dead_letters(&self) -> Result<Vec<DeadLetter>, ChatlineError>;

    async fn save_dead_letters(&self, letters: &[DeadLetter]) -> Result<(), ChatlineError>;
}
