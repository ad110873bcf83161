// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store for tests and hosts that do not persist.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use chatline_core::{
    AdapterType, ChatlineError, DeadLetter, HealthStatus, Message, MessageStore, PluginAdapter,
    QueueStore, QueuedAction, StorageAdapter,
};

#[derive(Default)]
struct Tables {
    messages: Vec<Message>,
    queue: Vec<QueuedAction>,
    dead_letters: Vec<DeadLetter>,
}

/// Message and queue store held in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing queue, as if restored from disk.
    pub fn with_queue(queue: Vec<QueuedAction>) -> Self {
        let store = Self::default();
        if let Ok(mut tables) = store.tables.lock() {
            tables.queue = queue;
        }
        store
    }

    /// Make every write fail with a storage error until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn queue_snapshot(&self) -> Vec<QueuedAction> {
        self.tables
            .lock()
            .map(|t| t.queue.clone())
            .unwrap_or_default()
    }

    pub fn dead_letter_snapshot(&self) -> Vec<DeadLetter> {
        self.tables
            .lock()
            .map(|t| t.dead_letters.clone())
            .unwrap_or_default()
    }

    pub fn message_snapshot(&self) -> Vec<Message> {
        self.tables
            .lock()
            .map(|t| t.messages.clone())
            .unwrap_or_default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, ChatlineError> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| ChatlineError::Internal("memory store lock poisoned".to_string()))?;
        Ok(f(&tables))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, ChatlineError>,
    ) -> Result<T, ChatlineError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ChatlineError::Storage {
                source: "memory store writes disabled".into(),
            });
        }
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| ChatlineError::Internal("memory store lock poisoned".to_string()))?;
        f(&mut tables)
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlineError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Ok(HealthStatus::Degraded("writes disabled".to_string()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), ChatlineError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStore {
    async fn initialize(&self) -> Result<(), ChatlineError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ChatlineError> {
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn load_messages(&self) -> Result<Vec<Message>, ChatlineError> {
        self.read(|t| t.messages.clone())
    }

    async fn append_message(&self, message: &Message) -> Result<(), ChatlineError> {
        self.write(|t| {
            match t.messages.iter_mut().find(|m| m.id == message.id) {
                Some(existing) => *existing = message.clone(),
                None => t.messages.push(message.clone()),
            }
            Ok(())
        })
    }

    async fn update_message(&self, message: &Message) -> Result<(), ChatlineError> {
        self.write(|t| {
            let existing = t
                .messages
                .iter_mut()
                .find(|m| m.id == message.id)
                .ok_or_else(|| ChatlineError::Storage {
                    source: format!("message {} not found", message.id).into(),
                })?;
            existing.content = message.content.clone();
            existing.status = message.status;
            existing.deleted = message.deleted;
            Ok(())
        })
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn load_queue(&self) -> Result<Vec<QueuedAction>, ChatlineError> {
        self.read(|t| t.queue.clone())
    }

    async fn save_queue(&self, actions: &[QueuedAction]) -> Result<(), ChatlineError> {
        self.write(|t| {
            t.queue = actions.to_vec();
            Ok(())
        })
    }

    async fn load_dead_letters(&self) -> Result<Vec<DeadLetter>, ChatlineError> {
        self.read(|t| t.dead_letters.clone())
    }

    async fn save_dead_letters(&self, letters: &[DeadLetter]) -> Result<(), ChatlineError> {
        self.write(|t| {
            t.dead_letters = letters.to_vec();
            Ok(())
        })
    }
}
