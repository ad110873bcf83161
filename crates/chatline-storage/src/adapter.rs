// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the message and queue store traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use chatline_config::model::StorageConfig;
use chatline_core::{
    AdapterType, ChatlineError, DeadLetter, HealthStatus, Message, MessageStore, PluginAdapter,
    QueueStore, QueuedAction, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed store.
///
/// The database is opened on [`StorageAdapter::initialize`]; every other call
/// fails with a storage error until then.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ChatlineError> {
        self.db.get().ok_or_else(|| ChatlineError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlineError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".to_string()));
        };
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ChatlineError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStore {
    async fn initialize(&self) -> Result<(), ChatlineError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ChatlineError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ChatlineError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn load_messages(&self) -> Result<Vec<Message>, ChatlineError> {
        queries::messages::load_messages(self.db()?).await
    }

    async fn append_message(&self, message: &Message) -> Result<(), ChatlineError> {
        queries::messages::append_message(self.db()?, message).await
    }

    async fn update_message(&self, message: &Message) -> Result<(), ChatlineError> {
        queries::messages::update_message(self.db()?, message).await
    }
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn load_queue(&self) -> Result<Vec<QueuedAction>, ChatlineError> {
        queries::queue::load_queue(self.db()?).await
    }

    async fn save_queue(&self, actions: &[QueuedAction]) -> Result<(), ChatlineError> {
        queries::queue::save_queue(self.db()?, actions).await
    }

    async fn load_dead_letters(&self) -> Result<Vec<DeadLetter>, ChatlineError> {
        queries::queue::load_dead_letters(self.db()?).await
    }

    async fn save_dead_letters(&self, letters: &[DeadLetter]) -> Result<(), ChatlineError> {
        queries::queue::save_dead_letters(self.db()?, letters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::{ActionPayload, MessageId};
    use tempfile::tempdir;

    fn config_for(dir: &tempfile::TempDir) -> StorageConfig {
        StorageConfig {
            database_path: dir.path().join("nested/chatline.db").display().to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn calls_before_initialize_fail() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config_for(&dir));
        assert!(matches!(
            store.load_queue().await,
            Err(ChatlineError::Storage { .. })
        ));
        assert_eq!(
            store.health_check().await.unwrap(),
            HealthStatus::Unhealthy("not initialized".to_string())
        );
    }

    #[tokio::test]
    async fn double_initialize_is_rejected() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(config_for(&dir));
        store.initialize().await.unwrap();
        assert!(store.initialize().await.is_err());
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn queue_survives_reopen() {
        let dir = tempdir().unwrap();

        let action = QueuedAction {
            id: "a1".to_string(),
            seq: 1,
            message_id: MessageId::from("m2"),
            payload: ActionPayload::SendMessage {
                content: "offline hello".to_string(),
            },
            enqueued_at: "2026-01-01T00:00:00.000Z".to_string(),
            attempts: 2,
        };

        {
            let store = SqliteStore::new(config_for(&dir));
            store.initialize().await.unwrap();
            store.save_queue(std::slice::from_ref(&action)).await.unwrap();
            store
                .append_message(&Message::outgoing(MessageId::from("m2"), "offline hello"))
                .await
                .unwrap();
            store.close().await.unwrap();
        }

        let reopened = SqliteStore::new(config_for(&dir));
        reopened.initialize().await.unwrap();
        assert_eq!(reopened.load_queue().await.unwrap(), vec![action]);
        let messages = reopened.load_messages().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "offline hello");
    }
}
