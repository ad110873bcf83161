// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ready-made pipeline wiring: SQLite persistence and a WebSocket transport.

use std::sync::Arc;

use chatline_config::{ChatlineConfig, ConfigError};
use chatline_connection::WebSocketTransport;
use chatline_core::{ChatlineError, MessageStore, QueueStore, StorageAdapter, Transport};
use chatline_pipeline::{ChatPipeline, PipelineHandle, PresentationEvent};
use chatline_storage::SqliteStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Load and validate configuration from the standard locations.
pub fn load_config() -> Result<ChatlineConfig, ChatlineError> {
    chatline_config::load_and_validate().map_err(config_error)
}

/// Load and validate configuration from a TOML string.
pub fn load_config_str(toml: &str) -> Result<ChatlineConfig, ChatlineError> {
    chatline_config::load_and_validate_str(toml).map_err(config_error)
}

fn config_error(errors: Vec<ConfigError>) -> ChatlineError {
    let joined = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    ChatlineError::Config(joined)
}

/// A running pipeline plus the means to stop it.
pub struct ChatlineClient {
    handle: PipelineHandle,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), ChatlineError>>,
}

impl ChatlineClient {
    /// Open the SQLite store named in `config`, then start the pipeline
    /// with the WebSocket transport.
    pub async fn open(
        config: ChatlineConfig,
    ) -> Result<(Self, mpsc::Receiver<PresentationEvent>), ChatlineError> {
        let store = Arc::new(SqliteStore::new(config.storage.clone()));
        store.initialize().await?;
        Ok(Self::start(
            &config,
            Arc::new(WebSocketTransport::new()),
            store.clone(),
            store,
        ))
    }

    /// Start the pipeline over caller-provided adapters.
    ///
    /// Stores must already be initialized.
    pub fn start(
        config: &ChatlineConfig,
        transport: Arc<dyn Transport>,
        messages: Arc<dyn MessageStore>,
        queue: Arc<dyn QueueStore>,
    ) -> (Self, mpsc::Receiver<PresentationEvent>) {
        let (mut pipeline, handle, events) = ChatPipeline::new(config, transport, messages, queue);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { pipeline.run(token).await });
        info!(client = %config.client.name, "chatline client started");
        (
            Self {
                handle,
                cancel,
                task,
            },
            events,
        )
    }

    pub fn handle(&self) -> &PipelineHandle {
        &self.handle
    }

    /// Token that stops the pipeline when cancelled, for wiring into the
    /// host's own shutdown signal.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the pipeline and wait for it to close the stores.
    pub async fn shutdown(self) -> Result<(), ChatlineError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| ChatlineError::Internal(format!("pipeline task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use chatline_core::SubmitOutcome;

    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> ChatlineConfig {
        let mut config = ChatlineConfig::default();
        config.storage.database_path = dir.path().join("chatline.db").display().to_string();
        config
    }

    #[test]
    fn invalid_config_becomes_config_error() {
        let err = load_config_str("[connection]\nendpoint = \"http://nope\"\n").unwrap_err();
        match err {
            ChatlineError::Config(message) => assert!(message.contains("endpoint")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn queued_message_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        let (client, _events) = ChatlineClient::open(config_in(&dir)).await.unwrap();
        let sent = client.handle().send_message("offline hello").await.unwrap();
        assert_eq!(sent.outcome, SubmitOutcome::Queued);
        client.shutdown().await.unwrap();

        let (client, _events) = ChatlineClient::open(config_in(&dir)).await.unwrap();
        let status = client.handle().status().await.unwrap();
        assert_eq!(status.pending_actions, 1);
        assert_eq!(status.messages, 1);
        let messages = client.handle().messages().await.unwrap();
        assert_eq!(messages[0].id, sent.message_id);
        assert_eq!(messages[0].content, "offline hello");
        client.shutdown().await.unwrap();
    }
}
