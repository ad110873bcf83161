// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host-facing handle and the commands it sends to the pipeline loop.

use chatline_core::{
    ChatlineError, ConnectionSnapshot, Credentials, DeliveryStatus, Message, MessageId,
    SubmitOutcome,
};
use tokio::sync::{mpsc, oneshot, watch};

type Reply<T> = oneshot::Sender<Result<T, ChatlineError>>;

pub(crate) enum ClientCommand {
    Connect {
        endpoint: Option<String>,
        credentials: Credentials,
        reply: Reply<ConnectionSnapshot>,
    },
    Disconnect {
        reply: Reply<ConnectionSnapshot>,
    },
    SendMessage {
        content: String,
        reply: Reply<SentMessage>,
    },
    UpdateStatus {
        message_id: MessageId,
        status: DeliveryStatus,
        reply: Reply<SubmitOutcome>,
    },
    DeleteMessage {
        message_id: MessageId,
        reply: Reply<SubmitOutcome>,
    },
    RetryMessage {
        message_id: MessageId,
        reply: Reply<usize>,
    },
    CancelStream {
        message_id: MessageId,
        reply: Reply<bool>,
    },
    AttachView {
        reply: Reply<()>,
    },
    DetachView {
        reply: Reply<()>,
    },
    Messages {
        reply: Reply<Vec<Message>>,
    },
    Status {
        reply: Reply<PipelineStatus>,
    },
}

/// Result of [`PipelineHandle::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: MessageId,
    pub outcome: SubmitOutcome,
}

/// Point-in-time counters for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    pub connection: ConnectionSnapshot,
    pub messages: usize,
    pub active_streams: usize,
    pub pending_actions: usize,
    pub dead_letters: usize,
    pub view_attached: bool,
}

/// Cloneable handle for driving a running [`ChatPipeline`](crate::ChatPipeline).
#[derive(Clone)]
pub struct PipelineHandle {
    commands: mpsc::Sender<ClientCommand>,
    connection: watch::Receiver<ConnectionSnapshot>,
}

impl PipelineHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<ClientCommand>,
        connection: watch::Receiver<ConnectionSnapshot>,
    ) -> Self {
        Self {
            commands,
            connection,
        }
    }

    /// Latest connection snapshot, without a round trip through the loop.
    pub fn connection(&self) -> ConnectionSnapshot {
        *self.connection.borrow()
    }

    /// Connect to the configured endpoint.
    pub async fn connect(&self, credentials: Credentials) -> Result<ConnectionSnapshot, ChatlineError> {
        self.request(|reply| ClientCommand::Connect {
            endpoint: None,
            credentials,
            reply,
        })
        .await
    }

    /// Connect to an explicit endpoint instead of the configured one.
    pub async fn connect_to(
        &self,
        endpoint: impl Into<String>,
        credentials: Credentials,
    ) -> Result<ConnectionSnapshot, ChatlineError> {
        let endpoint = Some(endpoint.into());
        self.request(|reply| ClientCommand::Connect {
            endpoint,
            credentials,
            reply,
        })
        .await
    }

    /// Intentional teardown. Queued actions are kept.
    pub async fn disconnect(&self) -> Result<ConnectionSnapshot, ChatlineError> {
        self.request(|reply| ClientCommand::Disconnect { reply }).await
    }

    /// Create a user message and send or queue it.
    pub async fn send_message(&self, content: impl Into<String>) -> Result<SentMessage, ChatlineError> {
        let content = content.into();
        self.request(|reply| ClientCommand::SendMessage { content, reply })
            .await
    }

    pub async fn update_status(
        &self,
        message_id: MessageId,
        status: DeliveryStatus,
    ) -> Result<SubmitOutcome, ChatlineError> {
        self.request(|reply| ClientCommand::UpdateStatus {
            message_id,
            status,
            reply,
        })
        .await
    }

    pub async fn delete_message(&self, message_id: MessageId) -> Result<SubmitOutcome, ChatlineError> {
        self.request(|reply| ClientCommand::DeleteMessage { message_id, reply })
            .await
    }

    /// Requeue a failed message's dead-lettered actions.
    ///
    /// Returns how many actions were requeued.
    pub async fn retry_message(&self, message_id: MessageId) -> Result<usize, ChatlineError> {
        self.request(|reply| ClientCommand::RetryMessage { message_id, reply })
            .await
    }

    /// Discard an in-flight stream without finalizing it.
    pub async fn cancel_stream(&self, message_id: MessageId) -> Result<bool, ChatlineError> {
        self.request(|reply| ClientCommand::CancelStream { message_id, reply })
            .await
    }

    /// Start the flush ticker for a newly shown view.
    pub async fn attach_view(&self) -> Result<(), ChatlineError> {
        self.request(|reply| ClientCommand::AttachView { reply }).await
    }

    /// Stop the flush ticker and release every streaming session.
    ///
    /// The connection and the offline queue keep running.
    pub async fn detach_view(&self) -> Result<(), ChatlineError> {
        self.request(|reply| ClientCommand::DetachView { reply }).await
    }

    /// Copy of the current message log.
    pub async fn messages(&self) -> Result<Vec<Message>, ChatlineError> {
        self.request(|reply| ClientCommand::Messages { reply }).await
    }

    pub async fn status(&self) -> Result<PipelineStatus, ChatlineError> {
        self.request(|reply| ClientCommand::Status { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ClientCommand,
    ) -> Result<T, ChatlineError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ChatlineError::Internal("pipeline stopped".to_string()))?;
        rx.await
            .map_err(|_| ChatlineError::Internal("pipeline dropped reply".to_string()))?
    }
}
