// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline testing.
//!
//! `TestHarness` runs a complete [`ChatPipeline`] over a [`MockTransport`]
//! and a [`MemoryStore`], with timings shrunk so reconnects and replays
//! finish in milliseconds. Tests act as the server through the transport
//! and as the host through the pipeline handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chatline_config::ChatlineConfig;
use chatline_core::{
    ChatlineError, ConnectionSnapshot, ConnectionState, Credentials, Message, MessageId,
    QueuedAction,
};
use chatline_pipeline::{ChatPipeline, PipelineHandle, PresentationEvent};
use chatline_reconciler::Diff;
use chatline_storage::MemoryStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::mock_transport::MockTransport;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

static BARRIER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Configuration with millisecond-scale delays and no jitter.
pub fn fast_config() -> ChatlineConfig {
    let mut config = ChatlineConfig::default();
    config.connection.endpoint = "ws://mock.invalid/stream".to_string();
    config.connection.base_delay_ms = 10;
    config.connection.max_delay_ms = 100;
    config.connection.jitter_ratio = 0.0;
    config.connection.stability_window_ms = 50;
    config.connection.connect_timeout_ms = 1_000;
    config.streaming.flush_interval_ms = 20;
    config.sync.replay_base_delay_ms = 10;
    config.sync.replay_max_delay_ms = 100;
    config
}

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    config: ChatlineConfig,
    transport: MockTransport,
    queue: Vec<QueuedAction>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: fast_config(),
            transport: MockTransport::new(),
            queue: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: ChatlineConfig) -> Self {
        self.config = config;
        self
    }

    /// Start with a transport that refuses every connection.
    pub fn unreachable(mut self) -> Self {
        self.transport = MockTransport::unreachable();
        self
    }

    /// Seed the store with a queue left behind by a previous run.
    pub fn with_queue(mut self, queue: Vec<QueuedAction>) -> Self {
        self.queue = queue;
        self
    }

    /// Spawn the pipeline.
    pub async fn build(self) -> Result<TestHarness, ChatlineError> {
        let store = Arc::new(MemoryStore::with_queue(self.queue));
        let transport = Arc::new(self.transport);
        let (mut pipeline, handle, events) =
            ChatPipeline::new(&self.config, transport.clone(), store.clone(), store.clone());

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { pipeline.run(token).await });

        Ok(TestHarness {
            transport,
            store,
            handle,
            config: self.config,
            events,
            seen: Vec::new(),
            cancel,
            task,
        })
    }
}

/// A running pipeline with a scriptable server side.
pub struct TestHarness {
    /// The mock server connection.
    pub transport: Arc<MockTransport>,
    /// Message and queue store shared with the pipeline.
    pub store: Arc<MemoryStore>,
    /// Host-side handle.
    pub handle: PipelineHandle,
    pub config: ChatlineConfig,
    events: mpsc::Receiver<PresentationEvent>,
    seen: Vec<PresentationEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), ChatlineError>>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Connect to the configured endpoint with a test token.
    pub async fn connect(&self) -> Result<ConnectionSnapshot, ChatlineError> {
        self.handle.connect(Credentials::bearer("test-token")).await
    }

    /// Send a raw frame from the server.
    pub async fn inject(&self, frame: impl Into<String>) -> Result<(), ChatlineError> {
        self.transport.inject(frame).await
    }

    /// Every presentation event received so far, in order.
    pub fn events_seen(&self) -> &[PresentationEvent] {
        &self.seen
    }

    /// Wait for the next event matching `pred`.
    pub async fn wait_for(
        &mut self,
        mut pred: impl FnMut(&PresentationEvent) -> bool,
    ) -> Result<PresentationEvent, ChatlineError> {
        let deadline = Instant::now() + WAIT_LIMIT;
        loop {
            let event = self.next_event(deadline).await?;
            if pred(&event) {
                return Ok(event);
            }
        }
    }

    /// Wait until the log holds `message_id` in a state matching `pred`.
    pub async fn wait_for_message(
        &mut self,
        message_id: &MessageId,
        pred: impl Fn(&Message) -> bool,
    ) -> Result<Message, ChatlineError> {
        let deadline = Instant::now() + WAIT_LIMIT;
        loop {
            if let Some(message) = self.message(message_id).await?
                && pred(&message)
            {
                return Ok(message);
            }
            self.next_event(deadline).await?;
        }
    }

    /// Wait until the connection reaches `state`.
    pub async fn wait_for_state(
        &mut self,
        state: ConnectionState,
    ) -> Result<ConnectionSnapshot, ChatlineError> {
        let deadline = Instant::now() + WAIT_LIMIT;
        loop {
            let snapshot = self.handle.connection();
            if snapshot.state == state {
                return Ok(snapshot);
            }
            self.next_event(deadline).await?;
        }
    }

    /// Current copy of one message from the log.
    pub async fn message(&self, message_id: &MessageId) -> Result<Option<Message>, ChatlineError> {
        let messages = self.handle.messages().await?;
        Ok(messages.into_iter().find(|m| &m.id == message_id))
    }

    /// Wait until every frame injected before this call has been processed.
    ///
    /// Injects a whole-message frame with a fresh id and waits for it to be
    /// appended; frames on one link are handled in order.
    pub async fn barrier(&mut self) -> Result<(), ChatlineError> {
        let n = BARRIER_SEQ.fetch_add(1, Ordering::SeqCst);
        let id = MessageId(format!("barrier-{n}"));
        self.inject(format!(
            r#"{{"type":"message","messageId":"{id}","payload":{{"role":"system","content":"barrier"}}}}"#
        ))
        .await?;
        self.wait_for(|event| {
            matches!(event, PresentationEvent::Diff(Diff::Append { message, .. }) if message.id == id)
        })
        .await
        .map(|_| ())
    }

    /// Stop the pipeline and wait for it to finish.
    pub async fn shutdown(self) -> Result<(), ChatlineError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| ChatlineError::Internal(format!("pipeline task failed: {e}")))?
    }

    async fn next_event(&mut self, deadline: Instant) -> Result<PresentationEvent, ChatlineError> {
        match timeout_at(deadline, self.events.recv()).await {
            Ok(Some(event)) => {
                self.seen.push(event.clone());
                Ok(event)
            }
            Ok(None) => Err(ChatlineError::Internal("pipeline stopped".to_string())),
            Err(_) => Err(ChatlineError::Timeout {
                duration: WAIT_LIMIT,
            }),
        }
    }
}
