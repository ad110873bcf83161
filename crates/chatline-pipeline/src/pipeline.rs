// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The serial context that owns every mutable piece of pipeline state.

use std::sync::Arc;
use std::time::Duration;

use chatline_config::ChatlineConfig;
use chatline_connection::{ConnectionCoordinator, CoordinatorEvent, CoordinatorSettings};
use chatline_core::{
    ActionKind, ActionPayload, ActionRequest, ChatlineError, DeliveryStatus, InboundFrame, Message, MessageId,
    MessageStore, QueueStore, SubmitOutcome, Transport, now_timestamp,
};
use chatline_reconciler::{Diff, MessageReconciler, ReconcileEvent};
use chatline_stream::{
    AssemblerSettings, FlushTick, StreamUpdate, StreamingAssembler, spawn_flush_ticker,
};
use chatline_sync::{OfflineSyncManager, SyncEvent, SyncSettings};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{ClientCommand, PipelineHandle, PipelineStatus, SentMessage};
use crate::event::PresentationEvent;
use crate::recording;

const COMMAND_BUFFER: usize = 64;
const PRESENTATION_BUFFER: usize = 256;

/// Lifetime of the flush ticker, tied to a visible conversation view.
struct ViewScope {
    cancel: CancellationToken,
    ticker: JoinHandle<()>,
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365)
}

/// Wires the connection coordinator, streaming assembler, offline sync
/// manager, and message reconciler together.
///
/// All state mutation happens inside [`run`](Self::run). The coordinator's
/// socket I/O and the flush ticker live on their own tasks.
pub struct ChatPipeline {
    endpoint: String,
    flush_interval: Duration,
    coordinator: ConnectionCoordinator,
    coordinator_events: mpsc::UnboundedReceiver<CoordinatorEvent>,
    assembler: StreamingAssembler,
    sync: OfflineSyncManager,
    reconciler: MessageReconciler,
    messages: Arc<dyn MessageStore>,
    queue: Arc<dyn QueueStore>,
    commands: mpsc::Receiver<ClientCommand>,
    presentation: mpsc::Sender<PresentationEvent>,
    tick_tx: mpsc::Sender<FlushTick>,
    ticks: mpsc::Receiver<FlushTick>,
    view: Option<ViewScope>,
    replay_at: Option<Instant>,
}

impl ChatPipeline {
    /// Builds the pipeline and spawns its connection task.
    ///
    /// Must be called inside a tokio runtime. Stores are expected to be
    /// initialized already. Nothing is loaded until [`run`](Self::run).
    pub fn new(
        config: &ChatlineConfig,
        transport: Arc<dyn Transport>,
        messages: Arc<dyn MessageStore>,
        queue: Arc<dyn QueueStore>,
    ) -> (Self, PipelineHandle, mpsc::Receiver<PresentationEvent>) {
        let (event_tx, coordinator_events) = mpsc::unbounded_channel();
        let coordinator = ConnectionCoordinator::spawn(
            transport,
            CoordinatorSettings::from(&config.connection),
            event_tx,
        );
        let sync = OfflineSyncManager::new(
            Arc::new(coordinator.clone()),
            queue.clone(),
            SyncSettings::from(&config.sync),
        );

        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (presentation, presentation_rx) = mpsc::channel(PRESENTATION_BUFFER);
        let (tick_tx, ticks) = mpsc::channel(1);
        let handle = PipelineHandle::new(command_tx, coordinator.subscribe());

        let pipeline = Self {
            endpoint: config.connection.endpoint.clone(),
            flush_interval: config.streaming.flush_interval(),
            coordinator,
            coordinator_events,
            assembler: StreamingAssembler::new(AssemblerSettings::from(&config.streaming)),
            sync,
            reconciler: MessageReconciler::new(),
            messages,
            queue,
            commands,
            presentation,
            tick_tx,
            ticks,
            view: None,
            replay_at: None,
        };
        (pipeline, handle, presentation_rx)
    }

    /// Runs the serial loop until `cancel` fires.
    ///
    /// Loads the message log and the offline queue, attaches the view, then
    /// processes commands, coordinator events, flush ticks, and replay
    /// retries one at a time. On cancellation the view is released, the
    /// connection is torn down, and the stores are closed.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), ChatlineError> {
        self.start().await?;

        loop {
            let replay_at = self.replay_at;
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping pipeline");
                    break;
                }
                Some(command) = self.commands.recv() => self.handle_command(command).await,
                Some(event) = self.coordinator_events.recv() => {
                    self.handle_coordinator_event(event).await;
                }
                Some(FlushTick) = self.ticks.recv() => self.flush().await,
                _ = sleep_until(replay_at.unwrap_or_else(far_future)), if replay_at.is_some() => {
                    self.replay_at = None;
                    self.replay().await;
                }
            }
        }

        self.shutdown().await
    }

    async fn start(&mut self) -> Result<(), ChatlineError> {
        let stored = self.messages.load_messages().await?;
        self.apply(ReconcileEvent::Load(stored)).await;
        self.sync.load().await?;
        recording::set_pending_actions(self.sync.pending_count());
        self.attach_view();
        info!(
            messages = self.reconciler.log().len(),
            pending = self.sync.pending_count(),
            "pipeline started"
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ChatlineError> {
        self.detach_view();
        if let Err(e) = self.coordinator.disconnect().await {
            debug!(error = %e, "disconnect during shutdown failed");
        }
        self.messages.close().await?;
        self.queue.close().await?;
        info!("pipeline stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Connect {
                endpoint,
                credentials,
                reply,
            } => {
                let endpoint = endpoint.unwrap_or_else(|| self.endpoint.clone());
                let result = self.coordinator.connect(endpoint, credentials).await;
                let _ = reply.send(result);
            }
            ClientCommand::Disconnect { reply } => {
                let result = self.coordinator.disconnect().await;
                self.replay_at = None;
                let _ = reply.send(result);
            }
            ClientCommand::SendMessage { content, reply } => {
                let result = self.send_message(content).await;
                let _ = reply.send(result);
            }
            ClientCommand::UpdateStatus {
                message_id,
                status,
                reply,
            } => {
                self.apply(ReconcileEvent::StatusChange {
                    message_id: message_id.clone(),
                    status,
                })
                .await;
                let result = self
                    .submit(ActionRequest::update_status(message_id, status))
                    .await;
                let _ = reply.send(result);
            }
            ClientCommand::DeleteMessage { message_id, reply } => {
                self.apply(ReconcileEvent::Deletion {
                    message_id: message_id.clone(),
                })
                .await;
                let result = self.submit(ActionRequest::delete_message(message_id)).await;
                let _ = reply.send(result);
            }
            ClientCommand::RetryMessage { message_id, reply } => {
                let result = self.retry_message(message_id).await;
                let _ = reply.send(result);
            }
            ClientCommand::CancelStream { message_id, reply } => {
                let cancelled = self.assembler.cancel_stream(&message_id);
                recording::set_active_streams(self.assembler.active_count());
                let _ = reply.send(Ok(cancelled));
            }
            ClientCommand::AttachView { reply } => {
                self.attach_view();
                let _ = reply.send(Ok(()));
            }
            ClientCommand::DetachView { reply } => {
                self.detach_view();
                let _ = reply.send(Ok(()));
            }
            ClientCommand::Messages { reply } => {
                let _ = reply.send(Ok(self.reconciler.log().messages().to_vec()));
            }
            ClientCommand::Status { reply } => {
                let _ = reply.send(Ok(self.status()));
            }
        }
    }

    fn status(&self) -> PipelineStatus {
        PipelineStatus {
            connection: self.coordinator.snapshot(),
            messages: self.reconciler.log().len(),
            active_streams: self.assembler.active_count(),
            pending_actions: self.sync.pending_count(),
            dead_letters: self.sync.dead_letters().len(),
            view_attached: self.view.is_some(),
        }
    }

    async fn send_message(&mut self, content: String) -> Result<SentMessage, ChatlineError> {
        let message = Message::outgoing(MessageId::generate(), content.clone());
        let message_id = message.id.clone();
        self.apply(ReconcileEvent::NewMessage(message)).await;

        let outcome = self
            .submit(ActionRequest::send_message(message_id.clone(), content))
            .await?;
        Ok(SentMessage {
            message_id,
            outcome,
        })
    }

    /// Routes an action through the sync manager and reflects the outcome
    /// on the owning message.
    async fn submit(&mut self, request: ActionRequest) -> Result<SubmitOutcome, ChatlineError> {
        let kind = request.payload.kind();
        let message_id = request.message_id.clone();
        let result = self.sync.submit(request).await;
        recording::set_pending_actions(self.sync.pending_count());

        match result {
            Ok(SubmitOutcome::Sent) => {
                recording::record_action(kind, "sent");
                if kind == ActionKind::SendMessage {
                    self.mark_status(&message_id, DeliveryStatus::Delivered).await;
                }
                Ok(SubmitOutcome::Sent)
            }
            Ok(SubmitOutcome::Queued) => {
                recording::record_action(kind, "queued");
                Ok(SubmitOutcome::Queued)
            }
            Err(e) => {
                warn!(message_id = %message_id, kind = %kind, error = %e, "action rejected");
                self.fail_message(&message_id, e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn retry_message(&mut self, message_id: MessageId) -> Result<usize, ChatlineError> {
        let status = retry_status(
            self.sync
                .dead_letters()
                .iter()
                .filter(|d| d.action.message_id == message_id)
                .map(|d| &d.action.payload),
        );
        let restored = self.sync.retry_dead_letters(&message_id).await?;
        recording::set_pending_actions(self.sync.pending_count());
        if restored > 0 {
            self.apply(ReconcileEvent::StatusOverride {
                message_id: message_id.clone(),
                status,
            })
            .await;
            if self.coordinator.snapshot().is_connected() {
                self.replay().await;
            }
        }
        Ok(restored)
    }

    pub(crate) async fn handle_coordinator_event(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::StateChanged { previous, current } => {
                recording::record_transition(current.state);
                self.emit(PresentationEvent::Connection(current)).await;
                if current.is_connected() && !previous.is_connected() {
                    self.replay_at = None;
                    self.replay().await;
                } else if !current.is_connected() {
                    self.replay_at = None;
                }
            }
            CoordinatorEvent::Frame(text) => self.handle_frame(&text).await,
        }
    }

    async fn handle_frame(&mut self, text: &str) {
        let frame = match InboundFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                recording::record_malformed_frame();
                return;
            }
        };

        match frame {
            InboundFrame::Begin { message_id } => {
                recording::record_frame("begin");
                if self.is_frozen(&message_id) {
                    debug!(message_id = %message_id, "begin for settled message dropped");
                } else if self.assembler.begin_stream(&message_id) {
                    self.emit(PresentationEvent::Typing { message_id }).await;
                }
            }
            InboundFrame::Chunk {
                message_id,
                payload,
            } => {
                recording::record_frame("chunk");
                if self.is_frozen(&message_id) {
                    debug!(message_id = %message_id, "chunk for settled message dropped");
                } else if let Some(update) = self.assembler.append_chunk(&message_id, &payload) {
                    recording::record_flushes(1);
                    self.forward_stream_update(update).await;
                }
            }
            InboundFrame::Complete { message_id } => {
                recording::record_frame("complete");
                if let Some(update) = self.assembler.complete_stream(&message_id) {
                    recording::record_flushes(1);
                    self.forward_stream_update(update).await;
                }
            }
            InboundFrame::Message {
                message_id,
                payload,
            } => {
                recording::record_frame("message");
                let message = Message {
                    id: message_id,
                    role: payload.role,
                    content: payload.content,
                    created_at: payload.created_at.unwrap_or_else(now_timestamp),
                    status: payload.status.unwrap_or(DeliveryStatus::Delivered),
                    deleted: false,
                };
                self.apply(ReconcileEvent::NewMessage(message)).await;
            }
            InboundFrame::Status {
                message_id,
                payload,
            } => {
                recording::record_frame("status");
                self.mark_status(&message_id, payload).await;
            }
        }
        recording::set_active_streams(self.assembler.active_count());
    }

    /// Whether the log holds `message_id` with content that can no longer
    /// change. The assembler's finalized set only remembers recent ids.
    fn is_frozen(&self, message_id: &MessageId) -> bool {
        self.reconciler
            .log()
            .get(message_id)
            .is_some_and(|m| !m.is_content_mutable())
    }

    async fn flush(&mut self) {
        let updates = self.assembler.flush_due();
        if updates.is_empty() {
            return;
        }
        recording::record_flushes(updates.len());
        for update in updates {
            self.forward_stream_update(update).await;
        }
    }

    async fn forward_stream_update(&mut self, update: StreamUpdate) {
        self.emit(PresentationEvent::StreamProgress {
            message_id: update.message_id.clone(),
            metadata: update.metadata,
            completed: update.completed,
        })
        .await;
        self.apply(ReconcileEvent::StreamingUpdate {
            message_id: update.message_id,
            content: update.content,
            completed: update.completed,
        })
        .await;
    }

    async fn replay(&mut self) {
        let report = self.sync.replay().await;
        for event in report.events {
            match event {
                SyncEvent::Delivered { action } => {
                    recording::record_action(action.kind(), "replayed");
                    if action.kind() == ActionKind::SendMessage {
                        self.mark_status(&action.message_id, DeliveryStatus::Delivered)
                            .await;
                    }
                }
                SyncEvent::RetryScheduled { .. } => {}
                SyncEvent::DeadLettered { letter } => {
                    recording::record_action(letter.action.kind(), "dead_lettered");
                    self.fail_message(&letter.action.message_id, letter.reason)
                        .await;
                }
            }
        }
        self.replay_at = report.next_sweep.map(|delay| Instant::now() + delay);
        recording::set_pending_actions(self.sync.pending_count());
    }

    async fn mark_status(&mut self, message_id: &MessageId, status: DeliveryStatus) {
        self.apply(ReconcileEvent::StatusChange {
            message_id: message_id.clone(),
            status,
        })
        .await;
    }

    async fn fail_message(&mut self, message_id: &MessageId, reason: String) {
        self.apply(ReconcileEvent::StatusOverride {
            message_id: message_id.clone(),
            status: DeliveryStatus::Failed,
        })
        .await;
        self.emit(PresentationEvent::ActionFailed {
            message_id: message_id.clone(),
            reason,
        })
        .await;
    }

    /// Applies `event` to the log, persists the diff, and forwards it.
    async fn apply(&mut self, event: ReconcileEvent) {
        let diff = self.reconciler.apply(event);
        let persisted = match &diff {
            Diff::Append { message, .. } => self.messages.append_message(message).await,
            Diff::UpdateInPlace { message, .. } => self.messages.update_message(message).await,
            Diff::FullReload { .. } | Diff::Unchanged => Ok(()),
        };
        if let Err(e) = persisted {
            warn!(error = %e, "failed to persist message change");
        }
        if !diff.is_unchanged() {
            self.emit(PresentationEvent::Diff(diff)).await;
        }
    }

    async fn emit(&self, event: PresentationEvent) {
        if self.presentation.send(event).await.is_err() {
            debug!("presentation receiver dropped");
        }
    }

    fn attach_view(&mut self) {
        if self.view.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let ticker = spawn_flush_ticker(self.flush_interval, self.tick_tx.clone(), cancel.clone());
        self.view = Some(ViewScope { cancel, ticker });
        debug!(interval_ms = self.flush_interval.as_millis() as u64, "view attached");
    }

    fn detach_view(&mut self) {
        let Some(view) = self.view.take() else {
            return;
        };
        view.cancel.cancel();
        view.ticker.abort();
        let released = self.assembler.cancel_all();
        while self.ticks.try_recv().is_ok() {}
        recording::set_active_streams(0);
        debug!(released, "view detached");
    }
}

/// Status a message returns to when its dead letters are requeued.
///
/// A pending send puts it back to `sending`; otherwise the last requested
/// status update is reapplied, and a retried deletion alone leaves it
/// `delivered`.
fn retry_status<'a>(payloads: impl Iterator<Item = &'a ActionPayload>) -> DeliveryStatus {
    let mut status = DeliveryStatus::Delivered;
    for payload in payloads {
        match payload {
            ActionPayload::SendMessage { .. } => return DeliveryStatus::Sending,
            ActionPayload::UpdateStatus { status: requested } => status = *requested,
            ActionPayload::DeleteMessage => {}
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chatline_core::{
        AdapterType, Credentials, HealthStatus, PluginAdapter, Role, TransportLink,
    };
    use chatline_storage::MemoryStore;
    use tracing_test::traced_test;

    use super::*;

    /// A transport whose endpoint is never reachable.
    struct OfflineTransport;

    #[async_trait]
    impl PluginAdapter for OfflineTransport {
        fn name(&self) -> &str {
            "offline"
        }

        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }

        fn adapter_type(&self) -> AdapterType {
            AdapterType::Transport
        }

        async fn health_check(&self) -> Result<HealthStatus, ChatlineError> {
            Ok(HealthStatus::Unhealthy("offline".to_string()))
        }

        async fn shutdown(&self) -> Result<(), ChatlineError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for OfflineTransport {
        async fn open(
            &self,
            _endpoint: &str,
            _credentials: &Credentials,
        ) -> Result<TransportLink, ChatlineError> {
            Err(ChatlineError::transport("unreachable"))
        }
    }

    fn pipeline() -> (
        ChatPipeline,
        mpsc::Receiver<PresentationEvent>,
        Arc<MemoryStore>,
    ) {
        pipeline_with(&ChatlineConfig::default())
    }

    fn pipeline_with(
        config: &ChatlineConfig,
    ) -> (
        ChatPipeline,
        mpsc::Receiver<PresentationEvent>,
        Arc<MemoryStore>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let (pipeline, _handle, events) = ChatPipeline::new(
            config,
            Arc::new(OfflineTransport),
            store.clone(),
            store.clone(),
        );
        (pipeline, events, store)
    }

    fn frame(text: &str) -> CoordinatorEvent {
        CoordinatorEvent::Frame(text.to_string())
    }

    fn drain(events: &mut mpsc::Receiver<PresentationEvent>) -> Vec<PresentationEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    #[traced_test]
    async fn malformed_frame_is_dropped_without_disturbing_sessions() {
        let (mut pipeline, mut events, _store) = pipeline();
        pipeline
            .handle_coordinator_event(frame(r#"{"type":"chunk","messageId":"m1","payload":"Hel"}"#))
            .await;
        pipeline.handle_coordinator_event(frame("{not json")).await;
        pipeline
            .handle_coordinator_event(frame(r#"{"type":"chunk","messageId":"m1","payload":"lo"}"#))
            .await;
        pipeline
            .handle_coordinator_event(frame(r#"{"type":"complete","messageId":"m1"}"#))
            .await;

        assert!(logs_contain("dropping malformed frame"));
        let message = pipeline
            .reconciler
            .log()
            .get(&MessageId::from("m1"))
            .cloned()
            .unwrap();
        assert_eq!(message.content, "Hello");
        assert_eq!(message.status, DeliveryStatus::Delivered);
        assert!(
            drain(&mut events)
                .iter()
                .any(|e| matches!(e, PresentationEvent::Diff(Diff::Append { .. })))
        );
    }

    #[tokio::test]
    async fn begin_frame_emits_typing_once() {
        let (mut pipeline, mut events, _store) = pipeline();
        let begin = r#"{"type":"begin","messageId":"m1"}"#;
        pipeline.handle_coordinator_event(frame(begin)).await;
        pipeline.handle_coordinator_event(frame(begin)).await;

        let typing = drain(&mut events)
            .into_iter()
            .filter(|e| matches!(e, PresentationEvent::Typing { .. }))
            .count();
        assert_eq!(typing, 1);
    }

    #[tokio::test]
    async fn tick_flush_appends_then_updates_in_place() {
        let (mut pipeline, mut events, store) = pipeline();
        pipeline
            .handle_coordinator_event(frame(r#"{"type":"chunk","messageId":"m1","payload":"a"}"#))
            .await;
        pipeline.flush().await;
        pipeline
            .handle_coordinator_event(frame(r#"{"type":"chunk","messageId":"m1","payload":"b"}"#))
            .await;
        pipeline.flush().await;

        let diffs: Vec<Diff> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                PresentationEvent::Diff(d) => Some(d),
                _ => None,
            })
            .collect();
        assert!(matches!(diffs[0], Diff::Append { index: 0, .. }));
        match &diffs[1] {
            Diff::UpdateInPlace { index, message } => {
                assert_eq!(*index, 0);
                assert_eq!(message.content, "ab");
            }
            other => panic!("unexpected diff {other:?}"),
        }
        assert_eq!(store.message_snapshot()[0].content, "ab");
    }

    #[tokio::test]
    async fn whole_message_frame_appends_delivered_message() {
        let (mut pipeline, _events, store) = pipeline();
        pipeline
            .handle_coordinator_event(frame(
                r#"{"type":"message","messageId":"s1","payload":{"role":"system","content":"welcome"}}"#,
            ))
            .await;
        let stored = store.message_snapshot();
        assert_eq!(stored[0].role, Role::System);
        assert_eq!(stored[0].status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn send_while_disconnected_is_queued() {
        let (mut pipeline, mut events, store) = pipeline();
        let sent = pipeline.send_message("hello".to_string()).await.unwrap();

        assert_eq!(sent.outcome, SubmitOutcome::Queued);
        assert_eq!(store.queue_snapshot().len(), 1);
        let message = pipeline.reconciler.log().get(&sent.message_id).unwrap();
        assert_eq!(message.status, DeliveryStatus::Sending);
        assert!(matches!(
            drain(&mut events).first(),
            Some(PresentationEvent::Diff(Diff::Append {
                follow_eligible: true,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn storage_failure_on_submit_fails_the_message() {
        let (mut pipeline, mut events, store) = pipeline();
        store.set_fail_writes(true);
        let err = pipeline.send_message("x".to_string()).await.unwrap_err();
        assert!(matches!(err, ChatlineError::Storage { .. }));
        assert!(
            drain(&mut events)
                .iter()
                .any(|e| matches!(e, PresentationEvent::ActionFailed { .. }))
        );
    }

    #[tokio::test]
    async fn detach_view_releases_sessions() {
        let (mut pipeline, _events, _store) = pipeline();
        pipeline.attach_view();
        pipeline
            .handle_coordinator_event(frame(r#"{"type":"chunk","messageId":"m1","payload":"a"}"#))
            .await;
        assert_eq!(pipeline.status().active_streams, 1);

        pipeline.detach_view();
        let status = pipeline.status();
        assert_eq!(status.active_streams, 0);
        assert!(!status.view_attached);
    }

    #[tokio::test]
    async fn late_chunk_for_completed_stream_is_dropped_after_eviction() {
        let mut config = ChatlineConfig::default();
        config.streaming.finalized_capacity = 2;
        let (mut pipeline, mut events, _store) = pipeline_with(&config);

        for n in 0..3 {
            let chunk = format!(r#"{{"type":"chunk","messageId":"s{n}","payload":"done"}}"#);
            let complete = format!(r#"{{"type":"complete","messageId":"s{n}"}}"#);
            pipeline.handle_coordinator_event(frame(&chunk)).await;
            pipeline.handle_coordinator_event(frame(&complete)).await;
        }
        assert!(!pipeline.assembler.is_finalized(&MessageId::from("s0")));
        drain(&mut events);

        pipeline
            .handle_coordinator_event(frame(r#"{"type":"begin","messageId":"s0"}"#))
            .await;
        pipeline
            .handle_coordinator_event(frame(r#"{"type":"chunk","messageId":"s0","payload":"late"}"#))
            .await;
        pipeline.flush().await;

        assert_eq!(pipeline.status().active_streams, 0);
        assert!(drain(&mut events).is_empty());
        let s0 = pipeline.reconciler.log().get(&MessageId::from("s0")).unwrap();
        assert_eq!(s0.content, "done");
        assert_eq!(s0.status, DeliveryStatus::Delivered);
    }

    #[test]
    fn retry_restores_the_status_the_actions_were_heading_for() {
        let send = ActionPayload::SendMessage {
            content: "hi".to_string(),
        };
        let read = ActionPayload::UpdateStatus {
            status: DeliveryStatus::Read,
        };
        let delete = ActionPayload::DeleteMessage;

        assert_eq!(retry_status([&read, &send].into_iter()), DeliveryStatus::Sending);
        assert_eq!(retry_status([&read, &delete].into_iter()), DeliveryStatus::Read);
        assert_eq!(retry_status([&delete].into_iter()), DeliveryStatus::Delivered);
    }
}
