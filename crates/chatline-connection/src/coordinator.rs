// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection coordinator: owns the duplex link and its state machine.
//!
//! The public [`ConnectionCoordinator`] is a cloneable handle. A background
//! task owns the transport link and is driven by a command channel; state is
//! published through a `watch` channel and transitions plus inbound frames are
//! forwarded as [`CoordinatorEvent`]s.
//!
//! Transitions:
//! - `disconnected -> connecting` on `connect`
//! - `connecting -> connected | reconnecting`
//! - `connected -> reconnecting` on unexpected close or write failure
//! - `reconnecting -> connected | reconnecting` (attempt incremented)
//! - `* -> disconnected` on `disconnect`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use chatline_config::model::ConnectionConfig;
use chatline_core::{
    ChatlineError, ConnectionSnapshot, ConnectionState, Credentials, FrameSender, OutboundFrame,
    Transport, TransportEvent, TransportLink,
};
use chatline_resilience::BackoffPolicy;

const COMMAND_BUFFER: usize = 64;

/// Timing knobs for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorSettings {
    pub backoff: BackoffPolicy,
    /// A link must stay open this long before the attempt counter resets.
    pub stability_window: Duration,
    pub connect_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&ConnectionConfig::default())
    }
}

impl From<&ConnectionConfig> for CoordinatorSettings {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            backoff: BackoffPolicy::new(
                config.base_delay(),
                config.max_delay(),
                config.jitter_ratio,
            ),
            stability_window: config.stability_window(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// Output of the coordinator task, consumed by the pipeline's serial context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    StateChanged {
        previous: ConnectionSnapshot,
        current: ConnectionSnapshot,
    },
    /// A raw inbound text frame, not yet decoded.
    Frame(String),
}

enum Command {
    Connect {
        endpoint: String,
        credentials: Arc<Credentials>,
        reply: oneshot::Sender<ConnectionSnapshot>,
    },
    Send {
        frame: String,
        reply: oneshot::Sender<Result<(), ChatlineError>>,
    },
    Disconnect {
        reply: oneshot::Sender<ConnectionSnapshot>,
    },
}

/// Handle to the connection task.
#[derive(Clone)]
pub struct ConnectionCoordinator {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionSnapshot>,
}

impl ConnectionCoordinator {
    /// Spawn the connection task. It starts `disconnected` and stops once
    /// every handle has been dropped.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        settings: CoordinatorSettings,
        events: mpsc::UnboundedSender<CoordinatorEvent>,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state) = watch::channel(ConnectionSnapshot::default());

        let worker = Worker {
            transport,
            settings,
            events,
            state: state_tx,
            target: None,
            link: None,
            attempt: 0,
            retry_at: None,
            stable_at: None,
        };
        tokio::spawn(worker.run(command_rx));

        Self { commands, state }
    }

    /// Current state, safe to read from any task.
    pub fn snapshot(&self) -> ConnectionSnapshot {
        *self.state.borrow()
    }

    /// A receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.state.clone()
    }

    /// Establish the link and return the resulting state.
    ///
    /// A failed first attempt yields `reconnecting`; retries continue in the
    /// background until `disconnect` is called.
    pub async fn connect(
        &self,
        endpoint: impl Into<String>,
        credentials: Credentials,
    ) -> Result<ConnectionSnapshot, ChatlineError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Command::Connect {
                endpoint: endpoint.into(),
                credentials: Arc::new(credentials),
                reply,
            },
            rx,
        )
        .await
    }

    /// Transmit an already-serialized frame.
    pub async fn send_text(&self, frame: String) -> Result<(), ChatlineError> {
        if !self.snapshot().is_connected() {
            return Err(ChatlineError::NotConnected);
        }
        let (reply, rx) = oneshot::channel();
        self.request(Command::Send { frame, reply }, rx).await?
    }

    /// Serialize and transmit an outbound frame.
    pub async fn send_frame(&self, frame: &OutboundFrame) -> Result<(), ChatlineError> {
        self.send_text(frame.encode()?).await
    }

    /// Tear the link down intentionally. No reconnect follows.
    pub async fn disconnect(&self) -> Result<ConnectionSnapshot, ChatlineError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Disconnect { reply }, rx).await
    }

    async fn request<T>(
        &self,
        command: Command,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, ChatlineError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ChatlineError::Internal("connection task stopped".to_string()))?;
        rx.await
            .map_err(|_| ChatlineError::Internal("connection task dropped reply".to_string()))
    }
}

#[async_trait]
impl FrameSender for ConnectionCoordinator {
    fn is_connected(&self) -> bool {
        self.snapshot().is_connected()
    }

    async fn send(&self, frame: &OutboundFrame) -> Result<(), ChatlineError> {
        self.send_frame(frame).await
    }
}

struct Target {
    endpoint: String,
    credentials: Arc<Credentials>,
}

struct Worker {
    transport: Arc<dyn Transport>,
    settings: CoordinatorSettings,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    state: watch::Sender<ConnectionSnapshot>,
    /// Where to (re)connect. `None` after an explicit disconnect.
    target: Option<Target>,
    link: Option<TransportLink>,
    attempt: u32,
    retry_at: Option<Instant>,
    stable_at: Option<Instant>,
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365)
}

async fn next_link_event(link: &mut Option<TransportLink>) -> TransportEvent {
    match link {
        Some(link) => link.events.recv().await.unwrap_or_else(|| TransportEvent::Closed {
            reason: "link dropped".to_string(),
        }),
        None => std::future::pending().await,
    }
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            let retry_at = self.retry_at;
            let stable_at = self.stable_at;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                event = next_link_event(&mut self.link) => self.on_link_event(event).await,
                _ = sleep_until(retry_at.unwrap_or_else(far_future)), if retry_at.is_some() => {
                    self.retry_at = None;
                    self.try_connect().await;
                }
                _ = sleep_until(stable_at.unwrap_or_else(far_future)), if stable_at.is_some() => {
                    self.stable_at = None;
                    self.mark_stable();
                }
            }
        }

        self.close_link().await;
        debug!("connection task stopped");
    }

    fn snapshot(&self) -> ConnectionSnapshot {
        *self.state.borrow()
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Connect {
                endpoint,
                credentials,
                reply,
            } => {
                self.connect(endpoint, credentials).await;
                let _ = reply.send(self.snapshot());
            }
            Command::Send { frame, reply } => {
                let result = self.write(frame).await;
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn connect(&mut self, endpoint: String, credentials: Arc<Credentials>) {
        let same_endpoint = self
            .target
            .as_ref()
            .is_some_and(|t| t.endpoint == endpoint);
        if same_endpoint && self.link.is_some() {
            return;
        }

        self.close_link().await;
        self.stable_at = None;
        self.retry_at = None;
        self.target = Some(Target {
            endpoint,
            credentials,
        });

        if self.snapshot().state == ConnectionState::Disconnected {
            self.attempt = 0;
            self.transition(ConnectionState::Connecting);
        }
        self.try_connect().await;
    }

    async fn try_connect(&mut self) {
        let Some(target) = self.target.as_ref() else {
            return;
        };
        let endpoint = target.endpoint.clone();
        let credentials = Arc::clone(&target.credentials);
        debug!(endpoint = %endpoint, attempt = self.attempt, "opening link");

        let timeout = self.settings.connect_timeout;
        let opened =
            tokio::time::timeout(timeout, self.transport.open(&endpoint, &credentials)).await;

        match opened {
            Ok(Ok(link)) => {
                self.link = Some(link);
                self.stable_at = Some(Instant::now() + self.settings.stability_window);
                info!(endpoint = %endpoint, attempt = self.attempt, "connected");
                self.transition(ConnectionState::Connected);
            }
            Ok(Err(e)) => {
                warn!(endpoint = %endpoint, error = %e, "connect failed");
                self.schedule_retry();
            }
            Err(_) => {
                warn!(
                    endpoint = %endpoint,
                    timeout_ms = timeout.as_millis() as u64,
                    "connect timed out"
                );
                self.schedule_retry();
            }
        }
    }

    fn schedule_retry(&mut self) {
        let delay = self.settings.backoff.next_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.retry_at = Some(Instant::now() + delay);
        info!(
            attempt = self.attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
        self.transition(ConnectionState::Reconnecting);
    }

    fn mark_stable(&mut self) {
        if self.attempt == 0 {
            return;
        }
        debug!(attempts = self.attempt, "link stable, resetting attempt counter");
        self.attempt = 0;
        let state = self.snapshot().state;
        self.state.send_replace(ConnectionSnapshot { state, attempt: 0 });
    }

    async fn on_link_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(text) => {
                let _ = self.events.send(CoordinatorEvent::Frame(text));
            }
            TransportEvent::Closed { reason } => {
                warn!(reason = %reason, "link closed unexpectedly");
                self.link = None;
                self.stable_at = None;
                if self.target.is_some() {
                    self.schedule_retry();
                } else {
                    self.transition(ConnectionState::Disconnected);
                }
            }
        }
    }

    async fn write(&mut self, frame: String) -> Result<(), ChatlineError> {
        let Some(link) = self.link.as_mut() else {
            return Err(ChatlineError::NotConnected);
        };

        let written = link.writer.write(frame).await;
        match written {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "write failed, reconnecting");
                self.close_link().await;
                self.stable_at = None;
                self.schedule_retry();
                Err(match e {
                    e @ ChatlineError::Transport { .. } => e,
                    other => ChatlineError::Transport {
                        message: other.to_string(),
                        source: Some(Box::new(other)),
                    },
                })
            }
        }
    }

    async fn disconnect(&mut self) {
        self.target = None;
        self.retry_at = None;
        self.stable_at = None;
        self.close_link().await;
        self.attempt = 0;
        info!("disconnected");
        self.transition(ConnectionState::Disconnected);
    }

    async fn close_link(&mut self) {
        if let Some(mut link) = self.link.take()
            && let Err(e) = link.writer.close().await
        {
            debug!(error = %e, "error while closing link");
        }
    }

    /// Publish a new snapshot. State changes, and every step of a reconnect
    /// series, are forwarded as events.
    fn transition(&mut self, state: ConnectionState) {
        let previous = self.snapshot();
        let current = ConnectionSnapshot {
            state,
            attempt: self.attempt,
        };
        if previous == current {
            return;
        }
        self.state.send_replace(current);
        if previous.state != current.state || state == ConnectionState::Reconnecting {
            debug!(
                from = %previous.state,
                to = %current.state,
                attempt = current.attempt,
                "connection state changed"
            );
            let _ = self
                .events
                .send(CoordinatorEvent::StateChanged { previous, current });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use chatline_core::{AdapterType, FrameWriter, HealthStatus, MessageId, PluginAdapter};

    #[derive(Default)]
    struct StubTransport {
        /// Scripted results for successive opens; empty means success.
        script: Mutex<VecDeque<Result<(), String>>>,
        opens: AtomicUsize,
        fail_writes: Arc<AtomicBool>,
        written: Arc<Mutex<Vec<String>>>,
        inbound: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    }

    impl StubTransport {
        fn scripted(results: Vec<Result<(), String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(results.into()),
                ..Self::default()
            })
        }

        fn inbound(&self) -> mpsc::Sender<TransportEvent> {
            self.inbound.lock().unwrap().clone().expect("no open link")
        }
    }

    struct StubWriter {
        fail: Arc<AtomicBool>,
        written: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl FrameWriter for StubWriter {
        async fn write(&mut self, frame: String) -> Result<(), ChatlineError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ChatlineError::transport("broken pipe"));
            }
            self.written.lock().unwrap().push(frame);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ChatlineError> {
            Ok(())
        }
    }

    #[async_trait]
    impl PluginAdapter for StubTransport {
        fn name(&self) -> &str {
            "stub"
        }

        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }

        fn adapter_type(&self) -> AdapterType {
            AdapterType::Transport
        }

        async fn health_check(&self) -> Result<HealthStatus, ChatlineError> {
            Ok(HealthStatus::Healthy)
        }

        async fn shutdown(&self) -> Result<(), ChatlineError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn open(
            &self,
            _endpoint: &str,
            _credentials: &Credentials,
        ) -> Result<TransportLink, ChatlineError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
            next.map_err(ChatlineError::transport)?;
            let (tx, events) = mpsc::channel(16);
            *self.inbound.lock().unwrap() = Some(tx);
            Ok(TransportLink {
                writer: Box::new(StubWriter {
                    fail: Arc::clone(&self.fail_writes),
                    written: Arc::clone(&self.written),
                }),
                events,
            })
        }
    }

    fn settings() -> CoordinatorSettings {
        CoordinatorSettings {
            backoff: BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(1), 0.0),
            stability_window: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    fn spawn(
        transport: Arc<StubTransport>,
    ) -> (
        ConnectionCoordinator,
        mpsc::UnboundedReceiver<CoordinatorEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionCoordinator::spawn(transport, settings(), tx), rx)
    }

    fn drain_states(rx: &mut mpsc::UnboundedReceiver<CoordinatorEvent>) -> Vec<ConnectionState> {
        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let CoordinatorEvent::StateChanged { current, .. } = event {
                states.push(current.state);
            }
        }
        states
    }

    #[tokio::test(start_paused = true)]
    async fn connect_publishes_connected() {
        let transport = StubTransport::scripted(vec![]);
        let (coordinator, mut events) = spawn(transport);

        let snapshot = coordinator
            .connect("ws://chat", Credentials::anonymous())
            .await
            .unwrap();
        assert_eq!(snapshot.state, ConnectionState::Connected);
        assert!(coordinator.is_connected());
        assert_eq!(
            drain_states(&mut events),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_first_attempt_moves_to_reconnecting_then_recovers() {
        let transport = StubTransport::scripted(vec![Err("refused".into())]);
        let (coordinator, mut events) = spawn(Arc::clone(&transport));

        let snapshot = coordinator
            .connect("ws://chat", Credentials::anonymous())
            .await
            .unwrap();
        assert_eq!(snapshot.state, ConnectionState::Reconnecting);
        assert_eq!(snapshot.attempt, 1);

        let mut state = coordinator.subscribe();
        state.wait_for(|s| s.is_connected()).await.unwrap();
        assert_eq!(transport.opens.load(Ordering::SeqCst), 2);
        assert_eq!(
            drain_states(&mut events),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Reconnecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_while_disconnected_fails_fast() {
        let (coordinator, _events) = spawn(StubTransport::scripted(vec![]));
        let err = coordinator.send_text("x".to_string()).await.unwrap_err();
        assert!(matches!(err, ChatlineError::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn sent_frames_reach_the_writer() {
        let transport = StubTransport::scripted(vec![]);
        let (coordinator, _events) = spawn(Arc::clone(&transport));
        coordinator
            .connect("ws://chat", Credentials::anonymous())
            .await
            .unwrap();

        let frame = OutboundFrame::Delete {
            message_id: MessageId::from("m1"),
        };
        FrameSender::send(&coordinator, &frame).await.unwrap();
        assert_eq!(
            transport.written.lock().unwrap().as_slice(),
            [r#"{"type":"delete","messageId":"m1"}"#]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_close_triggers_reconnect() {
        let transport = StubTransport::scripted(vec![]);
        let (coordinator, mut events) = spawn(Arc::clone(&transport));
        coordinator
            .connect("ws://chat", Credentials::anonymous())
            .await
            .unwrap();

        transport
            .inbound()
            .send(TransportEvent::Closed {
                reason: "server going away".into(),
            })
            .await
            .unwrap();

        let mut state = coordinator.subscribe();
        state
            .wait_for(|s| s.state == ConnectionState::Reconnecting)
            .await
            .unwrap();
        state.wait_for(|s| s.is_connected()).await.unwrap();
        assert_eq!(transport.opens.load(Ordering::SeqCst), 2);
        assert_eq!(
            drain_states(&mut events),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Reconnecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_reports_transport_error_and_reconnects() {
        let transport = StubTransport::scripted(vec![]);
        let (coordinator, _events) = spawn(Arc::clone(&transport));
        coordinator
            .connect("ws://chat", Credentials::anonymous())
            .await
            .unwrap();

        transport.fail_writes.store(true, Ordering::SeqCst);
        let err = coordinator.send_text("x".into()).await.unwrap_err();
        assert!(matches!(err, ChatlineError::Transport { .. }));
        assert_eq!(coordinator.snapshot().state, ConnectionState::Reconnecting);
        assert_eq!(coordinator.snapshot().attempt, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_counter_resets_only_after_stability_window() {
        let transport =
            StubTransport::scripted(vec![Err("refused".into()), Err("refused".into())]);
        let (coordinator, _events) = spawn(Arc::clone(&transport));
        coordinator
            .connect("ws://chat", Credentials::anonymous())
            .await
            .unwrap();

        let mut state = coordinator.subscribe();
        state.wait_for(|s| s.is_connected()).await.unwrap();
        assert_eq!(coordinator.snapshot().attempt, 2);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(coordinator.snapshot().attempt, 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(coordinator.snapshot().attempt, 0);
        assert!(coordinator.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_stops_reconnecting() {
        let transport = StubTransport::scripted(vec![Err("refused".into()); 3]);
        let (coordinator, _events) = spawn(Arc::clone(&transport));
        coordinator
            .connect("ws://chat", Credentials::anonymous())
            .await
            .unwrap();

        let snapshot = coordinator.disconnect().await.unwrap();
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
        assert_eq!(snapshot.attempt, 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.snapshot().state, ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_frames_are_forwarded() {
        let transport = StubTransport::scripted(vec![]);
        let (coordinator, mut events) = spawn(Arc::clone(&transport));
        coordinator
            .connect("ws://chat", Credentials::anonymous())
            .await
            .unwrap();

        transport
            .inbound()
            .send(TransportEvent::Frame("hello".into()))
            .await
            .unwrap();

        loop {
            match events.recv().await.unwrap() {
                CoordinatorEvent::Frame(text) => {
                    assert_eq!(text, "hello");
                    break;
                }
                CoordinatorEvent::StateChanged { .. } => continue,
            }
        }
    }
}
