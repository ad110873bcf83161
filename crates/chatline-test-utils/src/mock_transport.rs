// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic pipeline testing.
//!
//! `MockTransport` implements `Transport` with scripted connect failures,
//! per-message write rejection, captured outbound frames, and injectable
//! inbound frames and closures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use chatline_core::{
    AdapterType, ChatlineError, Credentials, FrameWriter, HealthStatus, MessageId, OutboundFrame,
    PluginAdapter, Transport, TransportEvent, TransportLink,
};

const LINK_BUFFER: usize = 64;

#[derive(Default)]
struct Shared {
    written: Mutex<Vec<OutboundFrame>>,
    rejected: Mutex<HashSet<MessageId>>,
    attempts: Mutex<HashMap<MessageId, usize>>,
}

/// A transport whose server side is driven by the test.
pub struct MockTransport {
    reachable: AtomicBool,
    fail_next_opens: AtomicUsize,
    opens: AtomicUsize,
    shared: Arc<Shared>,
    inbound: Mutex<Option<mpsc::Sender<TransportEvent>>>,
}

impl MockTransport {
    /// A reachable transport that accepts every write.
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            fail_next_opens: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            shared: Arc::new(Shared::default()),
            inbound: Mutex::new(None),
        }
    }

    /// A transport that refuses every open until made reachable.
    pub fn unreachable() -> Self {
        let transport = Self::new();
        transport.set_reachable(false);
        transport
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Refuse the next `count` opens even while reachable.
    pub fn fail_next_opens(&self, count: usize) {
        self.fail_next_opens.store(count, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Fail every write of a frame for `message_id`.
    pub fn reject_message(&self, message_id: &MessageId) {
        if let Ok(mut rejected) = self.shared.rejected.lock() {
            rejected.insert(message_id.clone());
        }
    }

    pub fn accept_message(&self, message_id: &MessageId) {
        if let Ok(mut rejected) = self.shared.rejected.lock() {
            rejected.remove(message_id);
        }
    }

    /// Frames the "server" received, in write order.
    pub fn written_frames(&self) -> Vec<OutboundFrame> {
        self.shared
            .written
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    /// Writes attempted for `message_id`, successful or not.
    pub fn write_attempts(&self, message_id: &MessageId) -> usize {
        self.shared
            .attempts
            .lock()
            .map(|a| a.get(message_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Deliver a raw text frame on the current link.
    pub async fn inject(&self, frame: impl Into<String>) -> Result<(), ChatlineError> {
        self.push(TransportEvent::Frame(frame.into())).await
    }

    /// Close the current link from the server side.
    pub async fn close_link(&self, reason: impl Into<String>) -> Result<(), ChatlineError> {
        let result = self
            .push(TransportEvent::Closed {
                reason: reason.into(),
            })
            .await;
        if let Ok(mut inbound) = self.inbound.lock() {
            inbound.take();
        }
        result
    }

    async fn push(&self, event: TransportEvent) -> Result<(), ChatlineError> {
        let sender = self
            .inbound
            .lock()
            .ok()
            .and_then(|inbound| inbound.clone())
            .ok_or(ChatlineError::NotConnected)?;
        sender
            .send(event)
            .await
            .map_err(|_| ChatlineError::transport("link receiver dropped"))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

struct MockWriter {
    shared: Arc<Shared>,
}

#[async_trait]
impl FrameWriter for MockWriter {
    async fn write(&mut self, frame: String) -> Result<(), ChatlineError> {
        let parsed: OutboundFrame = serde_json::from_str(&frame)
            .map_err(|e| ChatlineError::Internal(format!("mock transport got bad frame: {e}")))?;
        let message_id = parsed.message_id().clone();

        if let Ok(mut attempts) = self.shared.attempts.lock() {
            *attempts.entry(message_id.clone()).or_default() += 1;
        }
        let rejected = self
            .shared
            .rejected
            .lock()
            .map(|r| r.contains(&message_id))
            .unwrap_or(false);
        if rejected {
            return Err(ChatlineError::transport("write rejected"));
        }
        if let Ok(mut written) = self.shared.written.lock() {
            written.push(parsed);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ChatlineError> {
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
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
impl Transport for MockTransport {
    async fn open(
        &self,
        _endpoint: &str,
        _credentials: &Credentials,
    ) -> Result<TransportLink, ChatlineError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let scripted_failure = self
            .fail_next_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure || !self.reachable.load(Ordering::SeqCst) {
            return Err(ChatlineError::transport("connection refused"));
        }

        let (tx, events) = mpsc::channel(LINK_BUFFER);
        if let Ok(mut inbound) = self.inbound.lock() {
            *inbound = Some(tx);
        }
        Ok(TransportLink {
            writer: Box::new(MockWriter {
                shared: Arc::clone(&self.shared),
            }),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_open_failures_then_success() {
        let transport = MockTransport::new();
        transport.fail_next_opens(2);
        let creds = Credentials::anonymous();

        assert!(transport.open("ws://mock", &creds).await.is_err());
        assert!(transport.open("ws://mock", &creds).await.is_err());
        assert!(transport.open("ws://mock", &creds).await.is_ok());
        assert_eq!(transport.open_count(), 3);
    }

    #[tokio::test]
    async fn writes_are_captured_and_rejections_counted() {
        let transport = MockTransport::new();
        let mut link = transport
            .open("ws://mock", &Credentials::anonymous())
            .await
            .unwrap();
        let m1 = MessageId::from("m1");
        let frame = OutboundFrame::Delete {
            message_id: m1.clone(),
        };

        link.writer.write(frame.encode().unwrap()).await.unwrap();
        transport.reject_message(&m1);
        assert!(link.writer.write(frame.encode().unwrap()).await.is_err());

        assert_eq!(transport.written_frames(), vec![frame]);
        assert_eq!(transport.write_attempts(&m1), 2);
    }

    #[tokio::test]
    async fn injected_frames_reach_the_link() {
        let transport = MockTransport::new();
        let mut link = transport
            .open("ws://mock", &Credentials::anonymous())
            .await
            .unwrap();
        transport.inject("hello").await.unwrap();
        assert_eq!(
            link.events.recv().await,
            Some(TransportEvent::Frame("hello".to_string()))
        );
    }
}
