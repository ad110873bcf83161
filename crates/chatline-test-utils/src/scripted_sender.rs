// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Frame sender with scripted results, for driving the sync manager alone.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use chatline_core::{ChatlineError, FrameSender, OutboundFrame};

/// Result of one scripted send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResult {
    Ok,
    NotConnected,
    /// A transport failure with the given message.
    Fail(String),
}

/// A [`FrameSender`] that replays a script and records accepted frames.
///
/// Once the script runs out every send succeeds while connected.
#[derive(Default)]
pub struct ScriptedSender {
    connected: AtomicBool,
    script: Mutex<VecDeque<ScriptedResult>>,
    sent: Mutex<Vec<OutboundFrame>>,
}

impl ScriptedSender {
    pub fn connected() -> Self {
        let sender = Self::default();
        sender.set_connected(true);
        sender
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Append results for upcoming sends.
    pub fn push_results(&self, results: impl IntoIterator<Item = ScriptedResult>) {
        if let Ok(mut script) = self.script.lock() {
            script.extend(results);
        }
    }

    pub fn sent(&self) -> Vec<OutboundFrame> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FrameSender for ScriptedSender {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, frame: &OutboundFrame) -> Result<(), ChatlineError> {
        if !self.is_connected() {
            return Err(ChatlineError::NotConnected);
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or(ScriptedResult::Ok);
        match next {
            ScriptedResult::Ok => {
                if let Ok(mut sent) = self.sent.lock() {
                    sent.push(frame.clone());
                }
                Ok(())
            }
            ScriptedResult::NotConnected => {
                self.set_connected(false);
                Err(ChatlineError::NotConnected)
            }
            ScriptedResult::Fail(message) => Err(ChatlineError::transport(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chatline_core::MessageId;

    use super::*;

    #[tokio::test]
    async fn follows_script_then_succeeds() {
        let sender = ScriptedSender::connected();
        sender.push_results([ScriptedResult::Fail("boom".to_string())]);
        let frame = OutboundFrame::Delete {
            message_id: MessageId::from("m1"),
        };

        assert!(sender.send(&frame).await.is_err());
        assert!(sender.send(&frame).await.is_ok());
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn scripted_disconnect_sticks() {
        let sender = ScriptedSender::connected();
        sender.push_results([ScriptedResult::NotConnected]);
        let frame = OutboundFrame::Delete {
            message_id: MessageId::from("m1"),
        };

        assert!(matches!(
            sender.send(&frame).await,
            Err(ChatlineError::NotConnected)
        ));
        assert!(!sender.is_connected());
    }
}
