// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter trait for the persistent duplex connection.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

use crate::error::ChatlineError;
use crate::traits::adapter::PluginAdapter;

/// Credentials presented when opening a link. The token never appears in logs.
#[derive(Debug, Default)]
pub struct Credentials {
    token: Option<SecretString>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        let token: String = token.into();
        Self {
            token: Some(SecretString::new(token.into_boxed_str())),
        }
    }

    /// Value for an `Authorization` header, if a token is present.
    pub fn authorization_header(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()))
    }
}

/// Something a transport reports about an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Frame(String),
    /// The link closed. The receiver ends right after this event.
    Closed { reason: String },
}

/// Write half of an open link.
#[async_trait]
pub trait FrameWriter: Send + 'static {
    /// Writes one text frame. Returns once the transport has accepted it.
    async fn write(&mut self, frame: String) -> Result<(), ChatlineError>;

    /// Closes the link intentionally.
    async fn close(&mut self) -> Result<(), ChatlineError>;
}

/// An open duplex link: a writer plus the stream of inbound events.
pub struct TransportLink {
    pub writer: Box<dyn FrameWriter>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for TransportLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportLink").finish_non_exhaustive()
    }
}

/// Adapter that can open duplex links to the chat service.
#[async_trait]
pub trait Transport: PluginAdapter {
    /// Opens a new link. Every call produces an independent link.
    async fn open(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<TransportLink, ChatlineError>;
}
