// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Chatline streaming pipeline.

use thiserror::Error;

use crate::types::MessageId;

/// The primary error type used across all Chatline traits and core operations.
#[derive(Debug, Error)]
pub enum ChatlineError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A send was attempted while the connection is not in the connected state.
    ///
    /// Recoverable: callers route the action through the offline sync manager.
    #[error("not connected")]
    NotConnected,

    /// Transport-level read/write/open failure.
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An outbound action failed on every replay attempt and was dead-lettered.
    #[error("replay exhausted for action {action_id} (message {message_id}) after {attempts} attempts")]
    ReplayExhausted {
        action_id: String,
        message_id: MessageId,
        attempts: u32,
    },

    /// An inbound payload could not be parsed into a frame.
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatlineError {
    /// Convenience constructor for a transport failure without a source error.
    pub fn transport(message: impl Into<String>) -> Self {
        ChatlineError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error means the action should be held for later replay
    /// rather than reported as a failure of the action itself.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ChatlineError::NotConnected
                | ChatlineError::Transport { .. }
                | ChatlineError::Timeout { .. }
        )
    }
}
