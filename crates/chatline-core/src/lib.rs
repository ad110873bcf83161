// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Chatline streaming message pipeline.
//!
//! This crate provides the error type, domain types, wire frames, and the
//! adapter traits shared by every other crate in the workspace.

pub mod error;
pub mod frame;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ChatlineError;
pub use frame::{InboundFrame, MessagePayload, OutboundFrame};
pub use types::{
    ActionKind, ActionPayload, ActionRequest, AdapterType, ConnectionSnapshot, ConnectionState,
    DeadLetter, DeliveryStatus, HealthStatus, Message, MessageId, QueuedAction, Role,
    SubmitOutcome, now_timestamp,
};

pub use traits::{
    Credentials, FrameSender, FrameWriter, MessageStore, PluginAdapter, QueueStore,
    StorageAdapter, Transport, TransportEvent, TransportLink,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_errors_are_recoverable() {
        assert!(ChatlineError::NotConnected.is_connectivity());
        assert!(ChatlineError::transport("reset").is_connectivity());
        assert!(
            ChatlineError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }
            .is_connectivity()
        );
        assert!(!ChatlineError::Internal("bug".into()).is_connectivity());
        assert!(
            !ChatlineError::MalformedFrame {
                reason: "x".into()
            }
            .is_connectivity()
        );
    }

    #[test]
    fn default_snapshot_is_disconnected() {
        let snap = ConnectionSnapshot::default();
        assert_eq!(snap.state, ConnectionState::Disconnected);
        assert_eq!(snap.attempt, 0);
        assert!(!snap.is_connected());
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_transport<T: Transport>() {}
        fn _assert_message_store<T: MessageStore>() {}
        fn _assert_queue_store<T: QueueStore>() {}
        fn _assert_frame_sender<T: FrameSender>() {}
    }
}
