// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by every Chatline component.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque identifier for a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generates a fresh client-side message id.
    pub fn generate() -> Self {
        MessageId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        MessageId(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        MessageId(value)
    }
}

/// Current time as an RFC 3339 UTC string with millisecond precision.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Delivery status of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Failed,
    Read,
}

impl DeliveryStatus {
    /// Terminal statuses freeze message content.
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeliveryStatus::Sending)
    }

    fn rank(self) -> u8 {
        match self {
            DeliveryStatus::Sending => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Delivered => 2,
            DeliveryStatus::Read => 3,
            DeliveryStatus::Failed => 0,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Statuses only advance (`sending < sent < delivered < read`). `failed`
    /// can be entered before delivery is confirmed, and `failed -> sending`
    /// is the explicit user retry.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        match (self, next) {
            (a, b) if a == b => false,
            (Failed, Sending) => true,
            (Failed, _) => false,
            (Sending | Sent, Failed) => true,
            (_, Failed) => false,
            (a, b) => b.rank() > a.rank(),
        }
    }
}

/// A single chat message as held in the message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: String,
    pub status: DeliveryStatus,
    /// Tombstone marker. Deleted messages keep their slot in the log.
    #[serde(default)]
    pub deleted: bool,
}

impl Message {
    /// A message authored locally by the user, not yet confirmed by the server.
    pub fn outgoing(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            created_at: now_timestamp(),
            status: DeliveryStatus::Sending,
            deleted: false,
        }
    }

    /// An assistant message whose content is still streaming in.
    pub fn streaming(id: MessageId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: String::new(),
            created_at: now_timestamp(),
            status: DeliveryStatus::Sending,
            deleted: false,
        }
    }

    /// Whether content may still change.
    pub fn is_content_mutable(&self) -> bool {
        !self.deleted && !self.status.is_terminal()
    }
}

/// Connection lifecycle state owned by the connection coordinator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

/// Immutable point-in-time view of the connection, safe to read from any task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    /// Consecutive failed attempts in the current reconnect series.
    pub attempt: u32,
}

impl Default for ConnectionSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
        }
    }
}

impl ConnectionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Kind of outbound action held by the offline sync manager.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    SendMessage,
    UpdateStatus,
    DeleteMessage,
}

/// Payload of an outbound action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    SendMessage { content: String },
    UpdateStatus { status: DeliveryStatus },
    DeleteMessage,
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::SendMessage { .. } => ActionKind::SendMessage,
            ActionPayload::UpdateStatus { .. } => ActionKind::UpdateStatus,
            ActionPayload::DeleteMessage => ActionKind::DeleteMessage,
        }
    }
}

/// An outbound action before it has been assigned a queue position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub message_id: MessageId,
    pub payload: ActionPayload,
}

impl ActionRequest {
    pub fn send_message(message_id: MessageId, content: impl Into<String>) -> Self {
        Self {
            message_id,
            payload: ActionPayload::SendMessage {
                content: content.into(),
            },
        }
    }

    pub fn update_status(message_id: MessageId, status: DeliveryStatus) -> Self {
        Self {
            message_id,
            payload: ActionPayload::UpdateStatus { status },
        }
    }

    pub fn delete_message(message_id: MessageId) -> Self {
        Self {
            message_id,
            payload: ActionPayload::DeleteMessage,
        }
    }
}

/// A persisted outbound action awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: String,
    /// Global enqueue order; strictly increasing.
    pub seq: u64,
    pub message_id: MessageId,
    pub payload: ActionPayload,
    pub enqueued_at: String,
    pub attempts: u32,
}

impl QueuedAction {
    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }
}

/// An action retired after exhausting its replay attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub action: QueuedAction,
    pub reason: String,
    pub retired_at: String,
}

/// Result of submitting an outbound action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The coordinator accepted the frame and the transport confirmed the write.
    Sent,
    /// The action was persisted for replay once connectivity returns.
    Queued,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter plugged into the pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Storage,
}
