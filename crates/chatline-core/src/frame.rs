// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire envelope for frames exchanged with the chat service.
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "begin", "messageId": "m1"}
//! {"type": "chunk", "messageId": "m1", "payload": "Hel"}
//! {"type": "complete", "messageId": "m1"}
//! {"type": "message", "messageId": "m2", "payload": {"role": "system", "content": "..."}}
//! {"type": "status", "messageId": "m3", "payload": "delivered"}
//! ```
//!
//! Client -> Server (JSON):
//! ```json
//! {"type": "send", "messageId": "m3", "content": "hi"}
//! {"type": "status-update", "messageId": "m2", "status": "read"}
//! {"type": "delete", "messageId": "m3"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ChatlineError;
use crate::types::{ActionPayload, DeliveryStatus, MessageId, QueuedAction, Role};

/// Body of a `message` frame: a complete, non-streamed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub status: Option<DeliveryStatus>,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<String>,
}

/// A frame received from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundFrame {
    /// The server started generating a reply.
    Begin {
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
    /// An incremental fragment of a streaming reply.
    Chunk {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        payload: String,
    },
    /// The streaming reply is finished.
    Complete {
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
    /// A whole message delivered in one frame.
    Message {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        payload: MessagePayload,
    },
    /// A delivery status change for an existing message.
    Status {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        payload: DeliveryStatus,
    },
}

impl InboundFrame {
    /// Parses a text frame. Any structural problem is a `MalformedFrame`.
    pub fn decode(text: &str) -> Result<Self, ChatlineError> {
        let frame: InboundFrame =
            serde_json::from_str(text).map_err(|e| ChatlineError::MalformedFrame {
                reason: e.to_string(),
            })?;
        if frame.message_id().as_str().trim().is_empty() {
            return Err(ChatlineError::MalformedFrame {
                reason: "empty messageId".to_string(),
            });
        }
        Ok(frame)
    }

    pub fn message_id(&self) -> &MessageId {
        match self {
            InboundFrame::Begin { message_id }
            | InboundFrame::Chunk { message_id, .. }
            | InboundFrame::Complete { message_id }
            | InboundFrame::Message { message_id, .. }
            | InboundFrame::Status { message_id, .. } => message_id,
        }
    }
}

/// A frame sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundFrame {
    Send {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        content: String,
    },
    StatusUpdate {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        status: DeliveryStatus,
    },
    Delete {
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
}

impl OutboundFrame {
    pub fn encode(&self) -> Result<String, ChatlineError> {
        serde_json::to_string(self).map_err(|e| ChatlineError::Internal(format!("frame encode: {e}")))
    }

    pub fn message_id(&self) -> &MessageId {
        match self {
            OutboundFrame::Send { message_id, .. }
            | OutboundFrame::StatusUpdate { message_id, .. }
            | OutboundFrame::Delete { message_id } => message_id,
        }
    }
}

impl From<&QueuedAction> for OutboundFrame {
    fn from(action: &QueuedAction) -> Self {
        let message_id = action.message_id.clone();
        match &action.payload {
            ActionPayload::SendMessage { content } => OutboundFrame::Send {
                message_id,
                content: content.clone(),
            },
            ActionPayload::UpdateStatus { status } => OutboundFrame::StatusUpdate {
                message_id,
                status: *status,
            },
            ActionPayload::DeleteMessage => OutboundFrame::Delete { message_id },
        }
    }
}
