// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Applies pipeline events to the message log and emits minimal diffs.

use chatline_core::{DeliveryStatus, Message, MessageId};
use tracing::debug;

use crate::message_log::MessageLog;

/// An event that may change the message log.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileEvent {
    /// Initial population from storage. Replaces the whole log.
    Load(Vec<Message>),
    /// A complete message, either created locally or received whole.
    NewMessage(Message),
    /// Accumulated content of a streaming reply.
    StreamingUpdate {
        message_id: MessageId,
        content: String,
        completed: bool,
    },
    StatusChange {
        message_id: MessageId,
        status: DeliveryStatus,
    },
    Deletion { message_id: MessageId },
    /// Sets the status without the forward-only check. Used when an
    /// outbound action is given up on or explicitly retried.
    StatusOverride {
        message_id: MessageId,
        status: DeliveryStatus,
    },
}

/// Change to present after applying an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    FullReload { messages: Vec<Message> },
    /// A new trailing entry. `follow_eligible` is a hint; the presentation
    /// layer makes the final auto-scroll decision.
    Append {
        index: usize,
        message: Message,
        follow_eligible: bool,
    },
    UpdateInPlace { index: usize, message: Message },
    /// Duplicate, regression, or unknown id.
    Unchanged,
}

impl Diff {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Diff::Unchanged)
    }
}

/// Sole writer of the [`MessageLog`].
#[derive(Debug, Default)]
pub struct MessageReconciler {
    log: MessageLog,
}

impl MessageReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the log.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn apply(&mut self, event: ReconcileEvent) -> Diff {
        match event {
            ReconcileEvent::Load(messages) => {
                self.log = MessageLog::from_messages(messages);
                debug!(count = self.log.len(), "message log loaded");
                Diff::FullReload {
                    messages: self.log.messages().to_vec(),
                }
            }
            ReconcileEvent::NewMessage(message) => self.new_message(message),
            ReconcileEvent::StreamingUpdate {
                message_id,
                content,
                completed,
            } => self.streaming_update(message_id, content, completed),
            ReconcileEvent::StatusChange { message_id, status } => {
                self.status_change(&message_id, status)
            }
            ReconcileEvent::Deletion { message_id } => self.deletion(&message_id),
            ReconcileEvent::StatusOverride { message_id, status } => {
                self.status_override(&message_id, status)
            }
        }
    }

    fn append(&mut self, message: Message) -> Diff {
        let index = self.log.push(message.clone());
        Diff::Append {
            index,
            message,
            follow_eligible: true,
        }
    }

    fn new_message(&mut self, message: Message) -> Diff {
        if !self.log.contains(&message.id) {
            return self.append(message);
        }
        let Some((index, existing)) = self.log.get_mut(&message.id) else {
            return Diff::Unchanged;
        };
        if existing.deleted {
            return Diff::Unchanged;
        }

        // A whole-message frame for a known id only advances its state.
        let mut changed = false;
        if existing.is_content_mutable()
            && message.content.starts_with(existing.content.as_str())
            && message.content != existing.content
        {
            existing.content = message.content;
            changed = true;
        }
        if existing.status.can_transition_to(message.status) {
            existing.status = message.status;
            changed = true;
        }
        if changed {
            Diff::UpdateInPlace {
                index,
                message: existing.clone(),
            }
        } else {
            Diff::Unchanged
        }
    }

    fn streaming_update(&mut self, message_id: MessageId, content: String, completed: bool) -> Diff {
        let final_status = completed.then_some(DeliveryStatus::Delivered);

        let Some((index, existing)) = self.log.get_mut(&message_id) else {
            let mut message = Message::streaming(message_id);
            message.content = content;
            if let Some(status) = final_status {
                message.status = status;
            }
            return self.append(message);
        };

        if !existing.is_content_mutable() {
            debug!(message_id = %message_id, status = %existing.status, "update for frozen message rejected");
            return Diff::Unchanged;
        }
        if !content.starts_with(existing.content.as_str()) {
            debug!(message_id = %message_id, "non-extending streaming update rejected");
            return Diff::Unchanged;
        }
        if content == existing.content && final_status.is_none() {
            return Diff::Unchanged;
        }

        existing.content = content;
        if let Some(status) = final_status {
            existing.status = status;
        }
        Diff::UpdateInPlace {
            index,
            message: existing.clone(),
        }
    }

    fn status_change(&mut self, message_id: &MessageId, status: DeliveryStatus) -> Diff {
        let Some((index, existing)) = self.log.get_mut(message_id) else {
            debug!(message_id = %message_id, "status for unknown message ignored");
            return Diff::Unchanged;
        };
        if existing.deleted || !existing.status.can_transition_to(status) {
            debug!(
                message_id = %message_id,
                from = %existing.status,
                to = %status,
                "status transition rejected"
            );
            return Diff::Unchanged;
        }
        existing.status = status;
        Diff::UpdateInPlace {
            index,
            message: existing.clone(),
        }
    }

    fn status_override(&mut self, message_id: &MessageId, status: DeliveryStatus) -> Diff {
        match self.log.get_mut(message_id) {
            Some((index, existing)) if existing.status != status => {
                debug!(
                    message_id = %message_id,
                    from = %existing.status,
                    to = %status,
                    "status overridden"
                );
                existing.status = status;
                Diff::UpdateInPlace {
                    index,
                    message: existing.clone(),
                }
            }
            _ => Diff::Unchanged,
        }
    }

    fn deletion(&mut self, message_id: &MessageId) -> Diff {
        match self.log.get_mut(message_id) {
            Some((index, existing)) if !existing.deleted => {
                existing.deleted = true;
                Diff::UpdateInPlace {
                    index,
                    message: existing.clone(),
                }
            }
            _ => Diff::Unchanged,
        }
    }
}
