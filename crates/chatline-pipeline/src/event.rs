// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed output of the pipeline, consumed by the presentation layer.

use chatline_core::{ConnectionSnapshot, MessageId};
use chatline_reconciler::Diff;
use chatline_stream::StreamMetadata;

/// Everything the presentation layer needs to render the conversation.
///
/// Messages inside diffs are copies; the log itself is never shared.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    /// A change to the message log.
    Diff(Diff),
    /// The server started generating a reply.
    Typing { message_id: MessageId },
    /// Throughput for a streaming reply, emitted with every flush.
    StreamProgress {
        message_id: MessageId,
        metadata: StreamMetadata,
        completed: bool,
    },
    /// The connection coordinator published a new snapshot.
    Connection(ConnectionSnapshot),
    /// An outbound action was given up on. The message is now `failed`.
    ActionFailed { message_id: MessageId, reason: String },
}
