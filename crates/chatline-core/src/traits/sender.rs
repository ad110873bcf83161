// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::ChatlineError;
use crate::frame::OutboundFrame;

/// Outbound seam between the offline sync manager and the connection.
#[async_trait]
pub trait FrameSender: Send + Sync + 'static {
    /// Snapshot read of connectivity. May be stale by the time `send` runs.
    fn is_connected(&self) -> bool;

    /// Sends a frame, failing with `NotConnected` when the link is down.
    async fn send(&self, frame: &OutboundFrame) -> Result<(), ChatlineError>;
}
