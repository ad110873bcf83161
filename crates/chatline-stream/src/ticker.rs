// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic flush signal for the streaming assembler.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One flush tick delivered to the serial context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushTick;

/// Spawns a task that sends a [`FlushTick`] every `interval` until `cancel`
/// fires or the receiver is dropped.
///
/// Ticks are fire-and-forget: if the previous tick has not been consumed
/// yet the new one is skipped.
pub fn spawn_flush_ticker(
    interval: Duration,
    ticks: mpsc::Sender<FlushTick>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        timer.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("flush ticker cancelled");
                    break;
                }
                _ = timer.tick() => {
                    match ticks.try_send(FlushTick) {
                        Ok(()) | Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Closed(_)) => {
                            debug!("flush ticker receiver dropped");
                            break;
                        }
                    }
                }
            }
        }
    })
}
