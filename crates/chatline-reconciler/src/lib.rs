// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message reconciliation for Chatline.
//!
//! [`MessageReconciler`] owns the insertion-ordered [`MessageLog`] and turns
//! assembler, queue, and server events into minimal [`Diff`]s.

pub mod message_log;
pub mod reconciler;

pub use message_log::MessageLog;
pub use reconciler::{Diff, MessageReconciler, ReconcileEvent};
