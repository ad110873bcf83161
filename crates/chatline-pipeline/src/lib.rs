// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Chatline streaming message pipeline.
//!
//! [`ChatPipeline`] owns the streaming assembler, the offline sync manager,
//! and the message reconciler, and mutates them from a single serial loop.
//! The connection coordinator and the flush ticker run on their own tasks
//! and feed the loop through channels. Hosts drive the pipeline through a
//! [`PipelineHandle`] and observe it through [`PresentationEvent`]s.

pub mod command;
pub mod event;
pub mod pipeline;
pub mod recording;

pub use command::{PipelineHandle, PipelineStatus, SentMessage};
pub use event::PresentationEvent;
pub use pipeline::ChatPipeline;
