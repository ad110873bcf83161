// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatline: the real-time streaming message pipeline of a chat client.
//!
//! Hosts typically call [`load_config`], [`telemetry::init_tracing`], then
//! [`ChatlineClient::open`], and render the [`PresentationEvent`]s it
//! returns. Everything else goes through the [`PipelineHandle`].

pub mod client;
pub mod telemetry;

pub use client::{ChatlineClient, load_config, load_config_str};

pub use chatline_config::ChatlineConfig;
pub use chatline_core::{
    ChatlineError, ConnectionSnapshot, ConnectionState, Credentials, DeliveryStatus, Message,
    MessageId, Role, SubmitOutcome,
};
pub use chatline_pipeline::{PipelineHandle, PipelineStatus, PresentationEvent, SentMessage};
pub use chatline_reconciler::Diff;
