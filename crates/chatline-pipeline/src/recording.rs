// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so the host chooses the recorder.

use chatline_core::{ActionKind, ConnectionState};
use metrics::{describe_counter, describe_gauge};

/// Register all Chatline metric descriptions.
///
/// Call once after the host installs its recorder.
pub fn register_metrics() {
    describe_counter!("chatline_frames_received_total", "Inbound frames decoded");
    describe_counter!(
        "chatline_frames_malformed_total",
        "Inbound frames dropped as malformed"
    );
    describe_counter!("chatline_stream_flushes_total", "Coalesced stream updates emitted");
    describe_counter!("chatline_actions_total", "Outbound actions by outcome");
    describe_counter!(
        "chatline_connection_transitions_total",
        "Connection state transitions"
    );
    describe_gauge!("chatline_pending_actions", "Actions waiting for replay");
    describe_gauge!("chatline_active_streams", "Streaming sessions in flight");
}

pub fn record_frame(kind: &'static str) {
    metrics::counter!("chatline_frames_received_total", "type" => kind).increment(1);
}

pub fn record_malformed_frame() {
    metrics::counter!("chatline_frames_malformed_total").increment(1);
}

pub fn record_flushes(count: usize) {
    metrics::counter!("chatline_stream_flushes_total").increment(count as u64);
}

/// Record an action outcome: `sent`, `queued`, `replayed`, `dead_lettered`.
pub fn record_action(kind: ActionKind, outcome: &'static str) {
    metrics::counter!(
        "chatline_actions_total",
        "kind" => kind.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_transition(state: ConnectionState) {
    metrics::counter!("chatline_connection_transitions_total", "state" => state.to_string())
        .increment(1);
}

pub fn set_pending_actions(count: usize) {
    metrics::gauge!("chatline_pending_actions").set(count as f64);
}

pub fn set_active_streams(count: usize) {
    metrics::gauge!("chatline_active_streams").set(count as f64);
}
