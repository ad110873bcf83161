// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message streaming state.

use std::time::Duration;

use tokio::time::Instant;

/// Throughput metadata for one streaming reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamMetadata {
    pub chunk_count: usize,
    /// Characters divided by the configured characters-per-token.
    pub estimated_tokens: usize,
    pub started_at: Instant,
    pub ended_at: Option<Instant>,
    pub tokens_per_second: f64,
}

impl StreamMetadata {
    fn new(now: Instant) -> Self {
        Self {
            chunk_count: 0,
            estimated_tokens: 0,
            started_at: now,
            ended_at: None,
            tokens_per_second: 0.0,
        }
    }

    /// Time between start and end, or start and `now` while still streaming.
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.ended_at
            .unwrap_or(now)
            .saturating_duration_since(self.started_at)
    }
}

/// Accumulated state for one in-flight message. Owned by the assembler.
#[derive(Debug, Clone)]
pub struct StreamingSession {
    content: String,
    char_count: usize,
    /// Chunks received since the last flush, in arrival order.
    pending_chunks: Vec<String>,
    last_update: Instant,
    completed: bool,
    metadata: StreamMetadata,
}

impl StreamingSession {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            content: String::new(),
            char_count: 0,
            pending_chunks: Vec::new(),
            last_update: now,
            completed: false,
            metadata: StreamMetadata::new(now),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    /// Whether content changed since the last flush.
    pub fn is_dirty(&self) -> bool {
        !self.pending_chunks.is_empty()
    }

    pub fn unflushed_bytes(&self) -> usize {
        self.pending_chunks.iter().map(String::len).sum()
    }

    pub(crate) fn push(&mut self, text: &str, chars_per_token: usize, now: Instant) {
        self.content.push_str(text);
        self.char_count += text.chars().count();
        self.pending_chunks.push(text.to_string());
        self.metadata.chunk_count += 1;
        self.metadata.estimated_tokens = self.char_count / chars_per_token.max(1);
        self.refresh_throughput(now);
    }

    pub(crate) fn complete(&mut self, now: Instant) {
        self.completed = true;
        self.metadata.ended_at = Some(now);
        self.refresh_throughput(now);
    }

    /// Mark everything received so far as flushed.
    pub(crate) fn mark_flushed(&mut self, now: Instant) {
        self.pending_chunks.clear();
        self.last_update = now;
    }

    fn refresh_throughput(&mut self, now: Instant) {
        let elapsed = self.metadata.elapsed(now);
        self.metadata.tokens_per_second = if elapsed < Duration::from_millis(1) {
            0.0
        } else {
            self.metadata.estimated_tokens as f64 / elapsed.as_secs_f64()
        };
    }
}
