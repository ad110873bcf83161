// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coalesces chunk events into throttled content updates.
//!
//! Chunks are buffered per message id and released as [`StreamUpdate`]s
//! on the flush tick, when a session's unflushed bytes exceed the buffer
//! ceiling, or on completion.

use std::collections::{HashMap, HashSet, VecDeque};

use chatline_config::model::StreamingConfig;
use chatline_core::MessageId;
use tokio::time::Instant;
use tracing::debug;

use crate::session::{StreamMetadata, StreamingSession};

/// Tuning knobs for the assembler, derived from `[streaming]` config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerSettings {
    /// Unflushed bytes above which a session flushes without waiting for a tick.
    pub max_buffer_bytes: usize,
    pub chars_per_token: usize,
    /// How many finalized ids are remembered for late-chunk suppression.
    pub finalized_capacity: usize,
}

impl From<&StreamingConfig> for AssemblerSettings {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            max_buffer_bytes: config.max_buffer_bytes,
            chars_per_token: config.chars_per_token,
            finalized_capacity: config.finalized_capacity,
        }
    }
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self::from(&StreamingConfig::default())
    }
}

/// A coalesced content update for one streaming message.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamUpdate {
    pub message_id: MessageId,
    /// Full accumulated content, not just the delta.
    pub content: String,
    pub completed: bool,
    pub metadata: StreamMetadata,
}

/// Bounded FIFO of recently finalized ids.
#[derive(Debug)]
struct FinalizedSet {
    capacity: usize,
    order: VecDeque<MessageId>,
    members: HashSet<MessageId>,
}

impl FinalizedSet {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    fn insert(&mut self, id: MessageId) {
        if !self.members.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }

    fn contains(&self, id: &MessageId) -> bool {
        self.members.contains(id)
    }
}

/// Owns every in-flight [`StreamingSession`].
///
/// Not thread-safe by itself: the pipeline drives it from its serial loop.
#[derive(Debug)]
pub struct StreamingAssembler {
    settings: AssemblerSettings,
    sessions: HashMap<MessageId, StreamingSession>,
    finalized: FinalizedSet,
}

impl StreamingAssembler {
    pub fn new(settings: AssemblerSettings) -> Self {
        Self {
            finalized: FinalizedSet::new(settings.finalized_capacity),
            settings,
            sessions: HashMap::new(),
        }
    }

    /// Opens a session for `id`.
    ///
    /// Returns `true` when a new session was created, which the caller
    /// surfaces as a typing indicator. Repeated begins and begins for an
    /// already finalized id return `false`.
    pub fn begin_stream(&mut self, id: &MessageId) -> bool {
        if self.finalized.contains(id) {
            debug!(message_id = %id, "begin for finalized stream ignored");
            return false;
        }
        if self.sessions.contains_key(id) {
            return false;
        }
        self.sessions
            .insert(id.clone(), StreamingSession::new(Instant::now()));
        debug!(message_id = %id, "stream started");
        true
    }

    /// Appends `text` to the session for `id`, creating it if needed.
    ///
    /// Returns an update only when the append pushed the session over the
    /// buffer ceiling; otherwise the content waits for the next tick.
    pub fn append_chunk(&mut self, id: &MessageId, text: &str) -> Option<StreamUpdate> {
        if self.finalized.contains(id) {
            debug!(message_id = %id, "late chunk for finalized stream dropped");
            return None;
        }
        let now = Instant::now();
        let session = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| StreamingSession::new(now));
        if text.is_empty() {
            return None;
        }
        session.push(text, self.settings.chars_per_token, now);

        if session.unflushed_bytes() > self.settings.max_buffer_bytes {
            debug!(
                message_id = %id,
                unflushed = session.unflushed_bytes(),
                "buffer ceiling exceeded, flushing early"
            );
            return Some(Self::flush_session(id, session, now));
        }
        None
    }

    /// Marks `id` complete and returns its final update.
    ///
    /// The session is destroyed and the id remembered as finalized. Unknown
    /// and already finalized ids yield `None`.
    pub fn complete_stream(&mut self, id: &MessageId) -> Option<StreamUpdate> {
        let Some(mut session) = self.sessions.remove(id) else {
            debug!(message_id = %id, "complete for unknown stream ignored");
            return None;
        };
        let now = Instant::now();
        session.complete(now);
        self.finalized.insert(id.clone());
        let update = Self::flush_session(id, &mut session, now);
        debug!(
            message_id = %id,
            chunks = update.metadata.chunk_count,
            tokens = update.metadata.estimated_tokens,
            tokens_per_second = update.metadata.tokens_per_second,
            "stream completed"
        );
        Some(update)
    }

    /// Discards the session for `id` without emitting a final update.
    pub fn cancel_stream(&mut self, id: &MessageId) -> bool {
        let existed = self.sessions.remove(id).is_some();
        if existed {
            self.finalized.insert(id.clone());
            debug!(message_id = %id, "stream cancelled");
        }
        existed
    }

    /// Releases every session. Returns how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let ids: Vec<MessageId> = self.sessions.keys().cloned().collect();
        for id in &ids {
            self.cancel_stream(id);
        }
        ids.len()
    }

    /// Emits an update for every session whose content changed since its
    /// last flush.
    pub fn flush_due(&mut self) -> Vec<StreamUpdate> {
        let now = Instant::now();
        self.sessions
            .iter_mut()
            .filter(|(_, session)| session.is_dirty())
            .map(|(id, session)| Self::flush_session(id, session, now))
            .collect()
    }

    pub fn session(&self, id: &MessageId) -> Option<&StreamingSession> {
        self.sessions.get(id)
    }

    pub fn is_active(&self, id: &MessageId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_finalized(&self, id: &MessageId) -> bool {
        self.finalized.contains(id)
    }

    fn flush_session(id: &MessageId, session: &mut StreamingSession, now: Instant) -> StreamUpdate {
        session.mark_flushed(now);
        StreamUpdate {
            message_id: id.clone(),
            content: session.content().to_string(),
            completed: session.is_completed(),
            metadata: *session.metadata(),
        }
    }
}

impl Default for StreamingAssembler {
    fn default() -> Self {
        Self::new(AssemblerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;

    fn id(s: &str) -> MessageId {
        MessageId::from(s)
    }

    fn assembler() -> StreamingAssembler {
        StreamingAssembler::new(AssemblerSettings {
            max_buffer_bytes: 64,
            chars_per_token: 4,
            finalized_capacity: 4,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn hello_scenario_completes_with_full_content() {
        let mut asm = assembler();
        let m1 = id("m1");
        assert!(asm.begin_stream(&m1));
        assert!(asm.append_chunk(&m1, "Hel").is_none());
        assert!(asm.append_chunk(&m1, "lo").is_none());

        let update = asm.complete_stream(&m1).unwrap();
        assert_eq!(update.content, "Hello");
        assert!(update.completed);
        assert_eq!(update.metadata.chunk_count, 2);
        assert!(!asm.is_active(&m1));
    }

    #[tokio::test(start_paused = true)]
    async fn append_creates_session_implicitly() {
        let mut asm = assembler();
        asm.append_chunk(&id("m1"), "abc");
        assert!(asm.is_active(&id("m1")));
        assert_eq!(asm.session(&id("m1")).unwrap().content(), "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn begin_twice_signals_typing_once() {
        let mut asm = assembler();
        assert!(asm.begin_stream(&id("m1")));
        assert!(!asm.begin_stream(&id("m1")));
    }

    #[tokio::test(start_paused = true)]
    async fn chunk_after_complete_is_dropped() {
        let mut asm = assembler();
        let m1 = id("m1");
        asm.append_chunk(&m1, "done");
        asm.complete_stream(&m1).unwrap();

        assert!(asm.append_chunk(&m1, "late").is_none());
        assert!(!asm.is_active(&m1));
        assert!(asm.complete_stream(&m1).is_none());
        assert!(!asm.begin_stream(&m1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_without_final_update() {
        let mut asm = assembler();
        let m1 = id("m1");
        asm.append_chunk(&m1, "partial");
        assert!(asm.cancel_stream(&m1));
        assert!(asm.flush_due().is_empty());
        assert!(asm.append_chunk(&m1, "more").is_none());
        assert!(!asm.is_active(&m1));
        assert!(!asm.cancel_stream(&id("unknown")));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_emits_only_changed_sessions() {
        let mut asm = assembler();
        asm.append_chunk(&id("a"), "one");
        asm.append_chunk(&id("b"), "two");

        let mut first = asm.flush_due();
        first.sort_by(|x, y| x.message_id.cmp(&y.message_id));
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].content, "one");
        assert!(!first[0].completed);

        assert!(asm.flush_due().is_empty());

        asm.append_chunk(&id("b"), "!");
        let second = asm.flush_due();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].message_id, id("b"));
        assert_eq!(second[0].content, "two!");
    }

    #[tokio::test(start_paused = true)]
    async fn buffer_ceiling_forces_flush() {
        let mut asm = assembler();
        let m1 = id("m1");
        assert!(asm.append_chunk(&m1, &"x".repeat(40)).is_none());
        let forced = asm.append_chunk(&m1, &"y".repeat(40)).unwrap();
        assert_eq!(forced.content.len(), 80);
        assert!(!forced.completed);
        assert!(!asm.session(&m1).unwrap().is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn throughput_uses_estimated_tokens_over_elapsed() {
        let mut asm = assembler();
        let m1 = id("m1");
        asm.begin_stream(&m1);
        assert_eq!(asm.session(&m1).unwrap().metadata().tokens_per_second, 0.0);

        tokio::time::advance(Duration::from_secs(2)).await;
        asm.append_chunk(&m1, &"a".repeat(40));
        let update = asm.complete_stream(&m1).unwrap();

        assert_eq!(update.metadata.estimated_tokens, 10);
        assert!((update.metadata.tokens_per_second - 5.0).abs() < 1e-9);
        assert_eq!(
            update.metadata.elapsed(Instant::now()),
            Duration::from_secs(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interleaved_streams_finalize_independently() {
        let mut asm = assembler();
        let (m3, m4) = (id("m3"), id("m4"));
        asm.append_chunk(&m3, "The ");
        asm.append_chunk(&m4, "A ");
        asm.append_chunk(&m3, "cat");
        asm.append_chunk(&m4, "dog");

        let m4_final = asm.complete_stream(&m4).unwrap();
        asm.append_chunk(&m3, " sat");
        let m3_final = asm.complete_stream(&m3).unwrap();

        assert_eq!(m3_final.content, "The cat sat");
        assert_eq!(m4_final.content, "A dog");
        assert_eq!(asm.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_releases_everything() {
        let mut asm = assembler();
        asm.append_chunk(&id("a"), "1");
        asm.append_chunk(&id("b"), "2");
        assert_eq!(asm.cancel_all(), 2);
        assert_eq!(asm.active_count(), 0);
        assert!(asm.is_finalized(&id("a")));
    }

    #[test]
    fn finalized_set_evicts_oldest() {
        let mut set = FinalizedSet::new(2);
        set.insert(id("a"));
        set.insert(id("b"));
        set.insert(id("c"));
        assert!(!set.contains(&id("a")));
        assert!(set.contains(&id("b")));
        assert!(set.contains(&id("c")));
    }

    proptest! {
        #[test]
        fn content_is_in_order_concatenation(chunks in prop::collection::vec(".{0,12}", 0..40)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            rt.block_on(async {
                let mut asm = StreamingAssembler::default();
                let m = id("m");
                asm.begin_stream(&m);
                for chunk in &chunks {
                    asm.append_chunk(&m, chunk);
                }
                let update = asm.complete_stream(&m).unwrap();
                prop_assert_eq!(update.content, chunks.concat());
                Ok(())
            })?;
        }

        #[test]
        fn emitted_content_never_shrinks(
            chunks in prop::collection::vec(("[a-z]{1,30}", any::<bool>()), 1..60)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            rt.block_on(async {
                let mut asm = assembler();
                let m = id("m");
                let mut emitted = Vec::new();
                for (chunk, tick) in &chunks {
                    emitted.extend(asm.append_chunk(&m, chunk));
                    if *tick {
                        emitted.extend(asm.flush_due());
                    }
                }
                emitted.extend(asm.complete_stream(&m));
                for pair in emitted.windows(2) {
                    prop_assert!(pair[0].content.len() <= pair[1].content.len());
                    prop_assert!(pair[1].content.starts_with(&pair[0].content));
                }
                prop_assert!(emitted.last().is_some_and(|u| u.completed));
                Ok(())
            })?;
        }
    }
}
