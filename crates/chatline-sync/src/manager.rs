// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Buffer-or-forward handling of outbound actions and queue replay.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chatline_config::model::SyncConfig;
use chatline_core::{
    ActionRequest, ChatlineError, DeadLetter, FrameSender, MessageId, OutboundFrame, QueueStore,
    QueuedAction, SubmitOutcome, now_timestamp,
};
use chatline_resilience::BackoffPolicy;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

/// Replay policy derived from `[sync]` config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    /// Failed replays before an action is dead-lettered.
    pub max_attempts: u32,
    /// Distinct message ids replayed concurrently.
    pub replay_concurrency: usize,
    /// Delay between a failing sweep and the next one.
    pub backoff: BackoffPolicy,
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            replay_concurrency: config.replay_concurrency,
            backoff: BackoffPolicy::new(
                config.replay_base_delay(),
                config.replay_max_delay(),
                BackoffPolicy::default().jitter_ratio,
            ),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

/// Something that happened to a queued action during replay.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The transport confirmed the write; the action left the queue.
    Delivered { action: QueuedAction },
    /// The write failed; the action stays at the front of its id's queue.
    RetryScheduled {
        action_id: String,
        message_id: MessageId,
        attempts: u32,
        error: String,
    },
    /// The action was retired. Its message is considered failed.
    DeadLettered { letter: DeadLetter },
}

/// Outcome of one replay sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub events: Vec<SyncEvent>,
    /// When set, the caller should sweep again after this delay.
    pub next_sweep: Option<Duration>,
    /// The sweep stopped early because the connection dropped.
    pub aborted: bool,
}

#[derive(Default)]
struct GroupOutcome {
    delivered: Vec<QueuedAction>,
    failure: Option<(String, ChatlineError)>,
    aborted: bool,
}

/// Owns the pending action queue and the dead-letter list.
///
/// Every mutation is written through to the [`QueueStore`].
pub struct OfflineSyncManager {
    sender: Arc<dyn FrameSender>,
    store: Arc<dyn QueueStore>,
    settings: SyncSettings,
    next_seq: u64,
    pending: Vec<QueuedAction>,
    dead_letters: Vec<DeadLetter>,
}

impl OfflineSyncManager {
    pub fn new(
        sender: Arc<dyn FrameSender>,
        store: Arc<dyn QueueStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            sender,
            store,
            settings,
            next_seq: 1,
            pending: Vec::new(),
            dead_letters: Vec::new(),
        }
    }

    /// Restores the queue and dead letters persisted by a previous run.
    pub async fn load(&mut self) -> Result<(), ChatlineError> {
        let mut pending = self.store.load_queue().await?;
        pending.sort_by_key(|a| a.seq);
        let dead_letters = self.store.load_dead_letters().await?;

        let max_seq = pending
            .iter()
            .map(|a| a.seq)
            .chain(dead_letters.iter().map(|d| d.action.seq))
            .max()
            .unwrap_or(0);
        self.next_seq = max_seq + 1;
        self.pending = pending;
        self.dead_letters = dead_letters;

        info!(
            pending = self.pending.len(),
            dead_letters = self.dead_letters.len(),
            "offline queue restored"
        );
        Ok(())
    }

    /// Sends `request` now or queues it for replay.
    ///
    /// An action is queued when the connection is down, when the send fails
    /// for connectivity reasons, or when an earlier action for the same
    /// message id is still pending.
    pub async fn submit(&mut self, request: ActionRequest) -> Result<SubmitOutcome, ChatlineError> {
        let blocked = self.has_pending_for(&request.message_id);
        if !blocked && self.sender.is_connected() {
            let frame = OutboundFrame::from(&self.stamp(&request));
            match self.sender.send(&frame).await {
                Ok(()) => {
                    debug!(message_id = %request.message_id, kind = %request.payload.kind(), "action sent");
                    return Ok(SubmitOutcome::Sent);
                }
                Err(e) if e.is_connectivity() => {
                    debug!(message_id = %request.message_id, error = %e, "send failed, queueing");
                }
                Err(e) => return Err(e),
            }
        }

        let action = self.stamp(&request);
        let mut candidate = self.pending.clone();
        candidate.push(action.clone());
        self.store.save_queue(&candidate).await?;
        self.pending = candidate;
        self.next_seq = action.seq + 1;

        debug!(
            message_id = %action.message_id,
            seq = action.seq,
            pending = self.pending.len(),
            "action queued"
        );
        Ok(SubmitOutcome::Queued)
    }

    /// Replays the pending queue once.
    ///
    /// Actions for one message id go out one at a time in enqueue order;
    /// distinct ids replay concurrently. A `NotConnected` failure aborts the
    /// sweep without counting an attempt.
    pub async fn replay(&mut self) -> ReplayReport {
        if self.pending.is_empty() {
            return ReplayReport::default();
        }

        let groups = group_by_message(&self.pending);
        info!(
            pending = self.pending.len(),
            ids = groups.len(),
            "replaying offline queue"
        );

        let abort = Arc::new(AtomicBool::new(false));
        let sender = self.sender.clone();
        let outcomes: Vec<GroupOutcome> = stream::iter(groups.into_iter().map(|group| {
            replay_group(sender.clone(), group, abort.clone())
        }))
        .buffer_unordered(self.settings.replay_concurrency.max(1))
        .collect()
        .await;

        let mut report = ReplayReport::default();
        let mut delivered = HashSet::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            report.aborted |= outcome.aborted;
            for action in outcome.delivered {
                delivered.insert(action.id.clone());
                report.events.push(SyncEvent::Delivered { action });
            }
            failures.extend(outcome.failure);
        }
        self.pending.retain(|a| !delivered.contains(&a.id));

        let mut retired = false;
        let mut highest_retry_attempt = None;
        for (action_id, error) in failures {
            let Some(action) = self.pending.iter_mut().find(|a| a.id == action_id) else {
                continue;
            };
            action.attempts += 1;
            let attempts = action.attempts;
            let message_id = action.message_id.clone();

            if attempts >= self.settings.max_attempts {
                let exhausted = ChatlineError::ReplayExhausted {
                    action_id: action_id.clone(),
                    message_id: message_id.clone(),
                    attempts,
                };
                warn!(message_id = %message_id, attempts, error = %error, "action dead-lettered");
                report
                    .events
                    .extend(self.retire(&message_id, &action_id, exhausted.to_string()));
                retired = true;
            } else {
                warn!(message_id = %message_id, attempts, error = %error, "replay failed, will retry");
                report.events.push(SyncEvent::RetryScheduled {
                    action_id,
                    message_id,
                    attempts,
                    error: error.to_string(),
                });
                highest_retry_attempt = highest_retry_attempt.max(Some(attempts));
            }
        }

        if !report.aborted
            && let Some(attempts) = highest_retry_attempt
        {
            report.next_sweep = Some(self.settings.backoff.next_delay(attempts - 1));
        }

        if let Err(e) = self.store.save_queue(&self.pending).await {
            warn!(error = %e, "failed to persist queue after replay");
        }
        if retired && let Err(e) = self.store.save_dead_letters(&self.dead_letters).await {
            warn!(error = %e, "failed to persist dead letters");
        }

        report
    }

    /// Moves every dead letter for `message_id` back into the queue with
    /// its attempt count reset. Returns how many actions were restored.
    pub async fn retry_dead_letters(&mut self, message_id: &MessageId) -> Result<usize, ChatlineError> {
        let (restore, keep): (Vec<DeadLetter>, Vec<DeadLetter>) = self
            .dead_letters
            .iter()
            .cloned()
            .partition(|d| &d.action.message_id == message_id);
        if restore.is_empty() {
            return Ok(0);
        }

        let mut pending = self.pending.clone();
        pending.extend(restore.into_iter().map(|d| QueuedAction {
            attempts: 0,
            ..d.action
        }));
        pending.sort_by_key(|a| a.seq);
        let restored = pending.len() - self.pending.len();

        self.store.save_queue(&pending).await?;
        self.store.save_dead_letters(&keep).await?;
        self.pending = pending;
        self.dead_letters = keep;

        info!(message_id = %message_id, restored, "dead letters requeued");
        Ok(restored)
    }

    pub fn pending(&self) -> &[QueuedAction] {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn dead_letters(&self) -> &[DeadLetter] {
        &self.dead_letters
    }

    pub fn has_pending_for(&self, message_id: &MessageId) -> bool {
        self.pending.iter().any(|a| &a.message_id == message_id)
    }

    fn stamp(&self, request: &ActionRequest) -> QueuedAction {
        QueuedAction {
            id: uuid::Uuid::new_v4().to_string(),
            seq: self.next_seq,
            message_id: request.message_id.clone(),
            payload: request.payload.clone(),
            enqueued_at: now_timestamp(),
            attempts: 0,
        }
    }

    /// Retires the failed action and everything queued behind it for the
    /// same message id.
    fn retire(&mut self, message_id: &MessageId, action_id: &str, reason: String) -> Vec<SyncEvent> {
        let (retiring, remaining): (Vec<QueuedAction>, Vec<QueuedAction>) = self
            .pending
            .drain(..)
            .partition(|a| &a.message_id == message_id);
        self.pending = remaining;

        let retired_at = now_timestamp();
        retiring
            .into_iter()
            .map(|action| {
                let reason = if action.id == action_id {
                    reason.clone()
                } else {
                    format!("retired behind dead-lettered action {action_id}")
                };
                let letter = DeadLetter {
                    action,
                    reason,
                    retired_at: retired_at.clone(),
                };
                self.dead_letters.push(letter.clone());
                SyncEvent::DeadLettered { letter }
            })
            .collect()
    }
}

/// Splits the queue into per-id runs, each in enqueue order, ordered by the
/// seq of their first action.
fn group_by_message(pending: &[QueuedAction]) -> Vec<Vec<QueuedAction>> {
    let mut index: HashMap<&MessageId, usize> = HashMap::new();
    let mut groups: Vec<Vec<QueuedAction>> = Vec::new();
    for action in pending {
        match index.get(&action.message_id) {
            Some(&i) => groups[i].push(action.clone()),
            None => {
                index.insert(&action.message_id, groups.len());
                groups.push(vec![action.clone()]);
            }
        }
    }
    groups
}

async fn replay_group(
    sender: Arc<dyn FrameSender>,
    actions: Vec<QueuedAction>,
    abort: Arc<AtomicBool>,
) -> GroupOutcome {
    let mut outcome = GroupOutcome::default();
    for action in actions {
        if abort.load(Ordering::SeqCst) {
            outcome.aborted = true;
            break;
        }
        let frame = OutboundFrame::from(&action);
        match sender.send(&frame).await {
            Ok(()) => {
                debug!(message_id = %action.message_id, seq = action.seq, "replayed action delivered");
                outcome.delivered.push(action);
            }
            Err(ChatlineError::NotConnected) => {
                debug!(message_id = %action.message_id, "connection lost during replay");
                abort.store(true, Ordering::SeqCst);
                outcome.aborted = true;
                break;
            }
            Err(e) => {
                outcome.failure = Some((action.id.clone(), e));
                break;
            }
        }
    }
    outcome
}
