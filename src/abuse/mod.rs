//! Abuse control: bot blacklist, repetition detection and reply rate limiting.
//!
//! Per-sender state lives in memory and is created lazily on the first
//! inbound message. Only the blacklist is durable: it is persisted through
//! a [`BlacklistStore`] on every addition and reloaded by [`AbuseGuard::load`].
//!
//! The guard knows nothing about conversations or tags. Whoever blacklists a
//! sender is responsible for tagging the conversation.

pub mod rate_limit;
pub mod repetition;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AbuseConfig;
use crate::conversation::model::{ConversationView, Direction, SenderId};
use crate::error::DatabaseError;
use crate::store::BlacklistStore;

use rate_limit::ResponseWindow;
use repetition::{RecentContent, most_frequent};

/// A sender flagged by the historical scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotDetection {
    pub sender: SenderId,
    pub repeated_message: String,
    pub count: usize,
}

/// In-memory abuse state of one sender.
#[derive(Debug)]
struct SenderState {
    recent: RecentContent,
    responses: ResponseWindow,
}

/// Process-wide abuse control.
pub struct AbuseGuard {
    config: AbuseConfig,
    window: chrono::Duration,
    senders: Mutex<HashMap<SenderId, SenderState>>,
    blacklist: RwLock<HashSet<SenderId>>,
    store: Arc<dyn BlacklistStore>,
}

impl AbuseGuard {
    /// Build a guard and reload the durable blacklist.
    ///
    /// Fails if `rate_window` does not fit a chrono duration.
    pub async fn load(
        config: AbuseConfig,
        store: Arc<dyn BlacklistStore>,
    ) -> crate::error::Result<Self> {
        let window = config.chrono_window()?;
        let blacklist = store.load_blacklist().await?;
        info!(count = blacklist.len(), "Blacklist loaded");

        Ok(Self {
            config,
            window,
            senders: Mutex::new(HashMap::new()),
            blacklist: RwLock::new(blacklist),
            store,
        })
    }

    pub fn is_blacklisted(&self, sender: &SenderId) -> bool {
        self.blacklist
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(sender)
    }

    /// Remember a received body in the sender's bounded history.
    pub fn record_inbound(&self, sender: &SenderId, content: &str) {
        self.with_state(sender, |state| state.recent.push(content));
    }

    /// Whether the sender's recent history is dominated by one repeated body.
    pub fn is_bot(&self, sender: &SenderId) -> bool {
        let threshold = self.config.repeat_threshold;
        self.with_state(sender, |state| state.recent.is_repetitive(threshold))
    }

    /// Blacklist a sender in memory and in durable storage.
    ///
    /// Returns `Ok(false)` if the sender was already blacklisted. The
    /// in-memory entry is kept even when persisting fails.
    pub async fn blacklist(&self, sender: &SenderId, reason: &str) -> Result<bool, DatabaseError> {
        let added = self
            .blacklist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sender.clone());
        if !added {
            return Ok(false);
        }

        warn!(sender = %sender, reason, "Sender blacklisted");
        self.store.add_to_blacklist(sender, reason).await?;
        Ok(true)
    }

    /// Whether another automated reply may be sent now.
    pub fn can_respond(&self, sender: &SenderId) -> bool {
        self.can_respond_at(sender, Utc::now())
    }

    /// Whether fewer than the configured maximum replies fall inside the
    /// window ending at `now`. Expired entries are pruned as a side effect.
    pub fn can_respond_at(&self, sender: &SenderId, now: DateTime<Utc>) -> bool {
        let (window, max) = (self.window, self.config.max_responses);
        let allowed = self.with_state(sender, |state| state.responses.allows(now, window, max));
        if !allowed {
            debug!(sender = %sender, max, "Reply rate limit reached");
        }
        allowed
    }

    pub fn record_response_sent(&self, sender: &SenderId) {
        self.record_response_sent_at(sender, Utc::now());
    }

    pub fn record_response_sent_at(&self, sender: &SenderId, at: DateTime<Utc>) {
        self.with_state(sender, |state| state.responses.record(at));
    }

    /// Apply the repetition rule to stored conversations.
    ///
    /// A conversation matches when one received body occurs at least
    /// `repeat_threshold` times anywhere in its log. Already-blacklisted
    /// senders are skipped; matches are blacklisted. Tagging is left to
    /// the caller.
    pub async fn scan_historical_bots(&self, conversations: &[ConversationView]) -> Vec<BotDetection> {
        let threshold = self.config.repeat_threshold;
        let mut detections = Vec::new();

        for conversation in conversations {
            if self.is_blacklisted(&conversation.sender) {
                continue;
            }
            let received = conversation
                .messages
                .iter()
                .filter(|m| m.direction == Direction::Received)
                .map(|m| m.content.as_str());
            let Some((body, count)) = most_frequent(received) else {
                continue;
            };
            if count < threshold {
                continue;
            }

            if let Err(e) = self
                .blacklist(&conversation.sender, "historical repetition scan")
                .await
            {
                warn!(sender = %conversation.sender, error = %e, "Failed to persist blacklist entry");
            }
            detections.push(BotDetection {
                sender: conversation.sender.clone(),
                repeated_message: body.to_string(),
                count,
            });
        }

        info!(
            scanned = conversations.len(),
            detected = detections.len(),
            "Historical bot scan complete"
        );
        detections
    }

    fn with_state<R>(&self, sender: &SenderId, f: impl FnOnce(&mut SenderState) -> R) -> R {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        let state = senders.entry(sender.clone()).or_insert_with(|| SenderState {
            recent: RecentContent::new(self.config.recent_capacity),
            responses: ResponseWindow::default(),
        });
        f(state)
    }
}
