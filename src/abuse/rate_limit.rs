//! Sliding-window response counter.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// Instants of replies sent to one sender, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ResponseWindow {
    sent: VecDeque<DateTime<Utc>>,
}

impl ResponseWindow {
    /// Drop entries that fell out of the trailing window ending at `now`.
    pub fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        let cutoff = now - window;
        while self.sent.front().is_some_and(|t| *t <= cutoff) {
            self.sent.pop_front();
        }
    }

    /// Prune, then report whether another reply fits under `max`.
    pub fn allows(&mut self, now: DateTime<Utc>, window: Duration, max: usize) -> bool {
        self.prune(now, window);
        self.sent.len() < max
    }

    pub fn record(&mut self, at: DateTime<Utc>) {
        self.sent.push_back(at);
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}
