//! Per-dependency budgets shared by every orchestration run.
//!
//! Each dependency gets a fixed window that resets lazily on the first call
//! after its boundary. Reservations are RAII [`QuotaToken`]s: dropping one
//! ends its in-flight accounting, [`QuotaGovernor::settle`] corrects the
//! charge to the measured cost, and [`QuotaGovernor::refund`] hands the
//! reservation back when the call was never made.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const MINUTE: Duration = Duration::from_secs(60);

/// External dependencies with a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    /// Video platform API units.
    VideoData,
    /// Language model tokens.
    Llm,
}

impl Dependency {
    pub const ALL: [Dependency; 2] = [Dependency::VideoData, Dependency::Llm];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Dependency::VideoData => "video_data",
            Dependency::Llm => "llm",
        }
    }

    fn index(self) -> usize {
        match self {
            Dependency::VideoData => 0,
            Dependency::Llm => 1,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Budget of `limit` cost units per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub limit: u64,
    pub window: Duration,
}

impl Budget {
    #[must_use]
    pub fn per_day(limit: u64) -> Self {
        Self { limit, window: DAY }
    }

    #[must_use]
    pub fn per_minute(limit: u64) -> Self {
        Self {
            limit,
            window: MINUTE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{dependency} quota exceeded: requested {requested}, remaining {remaining}")]
pub struct QuotaExceeded {
    pub dependency: Dependency,
    pub requested: u64,
    pub remaining: u64,
}

/// Point-in-time view of one dependency's window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub dependency: Dependency,
    pub limit: u64,
    pub used: u64,
    pub in_flight: u64,
    pub window_secs: u64,
    pub resets_in_secs: u64,
}

#[derive(Debug)]
struct Bucket {
    budget: Budget,
    started_at: Instant,
    /// Incremented at every rollover so stale tokens can be recognised.
    epoch: u64,
    used: u64,
    in_flight: u64,
}

impl Bucket {
    fn new(budget: Budget) -> Self {
        Self {
            budget,
            started_at: Instant::now(),
            epoch: 0,
            used: 0,
            in_flight: 0,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.started_at) >= self.budget.window {
            self.started_at = now;
            self.epoch += 1;
            self.used = 0;
            self.in_flight = 0;
        }
    }

    fn remaining(&self) -> u64 {
        self.budget.limit.saturating_sub(self.used)
    }

    fn snapshot(&self, dependency: Dependency, now: Instant) -> QuotaSnapshot {
        let elapsed = now.duration_since(self.started_at);
        QuotaSnapshot {
            dependency,
            limit: self.budget.limit,
            used: self.used,
            in_flight: self.in_flight,
            window_secs: self.budget.window.as_secs(),
            resets_in_secs: self.budget.window.saturating_sub(elapsed).as_secs(),
        }
    }
}

#[derive(Debug)]
struct Buckets {
    slots: [Mutex<Bucket>; 2],
}

impl Buckets {
    fn lock(&self, dependency: Dependency) -> MutexGuard<'_, Bucket> {
        self.slots[dependency.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, dependency: Dependency, epoch: u64, cost: u64) {
        let mut bucket = self.lock(dependency);
        if bucket.epoch == epoch {
            bucket.in_flight = bucket.in_flight.saturating_sub(cost);
        }
    }
}

/// Shared budget tracker. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct QuotaGovernor {
    buckets: Arc<Buckets>,
}

impl QuotaGovernor {
    #[must_use]
    pub fn new(video_data: Budget, llm: Budget) -> Self {
        Self {
            buckets: Arc::new(Buckets {
                slots: [Mutex::new(Bucket::new(video_data)), Mutex::new(Bucket::new(llm))],
            }),
        }
    }

    /// Video-data units per 24 h and LLM tokens per minute.
    #[must_use]
    pub fn with_limits(video_units_per_day: u64, llm_tokens_per_minute: u64) -> Self {
        Self::new(
            Budget::per_day(video_units_per_day),
            Budget::per_minute(llm_tokens_per_minute),
        )
    }

    /// Reserve `cost` units of `dependency` in the current window.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaExceeded`] immediately when the window cannot cover
    /// `cost`. Never waits for the window to roll over.
    pub fn acquire(&self, dependency: Dependency, cost: u64) -> Result<QuotaToken, QuotaExceeded> {
        let mut bucket = self.buckets.lock(dependency);
        bucket.roll(Instant::now());

        let remaining = bucket.remaining();
        if cost > remaining {
            tracing::debug!(%dependency, cost, remaining, "quota exhausted");
            return Err(QuotaExceeded {
                dependency,
                requested: cost,
                remaining,
            });
        }

        bucket.used += cost;
        bucket.in_flight += cost;
        Ok(QuotaToken {
            buckets: Arc::clone(&self.buckets),
            dependency,
            cost,
            epoch: bucket.epoch,
            active: true,
        })
    }

    /// End a reservation, keeping its charge.
    pub fn release(&self, token: QuotaToken) {
        drop(token);
    }

    /// End a reservation and replace its estimated charge with `actual`.
    ///
    /// No-op on the charge if the window rolled over since the reservation.
    pub fn settle(&self, mut token: QuotaToken, actual: u64) {
        token.active = false;
        let mut bucket = self.buckets.lock(token.dependency);
        if bucket.epoch == token.epoch {
            bucket.in_flight = bucket.in_flight.saturating_sub(token.cost);
            bucket.used = bucket.used.saturating_sub(token.cost).saturating_add(actual);
        }
    }

    /// Hand a reservation back uncharged. Returns `false` when the window
    /// has already rolled over, in which case nothing changes.
    pub fn refund(&self, mut token: QuotaToken) -> bool {
        token.active = false;
        let mut bucket = self.buckets.lock(token.dependency);
        if bucket.epoch != token.epoch {
            return false;
        }
        bucket.in_flight = bucket.in_flight.saturating_sub(token.cost);
        bucket.used = bucket.used.saturating_sub(token.cost);
        true
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<QuotaSnapshot> {
        let now = Instant::now();
        Dependency::ALL
            .iter()
            .map(|&dependency| {
                let mut bucket = self.buckets.lock(dependency);
                bucket.roll(now);
                bucket.snapshot(dependency, now)
            })
            .collect()
    }

    /// Log the final state of every window.
    pub fn shutdown(&self) {
        for snap in self.snapshot() {
            tracing::info!(
                dependency = %snap.dependency,
                used = snap.used,
                limit = snap.limit,
                in_flight = snap.in_flight,
                "quota governor shut down"
            );
        }
    }
}

/// A live reservation against one dependency's window.
#[must_use = "dropping a token immediately ends the reservation"]
#[derive(Debug)]
pub struct QuotaToken {
    buckets: Arc<Buckets>,
    dependency: Dependency,
    cost: u64,
    epoch: u64,
    active: bool,
}

impl QuotaToken {
    #[must_use]
    pub fn dependency(&self) -> Dependency {
        self.dependency
    }

    #[must_use]
    pub fn cost(&self) -> u64 {
        self.cost
    }
}

impl Drop for QuotaToken {
    fn drop(&mut self) {
        if self.active {
            self.buckets.finish(self.dependency, self.epoch, self.cost);
        }
    }
}
