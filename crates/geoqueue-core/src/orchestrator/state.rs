use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Orchestrator lifecycle.
///
/// `Idle -> Running -> Completed | Stopped | Failed`; every terminal state
/// goes back to `Idle` on reset (or implicitly on the next start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl RunState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one work item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Resolved and persisted.
    Resolved,
    /// Chain exhausted, or the location could not be persisted.
    Failed,
    /// Input could not form a query; no provider was called.
    Skipped,
    /// The item handler panicked.
    Panicked,
}

/// Counters and timing for one run.
///
/// Callers only ever see copies. `skipped` is a subset of `errors`, and every
/// snapshot satisfies `processed == successful + errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJobState {
    pub run_id: Option<Uuid>,
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub errors: usize,
    pub skipped: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    /// Rounded share of `total` already processed, 0..=100.
    pub percentage: u8,
    pub estimated_seconds_remaining: Option<u64>,
}

impl BatchJobState {
    pub(crate) fn begin(run_id: Uuid, started_at: OffsetDateTime) -> Self {
        Self {
            run_id: Some(run_id),
            started_at: Some(started_at),
            ..Self::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub(crate) fn record(&mut self, outcome: ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Resolved => self.successful += 1,
            ItemOutcome::Failed | ItemOutcome::Panicked => self.errors += 1,
            ItemOutcome::Skipped => {
                self.errors += 1;
                self.skipped += 1;
            }
        }
    }

    /// Recomputes percentage and ETA from the whole run's average item time.
    pub(crate) fn recompute(&mut self, elapsed: Duration) {
        if self.total == 0 {
            self.percentage = 100;
            self.estimated_seconds_remaining = Some(0);
            return;
        }

        let ratio = self.processed as f64 / self.total as f64;
        self.percentage = (ratio * 100.0).round().clamp(0.0, 100.0) as u8;

        self.estimated_seconds_remaining = if self.processed == 0 {
            None
        } else {
            let per_item = elapsed.as_secs_f64() / self.processed as f64;
            Some((per_item * self.remaining() as f64).round() as u64)
        };
    }

    pub(crate) fn finish(&mut self, finished_at: OffsetDateTime) {
        self.finished_at = Some(finished_at);
        if self.remaining() == 0 {
            self.percentage = 100;
            self.estimated_seconds_remaining = Some(0);
        }
    }
}
