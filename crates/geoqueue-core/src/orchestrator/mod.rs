//! # Batch Orchestrator
//!
//! Drives a work set through the [`ResolutionChain`] in fixed-size batches.
//!
//! ## Run loop
//!
//! 1. Fetch pending items from the [`WorkSource`].
//! 2. Split them into batches of `batch_size`.
//! 3. Resolve every item of a batch concurrently on the orchestrator's task;
//!    a failing or panicking item never affects its siblings.
//! 4. Fold the outcomes into [`BatchJobState`], publish a progress event.
//! 5. Sleep `inter_batch_delay` before the next batch, whatever the outcomes.
//!
//! `stop()` is cooperative: the batch in flight finishes, the next one is
//! never started. Only failures of the scaffolding itself (the work source)
//! fail the run; item failures end up in the counters.
//!
//! ## Observing a run
//!
//! Push: [`BatchOrchestrator::subscribe`] returns a broadcast receiver of
//! [`BatchEvent`]s. Poll: [`BatchOrchestrator::status`] and
//! [`BatchOrchestrator::snapshot`] return copies, never live state.

mod events;
mod state;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::routing::ResolutionChain;
use crate::{AddressQuery, CollaboratorError, GeocodeError, OrchestratorError, ResolvedLocation, WorkItem};

pub use events::{BatchEvent, EventPublisher, DEFAULT_EVENT_CAPACITY};
pub use state::{BatchJobState, ItemOutcome, RunState};

pub type CollaboratorFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, CollaboratorError>> + Send + 'a>>;

/// Supplies the records still missing coordinates.
pub trait WorkSource: Send + Sync {
    fn fetch_pending<'a>(&'a self) -> CollaboratorFuture<'a, Vec<WorkItem>>;
}

/// Receives resolution results; the orchestrator never reads persisted state back.
pub trait ResolutionSink: Send + Sync {
    fn persist_resolution<'a>(
        &'a self,
        record_id: &'a str,
        location: &'a ResolvedLocation,
    ) -> CollaboratorFuture<'a, ()>;

    fn mark_failed<'a>(
        &'a self,
        record_id: &'a str,
        reason: &'a GeocodeError,
    ) -> CollaboratorFuture<'a, ()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub batch_size: usize,
    /// Pacing between batches for third-party rate limits.
    pub inter_batch_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            inter_batch_delay: Duration::from_millis(crate::config::DEFAULT_INTER_BATCH_DELAY_MS),
        }
    }
}

/// How a call to [`BatchOrchestrator::start`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    Completed(BatchJobState),
    Stopped(BatchJobState),
    /// A run was already active; nothing was changed.
    AlreadyRunning,
}

impl RunReport {
    pub fn job(&self) -> Option<&BatchJobState> {
        match self {
            Self::Completed(job) | Self::Stopped(job) => Some(job),
            Self::AlreadyRunning => None,
        }
    }
}

/// Polling view for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub state: RunState,
    pub stop_requested: bool,
    pub batch_size: usize,
    pub inter_batch_delay_ms: u64,
    pub job: BatchJobState,
}

struct Inner {
    state: RunState,
    job: BatchJobState,
}

pub struct BatchOrchestrator {
    chain: Arc<ResolutionChain>,
    work_source: Arc<dyn WorkSource>,
    sink: Arc<dyn ResolutionSink>,
    config: OrchestratorConfig,
    inner: Mutex<Inner>,
    stop_requested: AtomicBool,
    events: EventPublisher,
}

impl BatchOrchestrator {
    pub fn new(
        chain: Arc<ResolutionChain>,
        work_source: Arc<dyn WorkSource>,
        sink: Arc<dyn ResolutionSink>,
        config: OrchestratorConfig,
    ) -> Self {
        let config = OrchestratorConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };
        Self {
            chain,
            work_source,
            sink,
            config,
            inner: Mutex::new(Inner {
                state: RunState::Idle,
                job: BatchJobState::default(),
            }),
            stop_requested: AtomicBool::new(false),
            events: EventPublisher::default(),
        }
    }

    pub fn config(&self) -> OrchestratorConfig {
        self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BatchJobState {
        self.lock().job.clone()
    }

    pub fn status(&self) -> OrchestratorStatus {
        let inner = self.lock();
        OrchestratorStatus {
            state: inner.state,
            stop_requested: self.stop_requested.load(Ordering::SeqCst),
            batch_size: self.config.batch_size,
            inter_batch_delay_ms: self.config.inter_batch_delay.as_millis() as u64,
            job: inner.job.clone(),
        }
    }

    /// Runs on a background tokio task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<Result<RunReport, OrchestratorError>> {
        tokio::spawn(async move { self.start().await })
    }

    /// Drives one run to its end in the caller's task.
    ///
    /// Starting while a run is active returns [`RunReport::AlreadyRunning`]
    /// and leaves the job state untouched. Starting from a terminal state
    /// begins a fresh run.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the scaffolding fails; the run is
    /// then `Failed` and an error event has been published.
    pub async fn start(&self) -> Result<RunReport, OrchestratorError> {
        let run_id = {
            let mut inner = self.lock();
            if inner.state == RunState::Running {
                info!(run_id = ?inner.job.run_id, "run already active; start ignored");
                return Ok(RunReport::AlreadyRunning);
            }

            let run_id = Uuid::new_v4();
            inner.state = RunState::Running;
            inner.job = BatchJobState::begin(run_id, OffsetDateTime::now_utc());
            self.stop_requested.store(false, Ordering::SeqCst);
            run_id
        };
        info!(%run_id, "batch run started");

        let mut guard = RunGuard {
            orchestrator: self,
            armed: true,
        };
        let result = match AssertUnwindSafe(self.run(run_id)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(OrchestratorError::Panicked(panic_message(panic.as_ref()))),
        };
        guard.armed = false;

        match result {
            Ok(report) => Ok(report),
            Err(error) => {
                self.fail(&error);
                Err(error)
            }
        }
    }

    /// Asks a running run to stop after its current batch.
    pub fn stop(&self) -> bool {
        let inner = self.lock();
        if inner.state != RunState::Running {
            debug!(state = %inner.state, "stop ignored; no active run");
            return false;
        }
        self.stop_requested.store(true, Ordering::SeqCst);
        info!(run_id = ?inner.job.run_id, "stop requested");
        true
    }

    /// Clears a finished run back to `Idle`; refused while running.
    pub fn reset(&self) -> bool {
        let mut inner = self.lock();
        if inner.state == RunState::Running {
            warn!("reset refused while a run is active");
            return false;
        }
        inner.state = RunState::Idle;
        inner.job = BatchJobState::default();
        self.stop_requested.store(false, Ordering::SeqCst);
        true
    }

    async fn run(&self, run_id: Uuid) -> Result<RunReport, OrchestratorError> {
        let items = self
            .work_source
            .fetch_pending()
            .await
            .map_err(|error| OrchestratorError::WorkSource(error.message().to_owned()))?;

        let started = Instant::now();
        self.lock().job.total = items.len();

        if items.is_empty() {
            info!(%run_id, "work set is empty");
            return Ok(self.finish(RunState::Completed, started));
        }

        let batch_count = items.len().div_ceil(self.config.batch_size);
        info!(
            %run_id,
            total = items.len(),
            batch_size = self.config.batch_size,
            batches = batch_count,
            "processing work set"
        );

        for (index, batch) in items.chunks(self.config.batch_size).enumerate() {
            let outcomes = join_all(batch.iter().map(|item| self.process_isolated(item))).await;

            let snapshot = {
                let mut inner = self.lock();
                for outcome in outcomes {
                    inner.job.record(outcome);
                }
                inner.job.recompute(started.elapsed());
                inner.job.clone()
            };
            info!(
                %run_id,
                batch = index + 1,
                batches = batch_count,
                processed = snapshot.processed,
                successful = snapshot.successful,
                errors = snapshot.errors,
                percentage = snapshot.percentage,
                eta_seconds = ?snapshot.estimated_seconds_remaining,
                "batch settled"
            );
            self.events.publish(BatchEvent::Progress(snapshot));

            if index + 1 == batch_count {
                break;
            }
            if self.stop_requested() {
                return Ok(self.finish(RunState::Stopped, started));
            }
            tokio::time::sleep(self.config.inter_batch_delay).await;
            if self.stop_requested() {
                return Ok(self.finish(RunState::Stopped, started));
            }
        }

        Ok(self.finish(RunState::Completed, started))
    }

    async fn process_isolated(&self, item: &WorkItem) -> ItemOutcome {
        match AssertUnwindSafe(self.process_item(item)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(record_id = %item.id, panic = %message, "item handler panicked");
                let reason = GeocodeError::internal(format!("item handler panicked: {message}"));
                self.mark_failed(&item.id, &reason).await;
                ItemOutcome::Panicked
            }
        }
    }

    async fn process_item(&self, item: &WorkItem) -> ItemOutcome {
        let query = match AddressQuery::from_work_item(item) {
            Ok(query) => query,
            Err(error) => {
                debug!(record_id = %item.id, error = %error, "skipping item with invalid input");
                self.mark_failed(&item.id, &error).await;
                return ItemOutcome::Skipped;
            }
        };

        match self.chain.resolve(&query).await {
            Ok(location) => match self.sink.persist_resolution(&item.id, &location).await {
                Ok(()) => {
                    debug!(record_id = %item.id, provider = %location.provider, "item resolved");
                    ItemOutcome::Resolved
                }
                Err(error) => {
                    warn!(record_id = %item.id, error = %error, "resolution could not be persisted");
                    ItemOutcome::Failed
                }
            },
            Err(failure) => {
                debug!(
                    record_id = %item.id,
                    attempted = ?failure.attempted,
                    error = %failure.error,
                    "item exhausted every provider"
                );
                self.mark_failed(&item.id, &failure.error).await;
                ItemOutcome::Failed
            }
        }
    }

    async fn mark_failed(&self, record_id: &str, reason: &GeocodeError) {
        if let Err(error) = self.sink.mark_failed(record_id, reason).await {
            warn!(record_id, error = %error, "failure could not be recorded");
        }
    }

    fn finish(&self, state: RunState, started: Instant) -> RunReport {
        let snapshot = {
            let mut inner = self.lock();
            inner.job.recompute(started.elapsed());
            inner.job.finish(OffsetDateTime::now_utc());
            inner.state = state;
            inner.job.clone()
        };
        info!(
            run_id = ?snapshot.run_id,
            state = %state,
            processed = snapshot.processed,
            successful = snapshot.successful,
            errors = snapshot.errors,
            skipped = snapshot.skipped,
            "batch run finished"
        );

        if state == RunState::Stopped {
            self.events.publish(BatchEvent::Stopped(snapshot.clone()));
            RunReport::Stopped(snapshot)
        } else {
            self.events.publish(BatchEvent::Completed(snapshot.clone()));
            RunReport::Completed(snapshot)
        }
    }

    fn fail(&self, failure: &OrchestratorError) {
        let snapshot = {
            let mut inner = self.lock();
            inner.job.finish(OffsetDateTime::now_utc());
            inner.state = RunState::Failed;
            inner.job.clone()
        };
        error!(run_id = ?snapshot.run_id, error = %failure, "batch run failed");
        self.events.publish(BatchEvent::Error {
            error: failure.clone(),
            state: snapshot,
        });
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Leaves no run stuck in `Running` when the driving future is dropped mid-run.
struct RunGuard<'a> {
    orchestrator: &'a BatchOrchestrator,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let snapshot = {
            let mut inner = self.orchestrator.lock();
            if inner.state != RunState::Running {
                return;
            }
            inner.job.finish(OffsetDateTime::now_utc());
            inner.state = RunState::Stopped;
            inner.job.clone()
        };
        warn!(run_id = ?snapshot.run_id, "run future dropped mid-run; marked stopped");
        self.orchestrator
            .events
            .publish(BatchEvent::Stopped(snapshot));
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}
