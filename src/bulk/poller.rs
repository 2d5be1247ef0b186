//! Job status polling for bulk uploads.
//!
//! [`JobPoller`] fetches a job's status once per fixed interval until the
//! job reaches a terminal state, the caller cancels, or a fetch fails.
//!
//! - One fetch per tick; the next tick is awaited only after the fetch
//!   returns, so fetches never overlap
//! - Ticks missed while a fetch was slow are skipped, not replayed
//! - No retries: the first failed fetch ends polling with `AppError::PollFailed`
//! - Cancellation is checked before every tick; an in-flight fetch finishes

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::api::client::{redact_id, ApiClient};
use crate::bulk::job::JobSnapshot;
use crate::bulk::upload::check_job_id;
use crate::config::ClientConfig;
use crate::error::AppError;

/// When the first status fetch happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FirstFetch {
    /// Fetch as soon as polling starts.
    #[default]
    Immediate,
    /// Wait one interval first. Useful when the server registers the job
    /// asynchronously and an early fetch could return 404.
    AfterInterval,
}

/// How a poll loop ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job reached COMPLETED or FAILED.
    Finished { snapshot: JobSnapshot, fetches: u64 },
    /// The caller cancelled before the job finished.
    Cancelled {
        last: Option<JobSnapshot>,
        fetches: u64,
    },
}

impl PollOutcome {
    pub fn fetches(&self) -> u64 {
        match self {
            PollOutcome::Finished { fetches, .. } | PollOutcome::Cancelled { fetches, .. } => {
                *fetches
            }
        }
    }

    /// The most recent snapshot, if any fetch succeeded.
    pub fn snapshot(&self) -> Option<&JobSnapshot> {
        match self {
            PollOutcome::Finished { snapshot, .. } => Some(snapshot),
            PollOutcome::Cancelled { last, .. } => last.as_ref(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Traits for Testing
// ─────────────────────────────────────────────────────────────────────────────

/// Source of job snapshots, allowing test fakes.
pub trait JobStatusSource: Send + Sync {
    /// Fetches the current snapshot of a job.
    fn fetch_status<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<JobSnapshot, AppError>> + Send + 'a>>;
}

impl JobStatusSource for ApiClient {
    fn fetch_status<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<JobSnapshot, AppError>> + Send + 'a>> {
        Box::pin(ApiClient::bulk_upload_status(self, job_id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JobPoller
// ─────────────────────────────────────────────────────────────────────────────

/// Polls one job at a time at a fixed interval.
#[derive(Debug, Clone)]
pub struct JobPoller<S> {
    source: S,
    interval: Duration,
    first_fetch: FirstFetch,
}

impl<S: JobStatusSource> JobPoller<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source,
            interval,
            first_fetch: FirstFetch::default(),
        }
    }

    /// Uses the poll interval and first-fetch policy from `config`.
    pub fn from_config(source: S, config: &ClientConfig) -> Self {
        Self::new(source, config.poll_interval).with_first_fetch(config.first_fetch)
    }

    pub fn with_first_fetch(mut self, first_fetch: FirstFetch) -> Self {
        self.first_fetch = first_fetch;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Polls `job_id` until it is terminal or `cancel` fires, calling
    /// `on_snapshot` with every snapshot in fetch order.
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` - empty job id; nothing was fetched
    /// - `AppError::Config` - zero interval
    /// - `AppError::PollFailed` - a fetch failed; no further fetches happen
    pub async fn run<F>(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
        mut on_snapshot: F,
    ) -> Result<PollOutcome, AppError>
    where
        F: FnMut(&JobSnapshot),
    {
        check_job_id(job_id)?;
        if self.interval.is_zero() {
            return Err(AppError::Config(
                "Poll interval must be greater than zero".into(),
            ));
        }

        let start = match self.first_fetch {
            FirstFetch::Immediate => Instant::now(),
            FirstFetch::AfterInterval => Instant::now() + self.interval,
        };
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "[BULK] Polling job {} every {}ms",
            redact_id(job_id),
            self.interval.as_millis()
        );

        let mut fetches = 0u64;
        let mut last: Option<JobSnapshot> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(
                        "[BULK] Polling job {} cancelled after {} fetches",
                        redact_id(job_id),
                        fetches
                    );
                    return Ok(PollOutcome::Cancelled { last, fetches });
                }
                _ = ticker.tick() => {}
            }

            fetches += 1;
            let snapshot = match self.source.fetch_status(job_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(
                        "[BULK] Status fetch {} for job {} failed: {}",
                        fetches,
                        redact_id(job_id),
                        e
                    );
                    return Err(AppError::PollFailed {
                        job_id: job_id.to_string(),
                        source: Box::new(e),
                    });
                }
            };

            debug!(
                "[BULK] Job {} fetch {}: {} ({} processed)",
                redact_id(job_id),
                fetches,
                snapshot.status,
                snapshot.processed()
            );
            on_snapshot(&snapshot);

            if snapshot.is_terminal() {
                info!(
                    "[BULK] Job {} finished {} after {} fetches",
                    redact_id(job_id),
                    snapshot.status,
                    fetches
                );
                return Ok(PollOutcome::Finished { snapshot, fetches });
            }
            last = Some(snapshot);
        }
    }
}

impl<S: JobStatusSource + 'static> JobPoller<S> {
    /// Runs the poll loop on a background task.
    ///
    /// Snapshots arrive on [`PollHandle::next`]; the loop's result is
    /// returned by [`PollHandle::join`]. Dropping the handle cancels the loop.
    pub fn spawn(self, job_id: impl Into<String>) -> PollHandle {
        let job_id = job_id.into();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            self.run(&job_id, &task_cancel, |snapshot| {
                // A dropped receiver only means nobody is watching.
                let _ = tx.send(snapshot.clone());
            })
            .await
        });

        PollHandle {
            updates: rx,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }
}

/// Handle to a spawned poll loop.
#[derive(Debug)]
pub struct PollHandle {
    updates: mpsc::UnboundedReceiver<JobSnapshot>,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
    task: JoinHandle<Result<PollOutcome, AppError>>,
}

impl PollHandle {
    /// Next snapshot, or `None` once the loop has ended and all snapshots
    /// were received.
    pub async fn next(&mut self) -> Option<JobSnapshot> {
        self.updates.recv().await
    }

    /// Requests cancellation; no fetch starts after this.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the loop to end.
    pub async fn join(self) -> Result<PollOutcome, AppError> {
        self.task
            .await
            .map_err(|e| AppError::Internal(format!("Poll task failed: {}", e)))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
