//! Tiling service daemon.
//!
//! The [`TilingDaemon`] is a long-running background service that:
//! - Receives [`TilingJob`]s from producers via a bounded channel
//! - Runs each job on the blocking pool, at most `max_concurrent_jobs` at once
//! - Publishes exactly one [`JobEvent`] per accepted job
//!
//! Producers get their acknowledgement as soon as the job is queued; tiling
//! happens in the background.
//!
//! # Example
//!
//! ```ignore
//! use geopyramid::service::{TilingDaemon, TilingDaemonConfig};
//!
//! let (daemon, jobs, mut events) = TilingDaemon::new(orchestrator, TilingDaemonConfig::default());
//! let shutdown = CancellationToken::new();
//! tokio::spawn(daemon.run(shutdown.clone()));
//!
//! jobs.submit(job).await?;
//! let event = events.recv().await;
//! ```

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_MAX_CONCURRENT_JOBS;
use crate::orchestrator::{
    JobErrorKind, JobFailure, JobOutcome, JobReport, TilingJob, TilingOrchestrator,
};
use crate::pyramid::LayerId;

/// Default channel capacity for queued jobs.
pub const DEFAULT_JOB_CHANNEL_CAPACITY: usize = 64;

/// Configuration for the tiling daemon.
#[derive(Clone, Debug)]
pub struct TilingDaemonConfig {
    /// Job queue capacity.
    pub channel_capacity: usize,

    /// Jobs tiling at the same time.
    pub max_concurrent_jobs: usize,
}

impl Default for TilingDaemonConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_JOB_CHANNEL_CAPACITY,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

impl TilingDaemonConfig {
    pub fn with_max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.max_concurrent_jobs = jobs.max(1);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// Terminal notification for one job.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Succeeded(JobReport),
    Failed(JobFailure),
}

impl JobEvent {
    pub fn layer(&self) -> &LayerId {
        match self {
            JobEvent::Succeeded(report) => &report.layer,
            JobEvent::Failed(failure) => &failure.layer,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobEvent::Succeeded(_))
    }
}

impl From<JobOutcome> for JobEvent {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            Ok(report) => JobEvent::Succeeded(report),
            Err(failure) => JobEvent::Failed(failure),
        }
    }
}

/// Errors submitting work to the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Tiling service is shut down")]
    Closed,

    #[error("Tiling job queue is full")]
    QueueFull,
}

/// Cloneable producer handle.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::Sender<TilingJob>,
}

impl JobSender {
    /// Queues a job, waiting for queue space.
    ///
    /// Returns once the job is accepted, not when it finishes.
    pub async fn submit(&self, job: TilingJob) -> Result<(), ServiceError> {
        self.tx.send(job).await.map_err(|_| ServiceError::Closed)
    }

    /// Queues a job without waiting.
    pub fn try_submit(&self, job: TilingJob) -> Result<(), ServiceError> {
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => ServiceError::QueueFull,
            TrySendError::Closed(_) => ServiceError::Closed,
        })
    }
}

/// The tiling daemon.
///
/// Owns the job queue and runs jobs through a shared orchestrator.
pub struct TilingDaemon {
    orchestrator: Arc<TilingOrchestrator>,
    permits: Arc<Semaphore>,
    job_rx: mpsc::Receiver<TilingJob>,
    event_tx: mpsc::UnboundedSender<JobEvent>,
}

impl TilingDaemon {
    /// Creates a new daemon with its channels.
    ///
    /// Returns the daemon, a sender that can be cloned for producers, and
    /// the receiver for job events.
    pub fn new(
        orchestrator: Arc<TilingOrchestrator>,
        config: TilingDaemonConfig,
    ) -> (Self, JobSender, mpsc::UnboundedReceiver<JobEvent>) {
        let (job_tx, job_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let daemon = Self {
            orchestrator,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            job_rx,
            event_tx,
        };

        (daemon, JobSender { tx: job_tx }, event_rx)
    }

    /// Runs the daemon until shutdown is signalled and the queue is drained.
    ///
    /// Shutdown stops new submissions. Jobs already accepted still run, so
    /// every acknowledged job gets its event.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Tiling daemon starting");

        let Self {
            orchestrator,
            permits,
            mut job_rx,
            event_tx,
        } = self;

        let mut in_flight = JoinSet::new();
        let mut closing = false;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled(), if !closing => {
                    info!("Tiling daemon shutting down, draining accepted jobs");
                    job_rx.close();
                    closing = true;
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Tiling task ended abnormally");
                    }
                }

                job = job_rx.recv() => {
                    let Some(job) = job else {
                        debug!("Job channel closed");
                        break;
                    };
                    let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                        break;
                    };

                    let orchestrator = Arc::clone(&orchestrator);
                    let events = event_tx.clone();
                    in_flight.spawn(async move {
                        let event = Self::run_job(orchestrator, job).await;
                        drop(permit);
                        if events.send(event).is_err() {
                            debug!("Job event receiver dropped");
                        }
                    });
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Tiling task ended abnormally");
            }
        }
        info!("Tiling daemon stopped");
    }

    async fn run_job(orchestrator: Arc<TilingOrchestrator>, job: TilingJob) -> JobEvent {
        let start = Instant::now();
        let layer = job.layer().clone();
        debug!(layer = %layer, kind = %job.kind(), "Dispatching tiling job");

        let event = match tokio::task::spawn_blocking(move || orchestrator.run(job)).await {
            Ok(outcome) => JobEvent::from(outcome),
            Err(e) => {
                let detail = if e.is_panic() {
                    format!("tiling job panicked: {}", panic_detail(e.into_panic()))
                } else {
                    "tiling job was cancelled".to_string()
                };
                warn!(layer = %layer, error = %detail, "Tiling job aborted");
                JobEvent::Failed(JobFailure {
                    layer,
                    kind: JobErrorKind::Load,
                    detail,
                })
            }
        };

        debug!(
            layer = %event.layer(),
            success = event.is_success(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Tiling job finished"
        );
        event
    }
}

fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .unwrap_or_else(|| "non-string panic payload".to_string()),
    }
}
