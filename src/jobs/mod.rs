//! Background transcode jobs.
//!
//! The session manager only sees the [`JobQueue`] trait: submit a
//! [`StreamProps`], get back a job id and an event subscription, cancel or
//! heartbeat by id. [`LocalJobQueue`] runs jobs as tokio tasks in this process
//! and hands each one to a [`Transcoder`].

mod queue;
mod transcode;

pub use queue::LocalJobQueue;
pub use transcode::{FfmpegTranscoder, TranscodeSettings};

use async_trait::async_trait;
use reelcast_common::{Error, JobId, Result, StreamProps};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Lifecycle events published by a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// The job got a worker and began transcoding.
    Started,
    /// The job received a client heartbeat.
    Heartbeat,
    /// The job produced its whole output.
    Succeeded,
    /// The job stopped early. Carries the reason.
    Failed(String),
}

/// Signals a client can send to a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSignal {
    Heartbeat,
}

/// Subscription to one job's events.
#[derive(Debug)]
pub struct JobEvents {
    rx: broadcast::Receiver<JobEvent>,
}

impl JobEvents {
    pub fn new(rx: broadcast::Receiver<JobEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the job is gone.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped = skipped, "Job event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Wait until the job reports that it started.
    ///
    /// A job that finishes without a separate start event also counts as
    /// started. Timing out does not affect the job.
    pub async fn wait_until_started(mut self, timeout: Duration) -> Result<()> {
        let wait = async {
            while let Some(event) = self.recv().await {
                match event {
                    JobEvent::Started | JobEvent::Succeeded => return Ok(()),
                    JobEvent::Heartbeat => continue,
                    JobEvent::Failed(reason) => return Err(Error::upstream_failure(reason)),
                }
            }
            Err(Error::upstream_failure("job ended before starting"))
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(Error::upstream_timeout(format!(
                "job did not start within {:?}",
                timeout
            ))),
        }
    }
}

/// An accepted job.
#[derive(Debug)]
pub struct JobHandle {
    pub id: JobId,
    pub events: JobEvents,
}

/// Asynchronous job execution with cooperative cancellation.
#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Accept a transcode. Returns once the job is queued, not when it runs.
    async fn submit(&self, props: StreamProps) -> Result<JobHandle>;

    /// Ask a job to stop. Unknown or finished jobs are not an error.
    async fn cancel(&self, id: &JobId) -> Result<()>;

    /// Deliver a signal to a job. Unknown or finished jobs are not an error.
    async fn notify(&self, id: &JobId, signal: JobSignal) -> Result<()>;
}

/// What a [`Transcoder`] gets for one job.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub id: JobId,
    pub props: StreamProps,
    /// Cancelled on explicit cancel, on heartbeat timeout and on shutdown.
    pub cancel: CancellationToken,
}

/// Runs a single transcode to completion.
///
/// Implementations must stop promptly once `job.cancel` fires and must not
/// write any more output after noticing it.
#[async_trait]
pub trait Transcoder: Send + Sync + 'static {
    async fn run(&self, job: JobContext) -> Result<()>;
}
