//! In-process job queue.

use async_trait::async_trait;
use dashmap::DashMap;
use reelcast_common::{Error, JobId, Result, StreamProps};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{JobContext, JobEvent, JobEvents, JobHandle, JobQueue, JobSignal, Transcoder};

/// Buffered events per job. Subscribers that fall further behind skip ahead.
const EVENT_CAPACITY: usize = 16;

struct JobEntry {
    cancel: CancellationToken,
    heartbeat: watch::Sender<Instant>,
    events: broadcast::Sender<JobEvent>,
}

struct Inner {
    transcoder: Arc<dyn Transcoder>,
    jobs: DashMap<JobId, JobEntry>,
    permits: Arc<Semaphore>,
    heartbeat_window: Duration,
    shutdown: CancellationToken,
}

/// Runs jobs as tokio tasks, at most `concurrency` at a time.
///
/// A running job that receives no heartbeat for `heartbeat_window` is
/// cancelled, which is what reclaims transcodes abandoned by their client.
#[derive(Clone)]
pub struct LocalJobQueue {
    inner: Arc<Inner>,
}

impl LocalJobQueue {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        concurrency: usize,
        heartbeat_window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transcoder,
                jobs: DashMap::new(),
                permits: Arc::new(Semaphore::new(concurrency.max(1))),
                heartbeat_window,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Number of jobs that are queued or running.
    pub fn active_jobs(&self) -> usize {
        self.inner.jobs.len()
    }

    /// Whether a job is still queued or running.
    pub fn is_active(&self, id: &JobId) -> bool {
        self.inner.jobs.contains_key(id)
    }

    /// Cancel every job, including ones submitted later.
    pub fn shutdown(&self) {
        info!(active = self.active_jobs(), "Shutting down job queue");
        self.inner.shutdown.cancel();
    }
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn submit(&self, props: StreamProps) -> Result<JobHandle> {
        if self.inner.shutdown.is_cancelled() {
            return Err(Error::queue("job queue is shut down"));
        }

        let id = JobId::new();
        let cancel = self.inner.shutdown.child_token();
        let (heartbeat, heartbeat_rx) = watch::channel(Instant::now());
        let (events, events_rx) = broadcast::channel(EVENT_CAPACITY);

        self.inner.jobs.insert(
            id,
            JobEntry {
                cancel: cancel.clone(),
                heartbeat,
                events: events.clone(),
            },
        );

        info!(
            job_id = %id,
            stream_id = %props.stream_id,
            media_id = %props.media.media_id,
            start_offset = props.start_offset_secs,
            "Submitted transcode job"
        );

        tokio::spawn(run_job(
            Arc::clone(&self.inner),
            JobContext { id, props, cancel },
            heartbeat_rx,
            events,
        ));

        Ok(JobHandle {
            id,
            events: JobEvents::new(events_rx),
        })
    }

    async fn cancel(&self, id: &JobId) -> Result<()> {
        match self.inner.jobs.get(id) {
            Some(job) => {
                info!(job_id = %id, "Cancelling transcode job");
                job.cancel.cancel();
            }
            None => debug!(job_id = %id, "Cancel for unknown job ignored"),
        }
        Ok(())
    }

    async fn notify(&self, id: &JobId, signal: JobSignal) -> Result<()> {
        match self.inner.jobs.get(id) {
            Some(job) => match signal {
                JobSignal::Heartbeat => {
                    job.heartbeat.send_replace(Instant::now());
                    let _ = job.events.send(JobEvent::Heartbeat);
                }
            },
            None => debug!(job_id = %id, ?signal, "Signal for unknown job ignored"),
        }
        Ok(())
    }
}

async fn run_job(
    inner: Arc<Inner>,
    job: JobContext,
    heartbeat_rx: watch::Receiver<Instant>,
    events: broadcast::Sender<JobEvent>,
) {
    let id = job.id;
    let cancel = job.cancel.clone();

    let permit = tokio::select! {
        permit = Arc::clone(&inner.permits).acquire_owned() => permit.ok(),
        _ = cancel.cancelled() => None,
    };

    let outcome = match permit {
        Some(_permit) => {
            let watchdog = tokio::spawn(watch_heartbeats(
                id,
                heartbeat_rx,
                inner.heartbeat_window,
                cancel.clone(),
            ));

            let _ = events.send(JobEvent::Started);
            info!(job_id = %id, "Transcode job started");

            let result = inner.transcoder.run(job).await;
            watchdog.abort();
            result
        }
        None => Err(Error::queue("cancelled before start")),
    };

    inner.jobs.remove(&id);

    let event = match outcome {
        Ok(()) if !cancel.is_cancelled() => {
            info!(job_id = %id, "Transcode job succeeded");
            JobEvent::Succeeded
        }
        Ok(()) => {
            info!(job_id = %id, "Transcode job cancelled");
            JobEvent::Failed("cancelled".to_string())
        }
        Err(e) => {
            warn!(job_id = %id, error = %e, "Transcode job failed");
            JobEvent::Failed(e.to_string())
        }
    };
    let _ = events.send(event);
}

/// Cancel the job once the last heartbeat is older than `window`.
///
/// The window counts from when the job started running, so time spent waiting
/// for a worker does not count against it.
async fn watch_heartbeats(
    id: JobId,
    mut heartbeat_rx: watch::Receiver<Instant>,
    window: Duration,
    cancel: CancellationToken,
) {
    let started = Instant::now();
    loop {
        let deadline = (*heartbeat_rx.borrow_and_update()).max(started) + window;
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                if (*heartbeat_rx.borrow()).max(started) + window <= Instant::now() {
                    warn!(job_id = %id, window_secs = window.as_secs(), "No heartbeat, stopping job");
                    cancel.cancel();
                    return;
                }
            }
            changed = heartbeat_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = cancel.cancelled() => return,
        }
    }
}
