use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, warn};

use crate::error::{BotError, Result};

/// Detached unit of work; its error is logged and dropped
pub type VerificationJob = BoxFuture<'static, Result<()>>;

struct QueuedJob {
    label: String,
    job: VerificationJob,
}

/// Bounded worker pool for background verifications
///
/// Submitters never wait: jobs go into a bounded queue and are rejected when
/// it is full. A dispatcher task runs at most `max_concurrent` jobs at a time.
/// Results never flow back to the submitter.
pub struct VerificationPool {
    tx: mpsc::Sender<QueuedJob>,
    dispatcher: JoinHandle<()>,
}

impl VerificationPool {
    /// Start the dispatcher; must be called inside a tokio runtime
    pub fn start(max_concurrent: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let dispatcher = tokio::spawn(dispatch(rx, semaphore));
        Self { tx, dispatcher }
    }

    /// Queue a job without blocking
    pub fn submit(&self, label: impl Into<String>, job: VerificationJob) -> Result<()> {
        let label = label.into();
        match self.tx.try_send(QueuedJob {
            label: label.clone(),
            job,
        }) {
            Ok(()) => {
                debug!("Queued verification job '{}'", label);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Verification queue full, dropping job '{}'", label);
                Err(BotError::QueueRejected {
                    message: format!("queue full, dropped '{}'", label),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Verification pool is shut down, dropping job '{}'", label);
                Err(BotError::QueueRejected {
                    message: format!("pool closed, dropped '{}'", label),
                })
            }
        }
    }

    /// Stop accepting jobs and wait for queued and running ones to finish
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.dispatcher.await {
            error!("Verification dispatcher ended abnormally: {}", e);
        }
    }
}

async fn dispatch(mut rx: mpsc::Receiver<QueuedJob>, semaphore: Arc<Semaphore>) {
    let mut in_flight = JoinSet::new();

    while let Some(queued) = rx.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        in_flight.spawn(async move {
            let _permit = permit;
            if let Err(e) = queued.job.await {
                warn!("Verification job '{}' abandoned: {}", queued.label, e);
            }
        });

        while let Some(joined) = in_flight.try_join_next() {
            log_join(joined);
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        log_join(joined);
    }
    debug!("Verification dispatcher stopped");
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!("Verification job panicked: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_jobs_run_and_shutdown_waits() {
        let pool = VerificationPool::start(2, 8);
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..5 {
            let done = done.clone();
            pool.submit(
                format!("job-{}", i),
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();
        }

        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let pool = VerificationPool::start(2, 16);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for i in 0..8 {
            let running = running.clone();
            let peak = peak.clone();
            pool.submit(
                format!("job-{}", i),
                Box::pin(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();
        }

        pool.shutdown().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let pool = VerificationPool::start(1, 1);
        let gate = Arc::new(Notify::new());

        // Occupies the only permit until released
        let blocker = gate.clone();
        pool.submit("blocker", Box::pin(async move {
            blocker.notified().await;
            Ok(())
        }))
        .unwrap();

        // Give the dispatcher time to pull the blocker off the queue
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Dispatcher holds this one waiting for a permit
        pool.submit("waiting", Box::pin(async { Ok(()) })).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Fills the queue
        pool.submit("queued", Box::pin(async { Ok(()) })).unwrap();

        let rejected = pool.submit("overflow", Box::pin(async { Ok(()) }));
        assert!(matches!(rejected, Err(BotError::QueueRejected { .. })));

        gate.notify_one();
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_failing_job_does_not_stop_pool() {
        let pool = VerificationPool::start(1, 4);
        let done = Arc::new(AtomicUsize::new(0));

        pool.submit("fails", Box::pin(async {
            Err(BotError::Ocr {
                message: "engine crashed".to_string(),
            })
        }))
        .unwrap();

        let counter = done.clone();
        pool.submit("succeeds", Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();

        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
