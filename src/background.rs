//! Detached background work, such as sending mail after a request has
//! already been answered.
//!
//! Jobs go through a bounded channel to a single worker which runs each one
//! on its own task under a concurrency limit. A job that fails or panics is
//! logged and dropped; it never reaches the request that submitted it.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_CONCURRENCY: usize = 8;

type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

struct Job {
    name: &'static str,
    fut: JobFuture,
}

#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Job>,
    in_flight: Arc<AtomicUsize>,
}

impl TaskQueue {
    /// Starts the worker. Must be called from within a Tokio runtime.
    pub fn new(capacity: usize, concurrency: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let in_flight = Arc::new(AtomicUsize::new(0));
        tokio::spawn(run_worker(
            rx,
            Arc::new(Semaphore::new(concurrency.max(1))),
            in_flight.clone(),
        ));
        Self { tx, in_flight }
    }

    /// Queues `fut` without waiting. Returns `false` when the job was dropped
    /// because the queue is full or the worker is gone.
    pub fn submit<F>(&self, name: &'static str, fut: F) -> bool
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let job = Job {
            name,
            fut: Box::pin(fut),
        };
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                warn!(job = job.name, "background queue full, job dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                error!(job = job.name, "background worker stopped, job dropped");
                false
            }
        }
    }

    /// Jobs queued or running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Waits for queued jobs to finish, giving up after `limit`.
    pub async fn drain(&self, limit: Duration) -> bool {
        let wait = async {
            while self.in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(limit, wait).await.is_ok()
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Job>,
    limit: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
) {
    while let Some(job) = rx.recv().await {
        let Ok(permit) = limit.clone().acquire_owned().await else {
            break;
        };
        let in_flight = in_flight.clone();
        tokio::spawn(async move {
            let name = job.name;
            match tokio::spawn(job.fut).await {
                Ok(Ok(())) => debug!(job = name, "background job finished"),
                Ok(Err(e)) => warn!(job = name, error = %e, "background job failed"),
                Err(e) if e.is_panic() => error!(job = name, "background job panicked"),
                Err(e) => warn!(job = name, error = %e, "background job cancelled"),
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        });
    }
    debug!("background worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn runs_submitted_jobs() {
        let queue = TaskQueue::new(4, 2);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        assert!(queue.submit("flag", async move {
            flag.store(true, Ordering::SeqCst);
            anyhow::Ok(())
        }));
        assert!(queue.drain(Duration::from_secs(1)).await);
        assert!(ran.load(Ordering::SeqCst));
    }

    fn explode() -> anyhow::Result<()> {
        panic!("boom")
    }

    #[tokio::test]
    async fn failures_and_panics_are_contained() {
        let queue = TaskQueue::new(4, 2);
        queue.submit("fails", async { Err::<(), _>(anyhow::anyhow!("smtp down")) });
        queue.submit("panics", async { explode() });

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        queue.submit("after", async move {
            flag.store(true, Ordering::SeqCst);
            anyhow::Ok(())
        });

        assert!(queue.drain(Duration::from_secs(1)).await);
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let queue = TaskQueue::new(1, 1);
        let gate = Arc::new(Semaphore::new(0));

        let g = gate.clone();
        queue.submit("blocker", async move {
            let _ = g.acquire().await;
            anyhow::Ok(())
        });
        // Let the worker pick up the blocker so the channel slot frees.
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The worker takes this one off the channel and waits for a permit.
        assert!(queue.submit("waiting", async { anyhow::Ok(()) }));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(queue.submit("queued", async { anyhow::Ok(()) }));
        assert!(!queue.submit("dropped", async { anyhow::Ok(()) }));

        gate.add_permits(1);
        assert!(queue.drain(Duration::from_secs(1)).await);
    }
}
