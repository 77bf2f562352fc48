// src/engine/pool.rs
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use serde::{Serialize, Deserialize};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{info, debug, warn};

use crate::error::{ScrapeResult, ScrapeError};

/// Worker count used when the caller asks for zero workers
pub const DEFAULT_WORKERS: usize = 4;

/// Upper bound on workers; larger requests are clamped
pub const MAX_WORKERS: usize = 1024;

/// Queue slots per worker
pub const QUEUE_FACTOR: usize = 4;

/// A unit of work accepted by the pool
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type TaskReceiver = Arc<AsyncMutex<mpsc::Receiver<Task>>>;

/// Lifecycle of a pool
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PoolState {
    Running,
    Draining,
    Stopped,
}

/// Fixed-size worker group draining a bounded task queue.
///
/// At most `worker_count` tasks run at once. `submit` waits while the queue is
/// full. A task that panics is logged and dropped; the worker that ran it keeps
/// going. Tasks have no return channel, so callers that need results should use
/// [`gather`] or their own channel.
///
/// Tasks must not submit to the pool they run on: with every worker blocked on
/// a full queue the pool cannot make progress.
pub struct TaskPool {
    sender: RwLock<Option<mpsc::Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    state: Mutex<PoolState>,
    worker_count: usize,
    capacity: usize,
}

impl TaskPool {
    /// Create a pool and start its workers. Must be called inside a tokio runtime.
    pub fn new(worker_count: usize) -> Self {
        let worker_count = match worker_count {
            0 => DEFAULT_WORKERS,
            n if n > MAX_WORKERS => {
                warn!("Requested {} workers, clamping to {}", n, MAX_WORKERS);
                MAX_WORKERS
            }
            n => n,
        };
        let capacity = worker_count.saturating_mul(QUEUE_FACTOR);

        let (tx, rx) = mpsc::channel::<Task>(capacity);
        let receiver: TaskReceiver = Arc::new(AsyncMutex::new(rx));

        let workers = (0..worker_count)
            .map(|id| tokio::spawn(Self::worker_loop(id, receiver.clone())))
            .collect();

        info!("Started task pool with {} workers and queue capacity {}", worker_count, capacity);

        Self {
            sender: RwLock::new(Some(tx)),
            workers: Mutex::new(workers),
            state: Mutex::new(PoolState::Running),
            worker_count,
            capacity,
        }
    }

    /// Enqueue a task, waiting for queue space if necessary
    pub async fn submit<F>(&self, task: F) -> ScrapeResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.sender.read().clone().ok_or(ScrapeError::PoolStopped)?;

        sender
            .send(Box::pin(task))
            .await
            .map_err(|_| ScrapeError::PoolStopped)
    }

    /// Enqueue a plain closure as a task
    pub async fn submit_fn<F>(&self, f: F) -> ScrapeResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(async move { f() }).await
    }

    /// Stop accepting tasks and wait until every queued and running task has finished.
    ///
    /// Submitters already waiting for queue space when `stop` is called still get
    /// their task queued and run. Calling `stop` again returns `PoolStopped`.
    pub async fn stop(&self) -> ScrapeResult<()> {
        {
            let mut state = self.state.lock();
            if *state != PoolState::Running {
                return Err(ScrapeError::PoolStopped);
            }
            *state = PoolState::Draining;
        }

        debug!("Draining task pool");

        // Closing happens once the last sender clone held by a waiting submitter is gone.
        self.sender.write().take();

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Pool worker ended abnormally: {}", e);
            }
        }

        *self.state.lock() = PoolState::Stopped;
        info!("Task pool stopped");

        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> PoolState {
        *self.state.lock()
    }

    /// Number of workers
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Maximum number of queued tasks
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn worker_loop(id: usize, receiver: TaskReceiver) {
        loop {
            let task = {
                let mut rx = receiver.lock().await;
                rx.recv().await
            };

            match task {
                Some(task) => Self::run_isolated(id, task).await,
                None => break,
            }
        }

        debug!(worker = id, "Worker exiting");
    }

    /// Run a task on its own tokio task so a panic ends there instead of in the worker
    async fn run_isolated(worker: usize, task: Task) {
        match tokio::spawn(task).await {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                warn!(worker, "Discarding panicked task: {}", panic_message(e.into_panic().as_ref()));
            }
            Err(e) => {
                warn!(worker, "Discarding cancelled task: {}", e);
            }
        }
    }
}

/// Run every job through the pool and collect the outputs in submission order.
///
/// A job whose task panicked leaves `None` in its slot.
pub async fn gather<T, F>(pool: &TaskPool, jobs: Vec<F>) -> ScrapeResult<Vec<Option<T>>>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let total = jobs.len();
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, T)>();

    for (index, job) in jobs.into_iter().enumerate() {
        let tx = tx.clone();
        pool.submit(async move {
            let output = job.await;
            // The receiver only goes away if the gathering caller was dropped.
            let _ = tx.send((index, output));
        })
        .await?;
    }
    drop(tx);

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    while let Some((index, output)) = rx.recv().await {
        slots[index] = Some(output);
    }

    let missing = slots.iter().filter(|slot| slot.is_none()).count();
    if missing > 0 {
        debug!("{} of {} gathered jobs produced no output", missing, total);
    }

    Ok(slots)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
