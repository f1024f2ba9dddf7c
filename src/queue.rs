//! Bounded-concurrency execution queue.
//!
//! An intake channel feeds a dispatcher task; a semaphore of fixed size
//! bounds how many work items run at once. With one permit the queue is a
//! strict FIFO, which is what the sequential strategy uses. `pause` closes
//! the intake gate (later submissions are parked, not dropped); `drain`
//! awaits all accepted items, which is how `stop` finishes cleanly.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Notify, Semaphore};

use crate::agent::Agent;
use crate::task::TaskId;

/// One unit of queued work: run an agent's iteration loop over a task.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub task_id: TaskId,
    /// Working copy of the agent (a clone when the owner is busy).
    pub agent: Agent,
    /// Aggregated context from prior tasks.
    pub context: String,
    /// Re-enter from the task's pause checkpoint instead of starting fresh.
    pub resume: bool,
}

impl WorkItem {
    pub fn new(task_id: TaskId, agent: Agent, context: String) -> Self {
        Self { task_id, agent, context, resume: false }
    }

    pub fn resuming(task_id: TaskId, agent: Agent, context: String) -> Self {
        Self { task_id, agent, context, resume: true }
    }
}

/// Future type returned by a work-item runner.
pub type RunnerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Executes one work item; supplied by the engine when the queue is built.
pub type Runner = Arc<dyn Fn(WorkItem) -> RunnerFuture + Send + Sync>;

/// Bounded worker pool over an intake channel.
pub struct ExecutionQueue {
    tx: mpsc::UnboundedSender<WorkItem>,
    gate_open: Arc<AtomicBool>,
    parked: Arc<Mutex<Vec<WorkItem>>>,
    pending: Arc<AtomicUsize>,
    drained: Arc<Notify>,
    worker_count: usize,
}

impl ExecutionQueue {
    /// Build a queue with `worker_count` concurrent workers running `runner`.
    pub fn new(worker_count: usize, runner: Runner) -> Self {
        let worker_count = worker_count.max(1);
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkItem>();
        let pending = Arc::new(AtomicUsize::new(0));
        let drained = Arc::new(Notify::new());
        let semaphore = Arc::new(Semaphore::new(worker_count));

        {
            let pending = Arc::clone(&pending);
            let drained = Arc::clone(&drained);
            tokio::spawn(async move {
                while let Some(item) = rx.recv().await {
                    let permit = Arc::clone(&semaphore)
                        .acquire_owned()
                        .await
                        .expect("queue semaphore closed");
                    let runner = Arc::clone(&runner);
                    let pending = Arc::clone(&pending);
                    let drained = Arc::clone(&drained);
                    tokio::spawn(async move {
                        runner(item).await;
                        drop(permit);
                        if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                            drained.notify_waiters();
                        }
                    });
                }
            });
        }

        Self {
            tx,
            gate_open: Arc::new(AtomicBool::new(true)),
            parked: Arc::new(Mutex::new(Vec::new())),
            pending,
            drained,
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Submit a work item. Parked instead if the intake gate is closed.
    pub fn submit(&self, item: WorkItem) {
        if !self.gate_open.load(Ordering::SeqCst) {
            self.parked.lock().expect("queue parked lock poisoned").push(item);
            return;
        }
        self.pending.fetch_add(1, Ordering::SeqCst);
        // The dispatcher only stops when this sender is dropped.
        let _ = self.tx.send(item);
    }

    /// Items accepted but not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Close the intake gate; in-flight items keep running.
    pub fn close_intake(&self) {
        self.gate_open.store(false, Ordering::SeqCst);
    }

    /// Reopen the gate and flush anything parked while it was closed.
    pub fn open_intake(&self) {
        self.gate_open.store(true, Ordering::SeqCst);
        let parked: Vec<WorkItem> =
            std::mem::take(&mut *self.parked.lock().expect("queue parked lock poisoned"));
        for item in parked {
            self.submit(item);
        }
    }

    /// Discard anything parked behind a closed gate. Used by `stop`.
    pub fn clear_parked(&self) {
        self.parked.lock().expect("queue parked lock poisoned").clear();
    }

    /// Wait until every accepted item has finished.
    pub async fn drain(&self) {
        loop {
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.drained.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}
