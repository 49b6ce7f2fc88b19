// worker thread stuff
use super::pool::PoolShared;
use super::task::Task;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

// stats for each worker
#[derive(Debug, Default)]
pub struct WorkerState {
    pub tasks_executed: AtomicU64,
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub state: WorkerState,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            state: WorkerState::default(),
        }
    }

    // main loop
    pub fn run(self, shared: Arc<PoolShared>) {
        tracing::trace!(worker = self.id, "worker started");

        while let Some(task) = self.next_task(&shared) {
            self.execute_task(task, &shared);
        }

        tracing::trace!(
            worker = self.id,
            executed = self.state.tasks_executed.load(Ordering::Relaxed),
            "worker exiting"
        );
    }

    /// Blocks for the next job. Returns `None` once the pool is shut down and
    /// the queue is empty; the worker is unregistered under the same lock so a
    /// continuation is never queued with nobody left to run it.
    fn next_task(&self, shared: &PoolShared) -> Option<Task> {
        let mut queue = shared.queue.lock();
        loop {
            if let Some(task) = queue.jobs.pop_front() {
                return Some(task);
            }
            if queue.shutdown {
                queue.live_workers -= 1;
                return None;
            }
            shared.job_ready.wait(&mut queue);
        }
    }

    fn execute_task(&self, task: Task, shared: &PoolShared) {
        let tid = task.id;
        let queue_wait = task.enqueued_at.elapsed();
        let start = Instant::now();

        // jobs capture their own panics; this only trips on a bug in a
        // continuation body
        if shared.panic_handler.execute(|| task.execute()).is_err() {
            tracing::error!(worker = self.id, task = tid.as_u64(), "job panicked outside its guard");
            shared.metrics.record_panic();
        }

        shared.metrics.record_execution(queue_wait, start.elapsed());
        self.state.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }
}
