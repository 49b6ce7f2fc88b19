//! Job representation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a queued job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Where a job came from; continuations are dispatched internally and are
/// still accepted while the pool drains after shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskKind {
    Submitted,
    Continuation,
}

pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) kind: TaskKind,
    pub(crate) func: Box<dyn FnOnce() + Send + 'static>,
    pub(crate) enqueued_at: Instant,
}

impl Task {
    pub fn new<F>(f: F, kind: TaskKind) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            id: TaskId::next(),
            kind,
            func: Box::new(f),
            enqueued_at: Instant::now(),
        }
    }

    pub fn execute(self) {
        (self.func)();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}
