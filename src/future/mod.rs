//! Write-once result cells and the combinators built on them.
//!
//! A [`Future`] starts pending and settles exactly once, to a value or an
//! [`Error`]. Callbacks registered while pending are queued and dispatched to
//! the owning pool, in registration order, by whichever thread settles the
//! future. Callbacks registered after settlement run immediately on the
//! registering thread.
//!
//! # Blocking
//!
//! [`Future::join`] parks the calling thread. Calling it from inside a pool
//! job can deadlock if every worker ends up waiting on work that is still
//! queued behind it; prefer [`Future::chain`] there.

mod combinators;

pub use combinators::Completion;

use crate::error::{Error, Result};
use crate::executor::Spawner;
use parking_lot::{Condvar, Mutex};
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

type Continuation<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

enum State<T> {
    Pending(Vec<Continuation<T>>),
    Succeeded(T),
    Failed(Error),
}

impl<T: Clone> State<T> {
    fn outcome(&self) -> Option<Result<T>> {
        match self {
            State::Pending(_) => None,
            State::Succeeded(value) => Some(Ok(value.clone())),
            State::Failed(err) => Some(Err(err.clone())),
        }
    }
}

struct Cell<T> {
    state: Mutex<State<T>>,
    settled: Condvar,
    spawner: Spawner,
    release: fn(Vec<Continuation<T>>),
}

impl<T> Drop for Cell<T> {
    fn drop(&mut self) {
        if let State::Pending(queued) = self.state.get_mut() {
            if !queued.is_empty() {
                (self.release)(mem::take(queued));
            }
        }
    }
}

thread_local! {
    static DEFERRED_DROPS: RefCell<Option<Vec<Box<dyn Send>>>> = RefCell::new(None);
}

/// Drops unsettled continuations without recursing down the chain.
///
/// Each continuation owns the future it feeds, so dropping a long pending
/// chain would otherwise nest one `Cell::drop` per link. The outermost call
/// drains a per-thread worklist; nested calls only append to it.
fn release_continuations<T: 'static>(queued: Vec<Continuation<T>>) {
    let outermost = DEFERRED_DROPS.try_with(|deferred| {
        let mut deferred = deferred.borrow_mut();
        match deferred.as_mut() {
            Some(worklist) => {
                worklist.extend(queued.into_iter().map(|c| Box::new(c) as Box<dyn Send>));
                None
            }
            None => {
                *deferred = Some(Vec::new());
                Some(queued)
            }
        }
    });

    // nested call, or the thread-local is already torn down
    let Ok(Some(queued)) = outermost else {
        return;
    };
    drop(queued);

    loop {
        let batch = DEFERRED_DROPS.with(|deferred| deferred.borrow_mut().as_mut().map(mem::take));
        match batch {
            Some(batch) if !batch.is_empty() => drop(batch),
            _ => break,
        }
    }
    DEFERRED_DROPS.with(|deferred| deferred.borrow_mut().take());
}

/// Handle to a value computed asynchronously. Clones share the same cell.
pub struct Future<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn pending(spawner: Spawner) -> Self {
        Self {
            cell: Arc::new(Cell {
                state: Mutex::new(State::Pending(Vec::new())),
                settled: Condvar::new(),
                spawner,
                release: release_continuations::<T>,
            }),
        }
    }

    pub(crate) fn spawner(&self) -> &Spawner {
        &self.cell.spawner
    }

    /// The single pending → settled transition. Returns `false` if the
    /// future had already settled, in which case nothing changes.
    pub(crate) fn settle(&self, outcome: Result<T>) -> bool {
        let continuations = {
            let mut state = self.cell.state.lock();
            let queued = match &mut *state {
                State::Pending(queued) => mem::take(queued),
                _ => return false,
            };
            *state = match &outcome {
                Ok(value) => State::Succeeded(value.clone()),
                Err(err) => State::Failed(err.clone()),
            };
            queued
        };

        self.cell.settled.notify_all();

        for continuation in continuations {
            let outcome = outcome.clone();
            self.cell.spawner.dispatch(move || continuation(outcome));
        }
        true
    }

    /// Registers `f` to receive the outcome exactly once.
    pub(crate) fn on_settle<F>(&self, f: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.cell.state.lock();
            match &mut *state {
                State::Pending(queued) => {
                    queued.push(Box::new(f));
                    return;
                }
                settled => settled.outcome(),
            }
        };

        if let Some(outcome) = outcome {
            self.cell.spawner.note_inline_continuation();
            f(outcome);
        }
    }

    /// Settles the future with `value`. Returns `false` if it was already
    /// settled.
    pub fn complete(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settles the future with `error`. Returns `false` if it was already
    /// settled.
    pub fn fail(&self, error: Error) -> bool {
        self.settle(Err(error))
    }

    /// Blocks until the future settles.
    pub fn join(&self) -> Result<T> {
        let mut state = self.cell.state.lock();
        loop {
            if let Some(outcome) = state.outcome() {
                return outcome;
            }
            self.cell.settled.wait(&mut state);
        }
    }

    /// Like [`join`](Self::join) but gives up after `timeout` with
    /// [`Error::Timeout`]. The future itself is unaffected.
    pub fn join_timeout(&self, timeout: Duration) -> Result<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.join();
        };
        let mut state = self.cell.state.lock();
        loop {
            if let Some(outcome) = state.outcome() {
                return outcome;
            }
            if self.cell.settled.wait_until(&mut state, deadline).timed_out() {
                return state.outcome().unwrap_or(Err(Error::Timeout(timeout)));
            }
        }
    }

    /// The outcome if already settled, without blocking.
    pub fn try_get(&self) -> Option<Result<T>> {
        self.cell.state.lock().outcome()
    }

    pub fn is_done(&self) -> bool {
        !matches!(*self.cell.state.lock(), State::Pending(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.cell.state.lock(), State::Failed(_))
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &*self.cell.state.lock() {
            State::Pending(queued) => format!("pending ({} continuations)", queued.len()),
            State::Succeeded(_) => "succeeded".to_string(),
            State::Failed(err) => format!("failed: {}", err),
        };
        f.debug_struct("Future").field("status", &status).finish()
    }
}
