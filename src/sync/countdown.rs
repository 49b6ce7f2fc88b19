//! One-shot countdown barrier.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Releases every waiter once `count` signals have arrived. Never re-arms.
pub struct CountdownBarrier {
    remaining: Mutex<usize>,
    released: Condvar,
    count: usize,
}

impl CountdownBarrier {
    /// A barrier with `count == 0` is open from the start.
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            released: Condvar::new(),
            count,
        }
    }

    /// Counts one event. Signals past zero are ignored.
    pub fn signal(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            drop(remaining);
            self.released.notify_all();
        }
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.released.wait(&mut remaining);
        }
    }

    /// Returns `true` if the barrier opened within `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            if self.released.wait_until(&mut remaining, deadline).timed_out() {
                return *remaining == 0;
            }
        }
        true
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }

    pub fn is_open(&self) -> bool {
        self.remaining() == 0
    }

    /// The count the barrier was created with.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl std::fmt::Debug for CountdownBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownBarrier")
            .field("count", &self.count)
            .field("remaining", &self.remaining())
            .finish()
    }
}
