//! Counting admission gate.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct GateState {
    permits: usize,
    // fair mode only: tickets of blocked acquirers, oldest first
    waiters: VecDeque<u64>,
    next_ticket: u64,
}

/// A semaphore bounding how many callers hold a permit at once.
///
/// Permits are not tied to the caller that acquired them: `release` without
/// a matching `acquire` is legal and simply adds capacity.
///
/// In the default mode a release wakes one blocked acquirer and a newly
/// arriving caller may take the permit first. [`PermitGate::fair`] hands
/// permits out strictly in arrival order.
pub struct PermitGate {
    state: Mutex<GateState>,
    available: Condvar,
    fair: bool,
}

impl PermitGate {
    pub fn new(permits: usize) -> Self {
        Self::with_fairness(permits, false)
    }

    pub fn fair(permits: usize) -> Self {
        Self::with_fairness(permits, true)
    }

    fn with_fairness(permits: usize, fair: bool) -> Self {
        Self {
            state: Mutex::new(GateState {
                permits,
                waiters: VecDeque::new(),
                next_ticket: 0,
            }),
            available: Condvar::new(),
            fair,
        }
    }

    /// Blocks until a permit is available and takes it.
    pub fn acquire(&self) {
        self.acquire_until(None);
    }

    /// Takes a permit only if one is free right now. In fair mode this also
    /// fails while other callers are queued.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.permits > 0 && (!self.fair || state.waiters.is_empty()) {
            state.permits -= 1;
            return true;
        }
        false
    }

    /// Waits at most `timeout` for a permit. Returns `false` if none was
    /// obtained.
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        // an unrepresentable deadline waits without one
        self.acquire_until(Instant::now().checked_add(timeout))
    }

    pub fn release(&self) {
        self.release_n(1);
    }

    pub fn release_n(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.state.lock().permits += n;

        if self.fair {
            // only the head ticket may proceed; let every waiter re-check
            self.available.notify_all();
        } else {
            for _ in 0..n {
                if !self.available.notify_one() {
                    break;
                }
            }
        }
    }

    /// Acquires a permit that is released when the guard drops.
    pub fn permit(&self) -> PermitGuard<'_> {
        self.acquire();
        PermitGuard { gate: self }
    }

    pub fn try_permit(&self) -> Option<PermitGuard<'_>> {
        self.try_acquire().then(|| PermitGuard { gate: self })
    }

    pub fn available_permits(&self) -> usize {
        self.state.lock().permits
    }

    pub fn is_fair(&self) -> bool {
        self.fair
    }

    fn acquire_until(&self, deadline: Option<Instant>) -> bool {
        let mut state = self.state.lock();
        if self.fair {
            self.acquire_fair(&mut state, deadline)
        } else {
            self.acquire_barging(&mut state, deadline)
        }
    }

    fn acquire_barging(&self, state: &mut MutexGuard<'_, GateState>, deadline: Option<Instant>) -> bool {
        while state.permits == 0 {
            match deadline {
                None => self.available.wait(state),
                Some(deadline) => {
                    if self.available.wait_until(state, deadline).timed_out() && state.permits == 0 {
                        return false;
                    }
                }
            }
        }
        state.permits -= 1;
        true
    }

    fn acquire_fair(&self, state: &mut MutexGuard<'_, GateState>, deadline: Option<Instant>) -> bool {
        if state.waiters.is_empty() && state.permits > 0 {
            state.permits -= 1;
            return true;
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiters.push_back(ticket);

        loop {
            if state.waiters.front() == Some(&ticket) && state.permits > 0 {
                state.waiters.pop_front();
                state.permits -= 1;
                if state.permits > 0 && !state.waiters.is_empty() {
                    self.available.notify_all();
                }
                return true;
            }

            let timed_out = match deadline {
                None => {
                    self.available.wait(state);
                    false
                }
                Some(deadline) => self.available.wait_until(state, deadline).timed_out(),
            };

            if timed_out {
                if state.waiters.front() == Some(&ticket) && state.permits > 0 {
                    continue;
                }
                state.waiters.retain(|t| *t != ticket);
                // the head may have changed
                self.available.notify_all();
                return false;
            }
        }
    }
}

impl std::fmt::Debug for PermitGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PermitGate")
            .field("available", &state.permits)
            .field("queued", &state.waiters.len())
            .field("fair", &self.fair)
            .finish()
    }
}

/// Holds one permit of a [`PermitGate`] until dropped.
#[derive(Debug)]
pub struct PermitGuard<'a> {
    gate: &'a PermitGate,
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
