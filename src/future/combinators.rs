//! `map`, `chain`, `combine`, `recover`, `all_of` and friends.
//!
//! Every combinator returns a new future bound to the source future's pool.
//! Handlers run at most once and never on failure paths they do not handle.
//! A handler that panics settles the derived future with
//! [`Error::Combinator`].

use super::Future;
use crate::error::{Error, Result};
use crate::executor::{Spawner, TaskPool};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    /// New future on the same pool, settled by `body` once `self` settles.
    fn derive<U, F>(&self, body: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T>, Future<U>, &Spawner) + Send + 'static,
    {
        let spawner = self.spawner().clone();
        let next = Future::pending(spawner.clone());
        let settle = next.clone();
        self.on_settle(move |outcome| body(outcome, settle, &spawner));
        next
    }

    /// Transforms a successful value. Failures pass through without calling
    /// `f`.
    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.derive(move |outcome, next, spawner| {
            let result = match outcome {
                Ok(value) => spawner.guard(|| f(value)).map_err(Error::Combinator),
                Err(err) => Err(err),
            };
            next.settle(result);
        })
    }

    /// Consumes a successful value.
    pub fn accept<F>(&self, f: F) -> Future<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.map(f)
    }

    /// Starts a dependent computation once `self` succeeds and forwards its
    /// outcome. `f` is not called if `self` fails.
    pub fn chain<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        self.derive(move |outcome, next, spawner| match outcome {
            Ok(value) => match spawner.guard(|| f(value)) {
                Ok(inner) => inner.on_settle(move |inner_outcome| {
                    next.settle(inner_outcome);
                }),
                Err(failure) => {
                    next.settle(Err(Error::Combinator(failure)));
                }
            },
            Err(err) => {
                next.settle(Err(err));
            }
        })
    }

    /// Joins two independent futures. Succeeds with `f(a, b)` once both
    /// succeed; the first failure observed wins and the other side's result
    /// is dropped.
    pub fn combine<U, V, F>(&self, other: &Future<U>, f: F) -> Future<V>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
        F: FnOnce(T, U) -> V + Send + 'static,
    {
        let spawner = self.spawner().clone();
        let next = Future::pending(spawner.clone());
        let pair = Arc::new(Mutex::new(Pair {
            left: None,
            right: None,
            f: Some(f),
        }));

        {
            let pair = pair.clone();
            let next = next.clone();
            let spawner = spawner.clone();
            self.on_settle(move |outcome| match outcome {
                Ok(a) => {
                    let ready = {
                        let mut pair = pair.lock();
                        pair.left = Some(a);
                        pair.take_ready()
                    };
                    if let Some((a, b, f)) = ready {
                        next.settle(spawner.guard(|| f(a, b)).map_err(Error::Combinator));
                    }
                }
                Err(err) => {
                    next.settle(Err(err));
                }
            });
        }

        {
            let next = next.clone();
            other.on_settle(move |outcome| match outcome {
                Ok(b) => {
                    let ready = {
                        let mut pair = pair.lock();
                        pair.right = Some(b);
                        pair.take_ready()
                    };
                    if let Some((a, b, f)) = ready {
                        next.settle(spawner.guard(|| f(a, b)).map_err(Error::Combinator));
                    }
                }
                Err(err) => {
                    next.settle(Err(err));
                }
            });
        }

        next
    }

    /// Replaces a failure with `f(error)`. Successes pass through.
    pub fn recover<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce(Error) -> T + Send + 'static,
    {
        self.derive(move |outcome, next, spawner| {
            let result = match outcome {
                Ok(value) => Ok(value),
                Err(err) => spawner.guard(|| f(err)).map_err(Error::Combinator),
            };
            next.settle(result);
        })
    }

    /// Maps either outcome to a new value.
    pub fn handle<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T>) -> U + Send + 'static,
    {
        self.derive(move |outcome, next, spawner| {
            next.settle(spawner.guard(|| f(outcome)).map_err(Error::Combinator));
        })
    }

    /// Observes the outcome and passes it through. If `f` panics on a
    /// success the derived future fails; an existing failure is kept.
    pub fn when_complete<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce(&Result<T>) + Send + 'static,
    {
        self.derive(move |outcome, next, spawner| {
            let observed = spawner.guard(|| f(&outcome));
            let result = match (outcome, observed) {
                (Ok(_), Err(failure)) => Err(Error::Combinator(failure)),
                (outcome, _) => outcome,
            };
            next.settle(result);
        })
    }
}

struct Pair<A, B, F> {
    left: Option<A>,
    right: Option<B>,
    f: Option<F>,
}

impl<A, B, F> Pair<A, B, F> {
    fn take_ready(&mut self) -> Option<(A, B, F)> {
        if self.left.is_none() || self.right.is_none() {
            return None;
        }
        match (self.left.take(), self.right.take(), self.f.take()) {
            (Some(a), Some(b), Some(f)) => Some((a, b, f)),
            _ => None,
        }
    }
}

/// Type-erased view of a future's settlement, so futures of different value
/// types can be joined by [`TaskPool::all_of`].
pub trait Completion: Send + Sync {
    fn on_complete(&self, callback: Box<dyn FnOnce(Result<()>) + Send + 'static>);
}

impl<T> Completion for Future<T>
where
    T: Clone + Send + 'static,
{
    fn on_complete(&self, callback: Box<dyn FnOnce(Result<()>) + Send + 'static>) {
        self.on_settle(move |outcome| callback(outcome.map(|_| ())));
    }
}

impl TaskPool {
    /// Succeeds once every input has succeeded; fails as soon as any input
    /// fails, without waiting for or cancelling the rest. Empty input
    /// succeeds immediately.
    pub fn all_of(&self, futures: &[&dyn Completion]) -> Future<()> {
        let all = Future::pending(self.spawner().clone());
        if futures.is_empty() {
            all.settle(Ok(()));
            return all;
        }

        let remaining = Arc::new(AtomicUsize::new(futures.len()));
        for future in futures {
            let all = all.clone();
            let remaining = remaining.clone();
            future.on_complete(Box::new(move |outcome| match outcome {
                Ok(()) => {
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        all.settle(Ok(()));
                    }
                }
                Err(err) => {
                    all.settle(Err(err));
                }
            }));
        }

        all
    }
}
