//! Cascade - write-once futures on a fixed worker pool
//!
//! A small concurrency core: a [`TaskPool`] that runs closures on a fixed set
//! of threads, a [`Future`] result cell with non-blocking combinators, and
//! the two blocking primitives usually needed around a pool of workers.
//!
//! # Quick Start
//!
//! ```no_run
//! use cascade_rs::prelude::*;
//! use std::sync::Arc;
//!
//! let pool = Arc::new(TaskPool::with_threads(4).unwrap());
//!
//! let lookup = pool.clone();
//! let balance = pool
//!     .submit(|| 101u32)
//!     .chain(move |id| lookup.submit(move || id as f64 * 12.5))
//!     .recover(|_| 0.0);
//!
//! println!("balance: {:.2}", balance.join().unwrap());
//! ```
//!
//! # Features
//!
//! - **Task Pool**: FIFO queue, panics captured per job, explicit shutdown
//! - **Combinators**: `map`, `chain`, `combine`, `recover`, `handle`,
//!   `all_of`
//! - **Permit Gate**: counting semaphore with optional FIFO fairness
//! - **Countdown Barrier**: one-shot latch
//! - **Telemetry**: job counters, plus a latency histogram (feature
//!   `telemetry`)
//! - **Async Integration**: `.await` a future from async code (feature
//!   `async`)

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod future;
pub mod prelude;
pub mod sync;
pub mod telemetry;

#[cfg(feature = "async")]
pub mod async_bridge;

pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result, TaskFailure};
pub use executor::{PanicStrategy, TaskPool};
pub use future::{Completion, Future};
pub use sync::{CountdownBarrier, PermitGate, PermitGuard};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_balance_pipeline() {
        let pool = Arc::new(TaskPool::with_threads(2).unwrap());

        let lookup = pool.clone();
        let balance = pool
            .submit(|| 101u32)
            .chain(move |id| lookup.submit(move || id as f64 * 2.0))
            .map(|b| format!("{:.2}", b));

        assert_eq!(balance.join().unwrap(), "202.00");
    }

    #[test]
    fn test_workers_gated_and_counted() {
        let pool = TaskPool::with_threads(4).unwrap();
        let gate = Arc::new(PermitGate::new(2));
        let done = Arc::new(CountdownBarrier::new(6));

        for _ in 0..6 {
            let gate = gate.clone();
            let done = done.clone();
            pool.execute(move || {
                {
                    let _permit = gate.permit();
                }
                done.signal();
            });
        }

        done.wait();
        assert_eq!(gate.available_permits(), 2);
    }
}
