//! Async/await integration.
//!
//! Lets async code wait on a [`crate::Future`] without parking a thread: the
//! task's waker is registered as a continuation and woken on settlement.

pub mod join_future;

pub use join_future::JoinFuture;

/// Block on a std future in the current thread
///
/// Convenience wrapper around `futures::executor::block_on`.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    futures::executor::block_on(future)
}
