//! Task execution infrastructure.
//!
//! A fixed set of worker threads draining one FIFO job queue, plus the panic
//! capture used for producers and combinator handlers.

pub mod panic_handler;
pub mod pool;
pub mod task;
pub mod worker;

pub use panic_handler::{PanicHandler, PanicStrategy};
pub use pool::TaskPool;
pub use task::TaskId;

pub(crate) use pool::Spawner;
