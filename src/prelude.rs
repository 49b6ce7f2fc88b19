pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result, TaskFailure};
pub use crate::executor::{PanicStrategy, TaskPool};
pub use crate::future::{Completion, Future};
pub use crate::sync::{CountdownBarrier, PermitGate, PermitGuard};

pub use crate::telemetry::MetricsSnapshot;

#[cfg(feature = "async")]
pub use crate::async_bridge::{block_on, JoinFuture};
