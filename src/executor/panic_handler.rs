use crate::error::TaskFailure;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// How a caught panic is reported. Either way the job's future fails and
/// the worker keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicStrategy {
    /// Capture silently; the failure only shows up on the future.
    Isolate,
    LogAndContinue,
}

impl Default for PanicStrategy {
    fn default() -> Self {
        PanicStrategy::LogAndContinue
    }
}

#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self { strategy }
    }

    /// Runs `f`, turning a panic into a [`TaskFailure`].
    pub fn execute<F, R>(&self, f: F) -> Result<R, TaskFailure>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(payload) => {
                let failure = failure_from_payload(payload);
                if self.strategy == PanicStrategy::LogAndContinue {
                    tracing::warn!(message = %failure, "task panicked");
                }
                Err(failure)
            }
        }
    }

}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

pub(crate) fn failure_from_payload(payload: Box<dyn Any + Send>) -> TaskFailure {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };

    TaskFailure::from_message(message)
}
