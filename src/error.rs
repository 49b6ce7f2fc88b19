use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error carried by a [`TaskFailure`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The producer closure passed to `submit` panicked or returned an error.
    #[error("producer failed: {0}")]
    Producer(TaskFailure),

    /// A `map`/`chain`/`combine`/`recover` handler panicked.
    #[error("combinator failed: {0}")]
    Combinator(TaskFailure),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("task pool is shut down")]
    PoolClosed,

    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    /// Wraps an arbitrary error as a producer failure.
    pub fn producer<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Producer(TaskFailure::from_error(err))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// The captured failure for producer and combinator errors.
    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            Error::Producer(f) | Error::Combinator(f) => Some(f),
            _ => None,
        }
    }
}

/// A captured failure: either a panic message or an error value.
///
/// Cloning is cheap; the source error sits behind an `Arc` so every reader of
/// a failed future observes the same value.
#[derive(Clone)]
pub struct TaskFailure {
    message: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl TaskFailure {
    pub fn from_message<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn from_error<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        let err: BoxError = err.into();
        Self {
            message: err.to_string(),
            source: Some(Arc::from(err)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attempts to view the source error as a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_deref().and_then(|e| e.downcast_ref::<E>())
    }
}

impl fmt::Debug for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFailure")
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TaskFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("account {0} not found")]
    struct MissingAccount(u32);

    #[test]
    fn test_failure_keeps_source() {
        let err = Error::producer(MissingAccount(7));
        let failure = err.failure().unwrap();

        assert_eq!(failure.message(), "account 7 not found");
        assert_eq!(failure.downcast_ref::<MissingAccount>().unwrap().0, 7);
        assert_eq!(err.to_string(), "producer failed: account 7 not found");
    }

    #[test]
    fn test_clone_shares_source() {
        let err = Error::producer(MissingAccount(1));
        let copy = err.clone();

        assert!(copy.failure().unwrap().downcast_ref::<MissingAccount>().is_some());
        assert!(!copy.is_timeout());
    }

    #[test]
    fn test_message_only_failure() {
        let failure = TaskFailure::from_message("boom");
        assert!(std::error::Error::source(&failure).is_none());
        assert!(failure.downcast_ref::<MissingAccount>().is_none());
    }
}
