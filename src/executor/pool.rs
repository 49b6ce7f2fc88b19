use super::panic_handler::PanicHandler;
use super::task::{Task, TaskKind};
use super::worker::{Worker, WorkerId};
use crate::config::Config;
use crate::error::{BoxError, Error, Result, TaskFailure};
use crate::future::Future;
use crate::telemetry::{Metrics, MetricsSnapshot};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub(crate) struct QueueState {
    pub(crate) jobs: VecDeque<Task>,
    pub(crate) shutdown: bool,
    pub(crate) live_workers: usize,
}

/// State shared by the pool handle, its workers and every future it creates.
pub(crate) struct PoolShared {
    pub(crate) queue: Mutex<QueueState>,
    pub(crate) job_ready: Condvar,
    pub(crate) panic_handler: PanicHandler,
    pub(crate) metrics: Metrics,
}

/// Cloneable dispatch handle held by futures so continuations land on the
/// pool that created them.
#[derive(Clone)]
pub(crate) struct Spawner {
    shared: Arc<PoolShared>,
}

impl Spawner {
    /// Queues a job. Submitted jobs are refused after shutdown; continuation
    /// jobs are refused only once no worker is left to run them.
    fn push(&self, task: Task) -> std::result::Result<(), Task> {
        let mut queue = self.shared.queue.lock();
        let refuse = match task.kind {
            TaskKind::Submitted => queue.shutdown,
            TaskKind::Continuation => queue.live_workers == 0,
        };
        if refuse {
            return Err(task);
        }
        queue.jobs.push_back(task);
        drop(queue);
        self.shared.job_ready.notify_one();
        Ok(())
    }

    /// Runs a continuation on the pool, or inline when every worker has
    /// already exited.
    pub(crate) fn dispatch<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.push(Task::new(f, TaskKind::Continuation)) {
            Ok(()) => self.shared.metrics.record_continuation(false),
            Err(task) => {
                tracing::trace!(task = task.id.as_u64(), "pool drained, running continuation inline");
                self.shared.metrics.record_continuation(true);
                task.execute();
            }
        }
    }

    pub(crate) fn note_inline_continuation(&self) {
        self.shared.metrics.record_continuation(true);
    }

    /// Runs a user closure, capturing a panic as a failure.
    pub(crate) fn guard<F, R>(&self, f: F) -> std::result::Result<R, TaskFailure>
    where
        F: FnOnce() -> R,
    {
        let result = self.shared.panic_handler.execute(f);
        if result.is_err() {
            self.shared.metrics.record_panic();
        }
        result
    }
}

pub struct TaskPool {
    spawner: Spawner,
    workers: Mutex<Vec<WorkerHandle>>,
    num_threads: usize,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

impl TaskPool {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                shutdown: false,
                live_workers: 0,
            }),
            job_ready: Condvar::new(),
            panic_handler: PanicHandler::new(config.panic_strategy),
            metrics: Metrics::new(),
        });

        let pool = Self {
            spawner: Spawner {
                shared: shared.clone(),
            },
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
        };

        for id in 0..num_threads {
            let worker = Worker::new(id);
            let shared_clone = shared.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            // count the worker before it exists so a continuation is never
            // refused while it is starting up
            shared.queue.lock().live_workers += 1;

            match builder.spawn(move || worker.run(shared_clone)) {
                Ok(thread) => pool.workers.lock().push(WorkerHandle {
                    id,
                    thread: Some(thread),
                }),
                Err(e) => {
                    shared.queue.lock().live_workers -= 1;
                    // dropping `pool` shuts down and joins what was started
                    return Err(Error::executor(format!("spawn failed: {}", e)));
                }
            }
        }

        tracing::debug!(threads = num_threads, "task pool started");
        Ok(pool)
    }

    /// Pool with `n` workers and otherwise default settings.
    pub fn with_threads(n: usize) -> Result<Self> {
        let config = Config::builder().num_threads(n).build()?;
        Self::new(&config)
    }

    /// Runs `producer` on a worker. A panic settles the future with
    /// [`Error::Producer`]; after [`shutdown`](Self::shutdown) the returned
    /// future is already failed with [`Error::PoolClosed`].
    pub fn submit<T, F>(&self, producer: F) -> Future<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.submit_fallible(move || Ok::<T, Error>(producer()))
    }

    /// Like [`submit`](Self::submit) for producers that report errors.
    pub fn submit_fallible<T, E, F>(&self, producer: F) -> Future<T>
    where
        T: Clone + Send + 'static,
        E: Into<BoxError>,
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    {
        let future = Future::pending(self.spawner.clone());
        let settle = future.clone();
        let spawner = self.spawner.clone();

        let task = Task::new(
            move || {
                let outcome = match spawner.guard(producer) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(Error::producer(e)),
                    Err(failure) => Err(Error::Producer(failure)),
                };
                settle.settle(outcome);
            },
            TaskKind::Submitted,
        );

        self.spawner.shared.metrics.record_submitted();
        if let Err(task) = self.spawner.push(task) {
            tracing::warn!(task = task.id.as_u64(), "submission rejected, pool is shut down");
            self.spawner.shared.metrics.record_rejected();
            future.settle(Err(Error::PoolClosed));
        }

        future
    }

    /// Runs `f` for its side effects.
    pub fn execute<F>(&self, f: F) -> Future<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(f)
    }

    /// An unsettled future bound to this pool, settled by
    /// [`Future::complete`] or [`Future::fail`].
    pub fn pending<T>(&self) -> Future<T>
    where
        T: Clone + Send + 'static,
    {
        Future::pending(self.spawner.clone())
    }

    pub fn completed<T>(&self, value: T) -> Future<T>
    where
        T: Clone + Send + 'static,
    {
        let future = self.pending();
        future.settle(Ok(value));
        future
    }

    pub fn failed<T>(&self, error: Error) -> Future<T>
    where
        T: Clone + Send + 'static,
    {
        let future = self.pending();
        future.settle(Err(error));
        future
    }

    pub(crate) fn spawner(&self) -> &Spawner {
        &self.spawner
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Jobs queued but not yet picked up by a worker.
    pub fn pending_jobs(&self) -> usize {
        self.spawner.shared.queue.lock().jobs.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.spawner.shared.queue.lock().shutdown
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.spawner.shared.metrics.snapshot()
    }

    /// Stops accepting submissions. Queued and running jobs still complete.
    /// Idempotent and non-blocking.
    pub fn shutdown(&self) {
        let mut queue = self.spawner.shared.queue.lock();
        if queue.shutdown {
            return;
        }
        queue.shutdown = true;
        let queued = queue.jobs.len();
        drop(queue);

        tracing::debug!(queued, "task pool shutting down");
        self.spawner.shared.job_ready.notify_all();
    }

    /// Blocks until every worker has drained the queue and exited. Must be
    /// preceded by [`shutdown`](Self::shutdown) or it waits forever. A worker
    /// calling this skips joining itself.
    pub fn await_termination(&self) {
        let handles: Vec<WorkerHandle> = self.workers.lock().drain(..).collect();
        let current = thread::current().id();

        for mut worker in handles {
            if let Some(thread) = worker.thread.take() {
                if thread.thread().id() == current {
                    continue;
                }
                if thread.join().is_err() {
                    tracing::error!(worker = worker.id, "worker thread panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("num_threads", &self.num_threads)
            .field("pending_jobs", &self.pending_jobs())
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
        self.await_termination();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PanicStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn pool(n: usize) -> TaskPool {
        let config = Config::builder()
            .num_threads(n)
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();
        TaskPool::new(&config).unwrap()
    }

    #[test]
    fn test_submit_and_join() {
        let pool = pool(2);
        let future = pool.submit(|| 21 * 2);
        assert_eq!(future.join().unwrap(), 42);
    }

    #[test]
    fn test_panicking_producer_fails_future_not_worker() {
        let pool = pool(1);

        let bad = pool.submit(|| -> u32 { panic!("producer blew up") });
        let err = bad.join().unwrap_err();
        assert!(matches!(err, Error::Producer(ref f) if f.message() == "producer blew up"));

        // the only worker is still alive
        assert_eq!(pool.submit(|| 7).join().unwrap(), 7);
        assert_eq!(pool.metrics().jobs_panicked, 1);
    }

    #[test]
    fn test_fallible_producer_error() {
        let pool = pool(1);
        let future = pool.submit_fallible(|| "x".parse::<u32>());
        let err = future.join().unwrap_err();
        let failure = err.failure().unwrap();
        assert!(failure.downcast_ref::<std::num::ParseIntError>().is_some());
    }

    #[test]
    fn test_fifo_order_single_worker() {
        let pool = pool(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        let futures: Vec<_> = (0..10)
            .map(|i| {
                let order = order.clone();
                pool.execute(move || order.lock().push(i))
            })
            .collect();
        for f in &futures {
            f.join().unwrap();
        }

        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let pool = pool(2);
        pool.shutdown();
        pool.shutdown();

        let future = pool.submit(|| 1);
        assert!(matches!(future.join(), Err(Error::PoolClosed)));
        assert!(pool.is_shutdown());
        assert_eq!(pool.metrics().jobs_rejected, 1);
    }

    #[test]
    fn test_shutdown_drains_queued_jobs() {
        let pool = pool(1);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let counter = counter.clone();
            pool.execute(move || {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.shutdown();
        pool.await_termination();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_continuation_after_shutdown_still_runs() {
        let pool = pool(1);
        let slow = pool.submit(|| {
            thread::sleep(Duration::from_millis(20));
            5
        });
        let doubled = slow.map(|v| v * 2);

        pool.shutdown();
        assert_eq!(doubled.join().unwrap(), 10);
    }

    #[test]
    fn test_continuation_inline_once_workers_exited() {
        let pool = pool(1);
        let manual = pool.pending::<u8>();
        let mapped = manual.map(|v| v + 1);

        pool.shutdown();
        pool.await_termination();

        assert!(manual.complete(1));
        assert_eq!(mapped.join().unwrap(), 2);
        assert!(pool.metrics().continuations_inline >= 1);
    }

    #[test]
    fn test_thread_names() {
        let config = Config::builder()
            .num_threads(1)
            .thread_name_prefix("ledger")
            .build()
            .unwrap();
        let pool = TaskPool::new(&config).unwrap();

        let name = pool
            .submit(|| thread::current().name().map(str::to_string))
            .join()
            .unwrap();
        assert_eq!(name.as_deref(), Some("ledger-0"));
    }

    #[test]
    fn test_invalid_config() {
        assert!(TaskPool::with_threads(0).is_err());
    }
}
