//! Metrics collection for pool monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[cfg(feature = "telemetry")]
use hdrhistogram::Histogram;
#[cfg(feature = "telemetry")]
use parking_lot::RwLock;

/// Pool metrics collector
#[derive(Debug)]
pub struct Metrics {
    jobs_submitted: AtomicU64,
    jobs_rejected: AtomicU64,
    jobs_executed: AtomicU64,
    jobs_panicked: AtomicU64,
    continuations_dispatched: AtomicU64,
    continuations_inline: AtomicU64,

    busy_time_ns: AtomicU64,
    queue_wait_ns: AtomicU64,

    #[cfg(feature = "telemetry")]
    latency_histogram: Option<RwLock<Histogram<u64>>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            jobs_submitted: AtomicU64::new(0),
            jobs_rejected: AtomicU64::new(0),
            jobs_executed: AtomicU64::new(0),
            jobs_panicked: AtomicU64::new(0),
            continuations_dispatched: AtomicU64::new(0),
            continuations_inline: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
            queue_wait_ns: AtomicU64::new(0),
            // 3 significant figures, max of one hour in nanoseconds
            #[cfg(feature = "telemetry")]
            latency_histogram: Histogram::new_with_max(3_600_000_000_000, 3)
                .ok()
                .map(RwLock::new),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.jobs_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_continuation(&self, inline: bool) {
        if inline {
            self.continuations_inline.fetch_add(1, Ordering::Relaxed);
        } else {
            self.continuations_dispatched.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a finished job with its queue wait and run time
    pub fn record_execution(&self, queue_wait: Duration, run_time: Duration) {
        let run_ns = run_time.as_nanos() as u64;
        self.jobs_executed.fetch_add(1, Ordering::Relaxed);
        self.busy_time_ns.fetch_add(run_ns, Ordering::Relaxed);
        self.queue_wait_ns
            .fetch_add(queue_wait.as_nanos() as u64, Ordering::Relaxed);

        #[cfg(feature = "telemetry")]
        if let Some(hist) = &self.latency_histogram {
            // out-of-range samples are clamped to the histogram maximum
            hist.write().saturating_record(run_ns);
        }
    }

    pub fn record_panic(&self) {
        self.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: self.start_time.elapsed(),
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_rejected: self.jobs_rejected.load(Ordering::Relaxed),
            jobs_executed: self.jobs_executed.load(Ordering::Relaxed),
            jobs_panicked: self.jobs_panicked.load(Ordering::Relaxed),
            continuations_dispatched: self.continuations_dispatched.load(Ordering::Relaxed),
            continuations_inline: self.continuations_inline.load(Ordering::Relaxed),
            busy_time_ns: self.busy_time_ns.load(Ordering::Relaxed),
            queue_wait_ns: self.queue_wait_ns.load(Ordering::Relaxed),
            p50_latency_ns: 0,
            p99_latency_ns: 0,
            max_latency_ns: 0,
        };

        #[cfg(feature = "telemetry")]
        if let Some(hist) = &self.latency_histogram {
            let hist = hist.read();
            if hist.len() > 0 {
                snapshot.p50_latency_ns = hist.value_at_quantile(0.50);
                snapshot.p99_latency_ns = hist.value_at_quantile(0.99);
                snapshot.max_latency_ns = hist.max();
            }
        }

        snapshot
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: Instant,
    pub uptime: Duration,
    pub jobs_submitted: u64,
    pub jobs_rejected: u64,
    pub jobs_executed: u64,
    pub jobs_panicked: u64,
    pub continuations_dispatched: u64,
    pub continuations_inline: u64,
    pub busy_time_ns: u64,
    pub queue_wait_ns: u64,
    /// Zero unless the `telemetry` feature is enabled.
    pub p50_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl MetricsSnapshot {
    pub fn avg_queue_wait(&self) -> Duration {
        if self.jobs_executed == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.queue_wait_ns / self.jobs_executed)
    }

    pub fn jobs_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.jobs_executed as f64 / seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_execution(Duration::from_micros(10), Duration::from_micros(1));
        metrics.record_execution(Duration::from_micros(30), Duration::from_micros(2));
        metrics.record_continuation(false);
        metrics.record_continuation(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_submitted, 2);
        assert_eq!(snapshot.jobs_executed, 2);
        assert_eq!(snapshot.continuations_dispatched, 1);
        assert_eq!(snapshot.continuations_inline, 1);
        assert_eq!(snapshot.avg_queue_wait(), Duration::from_micros(20));
        assert_eq!(snapshot.busy_time_ns, 3_000);
    }

    #[cfg(feature = "telemetry")]
    #[test]
    fn test_latency_quantiles() {
        let metrics = Metrics::new();
        for _ in 0..100 {
            metrics.record_execution(Duration::ZERO, Duration::from_micros(5));
        }
        let snapshot = metrics.snapshot();
        assert!(snapshot.p50_latency_ns >= 4_990);
        assert!(snapshot.max_latency_ns >= snapshot.p99_latency_ns);
    }

    #[test]
    fn test_panics_and_rejections_counted() {
        let metrics = Metrics::new();

        metrics.record_panic();
        metrics.record_rejected();
        metrics.record_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_panicked, 1);
        assert_eq!(snapshot.jobs_rejected, 2);
    }

    #[test]
    fn test_jobs_per_second() {
        let metrics = Metrics::new();
        for _ in 0..4 {
            metrics.record_execution(Duration::ZERO, Duration::from_micros(1));
        }
        std::thread::sleep(Duration::from_millis(2));

        let snapshot = metrics.snapshot();
        assert!(snapshot.jobs_per_second() > 0.0);
        assert!(snapshot.jobs_per_second() <= 4.0 / 0.002);
    }

    #[test]
    fn test_empty_snapshot_rates() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.avg_queue_wait(), Duration::ZERO);
        assert_eq!(snapshot.p50_latency_ns, 0);
    }
}
