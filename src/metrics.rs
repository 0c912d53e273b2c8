//! Metrics collection and analysis

use std::{
    fmt::Debug,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

/// Receives measurements from the pacing loop and the consumers.
///
/// Implement this to forward to a real metrics backend.
pub trait MetricsSink: Debug + Send + Sync {
    /// An order was handed to the message substrate.
    fn record_order_placed(&self);

    /// An order finished processing after `duration`. Counts towards the processed total.
    fn record_processing_time(&self, duration: Duration);

    /// Time from order creation to completion (W): queueing plus processing.
    fn record_wait_time(&self, duration: Duration);

    /// Number of concurrent server slots.
    fn set_concurrency(&self, servers: usize);
}

/// Linear histogram buckets: `count` upper bounds starting at `start`, `width` apart, plus an
/// implicit `+Inf` bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearBuckets {
    /// First upper bound, in seconds.
    pub start: f64,
    /// Distance between upper bounds, in seconds.
    pub width: f64,
    /// Number of finite buckets.
    pub count: usize,
}

impl LinearBuckets {
    /// Buckets for total wait time: 0s to 9.5s in 0.5s steps.
    pub const WAIT: LinearBuckets = LinearBuckets {
        start: 0.0,
        width: 0.5,
        count: 20,
    };

    /// Buckets for processing time: 0s to 1.9s in 0.1s steps.
    pub const PROCESSING: LinearBuckets = LinearBuckets {
        start: 0.0,
        width: 0.1,
        count: 20,
    };

    /// The finite upper bounds, in seconds.
    pub fn upper_bounds(&self) -> Vec<f64> {
        (0..self.count)
            .map(|i| self.start + self.width * i as f64)
            .collect()
    }

    /// Index of the first bucket whose upper bound holds `secs`. `count` means `+Inf`.
    fn index_of(&self, secs: f64) -> usize {
        if secs <= self.start {
            return 0;
        }
        let idx = ((secs - self.start) / self.width).ceil() as usize;
        idx.min(self.count)
    }
}

/// A distribution of durations, kept as bucket counts plus a running sum and maximum.
///
/// Memory does not grow with the number of observations. Percentiles are estimated by linear
/// interpolation within a bucket, the way Prometheus' `histogram_quantile` does.
#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: LinearBuckets,
    /// One count per finite bucket, then `+Inf`.
    counts: Vec<u64>,
    count: usize,
    sum: Duration,
    max: Duration,
}

impl Histogram {
    /// Create an empty histogram.
    pub fn new(buckets: LinearBuckets) -> Self {
        Self {
            buckets,
            counts: vec![0; buckets.count + 1],
            count: 0,
            sum: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Record one observation.
    pub fn observe(&mut self, duration: Duration) {
        let idx = self.buckets.index_of(duration.as_secs_f64());
        self.counts[idx] += 1;
        self.count += 1;
        self.sum = self.sum.saturating_add(duration);
        self.max = self.max.max(duration);
    }

    /// Number of observations.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Cumulative `(upper bound, count)` pairs in seconds, Prometheus style. The last bound is
    /// `+Inf`.
    pub fn cumulative_buckets(&self) -> Vec<(f64, u64)> {
        let bounds = self
            .buckets
            .upper_bounds()
            .into_iter()
            .chain(std::iter::once(f64::INFINITY));

        let mut total = 0;
        bounds
            .zip(&self.counts)
            .map(|(bound, count)| {
                total += count;
                (bound, total)
            })
            .collect()
    }

    /// Summary statistics.
    pub fn summary(&self) -> DistributionSummary {
        DistributionSummary {
            count: self.count,
            mean: self.mean(),
            p50: self.quantile(0.5),
            p99: self.quantile(0.99),
            max: self.max,
        }
    }

    fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.sum.as_nanos() / self.count as u128;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Estimate the `q` quantile from the bucket counts, never above the observed maximum.
    fn quantile(&self, q: f64) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let rank = q * self.count as f64;

        let mut lower = 0.0;
        let mut below = 0u64;
        for (upper, cumulative) in self.cumulative_buckets() {
            if (cumulative as f64) >= rank && cumulative > below {
                if upper.is_infinite() {
                    return self.max;
                }
                let in_bucket = (cumulative - below) as f64;
                let secs = lower + (upper - lower) * (rank - below as f64) / in_bucket;
                return Duration::try_from_secs_f64(secs.max(0.0))
                    .unwrap_or(self.max)
                    .min(self.max);
            }
            lower = upper;
            below = cumulative;
        }
        self.max
    }
}

/// Summary statistics of a [`Histogram`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistributionSummary {
    pub count: usize,
    pub mean: Duration,
    pub p50: Duration,
    pub p99: Duration,
    pub max: Duration,
}

/// A point-in-time copy of everything a [`MetricsCollector`] has seen.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub orders_placed: u64,
    pub processed: u64,
    pub concurrency: usize,
    pub wait: Histogram,
    pub processing: Histogram,
}

/// Collects metrics in memory.
#[derive(Debug)]
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    orders_placed: u64,
    processed: u64,
    concurrency: usize,
    wait: Histogram,
    processing: Histogram,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                orders_placed: 0,
                processed: 0,
                concurrency: 0,
                wait: Histogram::new(LinearBuckets::WAIT),
                processing: Histogram::new(LinearBuckets::PROCESSING),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every update is a single observation or increment, so a poisoned lock still holds
        // consistent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn orders_placed(&self) -> u64 {
        self.lock().orders_placed
    }

    pub fn processed(&self) -> u64 {
        self.lock().processed
    }

    pub fn concurrency(&self) -> usize {
        self.lock().concurrency
    }

    /// Calculate mean wait time (W).
    ///
    /// Returns Duration::ZERO if no orders have been processed.
    pub fn mean_wait(&self) -> Duration {
        self.lock().wait.summary().mean
    }

    /// Calculate mean processing time.
    ///
    /// Returns Duration::ZERO if no orders have been processed.
    pub fn mean_processing(&self) -> Duration {
        self.lock().processing.summary().mean
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();
        MetricsSnapshot {
            orders_placed: inner.orders_placed,
            processed: inner.processed,
            concurrency: inner.concurrency,
            wait: inner.wait.clone(),
            processing: inner.processing.clone(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for MetricsCollector {
    fn record_order_placed(&self) {
        self.lock().orders_placed += 1;
    }

    fn record_processing_time(&self, duration: Duration) {
        let mut inner = self.lock();
        inner.processing.observe(duration);
        inner.processed += 1;
    }

    fn record_wait_time(&self, duration: Duration) {
        self.lock().wait.observe(duration);
    }

    fn set_concurrency(&self, servers: usize) {
        self.lock().concurrency = servers;
    }
}
