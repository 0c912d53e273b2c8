//! Reporting of run results against the analytic estimate.

use std::{fmt::Write, time::Duration};

use crate::{
    estimator::QueueAnalysis,
    metrics::{DistributionSummary, MetricsCollector},
    QueueConfiguration,
};

/// Summarises a run: the configuration, what theory predicts for it, and what was observed.
pub struct RunReporter<'a> {
    metrics: &'a MetricsCollector,
    config: QueueConfiguration,
    run_time: Duration,
}

impl<'a> RunReporter<'a> {
    /// Create a new reporter for a run of `run_time` under `config`.
    pub fn new(metrics: &'a MetricsCollector, config: QueueConfiguration, run_time: Duration) -> Self {
        Self {
            metrics,
            config,
            run_time,
        }
    }

    /// Render the summary.
    pub fn summary(&self) -> String {
        let analysis = QueueAnalysis::of(&self.config);
        let snapshot = self.metrics.snapshot();

        let mut out = String::new();

        // Writing to a String cannot fail.
        let _ = writeln!(out, "\n=== Queue Configuration ===");
        let _ = writeln!(out, "Mean arrival delay:  {:.2} ms", self.config.mean_arrival_delay_ms);
        let _ = writeln!(out, "Mean service delay:  {:.2} ms", self.config.mean_service_delay_ms);
        let _ = writeln!(out, "Servers:             {}", self.config.server_count);
        let _ = writeln!(out, "Arrival CV:          {:.2}", self.config.arrival_cv);
        let _ = writeln!(out, "Service CV:          {:.2}", self.config.service_cv);

        let _ = writeln!(out, "\n=== Theory ===");
        let _ = writeln!(out, "Arrival rate:        {:.2} orders/sec", analysis.arrival_rate_per_sec);
        let _ = writeln!(out, "Service rate:        {:.2} orders/sec/server", analysis.service_rate_per_sec);
        let _ = writeln!(out, "Utilization:         {:.3}", analysis.utilization);
        if analysis.is_stable() {
            let _ = writeln!(out, "Expected queue wait: {:.2} ms", analysis.expected_wait_ms);
            let _ = writeln!(out, "Expected total time: {:.2} ms", analysis.expected_time_in_system_ms);
            let _ = writeln!(out, "Expected queue len:  {:.2}", analysis.expected_queue_length());
        } else {
            let _ = writeln!(out, "Expected queue wait: unstable (ρ ≥ 1), grows without bound");
        }

        let _ = writeln!(out, "\n=== Observed ===");
        let _ = writeln!(out, "Run time:            {:.2}s", self.run_time.as_secs_f64());
        let _ = writeln!(out, "Orders placed:       {}", snapshot.orders_placed);
        let _ = writeln!(out, "Orders processed:    {}", snapshot.processed);
        let _ = writeln!(out, "Throughput:          {:.2} orders/sec", self.throughput(snapshot.processed));

        write_distribution(&mut out, "Wait time", &snapshot.wait.summary());
        write_distribution(&mut out, "Processing time", &snapshot.processing.summary());

        out
    }

    /// Print the summary to stdout.
    pub fn print_summary(&self) {
        print!("{}", self.summary());
    }

    fn throughput(&self, processed: u64) -> f64 {
        let secs = self.run_time.as_secs_f64();
        if secs > 0.0 {
            processed as f64 / secs
        } else {
            0.0
        }
    }
}

fn write_distribution(out: &mut String, name: &str, summary: &DistributionSummary) {
    let _ = writeln!(out, "\n{name}:");
    if summary.count == 0 {
        let _ = writeln!(out, "  No samples");
        return;
    }
    let _ = writeln!(out, "  Mean: {:.2} ms", millis(summary.mean));
    let _ = writeln!(out, "  p50:  {:.2} ms", millis(summary.p50));
    let _ = writeln!(out, "  p99:  {:.2} ms", millis(summary.p99));
    let _ = writeln!(out, "  Max:  {:.2} ms", millis(summary.max));
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
