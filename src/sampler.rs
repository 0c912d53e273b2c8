//! Consumer-side realisation of service times.

use std::{sync::Arc, time::Duration};

use tokio::time::Instant;
use tracing::debug;

use crate::{clock::Clock, metrics::MetricsSink, variate::VariateGenerator, OrderRecord, ServiceHint};

/// What processing one order looked like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingReport {
    /// How long the simulated work took.
    pub processing: Duration,
    /// Time from order creation to completion (W): queueing plus processing.
    pub wait: Duration,
}

/// Turns an order's service hint into a simulated unit of work and reports how long it took.
///
/// Owns its generator, so each consumer loop should have its own sampler.
#[derive(Debug)]
pub struct ProcessingSampler {
    variate: VariateGenerator,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
}

impl ProcessingSampler {
    pub fn new(
        variate: VariateGenerator,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            variate,
            clock,
            metrics,
        }
    }

    /// The service time to simulate for `order`.
    ///
    /// A [`ServiceHint::Sampled`] hint is used as-is. A [`ServiceHint::Mean`] hint is treated as
    /// the mean of a fresh draw using the order's `service_cv`.
    pub fn service_time(&mut self, order: &OrderRecord) -> Duration {
        match order.service_hint_kind {
            ServiceHint::Sampled => order.service_delay_hint(),
            ServiceHint::Mean => self
                .variate
                .sample_duration(order.service_delay_hint, order.service_cv),
        }
    }

    /// Simulate processing `order` and report the measurements.
    ///
    /// The simulated work suspends the calling task rather than spinning.
    pub async fn process(&mut self, order: OrderRecord) -> ProcessingReport {
        let started = Instant::now();

        let service_time = self.service_time(&order);
        tokio::time::sleep(service_time).await;

        let processing = started.elapsed();
        let wait = order.age_at(self.clock.now());

        self.metrics.record_processing_time(processing);
        self.metrics.record_wait_time(wait);

        debug!(
            order_id = %order.order_id,
            customer = %order.customer_label,
            amount = order.amount,
            processing_ms = processing.as_secs_f64() * 1000.0,
            wait_ms = wait.as_secs_f64() * 1000.0,
            "Processed order"
        );

        ProcessingReport { processing, wait }
    }
}
