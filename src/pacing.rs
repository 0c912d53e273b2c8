//! The producer loop: samples interarrival gaps and emits orders at the configured cadence.

use std::{sync::Arc, time::Duration};

use bon::bon;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    clock::{Clock, TokioClock},
    metrics::MetricsSink,
    transport::OrderSink,
    variate::VariateGenerator,
    worker::{StopSignal, WorkerHandle},
    ConfigurationStore, OrderRecord, QueueConfiguration, ServiceHint,
};

/// Customer labels used when none are configured.
pub const DEFAULT_CUSTOMERS: [&str; 5] = ["John", "Jane", "Bob", "Alice", "Charlie"];

/// The timing of one pacing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pace {
    /// The sampled gap before the next order.
    pub interarrival: Duration,
    /// How long emitting this order took.
    pub elapsed: Duration,
}

impl Pace {
    /// How long to sleep before the next cycle: `max(0, interarrival − elapsed)`.
    pub fn remaining(&self) -> Duration {
        self.interarrival.saturating_sub(self.elapsed)
    }
}

/// Running totals for a pacing loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PacingStats {
    /// Orders handed to the sink.
    pub emitted: u64,
    /// Orders the sink refused.
    pub failed: u64,
    first_emitted_at: Option<Instant>,
    last_emitted_at: Option<Instant>,
}

impl PacingStats {
    fn record_emitted(&mut self, at: Instant) {
        self.emitted += 1;
        self.first_emitted_at.get_or_insert(at);
        self.last_emitted_at = Some(at);
    }

    /// Mean gap between successive emitted orders.
    pub fn mean_interarrival(&self) -> Option<Duration> {
        let (first, last) = (self.first_emitted_at?, self.last_emitted_at?);
        let gaps = self.emitted.checked_sub(1).filter(|gaps| *gaps > 0)?;

        Some((last - first).div_f64(gaps as f64))
    }

    /// Observed arrival rate, in orders per second.
    pub fn arrival_rate(&self) -> Option<f64> {
        let mean = self.mean_interarrival()?.as_secs_f64();
        (mean > 0.0).then(|| 1.0 / mean)
    }
}

/// Emits orders at a randomised cadence driven by the live configuration.
///
/// Each cycle:
///
/// 1. Read a configuration snapshot.
/// 2. Sample the interarrival gap from `(mean_arrival_delay_ms, arrival_cv)`.
/// 3. Build an order whose service hint depends on the [`ServiceHint`] mode: either a draw from
///    `(mean_service_delay_ms, service_cv)` or the mean itself.
/// 4. Publish it.
/// 5. Sleep for whatever is left of the gap.
///
/// Publish failures are logged and the loop carries on.
pub struct PacingLoop<S> {
    store: Arc<ConfigurationStore>,
    sink: S,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    variate: VariateGenerator,
    hint_mode: ServiceHint,
    customers: Vec<String>,
    stats: PacingStats,
    last_config: Option<QueueConfiguration>,
}

#[bon]
impl<S: OrderSink + 'static> PacingLoop<S> {
    /// Create a new pacing loop.
    #[builder]
    pub fn new(
        store: Arc<ConfigurationStore>,
        sink: S,
        metrics: Arc<dyn MetricsSink>,
        /// Defaults to a [`TokioClock`].
        clock: Option<Arc<dyn Clock>>,
        /// Master seed. The producer uses stream 0.
        seed: Option<u64>,
        #[builder(default)] hint_mode: ServiceHint,
        /// Defaults to [`DEFAULT_CUSTOMERS`].
        customers: Option<Vec<String>>,
    ) -> Self {
        let customers = customers
            .filter(|customers| !customers.is_empty())
            .unwrap_or_else(|| DEFAULT_CUSTOMERS.iter().map(|c| c.to_string()).collect());

        Self {
            store,
            sink,
            metrics,
            clock: clock.unwrap_or_else(|| Arc::new(TokioClock::new())),
            variate: VariateGenerator::for_stream(seed, 0),
            hint_mode,
            customers,
            stats: PacingStats::default(),
            last_config: None,
        }
    }

    pub fn stats(&self) -> PacingStats {
        self.stats
    }

    /// Run one cycle without sleeping. Returns how long the caller should wait before the next.
    pub async fn cycle(&mut self) -> Pace {
        let started = Instant::now();

        let config = self.store.get();
        if self.last_config.replace(config) != Some(config) {
            debug!(%config, "Pacing with new configuration");
        }

        let interarrival = self
            .variate
            .sample_duration(config.mean_arrival_delay_ms, config.arrival_cv);

        let order = self.next_order(&config);
        let order_id = order.order_id;

        match self.sink.publish(order).await {
            Ok(()) => {
                self.stats.record_emitted(Instant::now());
                self.metrics.record_order_placed();

                debug!(
                    %order_id,
                    interarrival_ms = interarrival.as_secs_f64() * 1000.0,
                    observed_rate = self.stats.arrival_rate().unwrap_or_default(),
                    "Published order"
                );
            }
            Err(err) => {
                self.stats.failed += 1;
                warn!(%order_id, error = %err, "Failed to publish order, continuing");
            }
        }

        Pace {
            interarrival,
            elapsed: started.elapsed(),
        }
    }

    /// Run cycles until `stop` is signalled, checking at the top of each cycle.
    pub(crate) async fn run(mut self, stop: StopSignal) -> PacingStats {
        info!("Pacing loop started");

        while !stop.is_stopped() {
            let pace = self.cycle().await;
            tokio::time::sleep(pace.remaining()).await;
        }

        info!(
            emitted = self.stats.emitted,
            failed = self.stats.failed,
            "Pacing loop stopped"
        );

        self.stats
    }

    /// Run the loop in a background task.
    pub fn spawn(self) -> WorkerHandle {
        let (mut handle, stop) = WorkerHandle::new("pacing");

        handle.push(tokio::spawn(async move {
            self.run(stop).await;
        }));

        handle
    }

    fn next_order(&mut self, config: &QueueConfiguration) -> OrderRecord {
        let service_delay_hint = match self.hint_mode {
            ServiceHint::Sampled => self
                .variate
                .sample(config.mean_service_delay_ms, config.service_cv),
            ServiceHint::Mean => config.mean_service_delay_ms,
        };

        let customer = self.variate.pick(self.customers.len());
        let amount = (self.variate.unit() * 100.0 * 100.0).floor() / 100.0;

        OrderRecord {
            order_id: Uuid::new_v4(),
            customer_label: self.customers[customer].clone(),
            created_at: self.clock.now(),
            amount,
            service_delay_hint,
            service_cv: config.service_cv,
            service_hint_kind: self.hint_mode,
        }
    }
}
