//! Stochastic timing for an open queueing network of orders and servers.
//!
//! A producer ([`PacingLoop`]) emits orders with randomised gaps between them. A pool of
//! consumers ([`ServerPool`]) takes orders off a shared stream and spends a randomised time on
//! each. Both read their parameters from a live [`ConfigurationStore`], which can be changed while
//! the loops run, either directly or through a named [`Scenario`].
//!
//! Gaps and service times are drawn from a Gamma distribution matched to a mean and a coefficient
//! of variation ([`VariateGenerator`]). [`expected_wait`] gives Kingman's estimate of the queueing
//! delay to compare observations against.
//!
//! See the README for an example.

#[cfg(doctest)]
use doc_comment::doctest;
#[cfg(doctest)]
doctest!("../README.md");

mod clock;
mod config;
pub mod error;
mod estimator;
mod metrics;
mod order;
mod pacing;
mod pool;
mod reporter;
mod sampler;
mod scenario;
mod settings;
mod transport;
mod variate;
mod worker;

pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{ConfigurationStore, QueueConfiguration};
pub use estimator::{expected_wait, QueueAnalysis};
pub use metrics::{
    DistributionSummary, Histogram, LinearBuckets, MetricsCollector, MetricsSink, MetricsSnapshot,
};
pub use order::{OrderRecord, ServiceHint};
pub use pacing::{Pace, PacingLoop, PacingStats, DEFAULT_CUSTOMERS};
pub use pool::ServerPool;
pub use reporter::RunReporter;
pub use sampler::{ProcessingReport, ProcessingSampler};
pub use scenario::{apply_scenario, Scenario};
pub use settings::Settings;
pub use transport::{channel, ChannelSink, OrderSink, OrderStream};
pub use variate::{millis_to_duration, VariateGenerator};
pub use worker::WorkerHandle;
