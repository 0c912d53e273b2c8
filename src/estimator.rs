//! Analytic waiting-time estimates.
//!
//! Uses Kingman's approximation for a G/G/1 queue:
//!
//! ```text
//! Wq ≈ ((ca² + cs²) / 2) · (ρ / (1 − ρ)) · E[S]
//! ```
//!
//! With more than one server, `server_count` only enters through ρ = λ / (cμ). The single-server
//! form is applied as-is; there is no Erlang-C correction for `c > 1`.

use std::fmt::{self, Display};

use crate::QueueConfiguration;

/// Expected time an order spends queueing before service starts, in milliseconds.
///
/// Returns `f64::INFINITY` when ρ ≥ 1. Callers must check for this before treating the result as
/// a number.
pub fn expected_wait(config: &QueueConfiguration) -> f64 {
    let utilization = config.utilization();

    if utilization >= 1.0 || utilization.is_nan() {
        return f64::INFINITY;
    }

    let ca2 = config.arrival_cv.powi(2);
    let cs2 = config.service_cv.powi(2);

    (ca2 + cs2) / 2.0 * (utilization / (1.0 - utilization)) * config.mean_service_delay_ms
}

/// Everything the estimator can say about a configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueAnalysis {
    /// λ, orders per second.
    pub arrival_rate_per_sec: f64,
    /// μ, orders per second per server.
    pub service_rate_per_sec: f64,
    /// ρ.
    pub utilization: f64,
    /// Wq in milliseconds. Infinite when unstable.
    pub expected_wait_ms: f64,
    /// W = Wq + E[S] in milliseconds. Infinite when unstable.
    pub expected_time_in_system_ms: f64,
}

impl QueueAnalysis {
    /// Analyse `config`.
    pub fn of(config: &QueueConfiguration) -> Self {
        let expected_wait_ms = expected_wait(config);

        Self {
            arrival_rate_per_sec: config.arrival_rate() * 1000.0,
            service_rate_per_sec: config.service_rate() * 1000.0,
            utilization: config.utilization(),
            expected_wait_ms,
            expected_time_in_system_ms: expected_wait_ms + config.mean_service_delay_ms,
        }
    }

    /// Whether the queue settles (ρ < 1).
    pub fn is_stable(&self) -> bool {
        self.expected_wait_ms.is_finite()
    }

    /// Expected number of orders waiting (Lq = λ·Wq, Little's law).
    pub fn expected_queue_length(&self) -> f64 {
        if self.is_stable() {
            self.arrival_rate_per_sec * self.expected_wait_ms / 1000.0
        } else {
            f64::INFINITY
        }
    }
}

impl Display for QueueAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "λ = {:.3}/s, μ = {:.3}/s, ρ = {:.3}, ",
            self.arrival_rate_per_sec, self.service_rate_per_sec, self.utilization
        )?;
        if self.is_stable() {
            write!(
                f,
                "Wq ≈ {:.1}ms, W ≈ {:.1}ms",
                self.expected_wait_ms, self.expected_time_in_system_ms
            )
        } else {
            f.write_str("unstable (queue grows without bound)")
        }
    }
}
