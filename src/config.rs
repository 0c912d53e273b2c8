//! Live queueing parameters and the store that holds them.

use std::{
    fmt::{self, Display},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::{
    error::{ConfigField, Constraint, ValidationError},
    variate::millis_to_duration,
};

/// The parameters of the simulated queue.
///
/// Delays are in milliseconds. Replaced wholesale, never mutated field by field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfiguration {
    /// Mean time between order arrivals.
    pub mean_arrival_delay_ms: f64,
    /// Mean time for one server to process one order.
    pub mean_service_delay_ms: f64,
    /// Number of concurrent server slots.
    pub server_count: usize,
    /// Coefficient of variation of interarrival times (`ca`).
    pub arrival_cv: f64,
    /// Coefficient of variation of service times (`cs`).
    pub service_cv: f64,
}

impl QueueConfiguration {
    /// Default mean interarrival delay: 300ms, about 3.3 orders per second.
    pub const DEFAULT_ARRIVAL_DELAY_MS: f64 = 300.0;
    /// Default mean service delay.
    pub const DEFAULT_SERVICE_DELAY_MS: f64 = 500.0;
    /// Default number of servers.
    pub const DEFAULT_SERVER_COUNT: usize = 16;

    /// Check every field against its domain.
    ///
    /// Reports the first field that fails, in declaration order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        positive(ConfigField::MeanArrivalDelay, self.mean_arrival_delay_ms)?;
        positive(ConfigField::MeanServiceDelay, self.mean_service_delay_ms)?;

        if self.server_count < 1 {
            return Err(ValidationError {
                field: ConfigField::ServerCount,
                constraint: Constraint::AtLeastOne,
                value: self.server_count as f64,
            });
        }

        non_negative(ConfigField::ArrivalCv, self.arrival_cv)?;
        non_negative(ConfigField::ServiceCv, self.service_cv)?;

        Ok(())
    }

    /// Orders arriving per millisecond (λ).
    pub fn arrival_rate(&self) -> f64 {
        1.0 / self.mean_arrival_delay_ms
    }

    /// Orders one server completes per millisecond (μ).
    pub fn service_rate(&self) -> f64 {
        1.0 / self.mean_service_delay_ms
    }

    /// Fraction of aggregate service capacity consumed by arrivals (ρ = λ / cμ).
    pub fn utilization(&self) -> f64 {
        self.arrival_rate() / (self.server_count as f64 * self.service_rate())
    }

    /// The mean interarrival delay as a [`Duration`].
    pub fn mean_arrival_delay(&self) -> Duration {
        millis_to_duration(self.mean_arrival_delay_ms)
    }

    /// The mean service delay as a [`Duration`].
    pub fn mean_service_delay(&self) -> Duration {
        millis_to_duration(self.mean_service_delay_ms)
    }
}

fn positive(field: ConfigField, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError {
            field,
            constraint: Constraint::Positive,
            value,
        })
    }
}

fn non_negative(field: ConfigField, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError {
            field,
            constraint: Constraint::NonNegative,
            value,
        })
    }
}

impl Default for QueueConfiguration {
    fn default() -> Self {
        Self {
            mean_arrival_delay_ms: Self::DEFAULT_ARRIVAL_DELAY_MS,
            mean_service_delay_ms: Self::DEFAULT_SERVICE_DELAY_MS,
            server_count: Self::DEFAULT_SERVER_COUNT,
            arrival_cv: 0.0,
            service_cv: 0.0,
        }
    }
}

impl Display for QueueConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arrival: {}ms (ca={}), service: {}ms (cs={}), servers: {}",
            self.mean_arrival_delay_ms,
            self.arrival_cv,
            self.mean_service_delay_ms,
            self.service_cv,
            self.server_count
        )
    }
}

/// Holds the live [`QueueConfiguration`].
///
/// Reads return a whole snapshot. Writes validate the candidate and swap it in atomically, so a
/// reader never sees a mix of old and new fields.
///
/// Share it behind an `Arc` between the pacing loop, the consumers and whatever admin surface
/// accepts updates.
#[derive(Debug)]
pub struct ConfigurationStore {
    current: watch::Sender<QueueConfiguration>,
}

impl ConfigurationStore {
    /// Create a store seeded with `initial`.
    pub fn new(initial: QueueConfiguration) -> Result<Self, ValidationError> {
        initial.validate()?;

        let (current, _) = watch::channel(initial);

        Ok(Self { current })
    }

    /// The current configuration.
    pub fn get(&self) -> QueueConfiguration {
        *self.current.borrow()
    }

    /// Replace the configuration with `candidate`.
    ///
    /// On failure the stored configuration is unchanged.
    pub fn update(
        &self,
        candidate: QueueConfiguration,
    ) -> Result<QueueConfiguration, ValidationError> {
        candidate.validate()?;

        self.current.send_replace(candidate);

        info!(
            mean_arrival_delay_ms = candidate.mean_arrival_delay_ms,
            mean_service_delay_ms = candidate.mean_service_delay_ms,
            server_count = candidate.server_count,
            arrival_cv = candidate.arrival_cv,
            service_cv = candidate.service_cv,
            "Queue configuration updated"
        );

        Ok(candidate)
    }

    /// Watch for replacements.
    ///
    /// The receiver starts out holding the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<QueueConfiguration> {
        self.current.subscribe()
    }
}

impl Default for ConfigurationStore {
    fn default() -> Self {
        let (current, _) = watch::channel(QueueConfiguration::default());
        Self { current }
    }
}
