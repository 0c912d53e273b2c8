//! The order payload handed from the pacing loop to the consumers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::variate::millis_to_duration;

/// What the service-delay hint on an [`OrderRecord`] means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHint {
    /// The producer already drew the service time. Consumers use the hint as-is.
    #[default]
    Sampled,
    /// The hint is the configured mean. Consumers draw the service time from it using the
    /// record's `service_cv`.
    Mean,
}

/// An order placed by the pacing loop.
///
/// Immutable once created. Carries its own service parameters so a consumer never needs to read
/// the live configuration, which may have changed since the order was placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// Unique order ID.
    pub order_id: Uuid,
    /// Who placed the order.
    pub customer_label: String,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// Order value, truncated to whole cents.
    pub amount: f64,
    /// Service delay hint in milliseconds.
    pub service_delay_hint: f64,
    /// Coefficient of service variation in force when the order was placed.
    #[serde(rename = "serviceCV")]
    pub service_cv: f64,
    /// How to interpret `service_delay_hint`.
    pub service_hint_kind: ServiceHint,
}

impl OrderRecord {
    /// The service delay hint as a [`Duration`].
    pub fn service_delay_hint(&self) -> Duration {
        millis_to_duration(self.service_delay_hint)
    }

    /// Time elapsed between placing this order and `now`.
    ///
    /// Zero if `now` is before `created_at`.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }
}
