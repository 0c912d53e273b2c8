//! Errors.

use std::fmt::{self, Display};

use thiserror::Error;

/// A field of a [`QueueConfiguration`](crate::QueueConfiguration).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    /// Mean time between order arrivals.
    MeanArrivalDelay,
    /// Mean time to serve one order.
    MeanServiceDelay,
    /// Number of concurrent server slots.
    ServerCount,
    /// Coefficient of variation of the interarrival times.
    ArrivalCv,
    /// Coefficient of variation of the service times.
    ServiceCv,
}

/// The constraint a configuration field must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Finite and strictly greater than zero.
    Positive,
    /// At least one.
    AtLeastOne,
    /// Finite and not negative.
    NonNegative,
}

/// A configuration write was rejected.
///
/// Recoverable. The store is left unchanged.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("{field} must be {constraint}, got {value}")]
pub struct ValidationError {
    /// The offending field.
    pub field: ConfigField,
    /// The constraint it violated.
    pub constraint: Constraint,
    /// The rejected value.
    pub value: f64,
}

/// A scenario shortcut could not be applied.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ScenarioError {
    /// No preset exists with this name.
    #[error("Unknown scenario: {name}. Available scenarios: {}", .valid.join(", "))]
    Unknown {
        /// The name that was asked for.
        name: String,
        /// Every name that would have been accepted.
        valid: Vec<&'static str>,
    },

    /// The server-count override was invalid.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// An order could not be handed to the message substrate.
///
/// The pacing loop logs these and carries on with the next cycle.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum PublishError {
    /// The receiving side has gone away.
    #[error("Unable to publish order: channel closed")]
    Closed,

    /// The substrate refused the order.
    #[error("Unable to publish order: {0}")]
    Rejected(String),
}

/// Process settings could not be loaded.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SettingsError {
    /// Reading or deserialising a settings source failed.
    #[error("Unable to load settings")]
    Load(#[from] config::ConfigError),

    /// The initial queue configuration is invalid.
    #[error("Invalid initial queue configuration")]
    Invalid(#[from] ValidationError),

    /// The requested scenario could not be applied.
    #[error("Invalid scenario")]
    Scenario(#[from] ScenarioError),
}

impl Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigField::MeanArrivalDelay => "mean_arrival_delay_ms",
            ConfigField::MeanServiceDelay => "mean_service_delay_ms",
            ConfigField::ServerCount => "server_count",
            ConfigField::ArrivalCv => "arrival_cv",
            ConfigField::ServiceCv => "service_cv",
        })
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Constraint::Positive => "greater than 0",
            Constraint::AtLeastOne => "at least 1",
            Constraint::NonNegative => "greater than or equal to 0",
        })
    }
}
