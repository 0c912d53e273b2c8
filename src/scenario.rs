//! Named presets for seeding the queue configuration.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use tracing::info;

use crate::{
    error::{ConfigField, Constraint, ScenarioError, ValidationError},
    ConfigurationStore, QueueConfiguration,
};

/// A named preset, defined by a target utilization and the two coefficients of variation.
///
/// The mean service delay is fixed at 500ms. The mean arrival delay is derived from the target ρ
/// and the server count: `arrival = service / (ρ · c)`, so every preset hits its ρ whatever the
/// number of servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// λ well below cμ.
    Underload,
    /// λ ≈ cμ.
    NearCapacity,
    /// λ > cμ. The queue grows without bound.
    Overload,
    /// Moderate load, mild variability everywhere.
    LowVariability,
    /// Moderate load, regular arrivals but erratic service.
    HighServiceVariability,
    /// Heavy load, erratic arrivals and service.
    HighVariability,
}

impl Scenario {
    /// Every preset, in display order.
    pub const ALL: [Scenario; 6] = [
        Scenario::Underload,
        Scenario::NearCapacity,
        Scenario::Overload,
        Scenario::LowVariability,
        Scenario::HighServiceVariability,
        Scenario::HighVariability,
    ];

    const SERVICE_DELAY_MS: f64 = 500.0;

    /// The name used to look this preset up.
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Underload => "underload",
            Scenario::NearCapacity => "nearcapacity",
            Scenario::Overload => "overload",
            Scenario::LowVariability => "lowvariability",
            Scenario::HighServiceVariability => "highservicevariability",
            Scenario::HighVariability => "highvariability",
        }
    }

    /// Every valid name.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Scenario::name).collect()
    }

    /// The utilization this preset aims for.
    pub fn target_utilization(&self) -> f64 {
        match self {
            Scenario::Underload => 0.25,
            Scenario::NearCapacity => 0.95,
            Scenario::Overload => 1.25,
            Scenario::LowVariability => 0.7,
            Scenario::HighServiceVariability => 0.7,
            Scenario::HighVariability => 0.9,
        }
    }

    /// `(ca, cs)` for this preset.
    pub fn variation(&self) -> (f64, f64) {
        match self {
            Scenario::Underload | Scenario::NearCapacity | Scenario::Overload => (0.0, 0.0),
            Scenario::LowVariability => (0.5, 0.5),
            Scenario::HighServiceVariability => (0.5, 2.0),
            Scenario::HighVariability => (1.5, 1.5),
        }
    }

    /// The full configuration for this preset with `server_count` servers.
    pub fn configuration(&self, server_count: usize) -> Result<QueueConfiguration, ValidationError> {
        if server_count < 1 {
            return Err(ValidationError {
                field: ConfigField::ServerCount,
                constraint: Constraint::AtLeastOne,
                value: server_count as f64,
            });
        }

        let (arrival_cv, service_cv) = self.variation();

        Ok(QueueConfiguration {
            mean_arrival_delay_ms: Self::SERVICE_DELAY_MS
                / (self.target_utilization() * server_count as f64),
            mean_service_delay_ms: Self::SERVICE_DELAY_MS,
            server_count,
            arrival_cv,
            service_cv,
        })
    }

    /// Replace the stored configuration with this preset.
    ///
    /// Uses the default server count unless `server_count` is given.
    pub fn apply(
        &self,
        store: &ConfigurationStore,
        server_count: Option<usize>,
    ) -> Result<QueueConfiguration, ScenarioError> {
        let config = self.configuration(
            server_count.unwrap_or(QueueConfiguration::DEFAULT_SERVER_COUNT),
        )?;

        let config = store.update(config)?;

        info!(scenario = self.name(), %config, "Scenario applied");

        Ok(config)
    }
}

/// Look up a preset by (case-insensitive) name and apply it to `store`.
pub fn apply_scenario(
    store: &ConfigurationStore,
    name: &str,
    server_count: Option<usize>,
) -> Result<QueueConfiguration, ScenarioError> {
    name.parse::<Scenario>()?.apply(store, server_count)
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();

        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == lower)
            .ok_or_else(|| ScenarioError::Unknown {
                name: s.to_string(),
                valid: Scenario::names(),
            })
    }
}

impl Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
