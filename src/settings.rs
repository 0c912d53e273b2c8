//! Process settings for the binary.
//!
//! Layered with the `config` crate: built-in defaults, then an optional file, then environment
//! variables prefixed `QUEUE_SIM`, using `__` to separate nested keys:
//!
//! ```text
//! QUEUE_SIM__RUN_SECS=60
//! QUEUE_SIM__QUEUE__SERVER_COUNT=4
//! QUEUE_SIM__CUSTOMERS=Ann,Ben
//! ```
//!
//! The library itself never reads the environment. Loops take their configuration explicitly.

use std::path::Path;

use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use tracing::info;

use crate::{error::SettingsError, pacing::DEFAULT_CUSTOMERS, scenario::Scenario};
use crate::{ConfigurationStore, QueueConfiguration, ServiceHint};

const ENV_PREFIX: &str = "QUEUE_SIM";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The initial queue configuration.
    pub queue: QueueConfiguration,
    /// A preset to apply on top of `queue`.
    pub scenario: Option<String>,
    /// Server count to use with `scenario`.
    pub scenario_server_count: Option<usize>,
    /// Master seed for every loop's generator. Seeded from the OS if absent.
    pub seed: Option<u64>,
    /// Undelivered orders the in-memory substrate will hold before the producer waits.
    pub channel_capacity: usize,
    /// How long to run for.
    pub run_secs: u64,
    pub hint_mode: ServiceHint,
    /// Customer labels to pick from.
    pub customers: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            queue: QueueConfiguration::default(),
            scenario: None,
            scenario_server_count: None,
            seed: None,
            channel_capacity: 1024,
            run_secs: 30,
            hint_mode: ServiceHint::default(),
            customers: DEFAULT_CUSTOMERS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Load settings from the optional file at `path`, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("customers"),
        );

        Self::from_builder(builder)
    }

    /// Build settings from already-layered sources and validate them.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Check the initial configuration and that any scenario name is known.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.queue.validate()?;

        if let Some(name) = &self.scenario {
            name.parse::<Scenario>()?;
        }

        Ok(())
    }

    /// Create the configuration store, applying `scenario` if one is set.
    pub fn store(&self) -> Result<ConfigurationStore, SettingsError> {
        let store = ConfigurationStore::new(self.queue)?;

        if let Some(name) = &self.scenario {
            let scenario: Scenario = name.parse()?;
            scenario.apply(&store, self.scenario_server_count)?;
        } else {
            info!(config = %self.queue, "Using initial queue configuration");
        }

        Ok(store)
    }
}
