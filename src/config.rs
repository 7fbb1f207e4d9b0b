//! Application configuration

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;

use crate::errors::PortflowError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub vessel_provider: ProviderConfig,
    pub weather_provider: ProviderConfig,
    pub relay: RelayConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Connection settings for an external data provider.
///
/// Each adapter gets its own instance; nothing is shared process-wide.
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_api_key")]
    pub api_key: String,
    pub base_url: String,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_provider_timeout")]
    pub timeout: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub base_url: String,
    /// Target ledger channel; publishing is refused without one
    pub topic_id: Option<String>,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_relay_timeout")]
    pub timeout: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub delay_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub weather_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub sync_interval: Duration,
}

fn default_max_connections() -> u32 {
    5
}

fn default_api_key() -> String {
    "demo_key".to_string()
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_relay_timeout() -> Duration {
    Duration::from_secs(15)
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("PORTFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<(), PortflowError> {
        self.database.validate()?;
        self.vessel_provider.validate()?;
        self.weather_provider.validate()?;
        self.scan.validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), PortflowError> {
        if self.url.is_empty() {
            return Err(PortflowError::Configuration {
                message: "Database URL cannot be empty".to_string(),
            });
        }
        if self.max_connections == 0 {
            return Err(PortflowError::Configuration {
                message: "Database pool must allow at least one connection".to_string(),
            });
        }
        Ok(())
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), PortflowError> {
        if self.base_url.is_empty() {
            return Err(PortflowError::Configuration {
                message: "Provider base URL cannot be empty".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(PortflowError::Configuration {
                message: "Provider timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Whether the configured key looks like a real upstream credential.
    ///
    /// Demo keys keep the adapter in offline-fallback mode.
    pub fn has_real_api_key(&self) -> bool {
        self.api_key.len() > 10 && !self.api_key.starts_with("demo")
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), PortflowError> {
        for (name, interval) in [
            ("delay_interval", self.delay_interval),
            ("weather_interval", self.weather_interval),
            ("sync_interval", self.sync_interval),
        ] {
            if interval.is_zero() {
                return Err(PortflowError::Configuration {
                    message: format!("Scan {name} must be greater than zero"),
                });
            }
        }
        Ok(())
    }
}
