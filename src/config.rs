use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_DISTRIBUTION_POINT: &str = "http://crl.entrust.net/level1k.crl";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub distribution_points: Vec<String>,
    pub check_interval_secs: u64,
    pub timeout_secs: u64,
    /// Check each distribution point once and exit.
    pub run_once: bool,
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root of the per distribution point CRL archives.
    pub archive_dir: PathBuf,
    pub targets_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default(
                "monitor.distribution_points",
                vec![DEFAULT_DISTRIBUTION_POINT],
            )?
            .set_default("monitor.check_interval_secs", 30)?
            .set_default("monitor.timeout_secs", 30)?
            .set_default("monitor.run_once", false)?
            .set_default("storage.archive_dir", "crls")?
            .set_default("storage.targets_file", "targets.json")?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = if key == "monitor.distribution_points" {
                    builder.set_override(&key, split_list(&value))?
                } else {
                    builder.set_override(&key, value)?
                };
            }
        } else {
            // Should be in the format APP_MONITOR__CHECK_INTERVAL_SECS, lists are
            // comma separated: APP_MONITOR__DISTRIBUTION_POINTS=http://a,http://b
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("monitor.distribution_points")
                    .try_parsing(true),
            );
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.check_interval_secs == 0 {
            return Err(ConfigError::Message(
                "monitor.check_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
