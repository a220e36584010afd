use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::dates::{BillingCycle, DEFAULT_BILLING_CUTOVER_DAY};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// File name of the SQLite database inside the data directory
    #[serde(default = "default_db_file")]
    pub file_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file_name: default_db_file(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_db_file() -> String {
    "costs.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    /// Organisation the reports are produced for
    #[serde(default = "default_organisation")]
    pub organisation: String,
    /// Day of month from which last month's costs are complete
    #[serde(default = "default_cutover_day")]
    pub billing_cutover_day: u32,
    /// Version prefix for API paths
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            organisation: default_organisation(),
            billing_cutover_day: default_cutover_day(),
            api_version: default_api_version(),
        }
    }
}

impl ReportingConfig {
    pub fn billing_cycle(&self) -> BillingCycle {
        BillingCycle::new(self.billing_cutover_day)
    }
}

fn default_organisation() -> String {
    "default".to_string()
}

fn default_cutover_day() -> u32 {
    DEFAULT_BILLING_CUTOVER_DAY
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }
}
