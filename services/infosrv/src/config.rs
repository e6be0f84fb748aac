//! Infosrv configuration
//!
//! Loaded through `common::load_config`: compiled defaults, then
//! `config/infosrv.yaml` (or `--config`), then `INFOSRV_*` environment
//! variables such as `INFOSRV_API__PORT=6010`.

use std::path::{Path, PathBuf};

use common::LogConfig;
use remote_rules::{
    interval::validate_interval, ExtractionPattern, FetchSettings, SourceDefaults,
    DEFAULT_TICK_SECS,
};
use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "infosrv";

/// Default API port
pub const DEFAULT_PORT: u16 = 6010;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfosrvConfig {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub logging: LogConfig,
    pub refresh: RefreshConfig,
}

impl Default for InfosrvConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
            logging: LogConfig {
                service_name: SERVICE_NAME.to_string(),
                ..LogConfig::default()
            },
            refresh: RefreshConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding the declared sources
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/infosrv.db"),
        }
    }
}

impl DatabaseConfig {
    /// sqlx connection URL, creating the file if missing
    pub fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path.display())
    }
}

/// Refresh engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Scheduler wake-up period in seconds
    pub tick_secs: u64,
    /// Pattern and interval applied when a source omits them
    pub defaults: SourceDefaults,
    pub fetch: FetchSettings,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
            defaults: SourceDefaults::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl InfosrvConfig {
    /// Load configuration from defaults, file and environment
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        common::load_config(SERVICE_NAME, path)
    }

    /// Reject settings the service cannot start with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api.port == 0 {
            anyhow::bail!("api.port must be non-zero");
        }
        if self.refresh.tick_secs == 0 {
            anyhow::bail!("refresh.tick_secs must be non-zero");
        }
        if self.refresh.fetch.timeout_secs == 0 {
            anyhow::bail!("refresh.fetch.timeout_secs must be non-zero");
        }
        validate_interval(self.refresh.defaults.interval_secs)?;
        ExtractionPattern::new(&self.refresh.defaults.pattern)?;
        Ok(())
    }
}
