//! Configuration loading helper functions
//!
//! Layers, lowest to highest priority:
//! 1. Compiled-in defaults (`T::default()`)
//! 2. Config file: the explicit path if given, otherwise `config/{service}.yaml`
//!    or `config/{service}.toml` when present
//! 3. Environment variables `{SERVICE}_...`, with `__` separating nested keys
//!    (e.g. `INFOSRV_API__PORT=6010`)

use std::path::Path;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Load a service configuration
pub fn load_config<T>(service_name: &str, explicit_path: Option<&Path>) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let mut figment = Figment::from(Serialized::defaults(T::default()));

    match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading configuration from {}", path.display());
            figment = merge_file(figment, path)?;
        },
        None => {
            figment = figment
                .merge(Toml::file(format!("config/{}.toml", service_name)))
                .merge(Yaml::file(format!("config/{}.yaml", service_name)));
        },
    }

    figment
        .merge(Env::prefixed(&env_prefix(service_name)).split("__"))
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))
}

/// Environment variable prefix for a service, e.g. `INFOSRV_`
pub fn env_prefix(service_name: &str) -> String {
    format!("{}_", service_name.to_uppercase())
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Config("Config file must have an extension".to_string()))?;

    match extension {
        "toml" => Ok(figment.merge(Toml::file(path))),
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        "json" => Ok(figment.merge(Json::file(path))),
        _ => Err(Error::Config(format!(
            "Unsupported config file format: {}",
            extension
        ))),
    }
}
