//! Loading configuration from YAML

use super::schema::ModelConfig;
use super::validate::validate_config;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Load and validate a model configuration from a YAML file
pub fn load_config<A, P>(config_path: P) -> Result<ModelConfig<A>>
where
    A: DeserializeOwned,
    P: AsRef<Path>,
{
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;
    parse_config(&yaml_content)
}

/// Parse and validate a model configuration from YAML text
pub fn parse_config<A: DeserializeOwned>(yaml: &str) -> Result<ModelConfig<A>> {
    let config: ModelConfig<A> = serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;
    validate_config(&config)?;
    Ok(config)
}
