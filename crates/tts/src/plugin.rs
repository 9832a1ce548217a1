//! Built-in synthesis backends

pub mod command;
pub mod tone;

use murmur_config::EngineOptions;
use serde::de::DeserializeOwned;

use crate::error::{Result, TtsError};

/// Deserialize a plugin's typed options from the keyword map
fn parse_options<T: DeserializeOwned>(plugin: &str, options: &EngineOptions) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(options.clone())).map_err(|e| TtsError::InvalidOptions {
        plugin: plugin.to_string(),
        message: e.to_string(),
    })
}
