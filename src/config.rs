use std::{fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::daikin::{Controller, Features, Model, Transmitter};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sensor reference is empty")]
    EmptySensor,
}

/// Per-unit settings. Every field is optional, `{}` is a valid config.
///
/// ```json
/// { "model": "ARC432A14", "sensor": "living_room", "preset_boost": false }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: Model,

    /// Name of the room temperature sensor; without one the unit reports no current temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor: Option<String>,

    #[serde(flatten)]
    pub features: Features,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        fs::read_to_string(path)?.parse()
    }

    pub fn has_sensor(&self) -> bool {
        self.sensor.is_some()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        match self.sensor.as_deref() {
            Some(name) if name.trim().is_empty() => Err(ConfigError::EmptySensor),
            _ => Ok(self),
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str::<Config>(s)?.validate()
    }
}

impl<T: Transmitter> Controller<T> {
    pub fn from_config(config: &Config, transmitter: T) -> Self {
        Controller::new(config.model, config.features, config.has_sensor(), transmitter)
    }
}
