use config::Config;
use serde::Deserialize;
use std::{path::PathBuf, str, time::Duration};
use tracing::*;
use zenoh::config::Config as ZenohConfig;

use crate::error::WakeWordError;
use crate::topics::{DEFAULT_SILENCE_TIMEOUT_SECS, DEFAULT_TOPIC_PREFIX};

/// Use default config if no path is provided
pub fn get_configuration(config: &Option<PathBuf>) -> Result<WakeWordConfig, anyhow::Error> {
    let settings = if let Some(config) = config {
        info!("Using configuration from {:?}", config);
        Config::builder()
            .add_source(config::Environment::with_prefix("APP"))
            .add_source(config::File::with_name(
                config
                    .to_str()
                    .ok_or_else(|| anyhow::anyhow!("Failed to convert path"))?,
            ))
            .build()?
    } else {
        info!("Using dev configuration");
        Config::builder()
            .add_source(config::Environment::with_prefix("APP"))
            .add_source(config::File::with_name("config/settings"))
            .add_source(config::File::with_name("config/dev_settings").required(false))
            .build()?
    };

    Ok(settings.try_deserialize()?)
}

#[derive(Deserialize, Debug, Clone)]
pub struct WakeWordConfig {
    #[serde(default)]
    pub zenoh: WakeWordZenohConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TrackerConfig {
    /// Key prefix the detector publishes under
    pub topic_prefix: String,
    /// Seconds without activity before an active conversation returns to listening
    #[serde(default = "default_silence_timeout")]
    pub silence_timeout: f32,
}

impl TrackerConfig {
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.silence_timeout.max(0.0))
    }
}

fn default_silence_timeout() -> f32 {
    DEFAULT_SILENCE_TIMEOUT_SECS
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_owned(),
            silence_timeout: DEFAULT_SILENCE_TIMEOUT_SECS,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct WakeWordZenohConfig {
    #[serde(default)]
    pub connect: Vec<zenoh_config::EndPoint>,
    #[serde(default)]
    pub listen: Vec<zenoh_config::EndPoint>,
    #[serde(default)]
    pub config_path: Option<String>,
}

impl WakeWordZenohConfig {
    pub fn get_zenoh_config(&self) -> anyhow::Result<ZenohConfig> {
        let mut config = if let Some(conf_file) = &self.config_path {
            ZenohConfig::from_file(conf_file).map_err(WakeWordError::ZenohError)?
        } else {
            ZenohConfig::default()
        };
        if !self.connect.is_empty() {
            config.connect.endpoints = self.connect.clone();
        }
        if !self.listen.is_empty() {
            config.listen.endpoints = self.listen.clone();
        }
        Ok(config)
    }
}
