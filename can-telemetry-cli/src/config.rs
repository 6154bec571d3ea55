//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_telemetry::{GatewayConfig, PublishIntervals, PublishTier};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub publish: PublishIntervals,
    #[serde(default)]
    pub filtering: FilteringConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Prefix for every destination topic
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
}

fn default_base_topic() -> String {
    "vehicle/zoe".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_topic: default_base_topic(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilteringConfig {
    pub channels: Option<Vec<u8>>,
    pub message_ids: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalsConfig {
    /// Register the compiled-in vehicle catalog
    #[serde(default = "default_true")]
    pub builtin: bool,
    /// Additional TOML descriptor tables
    #[serde(default)]
    pub tables: Vec<PathBuf>,
    /// DBC files to import
    #[serde(default)]
    pub dbc_files: Vec<PathBuf>,
    /// Publish tier for imported DBC signals
    #[serde(default = "default_dbc_tier")]
    pub dbc_tier: PublishTier,
}

fn default_true() -> bool {
    true
}

fn default_dbc_tier() -> PublishTier {
    PublishTier::Fast
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            tables: Vec::new(),
            dbc_files: Vec::new(),
            dbc_tier: default_dbc_tier(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    /// Time between two simulated frame bursts
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
    /// Initial state of charge in percent
    #[serde(default = "default_start_soc")]
    pub start_soc: f64,
}

fn default_step_ms() -> u64 {
    1000
}

fn default_start_soc() -> f64 {
    60.0
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            step_ms: default_step_ms(),
            start_soc: default_start_soc(),
        }
    }
}

impl AppConfig {
    /// Core configuration derived from the application settings
    pub fn gateway_config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::new().with_intervals(self.publish);
        if let Some(channels) = &self.filtering.channels {
            config = config.with_channel_filter(channels.clone());
        }
        if let Some(ids) = &self.filtering.message_ids {
            config = config.with_message_filter(ids.clone());
        }
        config
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if config.simulator.step_ms == 0 {
        anyhow::bail!("simulator.step_ms must be greater than zero");
    }

    Ok(config)
}
