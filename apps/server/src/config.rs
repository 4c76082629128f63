//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cantata_core::WebhookConfig;
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port to bind the HTTP/JSON API to.
    /// Override: `CANTATA_BIND_PORT`
    pub bind_port: u16,

    /// Port for the GENA callback listener (0 = any free port).
    /// Override: `CANTATA_CALLBACK_PORT`
    pub callback_port: u16,

    /// IP address to advertise to players for callbacks.
    /// If not specified, auto-detection is attempted.
    /// Override: `CANTATA_ADVERTISE_IP`
    pub advertise_ip: Option<String>,

    /// Interval in seconds between discovery sweeps.
    /// Override: `CANTATA_DISCOVERY_INTERVAL`
    pub discovery_interval: u64,

    /// Enable mDNS/Bonjour discovery alongside SSDP.
    pub discovery_mdns: bool,

    /// Webhook targets for the event hub.
    pub webhooks: Vec<WebhookConfig>,

    /// Directory for persistent data (station cache, backoff files).
    /// Override: `CANTATA_DATA_DIR`
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: 5005,
            callback_port: 0,
            advertise_ip: None,
            discovery_interval: 30,
            discovery_mdns: true,
            webhooks: Vec::new(),
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CANTATA_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("CANTATA_CALLBACK_PORT") {
            if let Ok(port) = val.parse() {
                self.callback_port = port;
            }
        }

        if let Ok(val) = std::env::var("CANTATA_ADVERTISE_IP") {
            if !val.is_empty() {
                self.advertise_ip = Some(val);
            }
        }

        if let Ok(val) = std::env::var("CANTATA_DISCOVERY_INTERVAL") {
            if let Ok(interval) = val.parse() {
                self.discovery_interval = interval;
            }
        }

        // Note: CANTATA_DATA_DIR is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to cantata-core's Config type.
    pub fn to_core_config(&self) -> cantata_core::Config {
        cantata_core::Config {
            callback_port: self.callback_port,
            advertise_ip: self.advertise_ip.clone(),
            discovery_interval_secs: self.discovery_interval,
            discovery_mdns: self.discovery_mdns,
            webhooks: self.webhooks.clone(),
            data_dir: self.data_dir.clone(),
            ..Default::default()
        }
    }
}
