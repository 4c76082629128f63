//! Core configuration.
//!
//! All fields have defaults suitable for a LAN deployment; the server app
//! overlays values from its YAML file and CLI flags.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::events::WebhookConfig;
use crate::protocol_constants::{GENA_SUBSCRIPTION_TIMEOUT_SECS, SOAP_TIMEOUT_SECS};

/// Configuration for the control-plane core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Port for the GENA callback listener (0 = any free port).
    pub callback_port: u16,

    /// IP to advertise in callback URLs; None auto-detects the
    /// non-loopback IPv4.
    pub advertise_ip: Option<String>,

    /// Per-call timeout for SOAP and GENA HTTP requests (seconds).
    pub soap_timeout_secs: u64,

    /// Requested GENA subscription timeout (seconds).
    pub subscription_timeout_secs: u64,

    /// Interval between discovery re-sweeps (seconds).
    pub discovery_interval_secs: u64,

    /// Number of M-SEARCH packets per sweep.
    pub ssdp_send_count: u64,

    /// Delay between M-SEARCH retries (milliseconds).
    pub ssdp_retry_delay_ms: u64,

    /// Window to collect SSDP responses (seconds).
    pub ssdp_timeout_secs: u64,

    /// Enable the secondary mDNS browse.
    pub discovery_mdns: bool,

    /// mDNS browse window (milliseconds).
    pub mdns_browse_timeout_ms: u64,

    /// Webhook targets registered with the event hub at bootstrap.
    pub webhooks: Vec<WebhookConfig>,

    /// Directory for persisted JSON state (station cache, backoff).
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            callback_port: 0,
            advertise_ip: None,
            soap_timeout_secs: SOAP_TIMEOUT_SECS,
            subscription_timeout_secs: GENA_SUBSCRIPTION_TIMEOUT_SECS,
            discovery_interval_secs: 30,
            ssdp_send_count: 3,
            ssdp_retry_delay_ms: 800,
            ssdp_timeout_secs: 5,
            discovery_mdns: true,
            mdns_browse_timeout_ms: 2000,
            webhooks: Vec::new(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Builds the discovery sweep configuration.
    #[must_use]
    pub fn discovery_config(&self) -> crate::sonos::discovery::DiscoveryConfig {
        use std::time::Duration;

        crate::sonos::discovery::DiscoveryConfig {
            ssdp: crate::sonos::discovery::SsdpConfig {
                send_count: self.ssdp_send_count,
                retry_delay: Duration::from_millis(self.ssdp_retry_delay_ms),
                discovery_timeout: Duration::from_secs(self.ssdp_timeout_secs),
                mx_value: 1,
            },
            mdns: crate::sonos::discovery::MdnsConfig {
                browse_timeout: Duration::from_millis(self.mdns_browse_timeout_ms),
            },
            enable_mdns: self.discovery_mdns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.callback_port, 0);
        assert_eq!(config.soap_timeout_secs, 5);
        assert_eq!(config.subscription_timeout_secs, 300);
        assert!(config.discovery_mdns);
        assert!(config.webhooks.is_empty());
    }

    #[test]
    fn partial_yaml_like_json_overlays_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"callbackPort": 3500, "discoveryMdns": false}"#).unwrap();
        assert_eq!(config.callback_port, 3500);
        assert!(!config.discovery_mdns);
        // Untouched fields keep their defaults.
        assert_eq!(config.ssdp_send_count, 3);
    }
}
