//! Multi-method player discovery.
//!
//! - `ssdp` - SSDP multicast M-SEARCH (primary)
//! - `mdns` - mDNS/Bonjour browse (secondary, merged by UUID)
//! - `types` - shared discovery types and UUID normalization

pub mod mdns;
pub mod ssdp;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use mdns_sd::ServiceDaemon;

pub use mdns::MdnsConfig;
pub use ssdp::SsdpConfig;
pub use types::{
    normalize_uuid, DiscoveredDevice, DiscoveryError, DiscoveryMethod, DiscoveryResult,
};

/// Configuration for a discovery sweep.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// SSDP tuning.
    pub ssdp: SsdpConfig,
    /// mDNS tuning.
    pub mdns: MdnsConfig,
    /// Whether to run the mDNS browse at all.
    pub enable_mdns: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ssdp: SsdpConfig::default(),
            mdns: MdnsConfig::default(),
            enable_mdns: true,
        }
    }
}

/// Runs both discovery methods and merges results by normalized UUID.
///
/// A total failure of one method degrades to the other; only when every
/// method fails is an error returned.
pub async fn discover_all(
    config: &DiscoveryConfig,
    mdns_daemon: Option<&Arc<ServiceDaemon>>,
) -> DiscoveryResult<Vec<DiscoveredDevice>> {
    let mut merged: HashMap<String, DiscoveredDevice> = HashMap::new();
    let mut last_error: Option<DiscoveryError> = None;

    match ssdp::discover_multicast(&config.ssdp).await {
        Ok(devices) => {
            for mut device in devices {
                device.uuid = normalize_uuid(&device.uuid);
                merge_into(&mut merged, device);
            }
        }
        Err(e) => {
            log::warn!("[Discovery] SSDP sweep failed: {}", e);
            last_error = Some(e);
        }
    }

    if config.enable_mdns {
        if let Some(daemon) = mdns_daemon {
            match mdns::discover_mdns(daemon, &config.mdns).await {
                Ok(devices) => {
                    for mut device in devices {
                        device.uuid = normalize_uuid(&device.uuid);
                        merge_into(&mut merged, device);
                    }
                }
                Err(e) => {
                    log::warn!("[Discovery] mDNS sweep failed: {}", e);
                    if merged.is_empty() && last_error.is_none() {
                        last_error = Some(e);
                    }
                }
            }
        }
    }

    if merged.is_empty() {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    let mut devices: Vec<_> = merged.into_values().collect();
    devices.sort_by(|a, b| a.uuid.cmp(&b.uuid));
    Ok(devices)
}

fn merge_into(merged: &mut HashMap<String, DiscoveredDevice>, device: DiscoveredDevice) {
    match merged.get_mut(&device.uuid) {
        Some(existing) => existing.merge(device),
        None => {
            merged.insert(device.uuid.clone(), device);
        }
    }
}
