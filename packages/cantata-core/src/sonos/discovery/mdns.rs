//! mDNS/Bonjour discovery.
//!
//! Secondary discovery method: browses for `_sonos._tcp.local.` services.
//! Useful on networks where SSDP multicast is filtered but mDNS works.
//! Results are merged with SSDP sightings by normalized UUID; the SSDP
//! LOCATION wins when both methods see a device.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mdns_sd::{ResolvedService, ScopedIp, ServiceDaemon, ServiceEvent};
use tokio::time::timeout;

use super::types::{DiscoveredDevice, DiscoveryError, DiscoveryMethod};
use crate::protocol_constants::{DEVICE_DESCRIPTION_PATH, PLAYER_HTTP_PORT};

/// mDNS service type players advertise (trailing dot required by mdns-sd).
const MDNS_SERVICE_TYPE: &str = "_sonos._tcp.local.";

/// Configuration for mDNS discovery.
#[derive(Debug, Clone)]
pub struct MdnsConfig {
    /// How long to browse for services.
    pub browse_timeout: Duration,
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            browse_timeout: Duration::from_millis(2000),
        }
    }
}

/// Creates the shared mDNS daemon.
///
/// Called once; the daemon spawns a background thread and is reused
/// across discovery sweeps.
pub fn create_daemon() -> Result<ServiceDaemon, DiscoveryError> {
    ServiceDaemon::new().map_err(|e| DiscoveryError::MdnsDaemon(e.to_string()))
}

/// Discovers players via an mDNS browse.
pub async fn discover_mdns(
    daemon: &Arc<ServiceDaemon>,
    config: &MdnsConfig,
) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
    let receiver = daemon
        .browse(MDNS_SERVICE_TYPE)
        .map_err(|e| DiscoveryError::MdnsDaemon(e.to_string()))?;

    let mut discovered: HashMap<String, DiscoveredDevice> = HashMap::new();

    let start = std::time::Instant::now();
    while start.elapsed() < config.browse_timeout {
        let remaining = config.browse_timeout.saturating_sub(start.elapsed());

        match timeout(remaining, receiver.recv_async()).await {
            Ok(Ok(ServiceEvent::ServiceResolved(info))) => {
                if let Some(device) = parse_mdns_service(&info) {
                    log::debug!("[mDNS] Resolved {} ({})", device.ip, device.uuid);
                    discovered.insert(device.uuid.clone(), device);
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                log::debug!("[mDNS] Receiver channel closed: {:?}", e);
                break;
            }
            Err(_) => break, // browse window closed
        }
    }

    if let Err(e) = daemon.stop_browse(MDNS_SERVICE_TYPE) {
        log::warn!("[mDNS] Failed to stop browse: {:?}", e);
    }

    Ok(discovered.into_values().collect())
}

/// Parses one resolved mDNS service into a discovered device.
fn parse_mdns_service(info: &ResolvedService) -> Option<DiscoveredDevice> {
    // Prefer IPv4; these devices are IPv4-only for control traffic.
    let ip = info.addresses.iter().find_map(|addr| match addr {
        ScopedIp::V4(v4) => Some(v4.addr().to_string()),
        _ => None,
    })?;

    let uuid =
        extract_uuid_from_name(&info.fullname).or_else(|| extract_uuid_from_name(&info.host))?;

    let description_port = if info.port > 0 && info.port != PLAYER_HTTP_PORT {
        info.port
    } else {
        PLAYER_HTTP_PORT
    };

    let mut device = DiscoveredDevice::new(ip, uuid, DiscoveryMethod::Mdns);
    device.location = Some(format!(
        "http://{}:{}{}",
        device.ip, description_port, DEVICE_DESCRIPTION_PATH
    ));

    Some(device)
}

/// Extracts a RINCON UUID from an mDNS instance name or hostname.
fn extract_uuid_from_name(name: &str) -> Option<String> {
    let start = name.find("RINCON_")?;
    let rest = &name[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(rest.len());
    let uuid = &rest[..end];

    if uuid.len() > "RINCON_".len() {
        Some(uuid.to_string())
    } else {
        None
    }
}
