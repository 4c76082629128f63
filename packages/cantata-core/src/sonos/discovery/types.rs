//! Shared types for player discovery.
//!
//! Used across both discovery methods (SSDP multicast, mDNS) and the
//! discovery service that merges their results.

use std::collections::HashSet;

use thiserror::Error;

/// Discovery method identifier, tracked per discovered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryMethod {
    /// SSDP multicast M-SEARCH to 239.255.255.250:1900.
    SsdpMulticast,
    /// mDNS/Bonjour browse of `_sonos._tcp.local.`.
    Mdns,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SsdpMulticast => write!(f, "SSDP"),
            Self::Mdns => write!(f, "mDNS"),
        }
    }
}

/// Errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to bind a UDP socket for SSDP.
    #[error("failed to bind UDP socket: {0}")]
    SocketBind(#[source] std::io::Error),

    /// No usable network interfaces were found.
    #[error("no usable network interfaces found")]
    NoInterfaces,

    /// mDNS daemon error.
    #[error("mDNS daemon error: {0}")]
    MdnsDaemon(String),

    /// The device description could not be fetched or parsed.
    #[error("device description error for {location}: {reason}")]
    DeviceDescription { location: String, reason: String },
}

/// Convenient Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// A device seen on the wire, before its description has been fetched.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// IPv4 address the device answered from.
    pub ip: String,
    /// Raw UUID as discovered (normalize with [`normalize_uuid`]).
    pub uuid: String,
    /// Device-description URL (SSDP LOCATION header, or synthesized).
    pub location: Option<String>,
    /// Which discovery methods saw this device.
    pub methods: HashSet<DiscoveryMethod>,
}

impl DiscoveredDevice {
    /// Creates a record from a single sighting.
    pub fn new(ip: String, uuid: String, method: DiscoveryMethod) -> Self {
        let mut methods = HashSet::new();
        methods.insert(method);
        Self {
            ip,
            uuid,
            location: None,
            methods,
        }
    }

    /// Creates a record with a known LOCATION URL.
    pub fn with_location(
        ip: String,
        uuid: String,
        location: String,
        method: DiscoveryMethod,
    ) -> Self {
        let mut device = Self::new(ip, uuid, method);
        device.location = Some(location);
        device
    }

    /// Merges another sighting of the same device into this one.
    ///
    /// SSDP LOCATION wins over a synthesized mDNS location because it is
    /// authoritative for the description URL.
    pub fn merge(&mut self, other: DiscoveredDevice) {
        let other_is_ssdp = other.methods.contains(&DiscoveryMethod::SsdpMulticast);
        if other.location.is_some() && (self.location.is_none() || other_is_ssdp) {
            self.location = other.location;
        }
        self.methods.extend(other.methods);
    }
}

/// Normalizes a player UUID to canonical form for deduplication.
///
/// Handles the shapes seen on real networks:
/// - `uuid:` prefix (UPnP UDN)
/// - `::urn:schemas-upnp-org:device:ZonePlayer:1` suffix (USN)
/// - `:<digits>` suffixes (topology group ids like `RINCON_...01400:58`)
/// - `_MS`/`_MR`/`_LR` subdevice suffixes
#[must_use]
pub fn normalize_uuid(raw: &str) -> String {
    let mut uuid = raw.to_string();

    if let Some(stripped) = uuid.strip_prefix("uuid:") {
        uuid = stripped.to_string();
    }

    if let Some(idx) = uuid.find("::") {
        uuid.truncate(idx);
    }

    // Strip ":<digits>" only for RINCON_ UUIDs; plain colons elsewhere are
    // not topology suffixes.
    if uuid.contains("RINCON_") {
        if let Some(idx) = uuid.rfind(':') {
            let suffix = &uuid[idx + 1..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                uuid.truncate(idx);
            }
        }
    }

    const SUFFIXES: &[&str] = &["_MS", "_MR", "_LR"];
    loop {
        let before = uuid.len();
        for suffix in SUFFIXES {
            if let Some(stripped) = uuid.strip_suffix(suffix) {
                uuid = stripped.to_string();
            }
        }
        if uuid.len() == before {
            break;
        }
    }

    uuid
}

/// Interface-name prefixes of virtual/container interfaces to skip.
const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &[
    "lo", "docker", "veth", "br-", "virbr", "vmnet", "vbox", "tun", "tap",
];

/// Checks whether an interface name belongs to a virtual interface.
#[must_use]
pub fn is_virtual_interface(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    VIRTUAL_INTERFACE_PREFIXES
        .iter()
        .any(|prefix| name_lower.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_uuid_prefix_and_urn_suffix() {
        assert_eq!(
            normalize_uuid("uuid:RINCON_ABC123::urn:schemas-upnp-org:device:ZonePlayer:1"),
            "RINCON_ABC123"
        );
    }

    #[test]
    fn normalize_strips_topology_suffix() {
        assert_eq!(normalize_uuid("RINCON_ABC12301400:58"), "RINCON_ABC12301400");
    }

    #[test]
    fn normalize_strips_subdevice_suffixes() {
        assert_eq!(normalize_uuid("RINCON_ABC123_MS"), "RINCON_ABC123");
        assert_eq!(normalize_uuid("RINCON_ABC123_MS_LR"), "RINCON_ABC123");
    }

    #[test]
    fn normalize_preserves_non_rincon_colons() {
        assert_eq!(normalize_uuid("some:123"), "some:123");
    }

    #[test]
    fn merge_prefers_ssdp_location() {
        let mut from_mdns = DiscoveredDevice::with_location(
            "192.168.1.10".into(),
            "RINCON_A".into(),
            "http://192.168.1.10:1400/xml/device_description.xml#mdns".into(),
            DiscoveryMethod::Mdns,
        );
        let from_ssdp = DiscoveredDevice::with_location(
            "192.168.1.10".into(),
            "RINCON_A".into(),
            "http://192.168.1.10:1400/xml/device_description.xml".into(),
            DiscoveryMethod::SsdpMulticast,
        );

        from_mdns.merge(from_ssdp);
        assert_eq!(
            from_mdns.location.as_deref(),
            Some("http://192.168.1.10:1400/xml/device_description.xml")
        );
        assert!(from_mdns.methods.contains(&DiscoveryMethod::Mdns));
        assert!(from_mdns.methods.contains(&DiscoveryMethod::SsdpMulticast));
    }

    #[test]
    fn virtual_interfaces_are_detected() {
        assert!(is_virtual_interface("lo"));
        assert!(is_virtual_interface("docker0"));
        assert!(is_virtual_interface("veth1234"));
        assert!(!is_virtual_interface("eth0"));
        assert!(!is_virtual_interface("en0"));
    }
}
