//! SSDP multicast discovery.
//!
//! Sends M-SEARCH queries for the player device class to
//! 239.255.255.250:1900 on every physical interface and collects unicast
//! responses on the same sockets (devices reply to the sending
//! socket/port).

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use local_ip_address::list_afinet_netifas;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::types::{is_virtual_interface, DiscoveredDevice, DiscoveryError, DiscoveryMethod};
use crate::protocol_constants::{SSDP_MULTICAST_ADDR, SSDP_SEARCH_TARGET};

/// Checks if `s` starts with `prefix`, ASCII case-insensitive.
#[inline]
fn starts_with_ignore_ascii_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Finds `needle` in `haystack`, ASCII case-insensitive.
#[inline]
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Builds the M-SEARCH message.
fn build_msearch_message(mx: u64) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\r\n",
        mx, SSDP_SEARCH_TARGET
    )
}

/// Configuration for SSDP discovery.
#[derive(Debug, Clone)]
pub struct SsdpConfig {
    /// Number of M-SEARCH packets to send per interface.
    pub send_count: u64,
    /// Delay between M-SEARCH retries.
    pub retry_delay: Duration,
    /// Total window to collect responses.
    pub discovery_timeout: Duration,
    /// MX value (max device response delay, seconds).
    pub mx_value: u64,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            send_count: 3,
            retry_delay: Duration::from_millis(800),
            discovery_timeout: Duration::from_secs(5),
            mx_value: 1,
        }
    }
}

/// Returns the IPv4 addresses of physical (non-virtual, non-loopback)
/// interfaces.
fn usable_interface_ips() -> Vec<Ipv4Addr> {
    list_afinet_netifas()
        .unwrap_or_else(|e| {
            log::warn!("[SSDP] Failed to list network interfaces: {}", e);
            Vec::new()
        })
        .into_iter()
        .filter_map(|(name, addr)| {
            if is_virtual_interface(&name) {
                return None;
            }
            match addr {
                IpAddr::V4(ipv4) if !ipv4.is_loopback() => Some(ipv4),
                _ => None,
            }
        })
        .collect()
}

/// Creates a UDP socket bound to one interface, configured for SSDP.
fn create_socket(iface_ip: Ipv4Addr) -> Result<UdpSocket, DiscoveryError> {
    let bind_addr = SocketAddr::new(IpAddr::V4(iface_ip), 0);

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::SocketBind)?;

    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEADDR on {}: {}", iface_ip, e);
    }
    #[cfg(unix)]
    if let Err(e) = socket.set_reuse_port(true) {
        log::warn!("[SSDP] Failed to set SO_REUSEPORT on {}: {}", iface_ip, e);
    }
    // UPnP 1.0 recommends TTL 4 for SSDP multicast.
    if let Err(e) = socket.set_multicast_ttl_v4(4) {
        log::warn!("[SSDP] Failed to set multicast TTL on {}: {}", iface_ip, e);
    }

    socket
        .set_nonblocking(true)
        .map_err(DiscoveryError::SocketBind)?;
    socket
        .bind(&bind_addr.into())
        .map_err(DiscoveryError::SocketBind)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(DiscoveryError::SocketBind)
}

/// Parses one SSDP response datagram into a discovered device.
///
/// Accepts only responses advertising the player device class with a
/// RINCON UUID in the USN.
fn parse_ssdp_response(response: &str, src_ip: &str) -> Option<DiscoveredDevice> {
    let location = response
        .lines()
        .find(|l| starts_with_ignore_ascii_case(l, "location:"))
        .and_then(|l| l.find(':').map(|idx| l[idx + 1..].trim().to_string()));

    let uuid = response
        .lines()
        .find(|l| starts_with_ignore_ascii_case(l, "usn:"))
        .and_then(|l| find_ignore_ascii_case(l, "uuid:").map(|idx| &l[idx + 5..]))
        .and_then(|s| s.split("::").next())
        .unwrap_or("")
        .to_string();

    // UUIDs on these devices are always uppercase RINCON_; case-sensitive
    // on purpose.
    if !uuid.starts_with("RINCON_") {
        return None;
    }

    match location {
        Some(loc) => Some(DiscoveredDevice::with_location(
            src_ip.to_string(),
            uuid,
            loc,
            DiscoveryMethod::SsdpMulticast,
        )),
        None => Some(DiscoveredDevice::new(
            src_ip.to_string(),
            uuid,
            DiscoveryMethod::SsdpMulticast,
        )),
    }
}

/// Discovers players via SSDP multicast on all physical interfaces.
pub async fn discover_multicast(
    config: &SsdpConfig,
) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
    let interface_ips = usable_interface_ips();
    if interface_ips.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    let msg = build_msearch_message(config.mx_value);

    let mut sockets: Vec<Arc<UdpSocket>> = Vec::new();
    for ip in &interface_ips {
        match create_socket(*ip) {
            Ok(socket) => sockets.push(Arc::new(socket)),
            Err(e) => log::warn!("[SSDP] Failed to create socket for {}: {}", ip, e),
        }
    }
    if sockets.is_empty() {
        return Err(DiscoveryError::NoInterfaces);
    }

    log::debug!(
        "[SSDP] Discovery on {} interface(s), {} sends with {}ms spacing",
        sockets.len(),
        config.send_count,
        config.retry_delay.as_millis()
    );

    let discovered: Arc<Mutex<Vec<DiscoveredDevice>>> = Arc::new(Mutex::new(Vec::new()));

    let send_futures: Vec<_> = sockets
        .iter()
        .map(|socket| {
            let socket = Arc::clone(socket);
            let msg = msg.as_bytes().to_vec();
            let send_count = config.send_count;
            let retry_delay = config.retry_delay;

            async move {
                for i in 0..send_count {
                    if i > 0 {
                        tokio::time::sleep(retry_delay).await;
                    }
                    if let Err(e) = socket.send_to(&msg, SSDP_MULTICAST_ADDR).await {
                        log::warn!("[SSDP] M-SEARCH send failed (attempt {}): {}", i + 1, e);
                    }
                }
            }
        })
        .collect();

    let recv_futures: Vec<_> = sockets
        .iter()
        .map(|socket| {
            let socket = Arc::clone(socket);
            let discovered = Arc::clone(&discovered);
            let discovery_timeout = config.discovery_timeout;

            async move {
                let mut buf = [0u8; 2048];
                let start = std::time::Instant::now();

                while start.elapsed() < discovery_timeout {
                    let remaining = discovery_timeout.saturating_sub(start.elapsed());
                    match timeout(remaining, socket.recv_from(&mut buf)).await {
                        Ok(Ok((amt, src))) => {
                            let response = String::from_utf8_lossy(&buf[..amt]);
                            if let Some(device) =
                                parse_ssdp_response(&response, &src.ip().to_string())
                            {
                                log::debug!(
                                    "[SSDP] Response from {} ({})",
                                    device.ip,
                                    device.uuid
                                );
                                discovered.lock().await.push(device);
                            }
                        }
                        Ok(Err(e)) => {
                            log::warn!("[SSDP] Socket recv error: {}", e);
                        }
                        Err(_) => break, // window closed
                    }
                }
            }
        })
        .collect();

    let (_, _) = tokio::join!(
        futures::future::join_all(send_futures),
        futures::future::join_all(recv_futures)
    );

    let mut discovered = std::mem::take(&mut *discovered.lock().await);

    // Deduplicate by UUID, keep stable ordering.
    let mut seen = HashSet::new();
    discovered.retain(|d| seen.insert(d.uuid.clone()));
    discovered.sort_by(|a, b| a.uuid.cmp(&b.uuid));

    log::debug!("[SSDP] Discovery complete: {} device(s)", discovered.len());

    Ok(discovered)
}
