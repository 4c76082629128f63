//! The live player registry.
//!
//! Discovery inserts players as their device descriptions are fetched;
//! everything else reads. A player, once created, is immutable - cached
//! playback state lives in the device controller, keyed by id, so the
//! registry can hand out cheap `Arc` references.
//!
//! Additions are monotonic during a run: transient SSDP silences are
//! common and eviction would cause spurious ungrouped state, so players
//! are only removed on explicit stop.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::protocol_constants::PLAYER_HTTP_PORT;
use crate::sonos::device::{DeviceDescription, ServiceEndpoints};
use crate::sonos::services::SonosService;
use crate::sonos::soap::SoapTarget;

/// A discovered endpoint, identified by its stable UUID.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Stable opaque UUID from the device description (RINCON_xxx).
    pub uuid: String,
    /// User-configured room name.
    pub room_name: String,
    /// Model name (e.g. "Sonos One").
    pub model_name: String,
    /// Model number (e.g. "S13").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_number: Option<String>,
    /// IPv4 address of the device.
    pub ip: String,
    /// Base URL for all HTTP traffic (`http://ip:1400`).
    pub base_url: String,
    /// Discovered service descriptors, keyed by service name.
    #[serde(skip)]
    pub services: HashMap<String, ServiceEndpoints>,
}

impl Player {
    /// Builds a player from its device description.
    #[must_use]
    pub fn from_description(ip: &str, description: DeviceDescription) -> Self {
        let services = description
            .services
            .into_iter()
            .filter_map(|endpoints| {
                let service = SonosService::from_urn(&endpoints.service_type)?;
                Some((service.name().to_string(), endpoints))
            })
            .collect();

        Self {
            uuid: description.uuid,
            room_name: description.room_name,
            model_name: description.model_name,
            model_number: description.model_number,
            ip: ip.to_string(),
            base_url: format!("http://{}:{}", ip, PLAYER_HTTP_PORT),
            services,
        }
    }

    /// Resolves a possibly-relative URL from the device description
    /// against this player's base URL.
    fn absolute_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }

    /// Returns the control URL for a service.
    ///
    /// Prefers the URL discovered in the device description; falls back
    /// to the built-in service table for services the description did not
    /// declare.
    #[must_use]
    pub fn control_url(&self, service: SonosService) -> String {
        match self.services.get(service.name()) {
            Some(endpoints) => self.absolute_url(&endpoints.control_url),
            None => format!("{}{}", self.base_url, service.control_path()),
        }
    }

    /// Returns the event-subscription URL for a service, discovered URL
    /// preferred.
    #[must_use]
    pub fn event_url(&self, service: SonosService) -> String {
        match self.services.get(service.name()) {
            Some(endpoints) if !endpoints.event_url.is_empty() => {
                self.absolute_url(&endpoints.event_url)
            }
            _ => format!("{}{}", self.base_url, service.event_path()),
        }
    }

    /// Returns the SOAP target (control URL + URN) for a service.
    #[must_use]
    pub fn soap_target(&self, service: SonosService) -> SoapTarget {
        SoapTarget {
            control_url: self.control_url(service),
            service_type: service.urn().to_string(),
        }
    }

    /// Returns true if the device description declared this service.
    #[must_use]
    pub fn has_service(&self, service: SonosService) -> bool {
        self.services.contains_key(service.name())
    }
}

/// The registry of known players.
#[derive(Default)]
pub struct PlayerRegistry {
    players: RwLock<HashMap<String, Arc<Player>>>,
}

impl PlayerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a player if its UUID is not yet known.
    ///
    /// Returns the inserted `Arc` for a new player, `None` if the UUID
    /// was already present (the existing record is kept untouched).
    pub fn insert(&self, player: Player) -> Option<Arc<Player>> {
        let mut players = self.players.write();
        if players.contains_key(&player.uuid) {
            return None;
        }
        let player = Arc::new(player);
        players.insert(player.uuid.clone(), Arc::clone(&player));
        Some(player)
    }

    /// Looks up a player by UUID.
    #[must_use]
    pub fn by_id(&self, uuid: &str) -> Option<Arc<Player>> {
        self.players.read().get(uuid).cloned()
    }

    /// Returns all players in a room, matched case-insensitively.
    ///
    /// Multiple players share a room name when stereo-paired.
    #[must_use]
    pub fn by_room(&self, room_name: &str) -> Vec<Arc<Player>> {
        self.players
            .read()
            .values()
            .filter(|p| p.room_name.eq_ignore_ascii_case(room_name))
            .cloned()
            .collect()
    }

    /// Returns every known player.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Player>> {
        self.players.read().values().cloned().collect()
    }

    /// Returns the number of known players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    /// Returns true if no players are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }

    /// Removes every player. Only called during explicit teardown.
    pub fn clear(&self) {
        self.players.write().clear();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::player;
    use super::*;
    use crate::sonos::device::parse_device_description;
    use crate::sonos::test_fixtures::DEVICE_DESCRIPTION_XML;

    #[test]
    fn from_description_indexes_services_by_name() {
        let description = parse_device_description(DEVICE_DESCRIPTION_XML).unwrap();
        let p = Player::from_description("192.168.1.10", description);

        assert_eq!(p.uuid, "RINCON_B8E937ECE1F001400");
        assert_eq!(p.room_name, "Kitchen");
        assert_eq!(p.base_url, "http://192.168.1.10:1400");
        assert!(p.has_service(SonosService::AVTransport));
        assert!(p.has_service(SonosService::GroupRenderingControl));
        assert!(p.has_service(SonosService::ContentDirectory));
    }

    #[test]
    fn discovered_urls_are_preferred_and_absolutized() {
        let description = parse_device_description(DEVICE_DESCRIPTION_XML).unwrap();
        let p = Player::from_description("192.168.1.10", description);

        assert_eq!(
            p.control_url(SonosService::AVTransport),
            "http://192.168.1.10:1400/MediaRenderer/AVTransport/Control"
        );
        assert_eq!(
            p.event_url(SonosService::ZoneGroupTopology),
            "http://192.168.1.10:1400/ZoneGroupTopology/Event"
        );
    }

    #[test]
    fn built_in_table_is_the_fallback() {
        let p = player("RINCON_X", "192.168.1.44", "Den");
        assert!(!p.has_service(SonosService::AVTransport));
        assert_eq!(
            p.control_url(SonosService::AVTransport),
            "http://192.168.1.44:1400/MediaRenderer/AVTransport/Control"
        );
        assert_eq!(
            p.event_url(SonosService::RenderingControl),
            "http://192.168.1.44:1400/MediaRenderer/RenderingControl/Event"
        );
    }

    #[test]
    fn insert_is_monotonic_and_idempotent() {
        let registry = PlayerRegistry::new();

        assert!(registry.insert(player("RINCON_A", "192.168.1.10", "Kitchen")).is_some());
        assert!(registry.insert(player("RINCON_A", "192.168.1.99", "Changed")).is_none());

        // The original record is untouched by the duplicate insert.
        assert_eq!(registry.by_id("RINCON_A").unwrap().ip, "192.168.1.10");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn by_room_is_case_insensitive_and_returns_pairs() {
        let registry = PlayerRegistry::new();
        registry.insert(player("RINCON_A", "192.168.1.10", "Kitchen"));
        registry.insert(player("RINCON_B", "192.168.1.11", "Kitchen"));
        registry.insert(player("RINCON_C", "192.168.1.12", "Office"));

        assert_eq!(registry.by_room("kitchen").len(), 2);
        assert_eq!(registry.by_room("OFFICE").len(), 1);
        assert!(registry.by_room("Attic").is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let registry = PlayerRegistry::new();
        registry.insert(player("RINCON_A", "192.168.1.10", "Kitchen"));
        registry.clear();
        assert!(registry.is_empty());
    }
}
