//! Zone topology reconciliation.
//!
//! Consumes ZoneGroupState documents (from ZoneGroupTopology NOTIFYs or
//! an initial SOAP fetch), materializes zones against the registry, and
//! answers the coordinator/stereo-pair queries the rest of the core
//! routes commands with.
//!
//! Zones are rebuilt wholesale from each payload and replaced atomically;
//! readers always see a consistent snapshot. Identical payloads are
//! deduplicated by hash, so re-broadcasts from every player in the fleet
//! produce a single topology-change emission.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::events::{ControlEvent, EventHub};
use crate::registry::PlayerRegistry;
use crate::sonos::zone_groups::{channel_map_primary, parse_zone_group_state, RawZoneGroup};
use crate::utils::{extract_xml_text, now_millis};

/// One member of a zone, with the details needed for stereo-pair
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneMember {
    /// Player UUID.
    pub uuid: String,
    /// Room name.
    pub room_name: String,
    /// Channel-map string for stereo-pair members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_map: Option<String>,
}

/// An active group of players with one coordinator.
///
/// Members hold ids only; the coordinator back-pointer of any member is
/// resolved through the registry at lookup time rather than stored, so
/// zone replacement stays a plain value swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Group id from the topology document.
    pub id: String,
    /// Coordinator player UUID. Always present in `members`.
    pub coordinator: String,
    /// Ordered member list.
    pub members: Vec<ZoneMember>,
}

impl Zone {
    /// Returns true if the given player is a member of this zone.
    #[must_use]
    pub fn contains(&self, uuid: &str) -> bool {
        self.members.iter().any(|m| m.uuid == uuid)
    }
}

/// Maintains the fleet's zone view.
pub struct TopologyManager {
    registry: Arc<PlayerRegistry>,
    hub: Arc<EventHub>,
    zones: RwLock<Vec<Zone>>,
    last_payload_hash: Mutex<Option<u64>>,
}

impl TopologyManager {
    /// Creates a manager over the given registry, publishing to the hub.
    #[must_use]
    pub fn new(registry: Arc<PlayerRegistry>, hub: Arc<EventHub>) -> Self {
        Self {
            registry,
            hub,
            zones: RwLock::new(Vec::new()),
            last_payload_hash: Mutex::new(None),
        }
    }

    /// Handles a ZoneGroupTopology NOTIFY body.
    ///
    /// The ZoneGroupState document is itself an escaped XML string inside
    /// the event envelope; it is decoded exactly once here. Bodies
    /// without a ZoneGroupState element are ignored.
    pub fn handle_notify(&self, body: &str) {
        let Some(zone_state) = extract_xml_text(body, "ZoneGroupState") else {
            return;
        };

        // Some firmware double-escapes the payload; peel one more layer
        // if what we got still looks like entity-encoded markup.
        let zone_state = if zone_state.starts_with("&lt;") {
            html_escape::decode_html_entities(&zone_state).into_owned()
        } else {
            zone_state
        };

        self.apply_zone_group_state(&zone_state);
    }

    /// Applies a decoded ZoneGroupState document.
    ///
    /// Returns true if the topology was rebuilt (payload not seen before).
    pub fn apply_zone_group_state(&self, zone_state_xml: &str) -> bool {
        let mut hasher = DefaultHasher::new();
        zone_state_xml.hash(&mut hasher);
        let payload_hash = hasher.finish();

        {
            let mut last = self.last_payload_hash.lock();
            if *last == Some(payload_hash) {
                return false;
            }
            *last = Some(payload_hash);
        }

        let raw_groups = parse_zone_group_state(zone_state_xml);
        let zones: Vec<Zone> = raw_groups
            .into_iter()
            .filter_map(|raw| self.resolve_zone(raw))
            .collect();

        log::info!("[Topology] Rebuilt topology: {} zone(s)", zones.len());

        *self.zones.write() = zones.clone();

        self.hub.publish(ControlEvent::TopologyChange {
            zones,
            timestamp: now_millis(),
        });

        true
    }

    /// Resolves one raw group against the registry.
    ///
    /// - Unknown coordinator: the zone is skipped entirely.
    /// - Members not in the registry are filtered out.
    /// - The coordinator is kept in the member list even when the payload
    ///   omitted it there.
    fn resolve_zone(&self, raw: RawZoneGroup) -> Option<Zone> {
        let coordinator = self.registry.by_id(&raw.coordinator_uuid)?;

        let mut members: Vec<ZoneMember> = raw
            .members
            .iter()
            .filter(|m| self.registry.by_id(&m.uuid).is_some())
            .map(|m| ZoneMember {
                uuid: m.uuid.clone(),
                room_name: m.zone_name.clone(),
                channel_map: m.channel_map.clone(),
            })
            .collect();

        if !members.iter().any(|m| m.uuid == coordinator.uuid) {
            members.insert(
                0,
                ZoneMember {
                    uuid: coordinator.uuid.clone(),
                    room_name: coordinator.room_name.clone(),
                    channel_map: None,
                },
            );
        }

        Some(Zone {
            id: raw.id,
            coordinator: coordinator.uuid.clone(),
            members,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns true once at least one topology payload has been applied.
    #[must_use]
    pub fn has_topology(&self) -> bool {
        self.last_payload_hash.lock().is_some()
    }

    /// Returns a snapshot of the current zones.
    #[must_use]
    pub fn zones(&self) -> Vec<Zone> {
        self.zones.read().clone()
    }

    /// Returns the zone a player belongs to.
    #[must_use]
    pub fn zone_for_device(&self, uuid: &str) -> Option<Zone> {
        self.zones.read().iter().find(|z| z.contains(uuid)).cloned()
    }

    /// Returns true if the player coordinates its zone.
    ///
    /// A player with no topology data yet is treated as its own
    /// coordinator, matching the standalone default.
    #[must_use]
    pub fn is_coordinator(&self, uuid: &str) -> bool {
        match self.zone_for_device(uuid) {
            Some(zone) => zone.coordinator == uuid,
            None => true,
        }
    }

    /// Returns the coordinator of the player's zone.
    #[must_use]
    pub fn coordinator_for(&self, uuid: &str) -> Option<String> {
        self.zone_for_device(uuid).map(|z| z.coordinator)
    }

    /// Returns the member ids of the player's zone.
    #[must_use]
    pub fn group_members_of(&self, uuid: &str) -> Vec<String> {
        self.zone_for_device(uuid)
            .map(|z| z.members.into_iter().map(|m| m.uuid).collect())
            .unwrap_or_default()
    }

    /// Resolves the stereo-pair primary for a room.
    ///
    /// When a room name appears on multiple member UUIDs within one zone,
    /// the primary is the UUID appearing before `:LF` in any member's
    /// channel map. Rooms without a pair resolve to their sole member.
    #[must_use]
    pub fn stereo_pair_primary(&self, room_name: &str) -> Option<String> {
        let zones = self.zones.read();
        for zone in zones.iter() {
            let in_room: Vec<&ZoneMember> = zone
                .members
                .iter()
                .filter(|m| m.room_name.eq_ignore_ascii_case(room_name))
                .collect();

            match in_room.len() {
                0 => continue,
                1 => return Some(in_room[0].uuid.clone()),
                _ => {
                    let primary = in_room
                        .iter()
                        .filter_map(|m| m.channel_map.as_deref())
                        .find_map(channel_map_primary);
                    // Fall back to the coordinator when no channel map
                    // names an LF holder.
                    return primary.or_else(|| Some(zone.coordinator.clone()));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::player;
    use crate::sonos::test_fixtures::{topology_notify_body, ZONE_GROUP_STATE_STEREO};

    fn setup() -> (Arc<PlayerRegistry>, Arc<EventHub>, TopologyManager) {
        let registry = Arc::new(PlayerRegistry::new());
        let hub = Arc::new(EventHub::new());
        let manager = TopologyManager::new(Arc::clone(&registry), Arc::clone(&hub));
        (registry, hub, manager)
    }

    fn stereo_registry(registry: &PlayerRegistry) {
        registry.insert(player("RINCON_A01400", "192.168.1.10", "Kitchen"));
        registry.insert(player("RINCON_B01400", "192.168.1.11", "Kitchen"));
    }

    #[test]
    fn builds_zone_with_coordinator_and_pair_primary() {
        let (registry, hub, manager) = setup();
        stereo_registry(&registry);
        let events = hub.capture();

        let changed = manager.apply_zone_group_state(ZONE_GROUP_STATE_STEREO);
        assert!(changed);

        let zones = manager.zones();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].coordinator, "RINCON_A01400");
        assert_eq!(zones[0].members.len(), 2);
        assert_eq!(
            manager.stereo_pair_primary("Kitchen"),
            Some("RINCON_A01400".to_string())
        );

        // Exactly one topologyChange emission.
        let captured = events.lock();
        assert_eq!(captured.len(), 1);
        assert!(matches!(captured[0], ControlEvent::TopologyChange { .. }));
    }

    #[test]
    fn identical_payload_is_deduplicated() {
        let (registry, hub, manager) = setup();
        stereo_registry(&registry);
        let events = hub.capture();

        assert!(manager.apply_zone_group_state(ZONE_GROUP_STATE_STEREO));
        assert!(!manager.apply_zone_group_state(ZONE_GROUP_STATE_STEREO));
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn notify_body_is_unwrapped_and_applied() {
        let (registry, _hub, manager) = setup();
        stereo_registry(&registry);

        manager.handle_notify(&topology_notify_body(ZONE_GROUP_STATE_STEREO));
        assert!(manager.has_topology());
        assert_eq!(manager.zones().len(), 1);
    }

    #[test]
    fn zone_with_unknown_coordinator_is_skipped() {
        let (registry, _hub, manager) = setup();
        // Registry knows only the B member, not the A coordinator.
        registry.insert(player("RINCON_B01400", "192.168.1.11", "Kitchen"));

        manager.apply_zone_group_state(ZONE_GROUP_STATE_STEREO);
        assert!(manager.zones().is_empty());
    }

    #[test]
    fn unknown_members_are_filtered_but_coordinator_kept() {
        let (registry, _hub, manager) = setup();
        // Only the coordinator is registered.
        registry.insert(player("RINCON_A01400", "192.168.1.10", "Kitchen"));

        manager.apply_zone_group_state(ZONE_GROUP_STATE_STEREO);
        let zones = manager.zones();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].members.len(), 1);
        assert_eq!(zones[0].members[0].uuid, "RINCON_A01400");
    }

    #[test]
    fn coordinator_queries_route_members() {
        let (registry, _hub, manager) = setup();
        stereo_registry(&registry);
        manager.apply_zone_group_state(ZONE_GROUP_STATE_STEREO);

        assert!(manager.is_coordinator("RINCON_A01400"));
        assert!(!manager.is_coordinator("RINCON_B01400"));
        assert_eq!(
            manager.coordinator_for("RINCON_B01400"),
            Some("RINCON_A01400".to_string())
        );
        assert_eq!(manager.group_members_of("RINCON_B01400").len(), 2);
    }

    #[test]
    fn unknown_player_defaults_to_coordinator() {
        let (_registry, _hub, manager) = setup();
        assert!(manager.is_coordinator("RINCON_NOBODY"));
        assert_eq!(manager.coordinator_for("RINCON_NOBODY"), None);
    }

    #[test]
    fn single_member_room_resolves_to_itself() {
        let (registry, _hub, manager) = setup();
        registry.insert(player("RINCON_C01400", "192.168.1.12", "Office"));

        let xml = r#"<ZoneGroups><ZoneGroup Coordinator="RINCON_C01400" ID="G2"><ZoneGroupMember UUID="RINCON_C01400" Location="http://192.168.1.12:1400/xml/device_description.xml" ZoneName="Office" /></ZoneGroup></ZoneGroups>"#;
        manager.apply_zone_group_state(xml);

        assert_eq!(
            manager.stereo_pair_primary("office"),
            Some("RINCON_C01400".to_string())
        );
        assert_eq!(manager.stereo_pair_primary("Attic"), None);
    }
}
