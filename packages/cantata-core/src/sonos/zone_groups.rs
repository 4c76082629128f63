//! ZoneGroupState parsing.
//!
//! Parses the ZoneGroupState XML document (broadcast by every player via
//! ZoneGroupTopology events) into raw group structures. Resolution against
//! the registry and coordinator election happen in the topology manager;
//! this module is a pure parser.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::utils::{extract_ip_from_location, get_xml_attr};

/// One member entry of a raw zone group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawZoneMember {
    /// Player UUID (RINCON_xxx).
    pub uuid: String,
    /// User-configured room name.
    pub zone_name: String,
    /// IP extracted from the Location attribute.
    pub ip: Option<String>,
    /// Stereo-pair channel map (`RINCON_A:LF,LF;RINCON_B:RF,RF`), if any.
    pub channel_map: Option<String>,
}

/// One zone group as transmitted, before registry resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawZoneGroup {
    /// Group id (`ID` attribute).
    pub id: String,
    /// Coordinator UUID (`Coordinator` attribute).
    pub coordinator_uuid: String,
    /// Members in document order.
    pub members: Vec<RawZoneMember>,
}

/// Parses ZoneGroupState XML into raw zone groups.
///
/// # Filtering
/// - Zone Bridges (`IsZoneBridge="1"`) are skipped; they cannot play audio.
/// - Groups without a Coordinator attribute or without members are dropped.
///
/// The stereo-pair channel map is read from `ChannelMapSet` with
/// `HTSatChanMapSet` (home-theater satellites) as fallback.
#[must_use]
pub fn parse_zone_group_state(xml: &str) -> Vec<RawZoneGroup> {
    let mut groups = Vec::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut current_group_id = String::new();
    let mut current_coordinator: Option<String> = None;
    let mut current_members: Vec<RawZoneMember> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"ZoneGroup" => {
                    current_group_id = get_xml_attr(e, b"ID").unwrap_or_default();
                    current_coordinator = get_xml_attr(e, b"Coordinator");
                    current_members.clear();
                }
                b"ZoneGroupMember" | b"Satellite" => {
                    if get_xml_attr(e, b"IsZoneBridge").as_deref() == Some("1") {
                        continue;
                    }

                    let Some(uuid) = get_xml_attr(e, b"UUID") else {
                        continue;
                    };
                    let Some(zone_name) = get_xml_attr(e, b"ZoneName") else {
                        continue;
                    };

                    let ip = get_xml_attr(e, b"Location")
                        .as_deref()
                        .and_then(extract_ip_from_location);

                    let channel_map = get_xml_attr(e, b"ChannelMapSet")
                        .or_else(|| get_xml_attr(e, b"HTSatChanMapSet"));

                    current_members.push(RawZoneMember {
                        uuid,
                        zone_name,
                        ip,
                        channel_map,
                    });
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"ZoneGroup" => {
                if let Some(coordinator_uuid) = current_coordinator.take() {
                    if !current_members.is_empty() {
                        groups.push(RawZoneGroup {
                            id: std::mem::take(&mut current_group_id),
                            coordinator_uuid,
                            members: std::mem::take(&mut current_members),
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("[Topology] XML parse error in zone groups: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    groups
}

/// Finds the stereo-pair primary in a channel-map string.
///
/// The primary is the UUID appearing before `:LF` in the map, e.g. in
/// `RINCON_A:LF,LF;RINCON_B:RF,RF` the primary is `RINCON_A`.
#[must_use]
pub fn channel_map_primary(channel_map: &str) -> Option<String> {
    channel_map.split(';').find_map(|entry| {
        let (uuid, channels) = entry.split_once(':')?;
        if channels.starts_with("LF") && !uuid.is_empty() {
            Some(uuid.to_string())
        } else {
            None
        }
    })
}
