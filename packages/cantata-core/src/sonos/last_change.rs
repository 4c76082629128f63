//! LastChange event parsing.
//!
//! AVTransport and RenderingControl pack multiple state-variable updates
//! into a single NOTIFY body: an outer propertyset whose `LastChange`
//! element contains an escaped XML document of `<Variable val="..."/>`
//! elements. This module decodes that one level of escaping and extracts
//! the variables the controller cares about.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::utils::{extract_xml_text, get_xml_attr};

/// Incremental AVTransport update from one LastChange body.
///
/// Fields are `None` when the body did not mention the variable at all;
/// a variable that was present but empty is `Some("")` (an empty track
/// URI means "no track", which is different from "unchanged").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvTransportUpdate {
    /// New transport state string ("PLAYING", "STOPPED", ...).
    pub transport_state: Option<String>,
    /// New current-track URI.
    pub track_uri: Option<String>,
    /// DIDL-Lite metadata of the current track.
    pub track_metadata: Option<String>,
    /// Current track duration "H:MM:SS".
    pub track_duration: Option<String>,
}

impl AvTransportUpdate {
    /// Returns true if the body carried nothing the controller uses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transport_state.is_none()
            && self.track_uri.is_none()
            && self.track_metadata.is_none()
            && self.track_duration.is_none()
    }
}

/// Incremental RenderingControl update from one LastChange body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderingUpdate {
    /// New Master-channel volume, if present (clamped to 100).
    pub volume: Option<u8>,
    /// New Master-channel mute, if present.
    pub mute: Option<bool>,
}

/// Extracts `val` attributes from a decoded LastChange event document.
///
/// When `master_only` is set, elements carrying a `channel` attribute
/// other than "Master" are ignored (stereo pairs also report LF/RF
/// channels, which are not the player-level values).
fn extract_val_attrs(event_xml: &str, names: &[&str], master_only: bool) -> Vec<(String, String)> {
    let mut reader = Reader::from_str(event_xml);
    let mut buf = Vec::new();
    let mut found = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local = e.local_name();
                if let Some(name) = names.iter().find(|n| n.as_bytes() == local.as_ref()) {
                    let channel_ok = !master_only
                        || get_xml_attr(e, b"channel").map_or(true, |c| c == "Master");
                    let first_seen = !found.iter().any(|(n, _)| n == *name);

                    if channel_ok && first_seen {
                        if let Some(val) = get_xml_attr(e, b"val") {
                            found.push(((*name).to_string(), val));
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    found
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Parses an AVTransport NOTIFY body.
///
/// Returns `None` when the body carries no LastChange element at all.
#[must_use]
pub fn parse_av_transport_notify(body: &str) -> Option<AvTransportUpdate> {
    // extract_xml_text decodes the propertyset's entity layer, leaving the
    // inner Event document as proper XML; attribute values decode their own
    // layer in get_xml_attr. No further decoding here or nested DIDL breaks.
    let last_change = extract_xml_text(body, "LastChange")?;

    let attrs = extract_val_attrs(
        &last_change,
        &[
            "TransportState",
            "CurrentTrackURI",
            "CurrentTrackMetaData",
            "CurrentTrackDuration",
        ],
        false,
    );

    let non_empty = |v: &str| {
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    };

    Some(AvTransportUpdate {
        transport_state: attr(&attrs, "TransportState").and_then(non_empty),
        // Present-but-empty is meaningful here: it clears the track.
        track_uri: attr(&attrs, "CurrentTrackURI").map(str::to_string),
        track_metadata: attr(&attrs, "CurrentTrackMetaData").and_then(non_empty),
        track_duration: attr(&attrs, "CurrentTrackDuration").and_then(non_empty),
    })
}

/// Parses a RenderingControl NOTIFY body (Master channel only).
///
/// Returns `None` when the body carries no LastChange element.
#[must_use]
pub fn parse_rendering_notify(body: &str) -> Option<RenderingUpdate> {
    let last_change = extract_xml_text(body, "LastChange")?;

    let attrs = extract_val_attrs(&last_change, &["Volume", "Mute"], true);

    Some(RenderingUpdate {
        volume: attr(&attrs, "Volume")
            .and_then(|v| v.parse::<u8>().ok())
            .map(|v| v.min(100)),
        mute: attr(&attrs, "Mute").map(|v| v == "1"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sonos::test_fixtures::{AV_TRANSPORT_NOTIFY, RENDERING_NOTIFY_STEREO};

    #[test]
    fn av_transport_extracts_state_and_uri() {
        let update = parse_av_transport_notify(AV_TRANSPORT_NOTIFY).expect("has LastChange");

        assert_eq!(update.transport_state.as_deref(), Some("PLAYING"));
        assert_eq!(
            update.track_uri.as_deref(),
            Some("x-file-cifs://nas/music/harvest_moon.flac")
        );
        assert_eq!(update.track_duration.as_deref(), Some("0:03:42"));
        assert!(update
            .track_metadata
            .as_deref()
            .is_some_and(|m| m.contains("<DIDL-Lite")));
    }

    #[test]
    fn av_transport_without_last_change_is_none() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><Other>1</Other></e:property></e:propertyset>"#;
        assert!(parse_av_transport_notify(body).is_none());
    }

    #[test]
    fn rendering_prefers_master_channel() {
        let update = parse_rendering_notify(RENDERING_NOTIFY_STEREO).expect("has LastChange");
        // LF/RF entries report 50; Master is 60.
        assert_eq!(update.volume, Some(60));
        assert_eq!(update.mute, Some(false));
    }

    #[test]
    fn rendering_without_master_channel_is_empty_update() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><LastChange>&lt;Event&gt;&lt;InstanceID val=&quot;0&quot;&gt;&lt;Volume channel=&quot;LF&quot; val=&quot;50&quot;/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange></e:property></e:propertyset>"#;
        let update = parse_rendering_notify(body).expect("has LastChange");
        assert_eq!(update.volume, None);
        assert_eq!(update.mute, None);
    }

    #[test]
    fn rendering_clamps_volume_to_100() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><LastChange>&lt;Event&gt;&lt;InstanceID val=&quot;0&quot;&gt;&lt;Volume channel=&quot;Master&quot; val=&quot;150&quot;/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange></e:property></e:propertyset>"#;
        let update = parse_rendering_notify(body).expect("has LastChange");
        assert_eq!(update.volume, Some(100));
    }

    #[test]
    fn av_transport_empty_track_uri_is_preserved_as_empty() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><LastChange>&lt;Event&gt;&lt;InstanceID val=&quot;0&quot;&gt;&lt;TransportState val=&quot;STOPPED&quot;/&gt;&lt;CurrentTrackURI val=&quot;&quot;/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange></e:property></e:propertyset>"#;
        let update = parse_av_transport_notify(body).expect("has LastChange");
        assert_eq!(update.transport_state.as_deref(), Some("STOPPED"));
        // Present-but-empty clears the track; absent would be None.
        assert_eq!(update.track_uri.as_deref(), Some(""));
    }
}
