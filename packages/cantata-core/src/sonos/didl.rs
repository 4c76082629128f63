//! DIDL-Lite metadata parsing and construction.
//!
//! DIDL-Lite is UPnP's content-metadata format. It arrives entity-encoded
//! inside SOAP string elements (Browse results, GetPositionInfo track
//! metadata) and must be sent back verbatim as enqueue metadata, so each
//! parsed entry keeps its raw fragment alongside the typed fields.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::Serialize;

use crate::utils::get_xml_attr;

/// DIDL-Lite document header with the namespaces players expect.
pub const DIDL_HEADER: &str = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#;

/// One parsed DIDL-Lite entry (an `<item>` or `<container>`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DidlItem {
    /// Object id (`id` attribute).
    pub id: String,
    /// Parent object id (`parentID` attribute).
    pub parent_id: String,
    /// `dc:title`.
    pub title: Option<String>,
    /// `dc:creator` (artist).
    pub creator: Option<String>,
    /// `upnp:album`.
    pub album: Option<String>,
    /// `upnp:albumArtURI`.
    pub album_art_uri: Option<String>,
    /// `r:streamContent` (live stream "artist - title" line).
    pub stream_content: Option<String>,
    /// `res` content: the playable URI.
    pub uri: Option<String>,
    /// `protocolInfo` attribute of `res`.
    pub protocol_info: Option<String>,
    /// The entry's raw fragment re-wrapped in a DIDL-Lite envelope,
    /// ready to pass as AddURIToQueue metadata.
    pub metadata: String,
}

/// Splits a DIDL-Lite document into raw `<item>`/`<container>` fragments.
///
/// Entries never nest in DIDL-Lite, so a textual scan is sufficient and
/// preserves each fragment byte-for-byte for metadata carry-through.
fn split_entries(xml: &str) -> Vec<&str> {
    let mut fragments = Vec::new();

    for open in ["<item", "<container"] {
        let close = if open == "<item" { "</item>" } else { "</container>" };
        let mut pos = 0;
        while let Some(start_rel) = xml[pos..].find(open) {
            let start = pos + start_rel;
            // Require a delimiter after the tag name so "<itemX" doesn't match.
            let after = xml[start + open.len()..].chars().next();
            if !matches!(after, Some(' ') | Some('>') | Some('/') | Some('\t') | Some('\n')) {
                pos = start + open.len();
                continue;
            }

            if let Some(end_rel) = xml[start..].find(close) {
                let end = start + end_rel + close.len();
                fragments.push(&xml[start..end]);
                pos = end;
            } else {
                break;
            }
        }
    }

    fragments
}

/// Parses the typed fields of one entry fragment.
fn parse_entry(fragment: &str) -> Option<DidlItem> {
    let mut reader = Reader::from_str(fragment);
    let mut buf = Vec::new();

    let mut id = String::new();
    let mut parent_id = String::new();
    let mut title = None;
    let mut creator = None;
    let mut album = None;
    let mut album_art_uri = None;
    let mut stream_content = None;
    let mut uri = None;
    let mut protocol_info = None;
    let mut current: Vec<u8> = Vec::new();
    let mut root_seen = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = e.local_name().as_ref().to_vec();
                if !root_seen && (name == b"item" || name == b"container") {
                    root_seen = true;
                    id = get_xml_attr(e, b"id").unwrap_or_default();
                    parent_id = get_xml_attr(e, b"parentID").unwrap_or_default();
                } else if name == b"res" {
                    protocol_info = get_xml_attr(e, b"protocolInfo");
                }
                current = name;
            }
            Ok(Event::Text(ref t)) => {
                let Ok(raw) = t.decode() else { continue };
                let Ok(text) = quick_xml::escape::unescape(&raw) else { continue };
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match current.as_slice() {
                    b"title" => title = Some(text.to_string()),
                    b"creator" => creator = Some(text.to_string()),
                    b"album" => album = Some(text.to_string()),
                    b"albumArtURI" => album_art_uri = Some(text.to_string()),
                    b"streamContent" => stream_content = Some(text.to_string()),
                    b"res" => uri = Some(text.to_string()),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    if !root_seen {
        return None;
    }

    Some(DidlItem {
        id,
        parent_id,
        title,
        creator,
        album,
        album_art_uri,
        stream_content,
        uri,
        protocol_info,
        metadata: format!("{DIDL_HEADER}{fragment}</DIDL-Lite>"),
    })
}

/// Parses a DIDL-Lite document into its entries.
///
/// Tolerant by design: malformed entries are skipped rather than failing
/// the whole document, since best-effort paths (favorites enumeration)
/// prefer an empty result over an error.
#[must_use]
pub fn parse_didl(xml: &str) -> Vec<DidlItem> {
    split_entries(xml).into_iter().filter_map(parse_entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sonos::test_fixtures::DIDL_TWO_TRACKS;

    #[test]
    fn parses_track_fields() {
        let items = parse_didl(DIDL_TWO_TRACKS);
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.id, "Q:0/1");
        assert_eq!(first.parent_id, "Q:0");
        assert_eq!(first.title.as_deref(), Some("Harvest Moon"));
        assert_eq!(first.creator.as_deref(), Some("Neil Young"));
        assert_eq!(first.album.as_deref(), Some("Harvest Moon"));
        assert_eq!(
            first.uri.as_deref(),
            Some("x-file-cifs://nas/music/harvest_moon.flac")
        );
        assert_eq!(
            first.protocol_info.as_deref(),
            Some("x-file-cifs:*:audio/flac:*")
        );
    }

    #[test]
    fn metadata_fragment_is_wrapped_in_didl_envelope() {
        let items = parse_didl(DIDL_TWO_TRACKS);
        let meta = &items[0].metadata;

        assert!(meta.starts_with("<DIDL-Lite"));
        assert!(meta.ends_with("</DIDL-Lite>"));
        assert!(meta.contains(r#"<item id="Q:0/1""#));
        assert!(meta.contains("Harvest Moon"));
    }

    #[test]
    fn parses_containers_too() {
        let xml = r#"<DIDL-Lite><container id="SQ:12" parentID="SQ:"><dc:title>Dinner Jazz</dc:title><res>file:///jdata/SQ:12</res></container></DIDL-Lite>"#;
        let items = parse_didl(xml);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "SQ:12");
        assert_eq!(items[0].title.as_deref(), Some("Dinner Jazz"));
    }

    #[test]
    fn empty_document_yields_no_items() {
        assert!(parse_didl("<DIDL-Lite></DIDL-Lite>").is_empty());
        assert!(parse_didl("").is_empty());
    }

    #[test]
    fn malformed_entry_is_skipped() {
        let xml = r#"<DIDL-Lite><item id="ok" parentID="-1"><dc:title>Fine</dc:title></item><item id="broken" parentID="-1"><dc:title>Unclosed</DIDL-Lite>"#;
        let items = parse_didl(xml);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "ok");
    }

    #[test]
    fn stream_content_is_exposed() {
        let xml = r#"<DIDL-Lite><item id="-1" parentID="-1"><r:streamContent>Artist - Song</r:streamContent><dc:title>Radio X</dc:title></item></DIDL-Lite>"#;
        let items = parse_didl(xml);
        assert_eq!(items[0].stream_content.as_deref(), Some("Artist - Song"));
    }
}
