//! General utilities shared across the crate.
//!
//! Mostly small XML helpers used by the SOAP codec and the event parsers,
//! plus time conversions for UPnP's "H:MM:SS" durations.

use std::time::{SystemTime, UNIX_EPOCH};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Parses a UPnP "H:MM:SS" duration into whole seconds.
///
/// Accepts one to three colon-separated components ("SS", "MM:SS", "H:MM:SS").
/// Returns `None` for empty strings, "NOT_IMPLEMENTED", or malformed input.
#[must_use]
pub fn parse_hms_to_secs(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.is_empty() || value == "NOT_IMPLEMENTED" {
        return None;
    }

    let mut total: u64 = 0;
    for part in value.split(':') {
        let n: u64 = part.parse().ok()?;
        total = total * 60 + n;
    }
    u32::try_from(total).ok()
}

/// Formats whole seconds as a UPnP "H:MM:SS" duration.
#[must_use]
pub fn secs_to_hms(secs: u32) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

// ─────────────────────────────────────────────────────────────────────────────
// XML Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Escapes the five XML special characters for element/attribute content.
///
/// Used when building SOAP envelopes and DIDL-Lite documents. Embedded
/// DIDL-Lite passed as an argument value goes through this too, which is
/// exactly what UPnP expects: XML-in-XML arrives entity-encoded.
#[must_use]
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Extracts the text content of the first element with the given local name.
///
/// Namespace prefixes are ignored, so `extract_xml_text(xml, "LastChange")`
/// matches `<LastChange>` and `<e:LastChange>` alike. Entity references in
/// the content are decoded once, which is how escaped XML-in-XML payloads
/// (ZoneGroupState, LastChange, DIDL inside SOAP strings) are unwrapped.
#[must_use]
pub fn extract_xml_text(xml: &str, local_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut capturing = false;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                capturing = true;
                text.clear();
            }
            Ok(Event::Text(ref t)) if capturing => {
                {
                    eprintln!("DEBUG bytes={:?}", String::from_utf8_lossy(t));
                }
                if let Ok(raw) = t.decode() {
                    eprintln!("DEBUG raw={:?}", raw);
                    if let Ok(decoded) = quick_xml::escape::unescape(&raw) {
                        eprintln!("DEBUG decoded={:?}", decoded);
                        text.push_str(&decoded);
                    }
                }
            }
            Ok(Event::CData(ref t)) if capturing => {
                text.push_str(&String::from_utf8_lossy(t));
            }
            Ok(Event::End(ref e)) if capturing && e.local_name().as_ref() == local_name.as_bytes() => {
                return Some(text);
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Reads an attribute value from an element start tag, decoding entities.
#[must_use]
pub fn get_xml_attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Extracts the IPv4 host from a device-description LOCATION URL.
///
/// `http://192.168.1.10:1400/xml/device_description.xml` → `192.168.1.10`.
#[must_use]
pub fn extract_ip_from_location(location: &str) -> Option<String> {
    let rest = location
        .strip_prefix("http://")
        .or_else(|| location.strip_prefix("https://"))?;
    let host_port = rest.split('/').next()?;
    let host = host_port.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hms_full_form() {
        assert_eq!(parse_hms_to_secs("0:03:42"), Some(222));
        assert_eq!(parse_hms_to_secs("1:02:03"), Some(3723));
    }

    #[test]
    fn parse_hms_short_forms() {
        assert_eq!(parse_hms_to_secs("03:42"), Some(222));
        assert_eq!(parse_hms_to_secs("42"), Some(42));
    }

    #[test]
    fn parse_hms_rejects_not_implemented() {
        assert_eq!(parse_hms_to_secs("NOT_IMPLEMENTED"), None);
        assert_eq!(parse_hms_to_secs(""), None);
        assert_eq!(parse_hms_to_secs("abc"), None);
    }

    #[test]
    fn hms_round_trip() {
        assert_eq!(secs_to_hms(222), "0:03:42");
        assert_eq!(secs_to_hms(3723), "1:02:03");
        assert_eq!(parse_hms_to_secs(&secs_to_hms(86399)), Some(86399));
    }

    #[test]
    fn escape_xml_escapes_all_specials() {
        assert_eq!(
            escape_xml(r#"<a b="c">&'</a>"#),
            "&lt;a b=&quot;c&quot;&gt;&amp;&apos;&lt;/a&gt;"
        );
    }

    #[test]
    fn extract_xml_text_ignores_namespace_prefix() {
        let xml = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><LastChange>hello</LastChange></e:property></e:propertyset>"#;
        assert_eq!(extract_xml_text(xml, "LastChange"), Some("hello".into()));
    }

    #[test]
    fn extract_xml_text_decodes_entities_once() {
        let xml = "<outer><Inner>&lt;Event val=&quot;1&quot;/&gt;</Inner></outer>";
        assert_eq!(
            extract_xml_text(xml, "Inner"),
            Some(r#"<Event val="1"/>"#.into())
        );
    }

    #[test]
    fn extract_xml_text_missing_element() {
        assert_eq!(extract_xml_text("<a><b>x</b></a>", "c"), None);
    }

    #[test]
    fn extract_ip_from_location_url() {
        assert_eq!(
            extract_ip_from_location("http://192.168.1.10:1400/xml/device_description.xml"),
            Some("192.168.1.10".to_string())
        );
        assert_eq!(extract_ip_from_location("not a url"), None);
    }
}
