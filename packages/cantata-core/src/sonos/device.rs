//! Device description parsing.
//!
//! Every player serves an XML device description at a well-known path.
//! This module extracts the identity fields (UDN, room, model) and the
//! per-service control/event URLs from the root device and its embedded
//! MediaRenderer/MediaServer devices.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use thiserror::Error;

/// Errors from device description parsing.
#[derive(Debug, Error)]
pub enum DeviceXmlError {
    /// A required element was absent from the document.
    #[error("device description missing element: {0}")]
    Missing(&'static str),

    /// The XML was structurally invalid.
    #[error("device description XML error: {0}")]
    Xml(String),
}

/// Per-service URLs declared by a device description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    /// Full service-type URN (e.g. `urn:schemas-upnp-org:service:AVTransport:1`).
    pub service_type: String,
    /// Control URL path or absolute URL for SOAP actions.
    pub control_url: String,
    /// Event subscription URL path or absolute URL for GENA SUBSCRIBE.
    pub event_url: String,
}

/// Identity and service table parsed from a device description document.
#[derive(Debug, Clone)]
pub struct DeviceDescription {
    /// Canonical device UUID from the root UDN (without `uuid:` prefix).
    pub uuid: String,
    /// User-configured room name.
    pub room_name: String,
    /// Friendly name (usually "ip - model").
    pub friendly_name: String,
    /// Model name (e.g. "Sonos One").
    pub model_name: String,
    /// Model number (e.g. "S13").
    pub model_number: Option<String>,
    /// All services declared by the root device and embedded devices.
    pub services: Vec<ServiceEndpoints>,
}

/// Parses a device description document.
///
/// Identity fields come from the FIRST `<device>` element (the root
/// device); services are collected from the root device and every
/// embedded device so the MediaRenderer and MediaServer endpoints are all
/// visible in one flat table.
///
/// # Errors
/// Returns `DeviceXmlError` when the document is malformed or the root
/// UDN is missing. Missing optional fields degrade to empty strings.
pub fn parse_device_description(xml: &str) -> Result<DeviceDescription, DeviceXmlError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut uuid: Option<String> = None;
    let mut room_name = String::new();
    let mut friendly_name = String::new();
    let mut model_name = String::new();
    let mut model_number: Option<String> = None;
    let mut services: Vec<ServiceEndpoints> = Vec::new();

    // Identity fields are taken from the first <device> only; embedded
    // devices repeat these elements with subdevice values.
    let mut device_depth = 0usize;
    let mut in_service = false;
    let mut service_type = String::new();
    let mut control_url = String::new();
    let mut event_url = String::new();
    let mut current_element: Vec<u8> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"device" => device_depth += 1,
                b"service" => {
                    in_service = true;
                    service_type.clear();
                    control_url.clear();
                    event_url.clear();
                }
                name => current_element = name.to_vec(),
            },
            Ok(Event::Text(ref t)) => {
                let Ok(raw) = t.decode() else { continue };
                let Ok(text) = quick_xml::escape::unescape(&raw) else { continue };
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }

                if in_service {
                    match current_element.as_slice() {
                        b"serviceType" => service_type = text.to_string(),
                        b"controlURL" => control_url = text.to_string(),
                        b"eventSubURL" => event_url = text.to_string(),
                        _ => {}
                    }
                } else if device_depth == 1 {
                    match current_element.as_slice() {
                        b"UDN" if uuid.is_none() => {
                            uuid = Some(text.strip_prefix("uuid:").unwrap_or(text).to_string());
                        }
                        b"roomName" if room_name.is_empty() => room_name = text.to_string(),
                        b"friendlyName" if friendly_name.is_empty() => {
                            friendly_name = text.to_string();
                        }
                        b"modelName" if model_name.is_empty() => model_name = text.to_string(),
                        b"modelNumber" if model_number.is_none() => {
                            model_number = Some(text.to_string());
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"device" => device_depth = device_depth.saturating_sub(1),
                b"service" => {
                    if in_service && !service_type.is_empty() && !control_url.is_empty() {
                        services.push(ServiceEndpoints {
                            service_type: std::mem::take(&mut service_type),
                            control_url: std::mem::take(&mut control_url),
                            event_url: std::mem::take(&mut event_url),
                        });
                    }
                    in_service = false;
                }
                _ => current_element.clear(),
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(DeviceXmlError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let uuid = uuid.ok_or(DeviceXmlError::Missing("UDN"))?;

    Ok(DeviceDescription {
        uuid,
        room_name,
        friendly_name,
        model_name,
        model_number,
        services,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sonos::test_fixtures::DEVICE_DESCRIPTION_XML;

    #[test]
    fn parses_identity_from_root_device() {
        let desc = parse_device_description(DEVICE_DESCRIPTION_XML).expect("should parse");

        assert_eq!(desc.uuid, "RINCON_B8E937ECE1F001400");
        assert_eq!(desc.room_name, "Kitchen");
        assert_eq!(desc.model_name, "Sonos One");
        assert_eq!(desc.model_number.as_deref(), Some("S13"));
        assert!(desc.friendly_name.contains("192.168.1.10"));
    }

    #[test]
    fn collects_services_from_embedded_devices() {
        let desc = parse_device_description(DEVICE_DESCRIPTION_XML).expect("should parse");

        let types: Vec<&str> = desc.services.iter().map(|s| s.service_type.as_str()).collect();
        assert!(types.contains(&"urn:schemas-upnp-org:service:ZoneGroupTopology:1"));
        assert!(types.contains(&"urn:schemas-upnp-org:service:AVTransport:1"));
        assert!(types.contains(&"urn:schemas-upnp-org:service:RenderingControl:1"));
        assert!(types.contains(&"urn:schemas-upnp-org:service:ContentDirectory:1"));

        let avt = desc
            .services
            .iter()
            .find(|s| s.service_type.contains("AVTransport"))
            .expect("AVTransport declared");
        assert_eq!(avt.control_url, "/MediaRenderer/AVTransport/Control");
        assert_eq!(avt.event_url, "/MediaRenderer/AVTransport/Event");
    }

    #[test]
    fn strips_uuid_prefix_from_udn() {
        let xml = r#"<root><device><UDN>uuid:RINCON_TEST01400</UDN></device></root>"#;
        let desc = parse_device_description(xml).expect("should parse");
        assert_eq!(desc.uuid, "RINCON_TEST01400");
    }

    #[test]
    fn missing_udn_is_an_error() {
        let xml = r#"<root><device><friendlyName>x</friendlyName></device></root>"#;
        assert!(matches!(
            parse_device_description(xml),
            Err(DeviceXmlError::Missing("UDN"))
        ));
    }
}
