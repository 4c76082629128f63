//! UPnP service definitions for the player device class.
//!
//! This module provides a single source of truth for service URNs, control
//! paths, and event paths. These built-in paths are the FALLBACK: when a
//! player's device description declares a service, the discovered control
//! and event URLs are preferred (see [`crate::registry::Player`]).

use serde::Serialize;

/// UPnP services used for control and event subscriptions.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SonosService {
    /// Audio/Video transport control (play, pause, stop, seek, queue).
    AVTransport,
    /// Individual player volume and mute control.
    RenderingControl,
    /// Group volume and mute control (for coordinator players).
    GroupRenderingControl,
    /// Zone group topology and membership information.
    ZoneGroupTopology,
    /// Queue and library browsing (MediaServer side of the device).
    ContentDirectory,
}

impl SonosService {
    /// Returns the UPnP service URN for SOAP requests.
    #[must_use]
    pub fn urn(&self) -> &'static str {
        match self {
            Self::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
            Self::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:1",
            Self::GroupRenderingControl => "urn:schemas-upnp-org:service:GroupRenderingControl:1",
            Self::ZoneGroupTopology => "urn:schemas-upnp-org:service:ZoneGroupTopology:1",
            Self::ContentDirectory => "urn:schemas-upnp-org:service:ContentDirectory:1",
        }
    }

    /// Returns the fallback UPnP control endpoint path for SOAP requests.
    #[must_use]
    pub fn control_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/MediaRenderer/AVTransport/Control",
            Self::RenderingControl => "/MediaRenderer/RenderingControl/Control",
            Self::GroupRenderingControl => "/MediaRenderer/GroupRenderingControl/Control",
            Self::ZoneGroupTopology => "/ZoneGroupTopology/Control",
            Self::ContentDirectory => "/MediaServer/ContentDirectory/Control",
        }
    }

    /// Returns the fallback UPnP event endpoint path for GENA subscriptions.
    #[must_use]
    pub fn event_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/MediaRenderer/AVTransport/Event",
            Self::RenderingControl => "/MediaRenderer/RenderingControl/Event",
            Self::GroupRenderingControl => "/MediaRenderer/GroupRenderingControl/Event",
            Self::ZoneGroupTopology => "/ZoneGroupTopology/Event",
            Self::ContentDirectory => "/MediaServer/ContentDirectory/Event",
        }
    }

    /// Returns a human-readable name for this service.
    ///
    /// This is also the service component of deterministic subscription ids.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AVTransport => "AVTransport",
            Self::RenderingControl => "RenderingControl",
            Self::GroupRenderingControl => "GroupRenderingControl",
            Self::ZoneGroupTopology => "ZoneGroupTopology",
            Self::ContentDirectory => "ContentDirectory",
        }
    }

    /// Resolves a service by its human-readable name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "AVTransport" => Some(Self::AVTransport),
            "RenderingControl" => Some(Self::RenderingControl),
            "GroupRenderingControl" => Some(Self::GroupRenderingControl),
            "ZoneGroupTopology" => Some(Self::ZoneGroupTopology),
            "ContentDirectory" => Some(Self::ContentDirectory),
            _ => None,
        }
    }

    /// Resolves a service from a full service-type URN.
    ///
    /// Version suffixes are ignored so that `:1` and `:2` declarations both
    /// match the same service.
    #[must_use]
    pub fn from_urn(urn: &str) -> Option<Self> {
        let name = urn.split(':').nth(3)?;
        Self::from_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_round_trips_through_from_name() {
        for service in [
            SonosService::AVTransport,
            SonosService::RenderingControl,
            SonosService::GroupRenderingControl,
            SonosService::ZoneGroupTopology,
            SonosService::ContentDirectory,
        ] {
            assert_eq!(SonosService::from_name(service.name()), Some(service));
        }
    }

    #[test]
    fn from_urn_ignores_version() {
        assert_eq!(
            SonosService::from_urn("urn:schemas-upnp-org:service:AVTransport:1"),
            Some(SonosService::AVTransport)
        );
        assert_eq!(
            SonosService::from_urn("urn:schemas-upnp-org:service:RenderingControl:2"),
            Some(SonosService::RenderingControl)
        );
        assert_eq!(SonosService::from_urn("urn:nope"), None);
    }
}
