//! Cached playback state and change detection.
//!
//! Each player's controller owns one [`PlayerState`] snapshot, replaced
//! atomically on NOTIFY events and explicit polls. Change detection
//! compares the (transport, volume, mute, track URI) tuple and produces
//! the normalized events the hub fans out.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::events::ControlEvent;
use crate::sonos::didl::parse_didl;
use crate::utils::parse_hms_to_secs;

// ─────────────────────────────────────────────────────────────────────────────
// Transport State
// ─────────────────────────────────────────────────────────────────────────────

/// AVTransport state as reported by the device.
///
/// TRANSITIONING is observable but never terminal; callers treat it as
/// in-flight. Whether a device lands on STOPPED or PAUSED after Pause
/// varies by model, so either counts as a terminal non-playing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
    Transitioning,
}

impl TransportState {
    /// Returns true for STOPPED or PAUSED.
    #[must_use]
    pub fn is_stopped_or_paused(&self) -> bool {
        matches!(self, Self::Stopped | Self::Paused)
    }
}

impl FromStr for TransportState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STOPPED" => Ok(Self::Stopped),
            "PLAYING" => Ok(Self::Playing),
            "PAUSED_PLAYBACK" | "PAUSED" => Ok(Self::Paused),
            "TRANSITIONING" => Ok(Self::Transitioning),
            _ => Err(()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Track
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of the current track by its URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackKind {
    Track,
    Radio,
    LineIn,
}

/// Classifies a transport URI.
#[must_use]
pub fn track_kind_for_uri(uri: &str) -> TrackKind {
    if uri.starts_with("x-sonosapi-radio:")
        || uri.starts_with("x-sonosapi-stream:")
        || uri.starts_with("x-rincon-mp3radio:")
    {
        TrackKind::Radio
    } else if uri.starts_with("x-rincon-stream:") {
        TrackKind::LineIn
    } else {
        TrackKind::Track
    }
}

/// The current track, decoded from DIDL-Lite metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_art_uri: Option<String>,
    /// Duration in whole seconds; None for unbounded sources (radio).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    /// Transport URI of the track.
    pub uri: String,
    /// Kind derived from the URI scheme.
    pub kind: TrackKind,
    /// Station name for radio sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
}

/// Builds a track from a transport URI plus its DIDL metadata.
///
/// Empty and "NOT_IMPLEMENTED" URIs yield no track. Metadata that fails
/// to parse degrades to a bare track with only the URI and kind.
#[must_use]
pub fn track_from_metadata(uri: &str, metadata: Option<&str>, duration: Option<&str>) -> Option<Track> {
    if uri.is_empty() || uri == "NOT_IMPLEMENTED" {
        return None;
    }

    let kind = track_kind_for_uri(uri);
    let item = metadata
        .filter(|m| !m.is_empty() && *m != "NOT_IMPLEMENTED")
        .and_then(|m| parse_didl(m).into_iter().next());

    let duration_secs = duration.and_then(parse_hms_to_secs);

    match item {
        Some(item) => {
            let station_name = if kind == TrackKind::Radio {
                item.title.clone()
            } else {
                None
            };
            Some(Track {
                artist: item.creator,
                title: item.title,
                album: item.album,
                album_art_uri: item.album_art_uri,
                duration_secs,
                uri: uri.to_string(),
                kind,
                station_name,
            })
        }
        None => Some(Track {
            artist: None,
            title: None,
            album: None,
            album_art_uri: None,
            duration_secs,
            uri: uri.to_string(),
            kind,
            station_name: None,
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Player State
// ─────────────────────────────────────────────────────────────────────────────

/// One player's cached playback state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub transport: TransportState,
    /// Volume in [0, 100].
    pub volume: u8,
    pub mute: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<Track>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            transport: TransportState::Stopped,
            volume: 0,
            mute: false,
            track: None,
        }
    }
}

impl PlayerState {
    /// The URI of the current track, if any.
    #[must_use]
    pub fn track_uri(&self) -> Option<&str> {
        self.track.as_ref().map(|t| t.uri.as_str())
    }
}

/// Computes the events a state transition produces.
///
/// `deviceStateChange` fires iff the (transport, volume, mute, track URI)
/// tuple changed; volume and mute differences additionally produce their
/// narrower events, and a track URI change produces `trackChange`.
#[must_use]
pub fn diff_events(
    device_id: &str,
    previous: &PlayerState,
    current: &PlayerState,
    timestamp: u64,
) -> Vec<ControlEvent> {
    let mut events = Vec::new();

    let tuple_changed = previous.transport != current.transport
        || previous.volume != current.volume
        || previous.mute != current.mute
        || previous.track_uri() != current.track_uri();

    if !tuple_changed {
        return events;
    }

    if previous.volume != current.volume {
        events.push(ControlEvent::VolumeChange {
            device_id: device_id.to_string(),
            previous: previous.volume,
            current: current.volume,
            timestamp,
        });
    }

    if previous.mute != current.mute {
        events.push(ControlEvent::MuteChange {
            device_id: device_id.to_string(),
            previous: previous.mute,
            current: current.mute,
            timestamp,
        });
    }

    if previous.track_uri() != current.track_uri() {
        events.push(ControlEvent::TrackChange {
            device_id: device_id.to_string(),
            previous: previous.track.clone(),
            current: current.track.clone(),
            timestamp,
        });
    }

    events.push(ControlEvent::DeviceStateChange {
        device_id: device_id.to_string(),
        previous: previous.clone(),
        current: current.clone(),
        timestamp,
    });

    events
}
