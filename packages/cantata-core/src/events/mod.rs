//! Normalized event stream for external consumers.
//!
//! This module provides:
//! - [`ControlEvent`] - the tagged-variant event type
//! - [`hub::EventHub`] - the process-wide publish/subscribe surface
//! - [`webhook::WebhookConsumer`] - JSON POST fan-out
//! - [`sse::SseConsumer`] - Server-Sent Events fan-out

pub mod hub;
pub mod sse;
pub mod webhook;

pub use hub::{EventConsumer, EventHub};
pub use sse::SseConsumer;
pub use webhook::{WebhookConfig, WebhookConsumer};

use serde::{Deserialize, Serialize};

use crate::player::state::{PlayerState, Track};
use crate::topology::Zone;

/// Events emitted by the control plane.
///
/// Each variant carries the device id (or a zone summary), a Unix-millis
/// timestamp, and the previous+current values for diffing. Events are
/// immutable once emitted.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlEvent {
    /// The (transport, volume, mute, track) tuple of a device changed.
    #[serde(rename_all = "camelCase")]
    DeviceStateChange {
        device_id: String,
        previous: PlayerState,
        current: PlayerState,
        timestamp: u64,
    },
    /// A device's volume changed.
    #[serde(rename_all = "camelCase")]
    VolumeChange {
        device_id: String,
        previous: u8,
        current: u8,
        timestamp: u64,
    },
    /// A device's mute state changed.
    #[serde(rename_all = "camelCase")]
    MuteChange {
        device_id: String,
        previous: bool,
        current: bool,
        timestamp: u64,
    },
    /// The current track of a device changed.
    #[serde(rename_all = "camelCase")]
    TrackChange {
        device_id: String,
        previous: Option<Track>,
        current: Option<Track>,
        timestamp: u64,
    },
    /// The zone topology was rebuilt.
    #[serde(rename_all = "camelCase")]
    TopologyChange { zones: Vec<Zone>, timestamp: u64 },
    /// Content under a container changed on a device.
    #[serde(rename_all = "camelCase")]
    ContentUpdate {
        device_id: String,
        container_id: String,
        timestamp: u64,
    },
}

impl ControlEvent {
    /// The device this event concerns, if it is device-scoped.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::DeviceStateChange { device_id, .. }
            | Self::VolumeChange { device_id, .. }
            | Self::MuteChange { device_id, .. }
            | Self::TrackChange { device_id, .. }
            | Self::ContentUpdate { device_id, .. } => Some(device_id),
            Self::TopologyChange { .. } => None,
        }
    }

    /// The filter category this event belongs to.
    #[must_use]
    pub fn filter_kind(&self) -> EventFilter {
        match self {
            Self::VolumeChange { .. } | Self::MuteChange { .. } => EventFilter::Volume,
            Self::DeviceStateChange { .. } | Self::TrackChange { .. } => EventFilter::Transport,
            Self::TopologyChange { .. } | Self::ContentUpdate { .. } => EventFilter::Topology,
        }
    }
}

/// Webhook event-type filter categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventFilter {
    Volume,
    Transport,
    Topology,
}
