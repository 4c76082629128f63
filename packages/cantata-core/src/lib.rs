//! Cantata core - a LAN-local control plane for UPnP multi-room audio
//! players.
//!
//! Hides the UPnP wire protocol behind a typed API: SSDP/mDNS discovery
//! feeds the player registry, GENA eventing keeps a live view of every
//! device and the zone topology, and the device controller exposes
//! playback, volume, grouping, queue, and content-routing operations.
//! State changes fan out to consumers through the event hub.
//!
//! # Architecture
//!
//! - [`sonos`] - protocol plumbing: SOAP, device descriptions, DIDL,
//!   GENA subscriptions, SSDP/mDNS discovery
//! - [`registry`] - the live player map
//! - [`topology`] - zone reconciliation and coordinator resolution
//! - [`player`] - per-device control, state cache, content URI routing
//! - [`events`] - normalized event stream, webhook and SSE publishers
//! - [`services`] - discovery orchestration and NOTIFY processing
//! - [`bootstrap`] - the composition root
//! - [`persist`] - file-backed station cache and service backoff

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod events;
pub mod persist;
pub mod player;
pub mod protocol_constants;
pub mod registry;
pub mod services;
pub mod sonos;
pub mod topology;
pub mod utils;

pub use bootstrap::{bootstrap_services, CantataServices};
pub use config::Config;
pub use error::{ControlError, ControlResult, ErrorCode};
pub use events::{ControlEvent, EventHub, SseConsumer, WebhookConfig};
pub use player::{DeviceController, PlayMode, PlayerState, Preset, Repeat, TransportState};
pub use registry::{Player, PlayerRegistry};
pub use topology::{TopologyManager, Zone, ZoneMember};
pub mod repro_test_tmp;
