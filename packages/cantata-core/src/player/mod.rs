//! Per-player control.
//!
//! - `controller` - the per-player operation façade and state cache
//! - `state` - playback state, track model, change detection
//! - `play_mode` - (shuffle, repeat) ⇄ PlayMode string encoding
//! - `router` - content URI classification and playback dispatch
//! - `preset` - one-shot scene application

pub mod controller;
pub mod play_mode;
pub mod preset;
pub mod router;
pub mod state;

pub use controller::{queue_uri, DeviceController};
pub use play_mode::{PlayMode, Repeat};
pub use preset::{Preset, PresetPlayMode, PresetPlayer};
pub use router::{classify_uri, UriClass};
pub use state::{PlayerState, Track, TrackKind, TransportState};
