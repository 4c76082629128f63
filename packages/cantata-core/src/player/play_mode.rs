//! PlayMode encoding between (shuffle, repeat) pairs and wire strings.
//!
//! The device exposes a single PlayMode state variable; the API exposes
//! independent shuffle and repeat settings. Shuffle with REPEAT_ONE is
//! not representable on the wire, so enabling shuffle while repeat-one is
//! active collapses to SHUFFLE_NOREPEAT.

use serde::{Deserialize, Serialize};

/// Repeat setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    None,
    All,
    One,
}

/// Combined playback mode settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayMode {
    pub repeat: Repeat,
    pub shuffle: bool,
    pub crossfade: bool,
}

impl Default for PlayMode {
    fn default() -> Self {
        Self {
            repeat: Repeat::None,
            shuffle: false,
            crossfade: false,
        }
    }
}

/// Encodes a (shuffle, repeat) pair as the wire PlayMode string.
///
/// | Shuffle \ Repeat | none             | all        | one               |
/// |------------------|------------------|------------|-------------------|
/// | off              | NORMAL           | REPEAT_ALL | REPEAT_ONE        |
/// | on               | SHUFFLE_NOREPEAT | SHUFFLE    | SHUFFLE_NOREPEAT  |
#[must_use]
pub fn encode_play_mode(shuffle: bool, repeat: Repeat) -> &'static str {
    match (shuffle, repeat) {
        (false, Repeat::None) => "NORMAL",
        (false, Repeat::All) => "REPEAT_ALL",
        (false, Repeat::One) => "REPEAT_ONE",
        (true, Repeat::None) => "SHUFFLE_NOREPEAT",
        (true, Repeat::All) => "SHUFFLE",
        // Not representable on the wire; collapses to shuffle without repeat.
        (true, Repeat::One) => "SHUFFLE_NOREPEAT",
    }
}

/// Decodes a wire PlayMode string into a (shuffle, repeat) pair.
#[must_use]
pub fn decode_play_mode(mode: &str) -> Option<(bool, Repeat)> {
    match mode {
        "NORMAL" => Some((false, Repeat::None)),
        "REPEAT_ALL" => Some((false, Repeat::All)),
        "REPEAT_ONE" => Some((false, Repeat::One)),
        "SHUFFLE_NOREPEAT" => Some((true, Repeat::None)),
        "SHUFFLE" => Some((true, Repeat::All)),
        _ => None,
    }
}
