//! Preset playback.
//!
//! A preset describes a one-shot scene: which rooms group together, who
//! leads, per-room volumes, play mode, and what to play. The preset
//! loader collaborator supplies the parsed structure; this module drives
//! the fleet into it.

use serde::Deserialize;

use crate::error::{ControlError, ControlResult};
use crate::player::controller::DeviceController;
use crate::player::play_mode::Repeat;

/// One room entry of a preset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetPlayer {
    /// Room name, resolved through the registry and topology (stereo
    /// pairs resolve to their primary).
    pub room_name: String,
    /// Volume to apply to the room.
    #[serde(default)]
    pub volume: Option<i32>,
}

/// Play-mode overrides a preset may carry.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetPlayMode {
    #[serde(default)]
    pub shuffle: Option<bool>,
    #[serde(default)]
    pub repeat: Option<Repeat>,
    #[serde(default)]
    pub crossfade: Option<bool>,
}

/// A parsed preset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    /// What to play; absent means only arrange the group.
    #[serde(default)]
    pub uri: Option<String>,
    /// DIDL metadata for the URI.
    #[serde(default)]
    pub metadata: Option<String>,
    /// Volume for the lead room when it carries none of its own.
    #[serde(default)]
    pub volume: Option<i32>,
    /// Rooms in order; the first becomes the coordinator.
    #[serde(default)]
    pub players: Vec<PresetPlayer>,
    /// "stopped" arranges the group without starting playback.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub play_mode: Option<PresetPlayMode>,
    /// Pause every zone that is not part of the preset.
    #[serde(default)]
    pub pause_others: bool,
    /// Sleep timer in seconds.
    #[serde(default)]
    pub sleep: Option<u32>,
}

impl DeviceController {
    /// Resolves a preset room to a device id: the stereo-pair primary
    /// when topology knows one, otherwise any registry player in the room.
    fn resolve_preset_room(&self, room_name: &str) -> ControlResult<String> {
        if let Some(primary) = self.topology().stereo_pair_primary(room_name) {
            return Ok(primary);
        }
        self.player_in_room(room_name)
    }

    /// Applies a preset to the fleet.
    pub async fn play_preset(&self, preset: &Preset) -> ControlResult<()> {
        if preset.players.is_empty() {
            return Err(ControlError::InvalidArgument(
                "preset names no players".into(),
            ));
        }

        let mut member_ids = Vec::with_capacity(preset.players.len());
        for entry in &preset.players {
            member_ids.push(self.resolve_preset_room(&entry.room_name)?);
        }
        let lead_id = member_ids[0].clone();

        if preset.pause_others {
            self.pause_zones_outside(&member_ids).await;
        }

        // The lead leaves whatever group it is in; 1023 from a
        // stereo-pair slave is tolerated inside become_coordinator.
        self.become_coordinator(&lead_id).await?;

        for member_id in member_ids.iter().skip(1) {
            if let Err(e) = self.join_group(member_id, &lead_id).await {
                log::warn!(
                    "[Preset] Failed to join {} to {}: {}",
                    member_id,
                    lead_id,
                    e
                );
            }
        }

        for (entry, member_id) in preset.players.iter().zip(&member_ids) {
            if let Some(volume) = entry.volume {
                self.set_volume(member_id, volume).await?;
            }
        }
        if preset.players[0].volume.is_none() {
            if let Some(volume) = preset.volume {
                self.set_volume(&lead_id, volume).await?;
            }
        }

        if let Some(mode) = &preset.play_mode {
            if let Some(repeat) = mode.repeat {
                self.set_repeat(&lead_id, repeat).await?;
            }
            if let Some(shuffle) = mode.shuffle {
                self.set_shuffle(&lead_id, shuffle).await?;
            }
            if let Some(crossfade) = mode.crossfade {
                self.set_crossfade(&lead_id, crossfade).await?;
            }
        }

        if let Some(sleep) = preset.sleep {
            self.set_sleep_timer(&lead_id, sleep).await?;
        }

        let arrange_only = preset.state.as_deref() == Some("stopped");
        if !arrange_only {
            if let Some(uri) = preset.uri.as_deref() {
                self.play_uri(&lead_id, uri, preset.metadata.as_deref().unwrap_or(""))
                    .await?;
            }
        }

        Ok(())
    }

    /// Finds any registry player in a room.
    fn player_in_room(&self, room_name: &str) -> ControlResult<String> {
        let mut players = self.registry().by_room(room_name);
        players.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        players
            .first()
            .map(|p| p.uuid.clone())
            .ok_or_else(|| ControlError::NotFound(format!("unknown room {room_name}")))
    }

    /// Pauses the coordinator of every zone with no member in `keep`.
    async fn pause_zones_outside(&self, keep: &[String]) {
        for zone in self.topology().zones() {
            let overlaps = zone.members.iter().any(|m| keep.contains(&m.uuid));
            if overlaps {
                continue;
            }
            if let Err(e) = self.pause(&zone.coordinator).await {
                log::debug!(
                    "[Preset] Pause of outside zone {} failed: {}",
                    zone.coordinator,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::controller::testing::fixture;
    use crate::registry::testing::player;

    fn preset(rooms: &[(&str, Option<i32>)], uri: Option<&str>) -> Preset {
        Preset {
            uri: uri.map(String::from),
            metadata: None,
            volume: None,
            players: rooms
                .iter()
                .map(|(room, volume)| PresetPlayer {
                    room_name: (*room).to_string(),
                    volume: *volume,
                })
                .collect(),
            state: None,
            play_mode: None,
            pause_others: false,
            sleep: None,
        }
    }

    #[tokio::test]
    async fn empty_preset_is_invalid() {
        let f = fixture();
        let err = f.controller.play_preset(&preset(&[], None)).await.unwrap_err();
        assert!(matches!(err, ControlError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let f = fixture();
        let err = f
            .controller
            .play_preset(&preset(&[("Attic", None)], None))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::NotFound(_)));
    }

    #[tokio::test]
    async fn preset_groups_members_behind_first_room() {
        let f = fixture();
        f.registry.insert(player("RINCON_DEN", "192.168.1.60", "Den"));

        f.controller
            .play_preset(&preset(&[("Office", Some(30)), ("Den", Some(20))], None))
            .await
            .unwrap();

        let actions = f.transport.action_sequence();
        // Lead leaves its group, member joins via x-rincon set-URI,
        // volumes applied (SetVolume + confirming GetVolume each).
        assert_eq!(actions[0], "BecomeCoordinatorOfStandaloneGroup");
        assert!(actions.contains(&"SetAVTransportURI".to_string()));
        assert_eq!(
            actions.iter().filter(|a| *a == "SetVolume").count(),
            2
        );

        let join_args = f.transport.args_of("SetAVTransportURI", 0).unwrap();
        assert!(join_args.contains(&(
            "CurrentURI".to_string(),
            "x-rincon:RINCON_SELF".to_string()
        )));
    }

    #[tokio::test]
    async fn stopped_preset_does_not_play() {
        let f = fixture();
        let mut p = preset(&[("Office", None)], Some("http://host/stream.mp3"));
        p.state = Some("stopped".to_string());

        f.controller.play_preset(&p).await.unwrap();

        assert!(!f.transport.action_sequence().contains(&"Play".to_string()));
    }

    #[tokio::test]
    async fn preset_deserializes_legacy_shape() {
        let json = r#"{
            "players": [
                {"roomName": "Kitchen", "volume": 25},
                {"roomName": "Den"}
            ],
            "uri": "x-rincon-cpcontainer:abc",
            "playMode": {"shuffle": true, "repeat": "all"},
            "pauseOthers": true,
            "sleep": 1800
        }"#;
        let p: Preset = serde_json::from_str(json).unwrap();
        assert_eq!(p.players.len(), 2);
        assert_eq!(p.players[0].volume, Some(25));
        assert!(p.pause_others);
        assert_eq!(p.sleep, Some(1800));
        assert_eq!(p.play_mode.unwrap().repeat, Some(Repeat::All));
    }
}
