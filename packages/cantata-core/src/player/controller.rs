//! Per-player device controller.
//!
//! The façade the API layer talks to: transport, rendering, grouping,
//! queue, and playback-mode operations per player, plus the cached state
//! and its change detection. Transport commands are routed to the zone
//! coordinator; volume and mute stay on the addressed member.
//!
//! All SOAP goes through the injected [`SoapTransport`] seam, so tests
//! drive the controller with a scripted transport and assert on the exact
//! action sequence.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{ControlError, ControlResult};
use crate::events::{ControlEvent, EventHub};
use crate::player::play_mode::{decode_play_mode, encode_play_mode, PlayMode, Repeat};
use crate::player::state::{
    diff_events, track_from_metadata, PlayerState, TransportState,
};
use crate::protocol_constants::{
    BROWSE_PAGE_SIZE, UPNP_ERR_INVALID_FOR_ROLE, UPNP_ERR_TRANSITION_UNAVAILABLE,
};
use crate::registry::{Player, PlayerRegistry};
use crate::sonos::didl::{parse_didl, DidlItem};
use crate::sonos::last_change::{parse_av_transport_notify, parse_rendering_notify};
use crate::sonos::services::SonosService;
use crate::sonos::soap::SoapResult;
use crate::sonos::traits::SoapTransport;
use crate::topology::TopologyManager;
use crate::utils::{extract_xml_text, now_millis, parse_hms_to_secs, secs_to_hms};

/// Builds the synthetic queue URI of a device.
#[must_use]
pub fn queue_uri(device_id: &str) -> String {
    format!("x-rincon-queue:{device_id}#0")
}

/// Per-player operations over the fleet.
pub struct DeviceController {
    transport: Arc<dyn SoapTransport>,
    registry: Arc<PlayerRegistry>,
    topology: Arc<TopologyManager>,
    hub: Arc<EventHub>,
    states: DashMap<String, PlayerState>,
}

impl DeviceController {
    /// Creates a controller over the given collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn SoapTransport>,
        registry: Arc<PlayerRegistry>,
        topology: Arc<TopologyManager>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            transport,
            registry,
            topology,
            hub,
            states: DashMap::new(),
        }
    }

    /// Read-only view of the topology manager, for coordinator routing
    /// by callers.
    #[must_use]
    pub fn topology(&self) -> &Arc<TopologyManager> {
        &self.topology
    }

    /// Read-only view of the player registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PlayerRegistry> {
        &self.registry
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup & Routing
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn player(&self, device_id: &str) -> ControlResult<Arc<Player>> {
        self.registry
            .by_id(device_id)
            .ok_or_else(|| ControlError::NotFound(format!("unknown device {device_id}")))
    }

    /// Resolves the player that owns the transport for `device_id`.
    ///
    /// Transport commands to any zone member are logically addressed to
    /// its coordinator; without topology data the member stands alone.
    fn transport_target(&self, device_id: &str) -> ControlResult<Arc<Player>> {
        let coordinator_id = self
            .topology
            .coordinator_for(device_id)
            .unwrap_or_else(|| device_id.to_string());
        // The coordinator may be a player we have not discovered; fall
        // back to the addressed member rather than failing the command.
        match self.registry.by_id(&coordinator_id) {
            Some(player) => Ok(player),
            None => self.player(device_id),
        }
    }

    async fn soap(
        &self,
        player: &Player,
        service: SonosService,
        action: &str,
        args: &[(&str, String)],
    ) -> SoapResult<String> {
        self.transport
            .invoke(&player.soap_target(service), action, args)
            .await
    }

    /// Returns the cached state of a player (default if never polled).
    #[must_use]
    pub fn state_of(&self, device_id: &str) -> PlayerState {
        self.states
            .get(device_id)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    /// Sends Play to a specific player, without coordinator routing.
    ///
    /// The content router uses this right after ensure-coordinator, when
    /// the topology snapshot may still describe the old group.
    pub(crate) async fn play_on(&self, player: &Player) -> ControlResult<()> {
        self.soap(
            player,
            SonosService::AVTransport,
            "Play",
            &[("InstanceID", "0".into()), ("Speed", "1".into())],
        )
        .await?;
        Ok(())
    }

    /// Starts playback.
    pub async fn play(&self, device_id: &str) -> ControlResult<()> {
        let target = self.transport_target(device_id)?;
        self.play_on(&target).await
    }

    /// Pauses playback.
    pub async fn pause(&self, device_id: &str) -> ControlResult<()> {
        let target = self.transport_target(device_id)?;
        self.soap(
            &target,
            SonosService::AVTransport,
            "Pause",
            &[("InstanceID", "0".into())],
        )
        .await?;
        Ok(())
    }

    /// Sends Stop to a specific player; fault 701 (already stopped) is
    /// swallowed.
    pub(crate) async fn stop_on(&self, player: &Player) -> ControlResult<()> {
        match self
            .soap(
                player,
                SonosService::AVTransport,
                "Stop",
                &[("InstanceID", "0".into())],
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_fault(UPNP_ERR_TRANSITION_UNAVAILABLE) => {
                log::debug!("[Control] Stop on {}: already stopped (701)", player.uuid);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stops playback.
    pub async fn stop_playback(&self, device_id: &str) -> ControlResult<()> {
        let target = self.transport_target(device_id)?;
        self.stop_on(&target).await
    }

    /// Skips to the next queue entry.
    pub async fn next(&self, device_id: &str) -> ControlResult<()> {
        let target = self.transport_target(device_id)?;
        self.soap(
            &target,
            SonosService::AVTransport,
            "Next",
            &[("InstanceID", "0".into())],
        )
        .await?;
        Ok(())
    }

    /// Skips to the previous queue entry.
    pub async fn previous(&self, device_id: &str) -> ControlResult<()> {
        let target = self.transport_target(device_id)?;
        self.soap(
            &target,
            SonosService::AVTransport,
            "Previous",
            &[("InstanceID", "0".into())],
        )
        .await?;
        Ok(())
    }

    /// Seeks to a 1-based track number in the queue.
    pub async fn seek_track(&self, device_id: &str, track: u32) -> ControlResult<()> {
        if track == 0 {
            return Err(ControlError::InvalidArgument(
                "track numbers are 1-based".into(),
            ));
        }
        let target = self.transport_target(device_id)?;
        self.soap(
            &target,
            SonosService::AVTransport,
            "Seek",
            &[
                ("InstanceID", "0".into()),
                ("Unit", "TRACK_NR".into()),
                ("Target", track.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    /// Seeks to a relative time within the current track ("H:MM:SS").
    pub async fn seek_time(&self, device_id: &str, time: &str) -> ControlResult<()> {
        let secs = parse_hms_to_secs(time).ok_or_else(|| {
            ControlError::InvalidArgument(format!("malformed seek target {time:?}"))
        })?;
        let target = self.transport_target(device_id)?;
        self.soap(
            &target,
            SonosService::AVTransport,
            "Seek",
            &[
                ("InstanceID", "0".into()),
                ("Unit", "REL_TIME".into()),
                ("Target", secs_to_hms(secs)),
            ],
        )
        .await?;
        Ok(())
    }

    /// Sets the transport URI. Addressed to the named player itself:
    /// grouping and the content router decide coordinator placement.
    pub async fn set_av_transport_uri(
        &self,
        device_id: &str,
        uri: &str,
        metadata: &str,
    ) -> ControlResult<()> {
        let player = self.player(device_id)?;
        self.soap(
            &player,
            SonosService::AVTransport,
            "SetAVTransportURI",
            &[
                ("InstanceID", "0".into()),
                ("CurrentURI", uri.into()),
                ("CurrentURIMetaData", metadata.into()),
            ],
        )
        .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────────

    /// Reads the player's volume and refreshes the cache.
    pub async fn get_volume(&self, device_id: &str) -> ControlResult<u8> {
        let player = self.player(device_id)?;
        let volume = self.poll_volume(&player).await?;

        let mut state = self.state_of(device_id);
        state.volume = volume;
        self.apply_state(device_id, state);

        Ok(volume)
    }

    /// Sets the player's volume, clamped to [0, 100].
    ///
    /// The cache is confirmed with a GetVolume read-back, so the
    /// volume-change event carries what the device actually applied.
    pub async fn set_volume(&self, device_id: &str, volume: i32) -> ControlResult<()> {
        let clamped = volume.clamp(0, 100) as u8;
        let player = self.player(device_id)?;

        self.soap(
            &player,
            SonosService::RenderingControl,
            "SetVolume",
            &[
                ("InstanceID", "0".into()),
                ("Channel", "Master".into()),
                ("DesiredVolume", clamped.to_string()),
            ],
        )
        .await?;

        let confirmed = self.poll_volume(&player).await.unwrap_or(clamped);
        let mut state = self.state_of(device_id);
        state.volume = confirmed;
        self.apply_state(device_id, state);

        Ok(())
    }

    /// Reads the player's mute state and refreshes the cache.
    pub async fn get_mute(&self, device_id: &str) -> ControlResult<bool> {
        let player = self.player(device_id)?;
        let mute = self.poll_mute(&player).await?;

        let mut state = self.state_of(device_id);
        state.mute = mute;
        self.apply_state(device_id, state);

        Ok(mute)
    }

    /// Sets the player's mute state.
    pub async fn set_mute(&self, device_id: &str, mute: bool) -> ControlResult<()> {
        let player = self.player(device_id)?;
        self.soap(
            &player,
            SonosService::RenderingControl,
            "SetMute",
            &[
                ("InstanceID", "0".into()),
                ("Channel", "Master".into()),
                ("DesiredMute", if mute { "1" } else { "0" }.into()),
            ],
        )
        .await?;

        let mut state = self.state_of(device_id);
        state.mute = mute;
        self.apply_state(device_id, state);

        Ok(())
    }

    /// Sets the group volume for the player's zone.
    ///
    /// Prefers the group-rendering service on the addressed member. Some
    /// stereo-pair slaves do not implement it: those delegate to their
    /// coordinator, and a coordinator without the service falls back to a
    /// plain per-player volume.
    pub async fn set_group_volume(&self, device_id: &str, volume: i32) -> ControlResult<()> {
        let clamped = volume.clamp(0, 100) as u8;
        let mut player = self.player(device_id)?;

        // Delegate to the coordinator when this member lacks the group
        // service; the coordinator's own service table then decides.
        if !player.has_service(SonosService::GroupRenderingControl)
            && !self.topology.is_coordinator(&player.uuid)
        {
            if let Some(coordinator_id) = self.topology.coordinator_for(&player.uuid) {
                if let Ok(coordinator) = self.player(&coordinator_id) {
                    player = coordinator;
                }
            }
        }

        if player.has_service(SonosService::GroupRenderingControl) {
            self.soap(
                &player,
                SonosService::GroupRenderingControl,
                "SetGroupVolume",
                &[
                    ("InstanceID", "0".into()),
                    ("DesiredVolume", clamped.to_string()),
                ],
            )
            .await?;
            return Ok(());
        }

        let target_id = player.uuid.clone();
        self.set_volume(&target_id, volume).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grouping
    // ─────────────────────────────────────────────────────────────────────────

    /// Makes the player coordinator of its own standalone group.
    ///
    /// Fault 1023 (action invalid for a stereo-pair slave) means the
    /// device's role already makes this moot, and is swallowed.
    pub async fn become_coordinator(&self, device_id: &str) -> ControlResult<()> {
        let player = self.player(device_id)?;
        match self
            .soap(
                &player,
                SonosService::AVTransport,
                "BecomeCoordinatorOfStandaloneGroup",
                &[("InstanceID", "0".into())],
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_fault(UPNP_ERR_INVALID_FOR_ROLE) => {
                log::debug!(
                    "[Control] becomeCoordinator on {}: 1023, treating as already fine",
                    device_id
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Joins the player to another group's coordinator.
    pub async fn join_group(&self, device_id: &str, coordinator_uuid: &str) -> ControlResult<()> {
        self.set_av_transport_uri(device_id, &format!("x-rincon:{coordinator_uuid}"), "")
            .await
    }

    /// Detaches the player from its group.
    pub async fn leave_group(&self, device_id: &str) -> ControlResult<()> {
        self.become_coordinator(device_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queue & Browse
    // ─────────────────────────────────────────────────────────────────────────

    /// Browses a ContentDirectory container, following pagination up to
    /// `count` items.
    pub async fn browse(
        &self,
        device_id: &str,
        object_id: &str,
        start: u32,
        count: u32,
    ) -> ControlResult<Vec<DidlItem>> {
        let player = self.player(device_id)?;
        let mut items: Vec<DidlItem> = Vec::new();
        let mut index = start;

        while (items.len() as u32) < count {
            let page = (count - items.len() as u32).min(BROWSE_PAGE_SIZE);
            let response = self
                .soap(
                    &player,
                    SonosService::ContentDirectory,
                    "Browse",
                    &[
                        ("ObjectID", object_id.into()),
                        ("BrowseFlag", "BrowseDirectChildren".into()),
                        ("Filter", "*".into()),
                        ("StartingIndex", index.to_string()),
                        ("RequestedCount", page.to_string()),
                        ("SortCriteria", String::new()),
                    ],
                )
                .await?;

            let result = extract_xml_text(&response, "Result").unwrap_or_default();
            let number_returned: u32 = extract_xml_text(&response, "NumberReturned")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let total_matches: u32 = extract_xml_text(&response, "TotalMatches")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);

            items.extend(parse_didl(&result));

            index += number_returned;
            if number_returned == 0 || index >= total_matches {
                break;
            }
        }

        items.truncate(count as usize);
        Ok(items)
    }

    /// Enqueues a URI on a specific player's queue.
    pub(crate) async fn add_uri_to_queue_on(
        &self,
        player: &Player,
        uri: &str,
        metadata: &str,
        enqueue_as_next: bool,
        desired_position: u32,
    ) -> ControlResult<()> {
        self.soap(
            player,
            SonosService::AVTransport,
            "AddURIToQueue",
            &[
                ("InstanceID", "0".into()),
                ("EnqueuedURI", uri.into()),
                ("EnqueuedURIMetaData", metadata.into()),
                ("DesiredFirstTrackNumberEnqueued", desired_position.to_string()),
                ("EnqueueAsNext", if enqueue_as_next { "1" } else { "0" }.into()),
            ],
        )
        .await?;
        Ok(())
    }

    /// Adds a URI (with its DIDL metadata) to the zone's queue.
    pub async fn add_uri_to_queue(
        &self,
        device_id: &str,
        uri: &str,
        metadata: &str,
        enqueue_as_next: bool,
        desired_position: u32,
    ) -> ControlResult<()> {
        let target = self.transport_target(device_id)?;
        self.add_uri_to_queue_on(&target, uri, metadata, enqueue_as_next, desired_position)
            .await
    }

    /// Clears a specific player's queue.
    pub(crate) async fn clear_queue_on(&self, player: &Player) -> ControlResult<()> {
        self.soap(
            player,
            SonosService::AVTransport,
            "RemoveAllTracksFromQueue",
            &[("InstanceID", "0".into())],
        )
        .await?;
        Ok(())
    }

    /// Removes every track from the zone's queue.
    pub async fn clear_queue(&self, device_id: &str) -> ControlResult<()> {
        let target = self.transport_target(device_id)?;
        self.clear_queue_on(&target).await
    }

    /// Returns a window of the device's queue.
    pub async fn get_queue(
        &self,
        device_id: &str,
        limit: u32,
        offset: u32,
    ) -> ControlResult<Vec<DidlItem>> {
        self.browse(device_id, "Q:0", offset, limit).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Playback Modes
    // ─────────────────────────────────────────────────────────────────────────

    /// Reads the current play mode (repeat, shuffle, crossfade).
    pub async fn get_play_mode(&self, device_id: &str) -> ControlResult<PlayMode> {
        let target = self.transport_target(device_id)?;

        let settings = self
            .soap(
                &target,
                SonosService::AVTransport,
                "GetTransportSettings",
                &[("InstanceID", "0".into())],
            )
            .await?;
        let (shuffle, repeat) = extract_xml_text(&settings, "PlayMode")
            .as_deref()
            .and_then(decode_play_mode)
            .unwrap_or((false, Repeat::None));

        let crossfade_body = self
            .soap(
                &target,
                SonosService::AVTransport,
                "GetCrossfadeMode",
                &[("InstanceID", "0".into())],
            )
            .await?;
        let crossfade = extract_xml_text(&crossfade_body, "CrossfadeMode")
            .map(|v| v == "1")
            .unwrap_or(false);

        Ok(PlayMode {
            repeat,
            shuffle,
            crossfade,
        })
    }

    async fn write_play_mode(
        &self,
        device_id: &str,
        shuffle: bool,
        repeat: Repeat,
    ) -> ControlResult<()> {
        let target = self.transport_target(device_id)?;
        self.soap(
            &target,
            SonosService::AVTransport,
            "SetPlayMode",
            &[
                ("InstanceID", "0".into()),
                ("NewPlayMode", encode_play_mode(shuffle, repeat).into()),
            ],
        )
        .await?;
        Ok(())
    }

    /// Sets the repeat mode, preserving the current shuffle setting.
    pub async fn set_repeat(&self, device_id: &str, repeat: Repeat) -> ControlResult<()> {
        let current = self.get_play_mode(device_id).await?;
        self.write_play_mode(device_id, current.shuffle, repeat).await
    }

    /// Sets shuffle, preserving repeat per the PlayMode table.
    ///
    /// Enabling shuffle while repeat-one is active collapses to
    /// shuffle-without-repeat: the combination is not representable.
    pub async fn set_shuffle(&self, device_id: &str, shuffle: bool) -> ControlResult<()> {
        let current = self.get_play_mode(device_id).await?;
        self.write_play_mode(device_id, shuffle, current.repeat).await
    }

    /// Enables or disables crossfade.
    pub async fn set_crossfade(&self, device_id: &str, crossfade: bool) -> ControlResult<()> {
        let target = self.transport_target(device_id)?;
        self.soap(
            &target,
            SonosService::AVTransport,
            "SetCrossfadeMode",
            &[
                ("InstanceID", "0".into()),
                ("CrossfadeMode", if crossfade { "1" } else { "0" }.into()),
            ],
        )
        .await?;
        Ok(())
    }

    /// Sets the sleep timer; 0 seconds cancels it.
    pub async fn set_sleep_timer(&self, device_id: &str, seconds: u32) -> ControlResult<()> {
        let target = self.transport_target(device_id)?;
        let duration = if seconds == 0 {
            String::new()
        } else {
            secs_to_hms(seconds)
        };
        self.soap(
            &target,
            SonosService::AVTransport,
            "ConfigureSleepTimer",
            &[
                ("InstanceID", "0".into()),
                ("NewSleepTimerDuration", duration),
            ],
        )
        .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State Polling & Change Detection
    // ─────────────────────────────────────────────────────────────────────────

    async fn poll_volume(&self, player: &Player) -> ControlResult<u8> {
        let response = self
            .soap(
                player,
                SonosService::RenderingControl,
                "GetVolume",
                &[("InstanceID", "0".into()), ("Channel", "Master".into())],
            )
            .await?;
        extract_xml_text(&response, "CurrentVolume")
            .and_then(|v| v.parse::<u8>().ok())
            .map(|v| v.min(100))
            .ok_or_else(|| ControlError::Transport("unparseable GetVolume response".into()))
    }

    async fn poll_mute(&self, player: &Player) -> ControlResult<bool> {
        let response = self
            .soap(
                player,
                SonosService::RenderingControl,
                "GetMute",
                &[("InstanceID", "0".into()), ("Channel", "Master".into())],
            )
            .await?;
        extract_xml_text(&response, "CurrentMute")
            .map(|v| v == "1")
            .ok_or_else(|| ControlError::Transport("unparseable GetMute response".into()))
    }

    /// Polls the device (transport, volume, mute, position in parallel),
    /// refreshes the cache, and returns the new state.
    pub async fn update_state(&self, device_id: &str) -> ControlResult<PlayerState> {
        let player = self.player(device_id)?;

        let transport_args = [("InstanceID", "0".into())];
        let transport_fut = self.soap(
            &player,
            SonosService::AVTransport,
            "GetTransportInfo",
            &transport_args,
        );
        let volume_fut = self.poll_volume(&player);
        let mute_fut = self.poll_mute(&player);
        let position_args = [("InstanceID", "0".into())];
        let position_fut = self.soap(
            &player,
            SonosService::AVTransport,
            "GetPositionInfo",
            &position_args,
        );

        let (transport_res, volume, mute, position_res) =
            tokio::join!(transport_fut, volume_fut, mute_fut, position_fut);

        let transport_body = transport_res?;
        let volume = volume?;
        let mute = mute?;
        let position_body = position_res?;

        let transport = extract_xml_text(&transport_body, "CurrentTransportState")
            .and_then(|s| s.parse::<TransportState>().ok())
            .unwrap_or(TransportState::Stopped);

        let track_uri = extract_xml_text(&position_body, "TrackURI").unwrap_or_default();
        let track_metadata = extract_xml_text(&position_body, "TrackMetaData");
        let track_duration = extract_xml_text(&position_body, "TrackDuration");
        let track = track_from_metadata(
            &track_uri,
            track_metadata.as_deref(),
            track_duration.as_deref(),
        );

        let state = PlayerState {
            transport,
            volume,
            mute,
            track,
        };
        self.apply_state(device_id, state.clone());

        Ok(state)
    }

    /// Replaces the cached state, emitting change events on differences.
    pub(crate) fn apply_state(&self, device_id: &str, current: PlayerState) {
        let previous = self.state_of(device_id);
        let events = diff_events(device_id, &previous, &current, now_millis());

        self.states.insert(device_id.to_string(), current);

        for event in events {
            self.hub.publish(event);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // NOTIFY Application
    // ─────────────────────────────────────────────────────────────────────────

    /// Applies an AVTransport NOTIFY body to the cached state.
    pub(crate) fn apply_av_transport_notify(&self, device_id: &str, body: &str) {
        let Some(update) = parse_av_transport_notify(body) else {
            return;
        };
        if update.is_empty() {
            return;
        }

        let mut state = self.state_of(device_id);

        if let Some(transport) = update
            .transport_state
            .as_deref()
            .and_then(|s| s.parse::<TransportState>().ok())
        {
            state.transport = transport;
        }

        if let Some(uri) = update.track_uri.as_deref() {
            state.track = track_from_metadata(
                uri,
                update.track_metadata.as_deref(),
                update.track_duration.as_deref(),
            );
        }

        self.apply_state(device_id, state);
    }

    /// Applies a RenderingControl NOTIFY body to the cached state.
    pub(crate) fn apply_rendering_notify(&self, device_id: &str, body: &str) {
        let Some(update) = parse_rendering_notify(body) else {
            return;
        };

        let mut state = self.state_of(device_id);
        if let Some(volume) = update.volume {
            state.volume = volume;
        }
        if let Some(mute) = update.mute {
            state.mute = mute;
        }

        self.apply_state(device_id, state);
    }

    /// Applies a GroupRenderingControl NOTIFY body.
    ///
    /// Unlike the LastChange services, group rendering reports plain
    /// elements. Values land in the member's cached state like
    /// per-player rendering updates.
    pub(crate) fn apply_group_rendering_notify(&self, device_id: &str, body: &str) {
        let volume = extract_xml_text(body, "GroupVolume")
            .and_then(|v| v.parse::<u8>().ok())
            .map(|v| v.min(100));
        let mute = extract_xml_text(body, "GroupMute").map(|v| v == "1");

        if volume.is_none() && mute.is_none() {
            return;
        }

        let mut state = self.state_of(device_id);
        if let Some(volume) = volume {
            state.volume = volume;
        }
        if let Some(mute) = mute {
            state.mute = mute;
        }
        self.apply_state(device_id, state);
    }

    /// Applies a ContentDirectory NOTIFY body, emitting content updates.
    pub(crate) fn apply_content_directory_notify(&self, device_id: &str, body: &str) {
        let Some(update_ids) = extract_xml_text(body, "ContainerUpdateIDs") else {
            return;
        };
        if update_ids.is_empty() {
            return;
        }

        // Format: "Q:0,123,SQ:,456" - (container, version) pairs.
        let containers: Vec<&str> = update_ids.split(',').step_by(2).collect();
        let timestamp = now_millis();
        for container_id in containers {
            if container_id.is_empty() {
                continue;
            }
            self.hub.publish(ControlEvent::ContentUpdate {
                device_id: device_id.to_string(),
                container_id: container_id.to_string(),
                timestamp,
            });
        }
    }
}
