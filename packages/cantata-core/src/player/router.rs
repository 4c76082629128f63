//! Content URI routing.
//!
//! `play_uri` classifies an outbound URI by prefix and drives the correct
//! playback algorithm: direct SetAVTransportURI for streams, queue-based
//! enqueue for content-provider containers, browse-and-expand for library
//! playlists, and a group join for `x-rincon:` URIs.

use std::time::Duration;

use crate::error::{ControlError, ControlResult};
use crate::player::controller::{queue_uri, DeviceController};
use crate::protocol_constants::{
    BROWSE_EXPAND_LIMIT, HTTP_SETTLE_MS, PLAY_RETRY_DELAY_MS, TOPOLOGY_POLL_MS, TOPOLOGY_WAIT_MS,
    UPNP_ERR_TRANSITION_UNAVAILABLE,
};

/// Classification of an outbound content URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriClass {
    /// Broadcast/streaming URI consumable directly by SetAVTransportURI.
    Direct,
    /// Content-provider container; enqueue then play from the queue.
    QueueContainer,
    /// Library playlist; browse it and enqueue its items individually.
    LibraryPlaylist,
    /// `x-rincon:` group-member URI; the device follows a coordinator.
    GroupMember,
}

/// Classifies a URI by its prefix.
///
/// Unknown schemes deliberately fall back to `Direct` rather than
/// erroring: devices accept more schemes than this table knows about.
#[must_use]
pub fn classify_uri(uri: &str) -> UriClass {
    if uri.starts_with("x-rincon-playlist:") {
        UriClass::LibraryPlaylist
    } else if uri.starts_with("x-rincon-cpcontainer:") {
        UriClass::QueueContainer
    } else if uri.starts_with("x-rincon:") {
        UriClass::GroupMember
    } else {
        UriClass::Direct
    }
}

impl DeviceController {
    /// Plays a URI on a device, choosing the playback path by URI class.
    pub async fn play_uri(
        &self,
        device_id: &str,
        uri: &str,
        metadata: &str,
    ) -> ControlResult<()> {
        match classify_uri(uri) {
            UriClass::LibraryPlaylist => self.play_library_playlist(device_id, uri).await,
            UriClass::QueueContainer => self.play_queue_container(device_id, uri, metadata).await,
            UriClass::GroupMember => self.play_group_member(device_id, uri).await,
            UriClass::Direct => self.play_direct(device_id, uri, metadata).await,
        }
    }

    /// Waits briefly for topology data, then makes sure the device
    /// coordinates its zone.
    ///
    /// Topology may lag right after startup; after ~300 ms without data
    /// the device attempts becomeCoordinator anyway (1023 tolerated, so
    /// a slave that cannot comply is left as-is).
    async fn ensure_coordinator(&self, device_id: &str) -> ControlResult<()> {
        let mut waited = Duration::ZERO;
        let wait_limit = Duration::from_millis(TOPOLOGY_WAIT_MS);
        while !self.topology().has_topology() && waited < wait_limit {
            tokio::time::sleep(Duration::from_millis(TOPOLOGY_POLL_MS)).await;
            waited += Duration::from_millis(TOPOLOGY_POLL_MS);
        }

        if self.topology().has_topology() && self.topology().is_coordinator(device_id) {
            return Ok(());
        }

        self.become_coordinator(device_id).await
    }

    /// Sends Play to the addressed player, retrying once after ~1 s on
    /// UPnP fault 701 (device still buffering the freshly set URI).
    ///
    /// Self-addressed on purpose: after ensure-coordinator the topology
    /// snapshot may still describe the old group, so coordinator routing
    /// would target the wrong player.
    async fn play_with_701_retry(&self, player: &crate::registry::Player) -> ControlResult<()> {
        match self.play_on(player).await {
            Err(e) if e.fault_code() == Some(UPNP_ERR_TRANSITION_UNAVAILABLE) => {
                log::info!(
                    "[Router] Play on {} returned 701; retrying after {}ms",
                    player.uuid,
                    PLAY_RETRY_DELAY_MS
                );
                tokio::time::sleep(Duration::from_millis(PLAY_RETRY_DELAY_MS)).await;
                self.play_on(player).await
            }
            other => other,
        }
    }

    /// Library playlist: clear the queue, browse the playlist, enqueue
    /// every item, switch to the queue, play.
    async fn play_library_playlist(&self, device_id: &str, uri: &str) -> ControlResult<()> {
        let object_id = uri.split_once('#').map(|(_, id)| id).ok_or_else(|| {
            ControlError::InvalidArgument(format!("playlist URI without object id: {uri}"))
        })?;

        let player = self.player(device_id)?;
        self.ensure_coordinator(device_id).await?;
        self.clear_queue_on(&player).await?;

        let items = self
            .browse(device_id, object_id, 0, BROWSE_EXPAND_LIMIT)
            .await?;
        log::info!(
            "[Router] Expanding playlist {} into {} item(s) on {}",
            object_id,
            items.len(),
            device_id
        );

        for item in &items {
            let Some(item_uri) = item.uri.as_deref() else {
                continue;
            };
            if item.metadata.is_empty() {
                continue;
            }
            self.add_uri_to_queue_on(&player, item_uri, &item.metadata, false, 0)
                .await?;
        }

        self.set_av_transport_uri(device_id, &queue_uri(device_id), "")
            .await?;
        self.play_with_701_retry(&player).await
    }

    /// Content-provider container: enqueue the container itself, switch
    /// to the queue, play.
    async fn play_queue_container(
        &self,
        device_id: &str,
        uri: &str,
        metadata: &str,
    ) -> ControlResult<()> {
        let player = self.player(device_id)?;
        self.ensure_coordinator(device_id).await?;
        self.clear_queue_on(&player).await?;
        self.add_uri_to_queue_on(&player, uri, metadata, false, 0)
            .await?;
        self.set_av_transport_uri(device_id, &queue_uri(device_id), "")
            .await?;
        self.play_with_701_retry(&player).await
    }

    /// Group-member URI: point the transport at the coordinator and play.
    async fn play_group_member(&self, device_id: &str, uri: &str) -> ControlResult<()> {
        let player = self.player(device_id)?;
        self.set_av_transport_uri(device_id, uri, "").await?;
        self.play_on(&player).await
    }

    /// Direct URI: stop whatever plays, set the URI, give http(s)
    /// sources a settle interval to buffer, then play.
    async fn play_direct(&self, device_id: &str, uri: &str, metadata: &str) -> ControlResult<()> {
        let player = self.player(device_id)?;
        self.ensure_coordinator(device_id).await?;

        // Best-effort stop; failure must not prevent the new source.
        if let Err(e) = self.stop_on(&player).await {
            log::debug!("[Router] Pre-play stop on {} failed: {}", device_id, e);
        }

        self.set_av_transport_uri(device_id, uri, metadata).await?;

        if uri.starts_with("http://") || uri.starts_with("https://") {
            tokio::time::sleep(Duration::from_millis(HTTP_SETTLE_MS)).await;
        }

        self.play_with_701_retry(&player).await
    }
}
