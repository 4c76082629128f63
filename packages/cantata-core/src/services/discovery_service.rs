//! Discovery orchestration.
//!
//! Runs the periodic discovery sweep: SSDP + mDNS, device-description
//! fetch for new sightings, registry insertion, and the subscription
//! sync that keeps every player's event feeds alive. Re-sweeps only
//! confirm presence - the registry never evicts.

use std::sync::Arc;
use std::time::Duration;

use mdns_sd::ServiceDaemon;
use reqwest::Client;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::player::DeviceController;
use crate::protocol_constants::{DEVICE_DESCRIPTION_PATH, PLAYER_HTTP_PORT};
use crate::registry::{Player, PlayerRegistry};
use crate::sonos::device::parse_device_description;
use crate::sonos::discovery::{
    discover_all, mdns, DiscoveredDevice, DiscoveryConfig, DiscoveryError, DiscoveryResult,
};
use crate::sonos::gena::GenaSubscriptionManager;
use crate::sonos::services::SonosService;
use crate::sonos::soap::SoapRequestBuilder;
use crate::topology::TopologyManager;
use crate::utils::{extract_ip_from_location, extract_xml_text};

/// Capacity of the device-found broadcast channel.
const DEVICE_FOUND_CAPACITY: usize = 32;

/// Orchestrates discovery sweeps and subscription upkeep.
pub struct DiscoveryService {
    http: Client,
    registry: Arc<PlayerRegistry>,
    topology: Arc<TopologyManager>,
    gena: Arc<GenaSubscriptionManager>,
    controller: Arc<DeviceController>,
    discovery_config: DiscoveryConfig,
    interval: Duration,
    mdns_daemon: Option<Arc<ServiceDaemon>>,
    device_found_tx: broadcast::Sender<Arc<Player>>,
    cancel: CancellationToken,
}

impl DiscoveryService {
    /// Creates the service; the mDNS daemon is created lazily here so a
    /// failing daemon degrades to SSDP-only discovery.
    #[must_use]
    pub fn new(
        http: Client,
        config: &Config,
        registry: Arc<PlayerRegistry>,
        topology: Arc<TopologyManager>,
        gena: Arc<GenaSubscriptionManager>,
        controller: Arc<DeviceController>,
        cancel: CancellationToken,
    ) -> Self {
        let discovery_config = config.discovery_config();
        let mdns_daemon = if discovery_config.enable_mdns {
            match mdns::create_daemon() {
                Ok(daemon) => Some(Arc::new(daemon)),
                Err(e) => {
                    log::warn!("[Discovery] mDNS daemon unavailable: {}; SSDP only", e);
                    None
                }
            }
        } else {
            None
        };

        let (device_found_tx, _) = broadcast::channel(DEVICE_FOUND_CAPACITY);

        Self {
            http,
            registry,
            topology,
            gena,
            controller,
            discovery_config,
            interval: Duration::from_secs(config.discovery_interval_secs),
            mdns_daemon,
            device_found_tx,
            cancel,
        }
    }

    /// Subscribes to new-player announcements.
    #[must_use]
    pub fn subscribe_device_found(&self) -> broadcast::Receiver<Arc<Player>> {
        self.device_found_tx.subscribe()
    }

    /// Spawns the periodic sweep loop.
    pub fn start(self: &Arc<Self>) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if let Err(e) = service.sweep().await {
                    log::warn!("[Discovery] Sweep failed: {}", e);
                }

                tokio::select! {
                    _ = service.cancel.cancelled() => break,
                    _ = tokio::time::sleep(service.interval) => {}
                }
            }
            log::debug!("[Discovery] Sweep loop ended");
        });
    }

    /// Runs one discovery sweep.
    pub async fn sweep(&self) -> DiscoveryResult<()> {
        let devices = discover_all(&self.discovery_config, self.mdns_daemon.as_ref()).await?;
        log::debug!("[Discovery] Sweep saw {} device(s)", devices.len());

        for device in devices {
            if self.registry.by_id(&device.uuid).is_some() {
                // Known player; the sighting merely confirms presence.
                continue;
            }

            match self.add_device(&device).await {
                Ok(player) => {
                    log::info!(
                        "[Discovery] Found player {} ({}) at {}",
                        player.room_name,
                        player.uuid,
                        player.ip
                    );
                    let _ = self.device_found_tx.send(Arc::clone(&player));
                    self.on_device_found(player).await;
                }
                Err(e) => {
                    log::warn!("[Discovery] Skipping {}: {}", device.uuid, e);
                }
            }
        }

        self.sync_subscriptions().await;
        Ok(())
    }

    /// Fetches and parses a device description, inserting the player.
    async fn add_device(&self, device: &DiscoveredDevice) -> DiscoveryResult<Arc<Player>> {
        let location = device.location.clone().unwrap_or_else(|| {
            format!(
                "http://{}:{}{}",
                device.ip, PLAYER_HTTP_PORT, DEVICE_DESCRIPTION_PATH
            )
        });

        let xml = self
            .http
            .get(&location)
            .send()
            .await
            .map_err(|e| DiscoveryError::DeviceDescription {
                location: location.clone(),
                reason: e.to_string(),
            })?
            .text()
            .await
            .map_err(|e| DiscoveryError::DeviceDescription {
                location: location.clone(),
                reason: e.to_string(),
            })?;

        let description =
            parse_device_description(&xml).map_err(|e| DiscoveryError::DeviceDescription {
                location: location.clone(),
                reason: e.to_string(),
            })?;

        // Infrastructure devices (bridges/boosts) declare no media
        // renderer and would never accept transport commands.
        if description
            .model_name
            .to_lowercase()
            .contains("boost")
            || description.model_name.to_lowercase().contains("bridge")
        {
            return Err(DiscoveryError::DeviceDescription {
                location,
                reason: format!("infrastructure device ({})", description.model_name),
            });
        }

        let ip = extract_ip_from_location(&location).unwrap_or_else(|| device.ip.clone());
        let player = Player::from_description(&ip, description);

        self.registry
            .insert(player)
            .ok_or_else(|| DiscoveryError::DeviceDescription {
                location,
                reason: "player already registered".to_string(),
            })
    }

    /// Per-new-player follow-up: topology subscription and an initial
    /// state poll to warm the cache.
    async fn on_device_found(&self, player: Arc<Player>) {
        // The first NOTIFY can lag the SUBSCRIBE by seconds; fetch the
        // topology directly so coordinator routing works immediately.
        if !self.topology.has_topology() {
            self.fetch_initial_topology(&player).await;
        }

        // Topology events are broadcast by all devices and deduplicated
        // by payload, so every player carries a topology subscription.
        if let Err(e) = self
            .gena
            .subscribe(&player, SonosService::ZoneGroupTopology)
            .await
        {
            log::warn!(
                "[Discovery] Topology subscription on {} failed: {}",
                player.uuid,
                e
            );
        }

        let controller = Arc::clone(&self.controller);
        let uuid = player.uuid.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.update_state(&uuid).await {
                log::debug!("[Discovery] Initial state poll of {} failed: {}", uuid, e);
            }
        });
    }

    /// Fetches the current ZoneGroupState from one player via SOAP and
    /// applies it. Any player can answer; the document describes the
    /// whole fleet.
    async fn fetch_initial_topology(&self, player: &Player) {
        let response = SoapRequestBuilder::new(
            &self.http,
            player.soap_target(SonosService::ZoneGroupTopology),
        )
        .action("GetZoneGroupState")
        .send()
        .await;

        match response {
            Ok(body) => {
                if let Some(zone_state) = extract_xml_text(&body, "ZoneGroupState") {
                    self.topology.apply_zone_group_state(&zone_state);
                }
            }
            Err(e) => {
                log::debug!(
                    "[Discovery] Initial topology fetch from {} failed: {}",
                    player.uuid,
                    e
                );
            }
        }
    }

    /// Ensures device-event subscriptions exist for every player.
    ///
    /// Stereo-pair secondaries neither serve events reliably nor accept
    /// transport subscriptions, so all AVTransport/RenderingControl
    /// subscriptions target the pair primary; other players subscribe on
    /// themselves. Subscribe calls are idempotent, so re-running after
    /// every sweep and topology change is safe.
    pub async fn sync_subscriptions(&self) {
        for player in self.registry.all() {
            if event_subscription_target(&self.topology, &player) != player.uuid {
                continue;
            }

            for service in [SonosService::AVTransport, SonosService::RenderingControl] {
                if let Err(e) = self.gena.subscribe(&player, service).await {
                    log::debug!(
                        "[Discovery] {} subscription on {} failed: {}",
                        service.name(),
                        player.uuid,
                        e
                    );
                }
            }
        }
    }

    /// Stops the sweep loop.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Resolves the player whose event feeds cover a room.
///
/// Rooms with a stereo pair resolve to the pair primary (the `:LF`
/// channel holder); everything else subscribes on itself.
fn event_subscription_target(topology: &TopologyManager, player: &Player) -> String {
    topology
        .stereo_pair_primary(&player.room_name)
        .unwrap_or_else(|| player.uuid.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHub;
    use crate::registry::testing::player;
    use crate::sonos::test_fixtures::ZONE_GROUP_STATE_STEREO;

    #[test]
    fn stereo_pair_subscriptions_target_the_primary() {
        let registry = Arc::new(PlayerRegistry::new());
        let hub = Arc::new(EventHub::new());
        let topology = Arc::new(TopologyManager::new(Arc::clone(&registry), hub));

        let primary = player("RINCON_A01400", "192.168.1.10", "Kitchen");
        let secondary = player("RINCON_B01400", "192.168.1.11", "Kitchen");
        registry.insert(primary.clone());
        registry.insert(secondary.clone());
        topology.apply_zone_group_state(ZONE_GROUP_STATE_STEREO);

        // Both members of the pair resolve to the LF holder.
        assert_eq!(
            event_subscription_target(&topology, &primary),
            "RINCON_A01400"
        );
        assert_eq!(
            event_subscription_target(&topology, &secondary),
            "RINCON_A01400"
        );
    }

    #[test]
    fn unpaired_players_subscribe_on_themselves() {
        let registry = Arc::new(PlayerRegistry::new());
        let hub = Arc::new(EventHub::new());
        let topology = Arc::new(TopologyManager::new(Arc::clone(&registry), hub));

        let solo = player("RINCON_C01400", "192.168.1.12", "Office");
        registry.insert(solo.clone());

        // No topology yet: the player is its own event target.
        assert_eq!(
            event_subscription_target(&topology, &solo),
            "RINCON_C01400"
        );
    }
}
