//! NOTIFY routing and per-player serialization.
//!
//! The GENA dispatch loop hands resolved NOTIFY bodies here. Topology
//! events are applied inline (the topology manager is cheap and already
//! serializes internally); device events are pushed onto a per-player
//! worker so each player's notifications are processed in arrival order
//! without blocking the dispatch loop or other players.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::player::DeviceController;
use crate::protocol_constants::NOTIFY_WORKER_QUEUE_CAPACITY;
use crate::sonos::gena::NotifyHandler;
use crate::sonos::services::SonosService;
use crate::topology::TopologyManager;

struct DeviceNotification {
    service: SonosService,
    body: String,
}

/// Routes NOTIFY bodies to the topology manager and per-player workers.
pub struct NotifyProcessor {
    controller: Arc<DeviceController>,
    topology: Arc<TopologyManager>,
    workers: DashMap<String, mpsc::Sender<DeviceNotification>>,
    cancel: CancellationToken,
}

impl NotifyProcessor {
    /// Creates a processor over the controller and topology manager.
    #[must_use]
    pub fn new(
        controller: Arc<DeviceController>,
        topology: Arc<TopologyManager>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            controller,
            topology,
            workers: DashMap::new(),
            cancel,
        }
    }

    /// Returns the sender of the player's worker, spawning it on first use.
    fn worker_for(&self, player_id: &str) -> mpsc::Sender<DeviceNotification> {
        use dashmap::mapref::entry::Entry;

        let (tx, mut rx) = match self.workers.entry(player_id.to_string()) {
            Entry::Occupied(entry) => return entry.get().clone(),
            Entry::Vacant(entry) => {
                let (tx, rx) = mpsc::channel::<DeviceNotification>(NOTIFY_WORKER_QUEUE_CAPACITY);
                entry.insert(tx.clone());
                (tx, rx)
            }
        };

        let controller = Arc::clone(&self.controller);
        let cancel = self.cancel.clone();
        let player_id = player_id.to_string();

        tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    _ = cancel.cancelled() => break,
                    n = rx.recv() => match n {
                        Some(n) => n,
                        None => break,
                    },
                };

                match notification.service {
                    SonosService::AVTransport => {
                        controller.apply_av_transport_notify(&player_id, &notification.body);
                    }
                    SonosService::RenderingControl => {
                        controller.apply_rendering_notify(&player_id, &notification.body);
                    }
                    SonosService::GroupRenderingControl => {
                        controller.apply_group_rendering_notify(&player_id, &notification.body);
                    }
                    SonosService::ContentDirectory => {
                        controller.apply_content_directory_notify(&player_id, &notification.body);
                    }
                    SonosService::ZoneGroupTopology => {
                        // Handled inline in `handle`; never queued.
                    }
                }
            }
            log::debug!("[Notify] Worker for {} ended", player_id);
        });

        tx
    }
}

impl NotifyHandler for NotifyProcessor {
    fn handle(&self, player_id: &str, service: SonosService, body: &str) {
        if service == SonosService::ZoneGroupTopology {
            // Every player broadcasts topology; the manager dedups by
            // payload, so inline handling is cheap and ordering-free.
            self.topology.handle_notify(body);
            return;
        }

        let sender = self.worker_for(player_id);
        if sender
            .try_send(DeviceNotification {
                service,
                body: body.to_string(),
            })
            .is_err()
        {
            log::warn!(
                "[Notify] Worker queue for {} full; {} event dropped",
                player_id,
                service.name()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ControlEvent, EventHub};
    use crate::player::TransportState;
    use crate::registry::{testing::player, PlayerRegistry};
    use crate::sonos::test_fixtures::{
        topology_notify_body, AV_TRANSPORT_NOTIFY, RENDERING_NOTIFY_STEREO,
        ZONE_GROUP_STATE_STEREO,
    };
    use crate::sonos::traits::{testing::RecordingTransport, SoapTransport};

    struct Fixture {
        hub: Arc<EventHub>,
        controller: Arc<DeviceController>,
        topology: Arc<TopologyManager>,
        processor: NotifyProcessor,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(PlayerRegistry::new());
        let hub = Arc::new(EventHub::new());
        let topology = Arc::new(TopologyManager::new(Arc::clone(&registry), Arc::clone(&hub)));
        registry.insert(player("RINCON_A01400", "192.168.1.10", "Kitchen"));
        registry.insert(player("RINCON_B01400", "192.168.1.11", "Kitchen"));

        let controller = Arc::new(DeviceController::new(
            Arc::new(RecordingTransport::new()) as Arc<dyn SoapTransport>,
            registry,
            Arc::clone(&topology),
            Arc::clone(&hub),
        ));

        let processor = NotifyProcessor::new(
            Arc::clone(&controller),
            Arc::clone(&topology),
            CancellationToken::new(),
        );

        Fixture {
            hub,
            controller,
            topology,
            processor,
        }
    }

    #[tokio::test]
    async fn topology_notifies_are_applied_inline() {
        let f = fixture();
        f.processor.handle(
            "RINCON_A01400",
            SonosService::ZoneGroupTopology,
            &topology_notify_body(ZONE_GROUP_STATE_STEREO),
        );
        // No task hop for topology: visible immediately.
        assert_eq!(f.topology.zones().len(), 1);
    }

    #[tokio::test]
    async fn device_notifies_reach_the_controller_in_order() {
        let f = fixture();
        let events = f.hub.capture();

        f.processor.handle(
            "RINCON_A01400",
            SonosService::AVTransport,
            AV_TRANSPORT_NOTIFY,
        );
        f.processor.handle(
            "RINCON_A01400",
            SonosService::RenderingControl,
            RENDERING_NOTIFY_STEREO,
        );

        // Let the worker drain.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let state = f.controller.state_of("RINCON_A01400");
        assert_eq!(state.transport, TransportState::Playing);
        assert_eq!(state.volume, 60);

        // Transport change was observed before the volume change.
        let captured = events.lock();
        let transport_pos = captured
            .iter()
            .position(|e| matches!(e, ControlEvent::DeviceStateChange { .. }))
            .unwrap();
        let volume_pos = captured
            .iter()
            .position(|e| matches!(e, ControlEvent::VolumeChange { .. }))
            .unwrap();
        assert!(transport_pos < volume_pos);
    }

    #[tokio::test]
    async fn workers_are_per_player() {
        let f = fixture();

        f.processor.handle(
            "RINCON_A01400",
            SonosService::AVTransport,
            AV_TRANSPORT_NOTIFY,
        );
        f.processor.handle(
            "RINCON_B01400",
            SonosService::RenderingControl,
            RENDERING_NOTIFY_STEREO,
        );

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(f.processor.workers.len(), 2);
        assert_eq!(
            f.controller.state_of("RINCON_B01400").volume,
            60
        );
    }
}
