//! Application bootstrap and dependency wiring.
//!
//! The composition root: every collaborator is instantiated and wired
//! here, in dependency order, with no global state. The former habit of
//! a process-wide discovery reference is replaced by explicit injection;
//! components that need a back-edge (a controller asking who coordinates
//! a device) hold a narrow read-only handle instead.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{ControlError, ControlResult};
use crate::events::{EventConsumer, EventHub, WebhookConsumer};
use crate::player::DeviceController;
use crate::protocol_constants::SHUTDOWN_TIMEOUT_SECS;
use crate::registry::PlayerRegistry;
use crate::services::{DiscoveryService, NotifyProcessor};
use crate::sonos::gena::GenaSubscriptionManager;
use crate::sonos::traits::{HttpSoapTransport, SoapTransport};
use crate::topology::TopologyManager;

/// Container for all bootstrapped services.
pub struct CantataServices {
    /// The live player registry.
    pub registry: Arc<PlayerRegistry>,
    /// Zone topology view.
    pub topology: Arc<TopologyManager>,
    /// Per-player operations façade.
    pub controller: Arc<DeviceController>,
    /// Event fan-out surface.
    pub hub: Arc<EventHub>,
    /// GENA subscription manager.
    pub gena: Arc<GenaSubscriptionManager>,
    /// Discovery orchestration.
    pub discovery: Arc<DiscoveryService>,
    /// Shared HTTP client for collaborators needing one.
    http_client: Client,
    /// Root cancellation token for background tasks.
    pub cancel_token: CancellationToken,
}

impl CantataServices {
    /// Returns the shared HTTP client.
    #[must_use]
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Starts the callback listener and the discovery loop.
    ///
    /// Returns the bound callback port.
    pub async fn start(&self, config: &Config) -> ControlResult<u16> {
        let port = self
            .gena
            .start(config.callback_port, config.advertise_ip.clone())
            .await?;
        log::info!("[Bootstrap] Callback listener on port {}", port);

        self.discovery.start();
        Ok(port)
    }

    /// Graceful, bounded shutdown.
    ///
    /// Order matters: stop discovery first (no new subscriptions), then
    /// unsubscribe everything and close the listener, then clear the
    /// registry. Bounded to ~10 s; what has not finished by then is
    /// abandoned with the process.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        let sequence = async {
            self.discovery.shutdown().await;
            self.gena.stop().await;
            self.cancel_token.cancel();
            self.registry.clear();
        };

        if tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), sequence)
            .await
            .is_err()
        {
            log::error!(
                "[Bootstrap] Shutdown exceeded {}s; abandoning remaining teardown",
                SHUTDOWN_TIMEOUT_SECS
            );
        } else {
            log::info!("[Bootstrap] Shutdown complete");
        }
    }
}

/// Creates the shared HTTP client for all device communication.
///
/// One client means one connection pool across SOAP, GENA, description
/// fetches, and webhooks.
fn create_http_client(config: &Config) -> ControlResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.soap_timeout_secs))
        .build()
        .map_err(|e| ControlError::Transport(format!("failed to create HTTP client: {e}")))
}

/// Bootstraps all services with their dependencies.
///
/// Wiring order:
/// 1. Shared infrastructure (HTTP client, hub, cancellation token)
/// 2. Registry and topology
/// 3. Device controller (SOAP transport seam)
/// 4. GENA manager + NOTIFY processor
/// 5. Discovery service
///
/// Webhook consumers from the configuration are registered with the hub;
/// entries with invalid URLs are dropped.
pub fn bootstrap_services(config: &Config) -> ControlResult<CantataServices> {
    let http_client = create_http_client(config)?;
    let cancel_token = CancellationToken::new();

    let hub = Arc::new(EventHub::new());
    for webhook in &config.webhooks {
        if let Some(consumer) = WebhookConsumer::from_config(http_client.clone(), webhook.clone())
        {
            hub.register(Arc::new(consumer) as Arc<dyn EventConsumer>);
        }
    }

    let registry = Arc::new(PlayerRegistry::new());
    let topology = Arc::new(TopologyManager::new(Arc::clone(&registry), Arc::clone(&hub)));

    let soap_transport: Arc<dyn SoapTransport> = Arc::new(HttpSoapTransport::new(
        http_client.clone(),
        Duration::from_secs(config.soap_timeout_secs),
    ));
    let controller = Arc::new(DeviceController::new(
        soap_transport,
        Arc::clone(&registry),
        Arc::clone(&topology),
        Arc::clone(&hub),
    ));

    let gena = Arc::new(
        GenaSubscriptionManager::new(http_client.clone())
            .with_subscription_timeout(config.subscription_timeout_secs),
    );
    let processor = Arc::new(NotifyProcessor::new(
        Arc::clone(&controller),
        Arc::clone(&topology),
        cancel_token.clone(),
    ));
    gena.set_handler(processor);

    let discovery = Arc::new(DiscoveryService::new(
        http_client.clone(),
        config,
        Arc::clone(&registry),
        Arc::clone(&topology),
        Arc::clone(&gena),
        Arc::clone(&controller),
        cancel_token.child_token(),
    ));

    Ok(CantataServices {
        registry,
        topology,
        controller,
        hub,
        gena,
        discovery,
        http_client,
        cancel_token,
    })
}
