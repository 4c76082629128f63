//! GENA subscription lifecycle management.
//!
//! Owns the callback listener, the subscription table, and the renewal
//! schedule. Subscription ids are deterministic
//! (`"{player_base_url}/{service_name}"`), so repeated subscribe calls
//! for the same (player, service) pair are idempotent and resolve to the
//! same callback path token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::gena_client::GenaClient;
use super::gena_store::{Subscription, SubscriptionStore};
use super::listener::{CallbackListener, RawNotify};
use super::services::SonosService;
use crate::protocol_constants::{GENA_RENEWAL_LEAD_SECS, GENA_SUBSCRIPTION_TIMEOUT_SECS};
use crate::registry::Player;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during GENA operations.
#[derive(Debug, Error)]
pub enum GenaError {
    /// HTTP request to the player failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Player rejected the SUBSCRIBE request.
    #[error("SUBSCRIBE failed with HTTP status {0}")]
    SubscribeFailed(u16),

    /// SUBSCRIBE succeeded but the response carried no SID header.
    #[error("SUBSCRIBE response missing SID header")]
    MissingSid,

    /// The callback listener could not be bound.
    #[error("failed to bind callback listener: {0}")]
    Bind(String),

    /// An operation requiring the listener was called before `start`.
    #[error("subscriber not started")]
    NotStarted,
}

/// Convenient Result alias for GENA operations.
pub type GenaResult<T> = Result<T, GenaError>;

// ─────────────────────────────────────────────────────────────────────────────
// Notify Dispatch
// ─────────────────────────────────────────────────────────────────────────────

/// Receiver of resolved NOTIFY bodies.
///
/// Implementations must not block: the dispatch loop serializes all
/// inbound notifications, so a slow handler stalls every subscription.
pub trait NotifyHandler: Send + Sync {
    /// Handles one NOTIFY body for a (player, service) pair.
    fn handle(&self, player_id: &str, service: SonosService, body: &str);
}

/// Resolved callback address used to build per-subscription URLs.
#[derive(Debug, Clone)]
struct CallbackContext {
    local_ip: String,
    port: u16,
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Coordinates GENA subscriptions for the whole fleet.
pub struct GenaSubscriptionManager {
    client: Arc<GenaClient>,
    store: Arc<SubscriptionStore>,
    handler: Arc<RwLock<Option<Arc<dyn NotifyHandler>>>>,
    callback: Arc<RwLock<Option<CallbackContext>>>,
    listener: Mutex<Option<CallbackListener>>,
    cancel: CancellationToken,
    subscription_timeout_secs: u64,
}

impl GenaSubscriptionManager {
    /// Creates a manager using the shared HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(GenaClient::new(client)),
            store: Arc::new(SubscriptionStore::new()),
            handler: Arc::new(RwLock::new(None)),
            callback: Arc::new(RwLock::new(None)),
            listener: Mutex::new(None),
            cancel: CancellationToken::new(),
            subscription_timeout_secs: GENA_SUBSCRIPTION_TIMEOUT_SECS,
        }
    }

    /// Overrides the requested subscription timeout (seconds).
    #[must_use]
    pub fn with_subscription_timeout(mut self, secs: u64) -> Self {
        self.subscription_timeout_secs = secs;
        self
    }

    /// Installs the NOTIFY handler. Must be called before `start`.
    pub fn set_handler(&self, handler: Arc<dyn NotifyHandler>) {
        *self.handler.write() = Some(handler);
    }

    /// Returns the deterministic subscription id for a (player, service) pair.
    #[must_use]
    pub fn subscription_id(player_base_url: &str, service: SonosService) -> String {
        format!("{}/{}", player_base_url, service.name())
    }

    /// Binds the callback listener and starts the dispatch loop.
    ///
    /// Detects the host's non-loopback IPv4 for callback URL construction.
    /// Port 0 picks any free port; the bound port is returned.
    pub async fn start(&self, port: u16, advertise_ip: Option<String>) -> GenaResult<u16> {
        let local_ip = match advertise_ip {
            Some(ip) => ip,
            None => local_ip_address::local_ip()
                .map_err(|e| GenaError::Bind(format!("local IP detection failed: {e}")))?
                .to_string(),
        };

        let (notify_tx, notify_rx) = mpsc::channel::<RawNotify>(256);
        let listener = CallbackListener::start(port, notify_tx).await?;
        let bound_port = listener.local_addr.port();

        *self.callback.write() = Some(CallbackContext {
            local_ip,
            port: bound_port,
        });
        *self.listener.lock().await = Some(listener);

        self.spawn_dispatch_loop(notify_rx);

        Ok(bound_port)
    }

    /// Builds the callback URL for a subscription id.
    ///
    /// # Errors
    /// Returns `NotStarted` before `start` has bound the listener.
    pub fn callback_url(&self, subscription_id: &str) -> GenaResult<String> {
        let ctx = self.callback.read().clone().ok_or(GenaError::NotStarted)?;
        Ok(format!(
            "http://{}:{}/notify/{}",
            ctx.local_ip,
            ctx.port,
            urlencoding::encode(subscription_id)
        ))
    }

    /// Subscribes to a player's service events.
    ///
    /// Idempotent: a repeat call for an already-subscribed (or currently
    /// subscribing) pair returns the existing id without a second remote
    /// SUBSCRIBE.
    pub async fn subscribe(
        &self,
        player: &Player,
        service: SonosService,
    ) -> GenaResult<String> {
        let id = Self::subscription_id(&player.base_url, service);

        if self.store.contains(&id) || !self.store.try_mark_pending(&id) {
            return Ok(id);
        }

        let callback_url = match self.callback_url(&id) {
            Ok(url) => url,
            Err(e) => {
                self.store.clear_pending(&id);
                return Err(e);
            }
        };
        let event_url = player.event_url(service);

        let response = match self
            .client
            .subscribe(&event_url, &callback_url, Some(self.subscription_timeout_secs))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                self.store.clear_pending(&id);
                return Err(e);
            }
        };

        log::info!(
            "[GENA] Subscribed {} on {} (sid={}, timeout={}s)",
            service.name(),
            player.uuid,
            response.sid,
            response.timeout_secs
        );

        let renew_cancel = self.cancel.child_token();
        self.store.insert(
            id.clone(),
            Subscription {
                sid: response.sid,
                player_id: player.uuid.clone(),
                service,
                event_url: event_url.clone(),
                expires_at: Instant::now() + Duration::from_secs(response.timeout_secs),
                renew_cancel: renew_cancel.clone(),
            },
        );

        self.spawn_renewal(
            id.clone(),
            event_url,
            callback_url,
            response.timeout_secs,
            renew_cancel,
        );

        Ok(id)
    }

    /// Returns true if the (player, service) pair has an active subscription.
    #[must_use]
    pub fn is_subscribed(&self, player_id: &str, service: SonosService) -> bool {
        self.store.is_subscribed(player_id, service)
    }

    /// Returns the number of active subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.store.len()
    }

    /// Unsubscribes by subscription id.
    ///
    /// Best-effort: local state is cleared regardless of whether the
    /// remote UNSUBSCRIBE succeeds.
    pub async fn unsubscribe(&self, subscription_id: &str) {
        if let Some(sub) = self.store.remove(subscription_id) {
            let ok = self.client.unsubscribe(&sub.event_url, &sub.sid).await;
            log::info!(
                "[GENA] Unsubscribed {} on {} (remote {})",
                sub.service.name(),
                sub.player_id,
                if ok { "ok" } else { "failed, ignored" }
            );
        }
    }

    /// Unsubscribes everything and shuts the listener down.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let drained = self.store.drain();
        for (_, sub) in drained {
            let ok = self.client.unsubscribe(&sub.event_url, &sub.sid).await;
            log::debug!(
                "[GENA] Teardown unsubscribe {} on {}: {}",
                sub.service.name(),
                sub.player_id,
                if ok { "ok" } else { "failed, ignored" }
            );
        }

        if let Some(listener) = self.listener.lock().await.take() {
            listener.stop().await;
        }
        *self.callback.write() = None;

        log::info!("[GENA] Subscriber stopped");
    }

    /// Spawns the loop that resolves raw NOTIFYs and feeds the handler.
    fn spawn_dispatch_loop(&self, mut notify_rx: mpsc::Receiver<RawNotify>) {
        let store = Arc::clone(&self.store);
        let handler = Arc::clone(&self.handler);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            loop {
                let raw = tokio::select! {
                    _ = cancel.cancelled() => break,
                    raw = notify_rx.recv() => match raw {
                        Some(raw) => raw,
                        None => break,
                    },
                };

                let Some((player_id, service)) = store.route(&raw.subscription_id) else {
                    log::debug!(
                        "[GENA] NOTIFY for unknown subscription {} dropped",
                        raw.subscription_id
                    );
                    continue;
                };

                let handler = handler.read().clone();
                if let Some(handler) = handler {
                    handler.handle(&player_id, service, &raw.body);
                }
            }
            log::debug!("[GENA] Dispatch loop ended");
        });
    }

    /// Spawns the renewal task for one subscription.
    ///
    /// Renewal fires at grant − 30 s and re-issues a fresh SUBSCRIBE
    /// (no SID). On failure the record is removed and nothing is surfaced;
    /// the next discovery or topology pass re-subscribes.
    fn spawn_renewal(
        &self,
        id: String,
        event_url: String,
        callback_url: String,
        granted_secs: u64,
        cancel: CancellationToken,
    ) {
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let requested = self.subscription_timeout_secs;

        tokio::spawn(async move {
            let mut delay = renewal_delay_secs(granted_secs);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_secs(delay)) => {}
                }

                match client
                    .subscribe(&event_url, &callback_url, Some(requested))
                    .await
                {
                    Ok(response) => {
                        log::debug!(
                            "[GENA] Renewed {} (sid={}, timeout={}s)",
                            id,
                            response.sid,
                            response.timeout_secs
                        );
                        store.update_grant(&id, response.sid, response.timeout_secs);
                        delay = renewal_delay_secs(response.timeout_secs);
                    }
                    Err(e) => {
                        log::warn!("[GENA] Renewal failed for {}: {}; dropping", id, e);
                        store.remove(&id);
                        return;
                    }
                }
            }
        });
    }
}

/// Seconds from grant to the renewal attempt (grant − 30 s, floor 1 s).
fn renewal_delay_secs(granted_secs: u64) -> u64 {
    granted_secs.saturating_sub(GENA_RENEWAL_LEAD_SECS).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_id_is_deterministic() {
        let a = GenaSubscriptionManager::subscription_id(
            "http://192.168.1.10:1400",
            SonosService::AVTransport,
        );
        let b = GenaSubscriptionManager::subscription_id(
            "http://192.168.1.10:1400",
            SonosService::AVTransport,
        );
        assert_eq!(a, b);
        assert_eq!(a, "http://192.168.1.10:1400/AVTransport");
    }

    #[test]
    fn renewal_fires_thirty_seconds_before_expiry() {
        assert_eq!(renewal_delay_secs(300), 270);
        assert_eq!(renewal_delay_secs(3600), 3570);
        // Degenerate short grants still sleep at least a second.
        assert_eq!(renewal_delay_secs(10), 1);
        assert_eq!(renewal_delay_secs(0), 1);
    }

    #[test]
    fn callback_url_requires_start() {
        let manager = GenaSubscriptionManager::new(reqwest::Client::new());
        assert!(matches!(
            manager.callback_url("http://192.168.1.10:1400/AVTransport"),
            Err(GenaError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn callback_url_encodes_subscription_id() {
        let manager = GenaSubscriptionManager::new(reqwest::Client::new());
        let port = manager
            .start(0, Some("192.168.1.5".into()))
            .await
            .expect("start");

        let url = manager
            .callback_url("http://192.168.1.10:1400/AVTransport")
            .expect("started");
        assert_eq!(
            url,
            format!(
                "http://192.168.1.5:{}/notify/http%3A%2F%2F192.168.1.10%3A1400%2FAVTransport",
                port
            )
        );

        manager.stop().await;
    }
}
