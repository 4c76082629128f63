//! GENA subscription state management.
//!
//! Pure data structure for tracking active subscriptions without I/O.
//! Subscriptions are keyed by their deterministic id
//! `"{player_base_url}/{service_name}"`, which is also the path token the
//! callback listener resolves NOTIFYs with. A single mutex guards the
//! table; contention is O(players × services) and low.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::services::SonosService;

/// One live subscription record.
#[derive(Debug, Clone)]
pub(crate) struct Subscription {
    /// Server-assigned subscription identifier from the SUBSCRIBE response.
    pub sid: String,
    /// Target player id (registry UUID).
    pub player_id: String,
    /// Subscribed service.
    pub service: SonosService,
    /// Absolute event URL the SUBSCRIBE was sent to.
    pub event_url: String,
    /// When the current grant expires.
    pub expires_at: Instant,
    /// Cancels the pending renewal task for this record.
    pub renew_cancel: CancellationToken,
}

/// State container for GENA subscriptions.
#[derive(Default)]
pub(crate) struct SubscriptionStore {
    subscriptions: Mutex<HashMap<String, Subscription>>,
    /// In-flight SUBSCRIBE requests, to keep concurrent subscribe calls
    /// for the same id from issuing a second remote SUBSCRIBE.
    pending: Mutex<HashSet<String>>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a subscription with this id is active.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.subscriptions.lock().contains_key(id)
    }

    /// Attempts to mark a subscription id as in-flight.
    ///
    /// Returns false if the subscription already exists or another call is
    /// already subscribing it.
    pub fn try_mark_pending(&self, id: &str) -> bool {
        if self.subscriptions.lock().contains_key(id) {
            return false;
        }
        self.pending.lock().insert(id.to_string())
    }

    /// Clears the in-flight marker for an id.
    pub fn clear_pending(&self, id: &str) {
        self.pending.lock().remove(id);
    }

    /// Inserts a subscription, replacing (and cancelling the renewal of)
    /// any previous record under the same id.
    pub fn insert(&self, id: String, sub: Subscription) {
        self.pending.lock().remove(&id);
        if let Some(previous) = self.subscriptions.lock().insert(id, sub) {
            previous.renew_cancel.cancel();
        }
    }

    /// Removes a subscription by id, cancelling its renewal task.
    pub fn remove(&self, id: &str) -> Option<Subscription> {
        let removed = self.subscriptions.lock().remove(id);
        if let Some(sub) = &removed {
            sub.renew_cancel.cancel();
        }
        removed
    }

    /// Looks up the NOTIFY routing info for a subscription id.
    #[must_use]
    pub fn route(&self, id: &str) -> Option<(String, SonosService)> {
        self.subscriptions
            .lock()
            .get(id)
            .map(|s| (s.player_id.clone(), s.service))
    }

    /// Returns true if the (player, service) pair has an active subscription.
    #[must_use]
    pub fn is_subscribed(&self, player_id: &str, service: SonosService) -> bool {
        self.subscriptions
            .lock()
            .values()
            .any(|s| s.player_id == player_id && s.service == service)
    }

    /// Updates SID and expiry after a successful renewal.
    pub fn update_grant(&self, id: &str, sid: String, timeout_secs: u64) {
        if let Some(sub) = self.subscriptions.lock().get_mut(id) {
            sub.sid = sid;
            sub.expires_at = Instant::now() + Duration::from_secs(timeout_secs);
        }
    }

    /// Drains every subscription, cancelling all renewal tasks.
    pub fn drain(&self) -> Vec<(String, Subscription)> {
        let drained: Vec<_> = self.subscriptions.lock().drain().collect();
        for (_, sub) in &drained {
            sub.renew_cancel.cancel();
        }
        drained
    }

    /// Returns all active subscription ids.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.subscriptions.lock().keys().cloned().collect()
    }

    /// Returns the number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Returns true if there are no active subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(player: &str, service: SonosService) -> Subscription {
        Subscription {
            sid: "uuid:sub-1".into(),
            player_id: player.into(),
            service,
            event_url: "http://192.168.1.10:1400/MediaRenderer/AVTransport/Event".into(),
            expires_at: Instant::now() + Duration::from_secs(300),
            renew_cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn insert_and_route() {
        let store = SubscriptionStore::new();
        store.insert(
            "http://192.168.1.10:1400/AVTransport".into(),
            sub("RINCON_A", SonosService::AVTransport),
        );

        assert!(store.contains("http://192.168.1.10:1400/AVTransport"));
        assert_eq!(
            store.route("http://192.168.1.10:1400/AVTransport"),
            Some(("RINCON_A".to_string(), SonosService::AVTransport))
        );
        assert!(store.is_subscribed("RINCON_A", SonosService::AVTransport));
        assert!(!store.is_subscribed("RINCON_A", SonosService::RenderingControl));
    }

    #[test]
    fn pending_prevents_duplicate_subscribe() {
        let store = SubscriptionStore::new();
        assert!(store.try_mark_pending("id-1"));
        assert!(!store.try_mark_pending("id-1"));
        store.clear_pending("id-1");
        assert!(store.try_mark_pending("id-1"));
    }

    #[test]
    fn existing_subscription_prevents_pending() {
        let store = SubscriptionStore::new();
        store.insert("id-1".into(), sub("RINCON_A", SonosService::AVTransport));
        assert!(!store.try_mark_pending("id-1"));
    }

    #[test]
    fn insert_cancels_replaced_renewal() {
        let store = SubscriptionStore::new();
        let first = sub("RINCON_A", SonosService::AVTransport);
        let first_cancel = first.renew_cancel.clone();
        store.insert("id-1".into(), first);

        store.insert("id-1".into(), sub("RINCON_A", SonosService::AVTransport));
        assert!(first_cancel.is_cancelled());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_cancels_renewal() {
        let store = SubscriptionStore::new();
        let record = sub("RINCON_A", SonosService::AVTransport);
        let cancel = record.renew_cancel.clone();
        store.insert("id-1".into(), record);

        let removed = store.remove("id-1");
        assert!(removed.is_some());
        assert!(cancel.is_cancelled());
        assert!(store.is_empty());
    }

    #[test]
    fn drain_cancels_everything() {
        let store = SubscriptionStore::new();
        let a = sub("RINCON_A", SonosService::AVTransport);
        let b = sub("RINCON_B", SonosService::ZoneGroupTopology);
        let cancels = [a.renew_cancel.clone(), b.renew_cancel.clone()];
        store.insert("id-a".into(), a);
        store.insert("id-b".into(), b);

        let drained = store.drain();
        assert_eq!(drained.len(), 2);
        assert!(store.is_empty());
        assert!(cancels.iter().all(|c| c.is_cancelled()));
    }

    #[test]
    fn update_grant_refreshes_sid() {
        let store = SubscriptionStore::new();
        store.insert("id-1".into(), sub("RINCON_A", SonosService::AVTransport));

        store.update_grant("id-1", "uuid:sub-2".into(), 600);
        let (_, service) = store.route("id-1").unwrap();
        assert_eq!(service, SonosService::AVTransport);
        let subs = store.subscriptions.lock();
        assert_eq!(subs.get("id-1").unwrap().sid, "uuid:sub-2");
    }
}
