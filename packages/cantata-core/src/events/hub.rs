//! The process-wide event hub.
//!
//! Consumers register once and receive the normalized event stream until
//! they unregister or ask to be detached. Delivery is best-effort and
//! lossy by contract: a consumer whose `deliver` returns false is removed
//! on the spot, and publishers never block on consumer I/O.
//!
//! Per-producer ordering holds because each player's events are published
//! from that player's serial worker; the hub itself delivers to each
//! consumer in call order.

use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use super::ControlEvent;

/// A registered event consumer.
///
/// `deliver` must not block; consumers doing I/O hand the event to their
/// own task or buffer. Returning `false` requests detachment (slow or
/// dead client).
pub trait EventConsumer: Send + Sync {
    /// Delivers one event. Returns false to be detached.
    fn deliver(&self, event: &ControlEvent) -> bool;

    /// Short label for logs.
    fn describe(&self) -> String {
        "consumer".to_string()
    }
}

struct ConsumerEntry {
    token: Uuid,
    consumer: Arc<dyn EventConsumer>,
}

/// Publish/subscribe surface for [`ControlEvent`]s.
///
/// The hub owns no state except the consumer set.
#[derive(Default)]
pub struct EventHub {
    consumers: RwLock<Vec<ConsumerEntry>>,
}

impl EventHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a consumer; the returned token unregisters it.
    pub fn register(&self, consumer: Arc<dyn EventConsumer>) -> Uuid {
        let token = Uuid::new_v4();
        log::debug!("[EventHub] Registered {} ({})", consumer.describe(), token);
        self.consumers.write().push(ConsumerEntry { token, consumer });
        token
    }

    /// Unregisters a consumer by token. Unknown tokens are a no-op, so
    /// racing a slow-client detach is harmless.
    pub fn unregister(&self, token: Uuid) {
        self.consumers.write().retain(|entry| entry.token != token);
    }

    /// Returns the number of registered consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.consumers.read().len()
    }

    /// Publishes one event to every consumer.
    ///
    /// Consumers that refuse delivery are detached before the call
    /// returns; the remaining consumers still receive the event.
    pub fn publish(&self, event: ControlEvent) {
        tracing::debug!(?event, "control_event");

        // Deliver under the read lock (deliver is non-blocking by
        // contract), collect failures, then detach them.
        let failed: Vec<Uuid> = {
            let consumers = self.consumers.read();
            consumers
                .iter()
                .filter(|entry| !entry.consumer.deliver(&event))
                .map(|entry| entry.token)
                .collect()
        };

        if !failed.is_empty() {
            let mut consumers = self.consumers.write();
            consumers.retain(|entry| {
                let keep = !failed.contains(&entry.token);
                if !keep {
                    log::info!(
                        "[EventHub] Detached {} ({})",
                        entry.consumer.describe(),
                        entry.token
                    );
                }
                keep
            });
        }
    }

    /// Registers a capturing consumer and returns its buffer (tests).
    #[cfg(test)]
    pub(crate) fn capture(&self) -> Arc<parking_lot::Mutex<Vec<ControlEvent>>> {
        struct Capture(Arc<parking_lot::Mutex<Vec<ControlEvent>>>);
        impl EventConsumer for Capture {
            fn deliver(&self, event: &ControlEvent) -> bool {
                self.0.lock().push(event.clone());
                true
            }
        }

        let buffer = Arc::new(parking_lot::Mutex::new(Vec::new()));
        self.register(Arc::new(Capture(Arc::clone(&buffer))));
        buffer
    }
}
