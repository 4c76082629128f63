//! Server-Sent Events publisher.
//!
//! Frames events as `data: {json}\n\n` lines into a bounded channel the
//! HTTP layer drains into its response stream. A full buffer or a closed
//! receiver means the client is slow or gone; the consumer asks to be
//! detached and other clients are unaffected.

use tokio::sync::mpsc;

use super::{ControlEvent, EventConsumer};
use crate::protocol_constants::SSE_CONSUMER_BUFFER;

/// An event consumer feeding one SSE client.
pub struct SseConsumer {
    tx: mpsc::Sender<String>,
    label: String,
}

impl SseConsumer {
    /// Creates a consumer and the frame stream for the response writer.
    ///
    /// The first frame is the `:ping` comment sent on connect.
    #[must_use]
    pub fn new(label: impl Into<String>) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(SSE_CONSUMER_BUFFER);

        // Initial ping frame; the buffer is empty so this cannot fail.
        let _ = tx.try_send(":ping\n\n".to_string());

        (
            Self {
                tx,
                label: label.into(),
            },
            rx,
        )
    }

    /// Builds one SSE frame for an event.
    fn frame(event: &ControlEvent) -> Option<String> {
        serde_json::to_string(event)
            .map(|json| format!("data: {json}\n\n"))
            .ok()
    }
}

impl EventConsumer for SseConsumer {
    fn deliver(&self, event: &ControlEvent) -> bool {
        let Some(frame) = Self::frame(event) else {
            return true;
        };

        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("[SSE] Client {} too slow; detaching", self.label);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("[SSE] Client {} disconnected; detaching", self.label);
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("sse {}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::events::EventHub;

    fn event(n: u8) -> ControlEvent {
        ControlEvent::VolumeChange {
            device_id: "RINCON_A".into(),
            previous: 0,
            current: n,
            timestamp: n as u64,
        }
    }

    #[tokio::test]
    async fn first_frame_is_ping_then_data_frames() {
        let (consumer, mut rx) = SseConsumer::new("client-a");

        assert!(consumer.deliver(&event(1)));

        assert_eq!(rx.recv().await.unwrap(), ":ping\n\n");
        let frame = rx.recv().await.unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("\n\n"));
        assert!(frame.contains(r#""type":"volumeChange""#));
    }

    #[tokio::test]
    async fn closed_receiver_requests_detach() {
        let (consumer, rx) = SseConsumer::new("client-b");
        drop(rx);
        assert!(!consumer.deliver(&event(1)));
    }

    #[tokio::test]
    async fn full_buffer_requests_detach() {
        let (consumer, _rx) = SseConsumer::new("client-c");
        // Fill the buffer (it already holds the ping frame) without draining.
        let mut detached = false;
        for n in 0..=SSE_CONSUMER_BUFFER {
            if !consumer.deliver(&event((n % 250) as u8)) {
                detached = true;
                break;
            }
        }
        assert!(detached);
    }

    #[tokio::test]
    async fn slow_client_detach_leaves_others_receiving_in_order() {
        let hub = EventHub::new();

        let (fast, mut fast_rx) = SseConsumer::new("fast");
        let (slow, slow_rx) = SseConsumer::new("slow");
        drop(slow_rx); // slow client's writes fail immediately
        hub.register(Arc::new(fast));
        hub.register(Arc::new(slow));

        hub.publish(event(1));
        assert_eq!(hub.consumer_count(), 1); // slow detached

        hub.publish(event(2));

        assert_eq!(fast_rx.recv().await.unwrap(), ":ping\n\n");
        let first = fast_rx.recv().await.unwrap();
        let second = fast_rx.recv().await.unwrap();
        assert!(first.contains(r#""current":1"#));
        assert!(second.contains(r#""current":2"#));
    }
}
