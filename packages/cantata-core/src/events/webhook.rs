//! Webhook event publisher.
//!
//! POSTs JSON-serialized events to configured URLs. Per-URL failures are
//! logged and never block or detach: the POST happens on a spawned task,
//! so `deliver` returns immediately and publish ordering is unaffected.

use std::collections::HashMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ControlEvent, EventConsumer, EventFilter};

/// Configuration of one webhook target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Target URL (required).
    pub url: String,
    /// Extra headers to send with each POST.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Optional event-type filter; absent means all events.
    #[serde(default, rename = "type")]
    pub event_type: Option<EventFilter>,
}

/// An event consumer POSTing events to one webhook URL.
pub struct WebhookConsumer {
    client: Client,
    url: reqwest::Url,
    headers: HashMap<String, String>,
    filter: Option<EventFilter>,
}

impl WebhookConsumer {
    /// Builds a consumer from configuration.
    ///
    /// Returns `None` for an invalid URL - such entries are silently
    /// dropped at registration per the delivery contract.
    #[must_use]
    pub fn from_config(client: Client, config: WebhookConfig) -> Option<Self> {
        let url = match reqwest::Url::parse(&config.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => url,
            _ => {
                log::warn!("[Webhook] Dropping webhook with invalid URL: {}", config.url);
                return None;
            }
        };

        Some(Self {
            client,
            url,
            headers: config.headers,
            filter: config.event_type,
        })
    }
}

impl EventConsumer for WebhookConsumer {
    fn deliver(&self, event: &ControlEvent) -> bool {
        if let Some(filter) = self.filter {
            if event.filter_kind() != filter {
                return true;
            }
        }

        let body = match serde_json::to_vec(event) {
            Ok(body) => body,
            Err(e) => {
                log::error!("[Webhook] Failed to serialize event: {}", e);
                return true;
            }
        };

        let mut request = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .body(body);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let url = self.url.clone();
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    log::warn!(
                        "[Webhook] POST to {} returned {}",
                        url,
                        response.status()
                    );
                }
                Err(e) => log::warn!("[Webhook] POST to {} failed: {}", url, e),
                _ => {}
            }
        });

        true
    }

    fn describe(&self) -> String {
        format!("webhook {}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_is_dropped() {
        let config = WebhookConfig {
            url: "not a url".into(),
            headers: HashMap::new(),
            event_type: None,
        };
        assert!(WebhookConsumer::from_config(Client::new(), config).is_none());

        let config = WebhookConfig {
            url: "ftp://example.com/hook".into(),
            headers: HashMap::new(),
            event_type: None,
        };
        assert!(WebhookConsumer::from_config(Client::new(), config).is_none());
    }

    #[test]
    fn valid_url_is_accepted() {
        let config = WebhookConfig {
            url: "http://example.com/hook".into(),
            headers: HashMap::new(),
            event_type: Some(EventFilter::Volume),
        };
        let consumer = WebhookConsumer::from_config(Client::new(), config);
        assert!(consumer.is_some());
        assert!(consumer.unwrap().describe().contains("example.com"));
    }

    #[test]
    fn config_deserializes_type_field() {
        let config: WebhookConfig = serde_json::from_str(
            r#"{"url": "http://example.com/h", "type": "volume", "headers": {"X-Auth": "k"}}"#,
        )
        .unwrap();
        assert_eq!(config.event_type, Some(EventFilter::Volume));
        assert_eq!(config.headers.get("X-Auth").map(String::as_str), Some("k"));
    }

    #[tokio::test]
    async fn filtered_event_is_skipped_without_spawn() {
        let config = WebhookConfig {
            url: "http://127.0.0.1:9/hook".into(), // discard port; never reached
            headers: HashMap::new(),
            event_type: Some(EventFilter::Topology),
        };
        let consumer = WebhookConsumer::from_config(Client::new(), config).unwrap();

        // A volume event does not match the topology filter; deliver must
        // keep the consumer attached.
        let event = ControlEvent::VolumeChange {
            device_id: "RINCON_A".into(),
            previous: 1,
            current: 2,
            timestamp: 0,
        };
        assert!(consumer.deliver(&event));
    }
}
