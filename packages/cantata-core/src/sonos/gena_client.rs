//! GENA HTTP client for subscription operations.
//!
//! Handles the HTTP protocol aspects of GENA subscriptions. State
//! management is delegated to the subscription store; scheduling to the
//! subscription manager.

use std::time::Duration;

use reqwest::{Client, Method};

use super::gena::{GenaError, GenaResult};
use crate::protocol_constants::{GENA_SUBSCRIPTION_TIMEOUT_SECS, SOAP_TIMEOUT_SECS};

/// Response from a successful GENA subscription.
pub struct SubscribeResponse {
    /// The subscription identifier assigned by the player.
    pub sid: String,
    /// The granted timeout in seconds.
    pub timeout_secs: u64,
}

/// HTTP client for GENA (UPnP eventing) operations.
pub struct GenaClient {
    client: Client,
}

impl GenaClient {
    /// Creates a new GENA client with the given HTTP client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates the HTTP method for SUBSCRIBE requests.
    fn subscribe_method() -> Method {
        Method::from_bytes(b"SUBSCRIBE").expect("SUBSCRIBE is a valid method")
    }

    /// Creates the HTTP method for UNSUBSCRIBE requests.
    fn unsubscribe_method() -> Method {
        Method::from_bytes(b"UNSUBSCRIBE").expect("UNSUBSCRIBE is a valid method")
    }

    /// Extracts the granted timeout in seconds from a GENA response.
    ///
    /// The "TIMEOUT" header has format "Second-N". Returns the requested
    /// timeout when the header is missing or malformed.
    fn extract_timeout_secs(response: &reqwest::Response, requested: u64) -> u64 {
        response
            .headers()
            .get("TIMEOUT")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Second-"))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(requested)
    }

    /// Sends a SUBSCRIBE request to create a subscription.
    ///
    /// Renewal uses this same call with a fresh CALLBACK rather than the
    /// SID-bearing renew form: re-subscription is simpler and tolerant of
    /// SIDs the player has already forgotten.
    ///
    /// # Arguments
    /// * `event_url` - Absolute event URL of the (player, service) pair
    /// * `callback_url` - URL where NOTIFY events should be sent
    /// * `timeout_secs` - Requested subscription timeout
    pub async fn subscribe(
        &self,
        event_url: &str,
        callback_url: &str,
        timeout_secs: Option<u64>,
    ) -> GenaResult<SubscribeResponse> {
        let requested = timeout_secs.unwrap_or(GENA_SUBSCRIPTION_TIMEOUT_SECS);

        let response = self
            .client
            .request(Self::subscribe_method(), event_url)
            .header("CALLBACK", format!("<{}>", callback_url))
            .header("NT", "upnp:event")
            .header("TIMEOUT", format!("Second-{requested}"))
            .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenaError::SubscribeFailed(response.status().as_u16()));
        }

        let sid = response
            .headers()
            .get("SID")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or(GenaError::MissingSid)?;

        let timeout_secs = Self::extract_timeout_secs(&response, requested);

        Ok(SubscribeResponse { sid, timeout_secs })
    }

    /// Sends an UNSUBSCRIBE request for a subscription.
    ///
    /// # Returns
    /// `true` on any 2xx; `false` on HTTP errors or network failure. The
    /// caller removes local state either way - unsubscribe is best-effort.
    pub async fn unsubscribe(&self, event_url: &str, sid: &str) -> bool {
        match self
            .client
            .request(Self::unsubscribe_method(), event_url)
            .header("SID", sid)
            .timeout(Duration::from_secs(SOAP_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
