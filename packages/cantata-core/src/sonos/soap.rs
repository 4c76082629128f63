//! Low-level SOAP protocol implementation for UPnP communication.
//!
//! This module handles the raw SOAP envelope building, HTTP transport,
//! and XML response parsing. Higher-level commands live in the device
//! controller (`crate::player`).

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::utils::{escape_xml, extract_xml_text};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during SOAP operations with players.
#[derive(Debug, Error)]
pub enum SoapError {
    /// HTTP request to the player failed (connect, DNS, reset, timeout).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Player returned a non-success HTTP status without a SOAP fault.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Player returned a SOAP fault response.
    ///
    /// `code` is the numeric UPnP error code extracted from the fault
    /// detail, preserved verbatim for callers (701, 1023, ...). A fault
    /// whose detail carried no parsable code has `code == 0`.
    #[error("UPnP fault {code}: {description}")]
    Fault { code: u32, description: String },

    /// Failed to parse the SOAP response XML.
    #[error("failed to parse SOAP response")]
    Parse,
}

/// Convenient Result alias for SOAP operations.
pub type SoapResult<T> = Result<T, SoapError>;

impl SoapError {
    /// Returns the UPnP fault code, if this error is a SOAP fault.
    #[must_use]
    pub fn fault_code(&self) -> Option<u32> {
        match self {
            SoapError::Fault { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this error is a SOAP fault with the given UPnP code.
    #[must_use]
    pub fn is_fault(&self, code: u32) -> bool {
        self.fault_code() == Some(code)
    }

    /// Returns true if the underlying HTTP request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, SoapError::Http(e) if e.is_timeout())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Target
// ─────────────────────────────────────────────────────────────────────────────

/// Resolved address of one SOAP action endpoint.
///
/// Carries the full control URL (discovered from the device description
/// where available, built-in fallback otherwise) and the service-type URN
/// used for the `SOAPACTION` header and body namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapTarget {
    /// Absolute control URL, e.g. `http://192.168.1.10:1400/MediaRenderer/AVTransport/Control`.
    pub control_url: String,
    /// Service-type URN, e.g. `urn:schemas-upnp-org:service:AVTransport:1`.
    pub service_type: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request/Response
// ─────────────────────────────────────────────────────────────────────────────

/// Builds the SOAP 1.1 envelope for an action invocation.
///
/// The envelope must be a single line with no leading whitespace: some
/// device-side SOAP parsers reject XML with whitespace before the root
/// element. Argument values are XML-escaped here, so nested DIDL-Lite
/// arrives entity-encoded inside its string element as UPnP expects.
fn build_envelope(service_type: &str, action: &str, args: &[(&str, String)]) -> String {
    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{service_type}">"#,
    );

    for (k, v) in args {
        body.push_str(&format!("<{k}>{}</{k}>", escape_xml(v)));
    }

    body.push_str(&format!("</u:{action}></s:Body></s:Envelope>"));
    body
}

/// Extracts the numeric UPnP error code and description from a fault body.
fn parse_fault(xml: &str) -> (u32, String) {
    let code = extract_xml_text(xml, "errorCode")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);
    let description = extract_xml_text(xml, "errorDescription")
        .filter(|s| !s.is_empty())
        .or_else(|| extract_xml_text(xml, "faultstring"))
        .unwrap_or_else(|| "unknown SOAP fault".to_string());
    (code, description)
}

/// Sends a SOAP request to a player.
///
/// This is the core transport function for all UPnP SOAP operations. It
/// builds the envelope, posts it with the standard headers, and converts
/// fault responses into typed errors.
///
/// # Arguments
/// * `client` - Shared HTTP client
/// * `target` - Control URL + service URN of the action endpoint
/// * `action` - SOAP action name (e.g. "Play", "SetVolume")
/// * `args` - Action arguments; order is preserved on the wire
/// * `timeout` - Per-call timeout
///
/// # Returns
/// The raw response body on success, or a `SoapError` if the request
/// fails or the player returns a SOAP fault.
pub async fn send_soap_request(
    client: &Client,
    target: &SoapTarget,
    action: &str,
    args: &[(&str, String)],
    timeout: Duration,
) -> SoapResult<String> {
    let body = build_envelope(&target.service_type, action, args);

    log::debug!(
        "[SOAP] {} -> {} ({} bytes)",
        action,
        target.control_url,
        body.len()
    );

    let res = client
        .post(&target.control_url)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header("SOAPACTION", format!("\"{}#{}\"", target.service_type, action))
        .body(body)
        .timeout(timeout)
        .send()
        .await?;

    let status = res.status();
    let response_text = res.text().await?;

    // A SOAP fault usually arrives with HTTP 500, so check the body first.
    if response_text.contains("<s:Fault") || response_text.contains("<soap:Fault") {
        let (code, description) = parse_fault(&response_text);
        log::debug!("[SOAP] {} fault {}: {}", action, code, description);
        return Err(SoapError::Fault { code, description });
    }

    if !status.is_success() {
        return Err(SoapError::HttpStatus(status.as_u16(), response_text));
    }

    Ok(response_text)
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for constructing and sending SOAP requests.
///
/// Provides a fluent API that reduces boilerplate when making SOAP calls.
///
/// # Example
/// ```ignore
/// let response = SoapRequestBuilder::new(&client, target)
///     .action("SetVolume")
///     .instance_id()
///     .arg("Channel", "Master")
///     .arg("DesiredVolume", "75")
///     .send()
///     .await?;
/// ```
pub struct SoapRequestBuilder<'a> {
    client: &'a Client,
    target: SoapTarget,
    action: Option<&'a str>,
    args: Vec<(&'a str, String)>,
    timeout: Duration,
}

impl<'a> SoapRequestBuilder<'a> {
    /// Creates a new SOAP request builder for the given endpoint.
    #[must_use]
    pub fn new(client: &'a Client, target: SoapTarget) -> Self {
        Self {
            client,
            target,
            action: None,
            args: Vec::new(),
            timeout: Duration::from_secs(crate::protocol_constants::SOAP_TIMEOUT_SECS),
        }
    }

    /// Sets the SOAP action name.
    #[must_use]
    pub fn action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    /// Adds an argument to the SOAP request.
    ///
    /// Arguments are included in the SOAP body in the order they are added.
    #[must_use]
    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    /// Adds the standard InstanceID="0" argument used by most actions.
    #[must_use]
    pub fn instance_id(self) -> Self {
        self.arg("InstanceID", "0")
    }

    /// Overrides the per-call timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends the SOAP request and returns the response body.
    ///
    /// # Errors
    /// Returns `SoapError` if the action is not set or the request fails.
    pub async fn send(self) -> SoapResult<String> {
        let action = self.action.ok_or(SoapError::Parse)?;

        send_soap_request(self.client, &self.target, action, &self.args, self.timeout).await
    }

    /// Returns the request parts without sending (for testing).
    #[cfg(test)]
    pub(crate) fn into_parts(self) -> Option<(SoapTarget, &'a str, Vec<(&'a str, String)>)> {
        let action = self.action?;
        Some((self.target, action, self.args))
    }
}
