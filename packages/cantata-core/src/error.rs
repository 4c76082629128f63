//! Centralized error types for the control plane.
//!
//! Subsystems carry their own `thiserror` enums (`SoapError`, `GenaError`,
//! `DiscoveryError`); this module folds them into the crate-level
//! [`ControlError`] taxonomy that API callers see, maps each kind to an
//! HTTP status, and implements `IntoResponse` for automatic JSON error
//! responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::sonos::discovery::DiscoveryError;
use crate::sonos::gena::GenaError;
use crate::sonos::soap::SoapError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Control-plane error taxonomy.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Network failure: DNS, connection reset, timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP non-2xx or SOAP fault with a UPnP error code.
    ///
    /// The numeric code is preserved verbatim for callers; 0 when the
    /// fault carried none.
    #[error("UPnP fault {code}: {description}")]
    ProtocolFault { code: u32, description: String },

    /// Unknown room, device id, or zone.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed seek target, unknown operation, bad argument shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Reserved for external-service auth failures; not produced by core.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Subsystem not ready (topology pending, subscriber not started).
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Convenient Result alias for control-plane operations.
pub type ControlResult<T> = Result<T, ControlError>;

impl ControlError {
    /// The UPnP fault code, when this is a protocol fault.
    #[must_use]
    pub fn fault_code(&self) -> Option<u32> {
        match self {
            Self::ProtocolFault { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Transport(_) | Self::ProtocolFault { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ErrorCode for ControlError {
    fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport_error",
            Self::ProtocolFault { .. } => "protocol_fault",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Unauthorized(_) => "unauthorized",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl ErrorCode for SoapError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Fault { .. } => "soap_fault",
            Self::Parse => "soap_parse_error",
        }
    }
}

impl ErrorCode for GenaError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::SubscribeFailed(_) => "gena_subscription_failed",
            Self::MissingSid => "gena_missing_sid",
            Self::Bind(_) => "gena_bind_failed",
            Self::NotStarted => "gena_not_started",
        }
    }
}

impl From<SoapError> for ControlError {
    fn from(err: SoapError) -> Self {
        match err {
            SoapError::Fault { code, description } => Self::ProtocolFault { code, description },
            SoapError::HttpStatus(status, body) => Self::ProtocolFault {
                code: 0,
                description: format!("HTTP {status}: {body}"),
            },
            SoapError::Http(e) if e.is_timeout() => {
                Self::Transport(format!("request timed out: {e}"))
            }
            SoapError::Http(e) => Self::Transport(e.to_string()),
            SoapError::Parse => Self::Transport("unparseable SOAP response".to_string()),
        }
    }
}

impl From<GenaError> for ControlError {
    fn from(err: GenaError) -> Self {
        match err {
            GenaError::NotStarted => Self::Unavailable("subscriber not started".to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<DiscoveryError> for ControlError {
    fn from(err: DiscoveryError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// JSON body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soap_fault_preserves_upnp_code() {
        let err: ControlError = SoapError::Fault {
            code: 701,
            description: "Transition not available".into(),
        }
        .into();

        assert_eq!(err.fault_code(), Some(701));
        assert_eq!(err.code(), "protocol_fault");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = ControlError::NotFound("room Attic".into());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn invalid_argument_maps_to_400() {
        let err = ControlError::InvalidArgument("bad seek target".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn gena_not_started_maps_to_unavailable() {
        let err: ControlError = GenaError::NotStarted.into();
        assert!(matches!(err, ControlError::Unavailable(_)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
