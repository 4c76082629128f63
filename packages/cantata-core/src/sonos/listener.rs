//! GENA callback HTTP listener.
//!
//! A small axum server that accepts UPnP NOTIFY requests on
//! `/notify/{token}`, acknowledges them with 200 before any parsing, and
//! forwards the raw bodies to the subscription manager's dispatch loop.
//! The listener also answers port-probes on `/` so devices checking the
//! callback host get a response.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::{any, get};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use super::gena::{GenaError, GenaResult};
use crate::protocol_constants::MAX_NOTIFY_BODY_SIZE;

/// One raw NOTIFY delivery, before subscription resolution.
#[derive(Debug)]
pub(crate) struct RawNotify {
    /// URL-decoded subscription id from the request path.
    pub subscription_id: String,
    /// Full request body.
    pub body: String,
}

#[derive(Clone)]
struct ListenerState {
    notify_tx: mpsc::Sender<RawNotify>,
}

/// The bound callback listener.
pub(crate) struct CallbackListener {
    /// Address the listener is bound to (port resolved if 0 was requested).
    pub local_addr: SocketAddr,
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl CallbackListener {
    /// Binds the listener and starts serving.
    ///
    /// # Arguments
    /// * `port` - Port to bind on all interfaces; 0 picks any free port
    /// * `notify_tx` - Channel the raw NOTIFY bodies are forwarded to
    pub async fn start(
        port: u16,
        notify_tx: mpsc::Sender<RawNotify>,
    ) -> GenaResult<CallbackListener> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| GenaError::Bind(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| GenaError::Bind(e.to_string()))?;

        let state = ListenerState { notify_tx };
        let app = Router::new()
            .route("/notify/{token}", any(handle_notify))
            .route("/", get(|| async { StatusCode::OK }))
            .layer(DefaultBodyLimit::max(MAX_NOTIFY_BODY_SIZE))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let cancel = CancellationToken::new();
        let serve_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { serve_cancel.cancelled().await });
            if let Err(e) = server.await {
                log::error!("[GENA] Callback listener error: {}", e);
            }
        });

        log::info!("[GENA] Callback listener bound on {}", local_addr);

        Ok(CallbackListener {
            local_addr,
            handle,
            cancel,
        })
    }

    /// Shuts the listener down and releases the port.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            log::warn!("[GENA] Callback listener task join failed: {}", e);
        }
    }
}

/// Handles an inbound request on the notify path.
///
/// NOTIFYs are acknowledged with 200 unconditionally once the body is
/// read; resolution failures are the dispatcher's problem, not the
/// device's. Anything that isn't a NOTIFY gets 405.
async fn handle_notify(
    State(state): State<ListenerState>,
    Path(token): Path<String>,
    method: Method,
    body: Bytes,
) -> StatusCode {
    if method.as_str() != "NOTIFY" {
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    let subscription_id = match urlencoding::decode(&token) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => {
            // Acknowledge and drop; a malformed token can't be routed.
            log::debug!("[GENA] NOTIFY with undecodable token dropped");
            return StatusCode::OK;
        }
    };

    let body = String::from_utf8_lossy(&body).into_owned();

    if state
        .notify_tx
        .try_send(RawNotify {
            subscription_id,
            body,
        })
        .is_err()
    {
        log::warn!("[GENA] NOTIFY dispatch queue full; event dropped");
    }

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_on_ephemeral_port_and_stops() {
        let (tx, _rx) = mpsc::channel(8);
        let listener = CallbackListener::start(0, tx).await.expect("bind");
        let port = listener.local_addr.port();
        assert_ne!(port, 0);
        listener.stop().await;

        // Port released: a fresh bind on the same port succeeds.
        let rebound = TcpListener::bind(("0.0.0.0", port)).await;
        assert!(rebound.is_ok());
    }
}
