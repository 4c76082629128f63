//! HTTP route handlers.
//!
//! The outer JSON surface is deliberately generic: `/{room}/{action}`
//! resolves the room through the topology and dispatches into the device
//! controller, so the route table stays a thin shim over the core. The
//! `/events` endpoint registers an SSE consumer with the event hub and
//! streams its frames verbatim.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cantata_core::{
    CantataServices, ControlError, ControlResult, Repeat, SseConsumer, TransportState,
};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    services: Arc<CantataServices>,
}

/// Builds the server's router.
pub fn router(services: Arc<CantataServices>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events", get(events))
        .route("/zones", get(zones))
        .route("/{room}/{action}", get(room_action))
        .route("/{room}/{action}/{*args}", get(room_action_args))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { services })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "service": "cantata"}))
}

async fn zones(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!(state.services.topology.zones()))
}

/// `GET /events` - Server-Sent Events stream of control events.
async fn events(State(state): State<AppState>) -> Response {
    let (consumer, rx) = SseConsumer::new("http-client");
    let token = state.services.hub.register(Arc::new(consumer));
    log::debug!("[API] SSE client attached ({token})");

    // Frames are pre-formatted by the consumer; when the client goes
    // away the hub detaches it on the next failed delivery.
    let stream = ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn room_action(
    State(state): State<AppState>,
    Path((room, action)): Path<(String, String)>,
) -> Response {
    dispatch(&state, &room, &action, &[]).await
}

async fn room_action_args(
    State(state): State<AppState>,
    Path((room, action, args)): Path<(String, String, String)>,
) -> Response {
    let args: Vec<String> = args.split('/').map(String::from).collect();
    dispatch(&state, &room, &action, &args).await
}

/// Resolves a room name (or raw device id) to the device the operation
/// should address: stereo pairs resolve to their primary.
fn resolve_target(state: &AppState, room: &str) -> ControlResult<String> {
    if state.services.registry.by_id(room).is_some() {
        return Ok(room.to_string());
    }

    if let Some(primary) = state.services.topology.stereo_pair_primary(room) {
        return Ok(primary);
    }

    let mut players = state.services.registry.by_room(room);
    players.sort_by(|a, b| a.uuid.cmp(&b.uuid));
    players
        .first()
        .map(|p| p.uuid.clone())
        .ok_or_else(|| ControlError::NotFound(format!("unknown room {room}")))
}

fn ok() -> Response {
    Json(json!({"status": "success"})).into_response()
}

fn first_arg<'a>(args: &'a [String], what: &str) -> ControlResult<&'a str> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| ControlError::InvalidArgument(format!("{what} argument required")))
}

/// Parses an absolute or relative ("+5"/"-5") volume argument.
fn parse_volume(arg: &str, current: u8) -> ControlResult<i32> {
    let parse = |s: &str| {
        s.parse::<i32>()
            .map_err(|_| ControlError::InvalidArgument(format!("bad volume {arg:?}")))
    };

    if let Some(delta) = arg.strip_prefix('+') {
        Ok(current as i32 + parse(delta)?)
    } else if arg.starts_with('-') {
        Ok(current as i32 + parse(arg)?)
    } else {
        parse(arg)
    }
}

async fn dispatch(state: &AppState, room: &str, action: &str, args: &[String]) -> Response {
    match try_dispatch(state, room, action, args).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn try_dispatch(
    state: &AppState,
    room: &str,
    action: &str,
    args: &[String],
) -> ControlResult<Response> {
    let device_id = resolve_target(state, room)?;
    let controller = &state.services.controller;

    match action.to_ascii_lowercase().as_str() {
        "play" => controller.play(&device_id).await?,
        "pause" => controller.pause(&device_id).await?,
        "playpause" => {
            if controller.state_of(&device_id).transport == TransportState::Playing {
                controller.pause(&device_id).await?;
            } else {
                controller.play(&device_id).await?;
            }
        }
        "stop" => controller.stop_playback(&device_id).await?,
        "next" => controller.next(&device_id).await?,
        "previous" => controller.previous(&device_id).await?,
        "volume" => {
            let current = controller.state_of(&device_id).volume;
            let volume = parse_volume(first_arg(args, "volume")?, current)?;
            controller.set_volume(&device_id, volume).await?;
        }
        "groupvolume" => {
            let current = controller.state_of(&device_id).volume;
            let volume = parse_volume(first_arg(args, "volume")?, current)?;
            controller.set_group_volume(&device_id, volume).await?;
        }
        "mute" => controller.set_mute(&device_id, true).await?,
        "unmute" => controller.set_mute(&device_id, false).await?,
        "repeat" => {
            let repeat = match first_arg(args, "repeat")? {
                "none" | "off" => Repeat::None,
                "all" | "on" => Repeat::All,
                "one" => Repeat::One,
                other => {
                    return Err(ControlError::InvalidArgument(format!(
                        "unknown repeat mode {other:?}"
                    )))
                }
            };
            controller.set_repeat(&device_id, repeat).await?;
        }
        "shuffle" => {
            let on = matches!(first_arg(args, "shuffle")?, "on" | "true" | "1");
            controller.set_shuffle(&device_id, on).await?;
        }
        "crossfade" => {
            let on = matches!(first_arg(args, "crossfade")?, "on" | "true" | "1");
            controller.set_crossfade(&device_id, on).await?;
        }
        "sleep" => {
            let seconds = first_arg(args, "sleep")?
                .parse()
                .map_err(|_| ControlError::InvalidArgument("bad sleep seconds".into()))?;
            controller.set_sleep_timer(&device_id, seconds).await?;
        }
        "seek" => controller.seek_time(&device_id, first_arg(args, "seek")?).await?,
        "trackseek" => {
            let track = first_arg(args, "trackseek")?
                .parse()
                .map_err(|_| ControlError::InvalidArgument("bad track number".into()))?;
            controller.seek_track(&device_id, track).await?;
        }
        "join" => {
            let other_room = first_arg(args, "join")?;
            let other_id = resolve_target(state, other_room)?;
            let coordinator = state
                .services
                .topology
                .coordinator_for(&other_id)
                .unwrap_or(other_id);
            controller.join_group(&device_id, &coordinator).await?;
        }
        "leave" => controller.leave_group(&device_id).await?,
        "clearqueue" => controller.clear_queue(&device_id).await?,
        "queue" => {
            let limit = args
                .first()
                .and_then(|a| a.parse().ok())
                .unwrap_or(100);
            let offset = args.get(1).and_then(|a| a.parse().ok()).unwrap_or(0);
            let items = controller.get_queue(&device_id, limit, offset).await?;
            return Ok(Json(json!(items)).into_response());
        }
        "playuri" => {
            // URIs contain slashes; the wildcard segment is re-joined.
            let uri = args.join("/");
            if uri.is_empty() {
                return Err(ControlError::InvalidArgument("playuri needs a URI".into()));
            }
            controller.play_uri(&device_id, &uri, "").await?;
        }
        "state" => {
            // Fresh poll preferred; cached snapshot if the device is slow.
            let snapshot = match controller.update_state(&device_id).await {
                Ok(fresh) => fresh,
                Err(_) => controller.state_of(&device_id),
            };
            return Ok(Json(json!(snapshot)).into_response());
        }
        other => {
            return Err(ControlError::InvalidArgument(format!(
                "unknown action {other:?}"
            )))
        }
    }

    Ok(ok())
}
