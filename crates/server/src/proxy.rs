//! HTTP surface of the worker.
//!
//! Every request outside [`CONTROL_PREFIX`] goes through the interceptor.
//! Under the prefix:
//! - `POST /__lantern/control` queues a control message (202)
//! - `GET /__lantern/events` upgrades to a WebSocket that streams
//!   notifications and also accepts control messages
//! - `GET /__lantern/status` reports consent, phase and namespaces

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use lantern_client::FetchRequest;
use lantern_core::{Notification, StoredResponse};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::ProxyError;
use crate::worker::dispatch::DispatchHandle;
use crate::worker::intercept::Interceptor;
use crate::worker::{Phase, WorkerContext};

pub const CONTROL_PREFIX: &str = "/__lantern";

#[derive(Clone)]
pub struct AppState {
    ctx: Arc<WorkerContext>,
    interceptor: Interceptor,
    dispatch: DispatchHandle,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(ctx: Arc<WorkerContext>, dispatch: DispatchHandle, max_body_bytes: usize) -> Self {
        let interceptor = Interceptor::new(ctx.clone());
        Self { ctx, interceptor, dispatch, max_body_bytes }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    enabled: bool,
    phase: Phase,
    versioned_core: String,
    namespaces: Vec<String>,
    clients: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&format!("{CONTROL_PREFIX}/control"), post(control))
        .route(&format!("{CONTROL_PREFIX}/events"), get(events))
        .route(&format!("{CONTROL_PREFIX}/status"), get(status))
        .fallback(intercept)
        .with_state(state)
}

async fn control(State(state): State<AppState>, body: String) -> Result<StatusCode, ProxyError> {
    match state.dispatch.submit_raw(&body) {
        Some(_) => Ok(StatusCode::ACCEPTED),
        None => Err(ProxyError::InvalidInput("malformed control message".into())),
    }
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let namespaces = state.ctx.db.namespace_names().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to enumerate namespaces");
        Vec::new()
    });

    axum::Json(StatusResponse {
        enabled: state.ctx.consent.is_enabled(),
        phase: state.ctx.phase(),
        versioned_core: state.ctx.registry.versioned_core().to_string(),
        namespaces,
        clients: state.ctx.bus.client_count(),
    })
}

async fn events(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let notifications = state.ctx.bus.subscribe();
    ws.on_upgrade(move |socket| attach(socket, notifications, state.dispatch))
}

/// Relay notifications to one client until either side closes.
async fn attach(mut socket: WebSocket, mut notifications: broadcast::Receiver<Notification>, dispatch: DispatchHandle) {
    tracing::debug!("client attached");
    loop {
        tokio::select! {
            received = notifications.recv() => match received {
                Ok(notification) => {
                    let Ok(text) = serde_json::to_string(&notification) else { continue };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "client lagged, notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if dispatch.submit_raw(text.as_str()).is_none() {
                        tracing::debug!("ignoring malformed message from client");
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("client detached");
}

async fn intercept(State(state): State<AppState>, request: Request) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| ProxyError::PayloadTooLarge(e.to_string()))?;

    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = state
        .ctx
        .origin
        .join(path_and_query)
        .map_err(|e| ProxyError::InvalidInput(e.to_string()))?;

    let navigation = is_navigation(&parts.method, &parts.headers);
    let fetch = FetchRequest { method: parts.method, url, headers: parts.headers, body };

    let served = state.interceptor.handle(fetch, navigation).await?;
    tracing::debug!(source = ?served.source, status = served.response.status, "served");
    Ok(into_response(served.response))
}

/// Document loads: `Sec-Fetch-Mode: navigate`, or a GET accepting HTML.
fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
    if let Some(mode) = headers.get("sec-fetch-mode") {
        return mode.as_bytes().eq_ignore_ascii_case(b"navigate");
    }
    *method == Method::GET
        && headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"))
}

fn into_response(stored: StoredResponse) -> Response {
    let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(stored.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in stored.headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "dropping invalid stored header"),
        }
    }
    response
}
