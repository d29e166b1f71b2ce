//! Request dispatch for the edge server.
//!
//! [`dispatch`] is the single entry point for every HTTP request. It asks
//! the [`RequestRouter`](crate::router::RequestRouter) for a decision and
//! hands the request to the static asset service, the stream proxy, the
//! mock responder, or the daemon forwarder.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tracing::{debug, warn};

use crate::error::EdgeError;
use crate::router::RouteDecision;
use crate::state::AppState;
use crate::ws;

/// Route one request according to the server's mode and the request path.
pub async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let decision = state.router.route(request.uri().path());
    debug!(
        path = request.uri().path(),
        method = %request.method(),
        ?decision,
        mode = %state.mode,
        "routing request"
    );

    match decision {
        RouteDecision::StaticAsset => serve_static(&state, request).await,
        RouteDecision::Stream => open_stream(state, request).await,
        RouteDecision::Mock => state.mock.handle(request.method(), request.uri()),
        RouteDecision::Forward => forward(&state, request).await,
    }
}

/// Serve a pre-built dashboard asset, falling back to the entry document.
async fn serve_static(state: &AppState, request: Request) -> Response {
    let result: Result<_, Infallible> = state.static_files.clone().oneshot(request).await;
    match result {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Hand a `WebSocket` upgrade request to the stream proxy.
async fn open_stream(state: Arc<AppState>, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();
    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => ws::upgrade(state, upgrade, &parts.uri, &parts.headers).await,
        Err(rejection) => {
            debug!(path = parts.uri.path(), "stream path requested without upgrade");
            rejection.into_response()
        }
    }
}

/// Pass a request through to the daemon.
async fn forward(state: &AppState, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or(path, |pq| pq.as_str());

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path, mode = %state.mode, limit = state.max_body_bytes, error = %e, "request body rejected");
            return EdgeError::PayloadTooLarge(e.to_string()).into_response();
        }
    };

    match state
        .upstream
        .forward(parts.method.clone(), path_and_query, &parts.headers, body)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(
                path,
                method = %parts.method,
                mode = %state.mode,
                upstream = %state.upstream.base_url(),
                error = %e,
                "forward to relay daemon failed"
            );
            e.into_response()
        }
    }
}
