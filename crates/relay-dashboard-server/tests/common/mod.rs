//! Shared helpers for the edge server integration tests.
//!
//! Includes a small fake relay daemon built on Axum so proxy behaviour can
//! be exercised end to end over real sockets.

#![allow(dead_code, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{any, get};
use axum::{Json, Router};
use relay_dashboard_fixtures::FixtureStore;
use relay_dashboard_server::{start_server, EdgeConfig, ModeOverride, ServerHandle};
use reqwest::Url;
use tokio::net::TcpListener;

/// Binary frame the fake daemon sends as soon as a stream opens.
pub const DAEMON_HELLO: &[u8] = &[0xde, 0xad, 0xbe, 0xef];

/// Stream subprotocol the fake daemon accepts.
pub const DAEMON_PROTOCOL: &str = "relay.v1";

/// A running fake relay daemon.
pub struct FakeDaemon {
    /// Address it listens on.
    pub addr: SocketAddr,
    /// Stream connections the daemon currently holds open.
    pub open_streams: Arc<AtomicUsize>,
    /// Headers of the most recent stream handshake the daemon received.
    pub last_handshake: Arc<Mutex<Option<HeaderMap>>>,
}

impl FakeDaemon {
    /// Base URL for pointing the edge server at this daemon.
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }
}

/// Start a fake daemon on an ephemeral port.
///
/// - `GET /api/health` answers 200.
/// - `GET /api/channels` answers a fixed list with an `x-relay-daemon`
///   header and echoes the query string.
/// - `/api/echo` (any method) answers 201 with the method, body and the
///   `x-dashboard-client` header it received.
/// - `GET /api/missing` answers 404 with a daemon-specific body.
/// - `GET /api/boom` answers 500.
/// - `/ws` records the handshake headers, accepts the [`DAEMON_PROTOCOL`]
///   subprotocol, sends [`DAEMON_HELLO`] as a binary frame, then echoes
///   every text frame back unchanged.
pub async fn spawn_daemon() -> FakeDaemon {
    let open_streams = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&open_streams);
    let last_handshake = Arc::new(Mutex::new(None));
    let handshake = Arc::clone(&last_handshake);

    let app = Router::new()
        .route("/api/health", get(|| async { Json(serde_json::json!({"ok": true})) }))
        .route(
            "/api/channels",
            get(|uri: axum::http::Uri| async move {
                (
                    [("x-relay-daemon", "fake")],
                    Json(serde_json::json!({
                        "channels": ["alpha", "beta"],
                        "query": uri.query(),
                    })),
                )
            }),
        )
        .route(
            "/api/echo",
            any(|method: axum::http::Method, headers: HeaderMap, body: Bytes| async move {
                let client = headers
                    .get("x-dashboard-client")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                (
                    StatusCode::CREATED,
                    Json(serde_json::json!({
                        "method": method.as_str(),
                        "body": String::from_utf8_lossy(&body),
                        "client": client,
                    })),
                )
            }),
        )
        .route(
            "/api/missing",
            get(|| async { (StatusCode::NOT_FOUND, Json(serde_json::json!({"daemon": "no such thing"}))) }),
        )
        .route(
            "/api/boom",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "daemon exploded") }),
        )
        .route(
            "/ws",
            get(move |upgrade: WebSocketUpgrade, headers: HeaderMap| {
                let counter = Arc::clone(&counter);
                *handshake.lock().unwrap() = Some(headers);
                async move {
                    upgrade
                        .protocols([DAEMON_PROTOCOL])
                        .on_upgrade(move |socket| daemon_stream(socket, counter))
                }
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeDaemon {
        addr,
        open_streams,
        last_handshake,
    }
}

async fn daemon_stream(mut socket: WebSocket, open: Arc<AtomicUsize>) {
    open.fetch_add(1, Ordering::SeqCst);
    if socket
        .send(Message::Binary(Bytes::from_static(DAEMON_HELLO)))
        .await
        .is_ok()
    {
        while let Some(Ok(message)) = socket.recv().await {
            match message {
                Message::Text(text) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    }
    open.fetch_sub(1, Ordering::SeqCst);
}

/// A URL with nothing listening behind it.
pub async fn dead_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// A daemon that accepts TCP connections and never answers on them.
pub async fn hung_daemon() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// A daemon that answers every request with `status` and an empty body.
pub async fn status_daemon(status: StatusCode) -> Url {
    let app = Router::new().fallback(move || async move { status });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// A fresh, empty directory under the system temp dir.
pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("relay-dashboard-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Edge configuration on an ephemeral port with short timeouts.
pub fn test_config(relay_url: Url, mode: ModeOverride) -> EdgeConfig {
    let mut config = EdgeConfig::new(relay_url);
    config.port = 0;
    config.mode = mode;
    config.static_dir = temp_dir();
    config.probe_timeout = Duration::from_millis(500);
    config.upstream_timeout = Duration::from_secs(2);
    config.stream.interval = Duration::from_millis(50);
    config
}

/// Start an edge server with the embedded fixtures.
pub async fn start(config: EdgeConfig) -> ServerHandle {
    let fixtures = Arc::new(FixtureStore::embedded().unwrap());
    start_server(config, fixtures).await.unwrap()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Read a whole response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

