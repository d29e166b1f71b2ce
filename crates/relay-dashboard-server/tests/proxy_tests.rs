//! End-to-end proxy mode tests against a fake relay daemon.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use relay_dashboard_server::ModeOverride;
use relay_dashboard_types::ServerMode;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn api_calls_are_forwarded_verbatim() {
    let daemon = common::spawn_daemon().await;
    let server = common::start(common::test_config(daemon.url(), ModeOverride::Proxy)).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", server.local_addr());

    let response = client
        .get(format!("{base}/api/channels?limit=5"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("x-relay-daemon").unwrap(), "fake");
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["channels"], serde_json::json!(["alpha", "beta"]));
    assert_eq!(json["query"], "limit=5");

    let response = client
        .post(format!("{base}/api/echo"))
        .header("x-dashboard-client", "tests")
        .body("hello daemon")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["method"], "POST");
    assert_eq!(json["body"], "hello daemon");
    assert_eq!(json["client"], "tests");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn daemon_client_errors_pass_through() {
    let daemon = common::spawn_daemon().await;
    let server = common::start(common::test_config(daemon.url(), ModeOverride::Proxy)).await;

    let response = reqwest::get(format!("http://{}/api/missing", server.local_addr()))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["daemon"], "no such thing");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn daemon_server_errors_become_bad_gateway() {
    let daemon = common::spawn_daemon().await;
    let server = common::start(common::test_config(daemon.url(), ModeOverride::Proxy)).await;

    let response = reqwest::get(format!("http://{}/api/boom", server.local_addr()))
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "upstream_unavailable");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn dead_daemon_fails_fast_without_mock_data() {
    let server = common::start(common::test_config(
        common::dead_url().await,
        ModeOverride::Proxy,
    ))
    .await;
    assert_eq!(server.mode(), ServerMode::Proxy);

    let started = Instant::now();
    let response = reqwest::get(format!("http://{}/api/channels", server.local_addr()))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(response.status(), 502);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["error"], "upstream_unavailable");
    assert!(json.get("data").is_none());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn stream_frames_are_relayed_both_ways() {
    let daemon = common::spawn_daemon().await;
    let server = common::start(common::test_config(daemon.url(), ModeOverride::Proxy)).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.local_addr()))
        .await
        .unwrap();

    // Daemon greets with a binary frame; it must arrive as binary.
    let hello = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(&hello, Message::Binary(b) if b.as_ref() == common::DAEMON_HELLO));

    let payload = r#"{"type":"subscribe","channel":"general"}"#;
    socket.send(Message::text(payload)).await.unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(&echoed, Message::Text(t) if t.as_str() == payload));
    assert_eq!(server.active_sessions(), 1);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn client_close_releases_both_sides() {
    let daemon = common::spawn_daemon().await;
    let server = common::start(common::test_config(daemon.url(), ModeOverride::Proxy)).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.local_addr()))
        .await
        .unwrap();
    let _hello = socket.next().await.unwrap().unwrap();
    let open = std::sync::Arc::clone(&daemon.open_streams);
    assert!(common::eventually(|| open.load(Ordering::SeqCst) == 1).await);

    socket.close(None).await.unwrap();
    drop(socket);

    assert!(common::eventually(|| open.load(Ordering::SeqCst) == 0).await);
    assert!(common::eventually(|| server.active_sessions() == 0).await);
    assert_eq!(server.sessions().opened(), 1);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn stream_upgrade_fails_when_daemon_is_down() {
    let server = common::start(common::test_config(
        common::dead_url().await,
        ModeOverride::Proxy,
    ))
    .await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.local_addr())).await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 502);
        }
        Err(other) => panic!("expected a 502 handshake failure, got {other}"),
        Ok(_) => panic!("handshake succeeded with the daemon down"),
    }
    assert!(common::eventually(|| server.active_sessions() == 0).await);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn auto_mode_proxies_when_daemon_is_up() {
    let daemon = common::spawn_daemon().await;
    let server = common::start(common::test_config(daemon.url(), ModeOverride::Auto)).await;
    assert_eq!(server.mode(), ServerMode::Proxy);
    assert!(server.startup_probe().unwrap().is_reachable());
    assert!(server.upstream().await.is_reachable);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn auto_mode_falls_back_to_mock_when_daemon_is_down() {
    let server = common::start(common::test_config(
        common::dead_url().await,
        ModeOverride::Auto,
    ))
    .await;
    assert_eq!(server.mode(), ServerMode::Mock);

    let response = reqwest::get(format!("http://{}/api/channels", server.local_addr()))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["success"], true);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn oversized_bodies_are_rejected_before_forwarding() {
    let daemon = common::spawn_daemon().await;
    let mut config = common::test_config(daemon.url(), ModeOverride::Proxy);
    config.max_body_bytes = 16;
    let server = common::start(config).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/echo", server.local_addr()))
        .body("this body is well over sixteen bytes")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 413);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["error"], "payload_too_large");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn hung_daemon_times_out_as_bad_gateway() {
    let mut config = common::test_config(common::hung_daemon().await, ModeOverride::Proxy);
    config.upstream_timeout = Duration::from_millis(300);
    let server = common::start(config).await;

    let started = Instant::now();
    let response = reqwest::get(format!("http://{}/api/channels", server.local_addr()))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(response.status(), 502);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        json,
        serde_json::json!({"success": false, "error": "upstream_unavailable"})
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn hung_daemon_fails_the_stream_handshake() {
    let mut config = common::test_config(common::hung_daemon().await, ModeOverride::Proxy);
    config.upstream_timeout = Duration::from_millis(300);
    let server = common::start(config).await;

    let started = Instant::now();
    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.local_addr())).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 502);
        }
        Err(other) => panic!("expected a 502 handshake failure, got {other}"),
        Ok(_) => panic!("handshake succeeded against a daemon that never answers"),
    }
    assert_eq!(server.active_sessions(), 0);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn stream_handshake_carries_client_headers_and_subprotocol() {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    let daemon = common::spawn_daemon().await;
    let server = common::start(common::test_config(daemon.url(), ModeOverride::Proxy)).await;

    let mut request = format!("ws://{}/ws", server.local_addr())
        .into_client_request()
        .unwrap();
    let headers = request.headers_mut();
    headers.insert("authorization", "Bearer dashboard".parse().unwrap());
    headers.insert("cookie", "session=abc".parse().unwrap());
    headers.insert("sec-websocket-protocol", common::DAEMON_PROTOCOL.parse().unwrap());

    let (mut socket, response) = tokio_tungstenite::connect_async(request).await.unwrap();
    assert_eq!(
        response.headers().get("sec-websocket-protocol").unwrap(),
        common::DAEMON_PROTOCOL
    );

    let seen = daemon.last_handshake.lock().unwrap().clone().unwrap();
    assert_eq!(seen.get("authorization").unwrap(), "Bearer dashboard");
    assert_eq!(seen.get("cookie").unwrap(), "session=abc");
    assert_eq!(seen.get("sec-websocket-protocol").unwrap(), common::DAEMON_PROTOCOL);
    assert_eq!(seen.get_all("sec-websocket-key").iter().count(), 1);

    let hello = socket.next().await.unwrap().unwrap();
    assert!(matches!(&hello, Message::Binary(b) if b.as_ref() == common::DAEMON_HELLO));

    server.shutdown().await.unwrap();
}
