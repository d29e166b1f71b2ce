//! Forwarding to the relay daemon.
//!
//! [`UpstreamClient::forward`] passes one API request through to the
//! daemon (method, headers minus `host` and hop-by-hop headers, body,
//! query string) and relays the daemon's status, headers, and body back.
//! Connection failures, timeouts, and 5xx answers all become
//! [`EdgeError::UpstreamUnavailable`]; there are no retries and no
//! fallback to fixtures.
//!
//! [`UpstreamClient::connect_stream`] opens the daemon side of a proxied
//! `WebSocket` session.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, Method};
use axum::response::Response;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::EdgeError;
use crate::health::join_url;

/// Daemon side of a proxied stream.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open daemon stream and the subprotocol the daemon selected.
#[derive(Debug)]
pub struct UpstreamStream {
    /// The daemon socket.
    pub socket: UpstreamSocket,
    /// `Sec-WebSocket-Protocol` chosen by the daemon, if any.
    pub protocol: Option<String>,
}

/// Headers that describe a single hop and are never forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Copy `headers` without `host`, hop-by-hop headers, and any header
/// listed in `Connection`.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .collect();

    headers
        .iter()
        .filter(|(name, _)| {
            **name != header::HOST
                && !HOP_BY_HOP.contains(*name)
                && !listed.iter().any(|l| l == name.as_str())
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// HTTP and `WebSocket` client bound to one daemon.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl UpstreamClient {
    /// Client for `base_url` whose calls give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, EdgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| EdgeError::Config(format!("failed to build upstream client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Daemon base URL.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Forward one request and relay the daemon's answer.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::UpstreamUnavailable`] if the daemon cannot be
    /// reached, times out, or answers with a 5xx status.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, EdgeError> {
        let url = join_url(&self.base_url, path_and_query)?;
        let target = url.to_string();
        let unavailable = |reason: String| EdgeError::UpstreamUnavailable {
            target: target.clone(),
            reason,
        };

        let upstream = self
            .client
            .request(method, url.clone())
            .headers(forwardable_headers(headers))
            .body(body)
            .send()
            .await
            .map_err(|e| unavailable(describe_reqwest_error(&e, self.timeout)))?;

        let status = upstream.status();
        if status.is_server_error() {
            return Err(unavailable(format!("daemon answered {status}")));
        }

        let response_headers = forwardable_headers(upstream.headers());
        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| unavailable(describe_reqwest_error(&e, self.timeout)))?;

        debug!(upstream = %url, %status, bytes = bytes.len(), "forwarded request");

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }

    /// `WebSocket` URL on the daemon for `path_and_query`.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::Config`] if the base URL cannot carry a
    /// `ws`/`wss` scheme.
    pub fn stream_url(&self, path_and_query: &str) -> Result<Url, EdgeError> {
        let mut url = join_url(&self.base_url, path_and_query)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| EdgeError::Config(format!("cannot use {scheme} scheme for {url}")))?;
        Ok(url)
    }

    /// Open the daemon side of a stream session.
    ///
    /// The client's handshake headers are carried over (see
    /// [`handshake_headers`]), so cookies, credentials, and requested
    /// subprotocols reach the daemon the same way they do on forwarded
    /// API calls.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::UpgradeFailed`] if the handshake fails or does
    /// not finish within the upstream timeout.
    pub async fn connect_stream(
        &self,
        path_and_query: &str,
        headers: &HeaderMap,
    ) -> Result<UpstreamStream, EdgeError> {
        let url = self.stream_url(path_and_query)?;
        let target = url.to_string();
        let failed = |reason: String| EdgeError::UpgradeFailed {
            target: target.clone(),
            reason,
        };

        let mut request = target
            .as_str()
            .into_client_request()
            .map_err(|e| failed(e.to_string()))?;
        for (name, value) in &handshake_headers(headers) {
            request.headers_mut().append(name.clone(), value.clone());
        }

        match tokio::time::timeout(self.timeout, tokio_tungstenite::connect_async(request)).await {
            Ok(Ok((socket, response))) => {
                let protocol = response
                    .headers()
                    .get(header::SEC_WEBSOCKET_PROTOCOL)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                Ok(UpstreamStream { socket, protocol })
            }
            Ok(Err(e)) => Err(failed(e.to_string())),
            Err(_) => Err(failed(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

/// Client handshake headers to replay on the daemon handshake.
///
/// Same filtering as [`forwardable_headers`], minus the per-connection
/// `Sec-WebSocket-*` negotiation headers, which the upstream handshake
/// generates itself. `Sec-WebSocket-Protocol` is kept.
pub fn handshake_headers(headers: &HeaderMap) -> HeaderMap {
    forwardable_headers(headers)
        .iter()
        .filter(|(name, _)| {
            **name == header::SEC_WEBSOCKET_PROTOCOL
                || !name.as_str().starts_with("sec-websocket-")
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Short, log-friendly description of a failed daemon call.
fn describe_reqwest_error(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("timed out after {}ms", timeout.as_millis())
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}
