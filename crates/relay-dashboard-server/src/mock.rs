//! Fixture-backed HTTP responder for mock mode.
//!
//! [`MockResponder::handle`] mirrors the relay daemon's API surface from
//! the [`FixtureStore`], wrapping payloads in the same
//! `{"success": true, "data": ...}` envelope the daemon uses. Responses
//! depend only on the method, the path, and the query string, so replaying
//! a request yields byte-identical output.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/health` | Liveness, reports mock mode |
//! | `GET` | `/api/status` | Record counts |
//! | `GET` | `/api/channels` | List channels |
//! | `GET` | `/api/channels/{name}` | Single channel |
//! | `GET` | `/api/channels/{name}/messages` | Messages in a channel |
//! | `GET` | `/api/messages` | All messages, optional `?channel=` |
//! | `GET` | `/api/agents` | List agents |
//! | `GET` | `/api/agents/{name}` | Single agent |
//! | `POST` | `/api/send` | Acknowledged, never persisted |

use std::sync::Arc;

use axum::extract::Query;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use relay_dashboard_fixtures::{FixtureError, FixtureStore};
use relay_dashboard_types::{AgentStatus, ApiEnvelope, ServerMode};
use serde::Serialize;
use tracing::debug;

use crate::config::{StreamSettings, API_PREFIX};
use crate::error::EdgeError;
use crate::feed::{FeedScript, SyntheticFeed};

/// Query parameters for `GET /api/messages`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct MessagesQuery {
    /// Only return messages posted to this channel.
    pub channel: Option<String>,
}

/// Record counts reported by `GET /api/status`.
#[derive(Debug, Serialize)]
struct StatusPayload {
    agents: usize,
    online: usize,
    channels: usize,
    messages: usize,
}

/// Serves the daemon's HTTP contract and stream script from fixtures.
#[derive(Debug, Clone)]
pub struct MockResponder {
    fixtures: Arc<FixtureStore>,
    script: Arc<FeedScript>,
    api_prefix: String,
}

impl MockResponder {
    /// Responder over `fixtures` for the standard `/api` prefix.
    pub fn new(fixtures: Arc<FixtureStore>) -> Self {
        let script = Arc::new(FeedScript::from_fixtures(&fixtures));
        Self {
            fixtures,
            script,
            api_prefix: API_PREFIX.to_owned(),
        }
    }

    /// The fixture store behind this responder.
    pub fn fixtures(&self) -> &FixtureStore {
        &self.fixtures
    }

    /// A fresh synthetic feed for one stream session.
    pub fn synthetic_feed(&self, settings: StreamSettings) -> SyntheticFeed {
        SyntheticFeed::new(Arc::clone(&self.script), settings.repeat)
    }

    /// Answer one API request.
    ///
    /// Unknown paths get a 404 `not_found` body, whatever the method.
    pub fn handle(&self, method: &Method, uri: &Uri) -> Response {
        match self.resolve(method, uri) {
            Ok(response) => response,
            Err(e) => {
                debug!(path = uri.path(), %method, mode = %ServerMode::Mock, error = %e, "mock request rejected");
                e.into_response()
            }
        }
    }

    fn resolve(&self, method: &Method, uri: &Uri) -> Result<Response, EdgeError> {
        let path = uri.path();
        let not_found = || EdgeError::NotFound {
            path: path.to_owned(),
        };
        let fixture_miss = |e: FixtureError| EdgeError::from_fixture(&e, path);

        let rest = path
            .strip_prefix(self.api_prefix.as_str())
            .ok_or_else(not_found)?;
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let is_read = *method == Method::GET || *method == Method::HEAD;

        match (is_read, segments.as_slice()) {
            (true, ["health"]) => json_ok(&serde_json::json!({
                "status": "ok",
                "mode": ServerMode::Mock,
            })),
            (true, ["status"]) => json_ok(&self.status()),
            (true, ["channels"]) => {
                json_ok(&self.fixtures.get("channels").map_err(fixture_miss)?)
            }
            (true, ["channels", name]) => {
                json_ok(self.fixtures.channel(name).map_err(fixture_miss)?)
            }
            (true, ["channels", name, "messages"]) => {
                json_ok(&self.fixtures.messages_in(name).map_err(fixture_miss)?)
            }
            (true, ["messages"]) => {
                let query = Query::<MessagesQuery>::try_from_uri(uri)
                    .map(|Query(q)| q)
                    .unwrap_or_default();
                match query.channel {
                    Some(channel) => {
                        json_ok(&self.fixtures.messages_in(&channel).map_err(fixture_miss)?)
                    }
                    None => json_ok(&self.fixtures.get("messages").map_err(fixture_miss)?),
                }
            }
            (true, ["agents"]) => json_ok(&self.fixtures.get("agents").map_err(fixture_miss)?),
            (true, ["agents", name]) => json_ok(self.fixtures.agent(name).map_err(fixture_miss)?),
            (false, ["send"]) if *method == Method::POST => json_response(
                StatusCode::ACCEPTED,
                &serde_json::json!({"accepted": true, "persisted": false}),
            ),
            _ => Err(not_found()),
        }
    }

    fn status(&self) -> StatusPayload {
        let agents = self.fixtures.agents();
        StatusPayload {
            agents: agents.len(),
            online: agents
                .iter()
                .filter(|a| a.status == AgentStatus::Online)
                .count(),
            channels: self.fixtures.channels().len(),
            messages: self.fixtures.messages().len(),
        }
    }
}

/// 200 response with `data` in the success envelope.
fn json_ok<T: Serialize + ?Sized>(data: &T) -> Result<Response, EdgeError> {
    json_response(StatusCode::OK, data)
}

fn json_response<T: Serialize + ?Sized>(
    status: StatusCode,
    data: &T,
) -> Result<Response, EdgeError> {
    let body = serde_json::to_vec(&ApiEnvelope::ok(data))?;
    Ok((
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body,
    )
        .into_response())
}
