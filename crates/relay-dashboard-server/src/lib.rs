//! Dual-mode edge server for the relay dashboard.
//!
//! This crate provides an Axum HTTP server that sits between the browser
//! dashboard and the relay daemon:
//!
//! - **Proxy mode** forwards every `/api` request and the `/ws` event
//!   stream to the daemon verbatim.
//! - **Mock mode** answers the same surface from the checked-in fixtures
//!   and drives a deterministic synthetic event feed, so the dashboard
//!   runs standalone for demos, tests, and development.
//! - Every other path is served from the pre-built dashboard assets, with
//!   unmatched client-side routes falling back to `index.html`.
//!
//! # Architecture
//!
//! The [`ServerMode`] is decided once at startup ([`startup::decide_mode`])
//! and held in the immutable [`AppState`] for the process lifetime. Each
//! inbound request goes through [`RequestRouter::route`], which picks a
//! [`RouteDecision`]. `WebSocket` connections become [`StreamSession`]s
//! that own their socket pair and close both sides together.
//!
//! [`ServerMode`]: relay_dashboard_types::ServerMode
//! [`StreamSession`]: session::StreamSession

pub mod config;
pub mod error;
pub mod feed;
pub mod forward;
pub mod handlers;
pub mod health;
pub mod mock;
pub mod router;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use config::{EdgeConfig, FeedRepeat, ModeOverride, StreamSettings};
pub use error::EdgeError;
pub use router::{build_router, RequestRouter, RouteDecision};
pub use server::{start_server, ServerError, ServerHandle};
pub use state::AppState;
