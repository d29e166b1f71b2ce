//! Wire types shared by the relay dashboard edge server.
//!
//! Everything the dashboard client sees over HTTP or the event stream is
//! defined here, whether it originates from the relay daemon (proxy mode)
//! or from the checked-in fixtures (mock mode). Types flow downstream to
//! `TypeScript` via `ts-rs` so the client stays mode-agnostic.
//!
//! # Modules
//!
//! - [`entities`] -- Domain records served by the daemon (channels, messages, agents)
//! - [`api`] -- HTTP response envelopes and structured error bodies
//! - [`stream`] -- Event frames pushed over the `WebSocket` surface
//! - [`mode`] -- The process-wide [`ServerMode`]

pub mod api;
pub mod entities;
pub mod mode;
pub mod stream;

pub use api::{ApiEnvelope, ErrorBody, ErrorCode};
pub use entities::{Agent, AgentStatus, Channel, Message};
pub use mode::ServerMode;
pub use stream::{StreamEvent, StreamEventKind};
