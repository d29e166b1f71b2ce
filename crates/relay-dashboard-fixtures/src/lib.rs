//! Mock dataset for the relay dashboard edge server.
//!
//! The [`FixtureStore`] holds the channels, messages, and agents that mock
//! mode serves in place of the relay daemon. It is loaded once at process
//! start (from the dataset embedded in this crate, or from a JSON file with
//! the same shape) and never mutated afterwards, so it can be shared by
//! every concurrent request and stream session without locking.

pub mod error;
pub mod store;

pub use error::FixtureError;
pub use store::{Dataset, FixtureStore, RESOURCE_NAMES};
