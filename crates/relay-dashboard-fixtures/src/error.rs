//! Error types for fixture loading and lookup.

/// Errors raised by the [`FixtureStore`](crate::FixtureStore).
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// No dataset or record exists under the requested name.
    #[error("fixture not found: {0}")]
    NotFound(String),

    /// The dataset file could not be read.
    #[error("failed to read fixture file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The dataset is not valid JSON or does not match the expected shape.
    #[error("failed to parse fixture dataset: {source}")]
    Parse {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The dataset parsed but is internally inconsistent.
    #[error("invalid fixture dataset: {0}")]
    Invalid(String),
}
