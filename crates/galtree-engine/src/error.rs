//! Error types for the forest runner binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and forest processing.

/// Top-level error for the forest runner binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: galtree_core::ConfigError,
    },

    /// The forest file could not be read.
    #[error("failed to read forest file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The forest file is not valid JSON.
    #[error("failed to parse forest file: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Traversal of one forest failed.
    #[error("forest {forest_id} failed: {source}")]
    Forest {
        /// The forest that failed.
        forest_id: u64,
        /// The underlying traversal error.
        source: galtree_core::TreeError,
    },

    /// A forest worker panicked or was cancelled.
    #[error("forest worker failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
