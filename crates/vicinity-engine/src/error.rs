//! Error types for the Vicinity engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup, ingestion and shutdown.

/// Top-level error for the engine binary.
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
        source: vicinity_core::config::ConfigError,
    },

    /// User registry construction failed.
    #[error("registry error: {source}")]
    Registry {
        /// The underlying geography error.
        #[from]
        source: vicinity_geo::GeoError,
    },

    /// Starting or stopping ingestion failed.
    #[error("ingest error: {source}")]
    Ingest {
        /// The underlying ingest error.
        #[from]
        source: vicinity_core::ingest::IngestError,
    },

    /// The tracing subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the logging failure.
        message: String,
    },
}
