//! Error types for the annotation engine

use thiserror::Error;

/// Result type alias for annotation, rendering and export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while annotating, compositing or exporting
#[derive(Error, Debug)]
pub enum Error {
    /// The base image could not be fetched or decoded
    #[error("Failed to load image: {0}")]
    LoadError(String),

    /// Failed to paint onto the raster surface
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to encode or deliver an export
    #[error("Export failed: {0}")]
    ExportError(String),

    /// An annotation was rejected at the store boundary
    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    /// Output from the analysis or critique model could not be understood
    #[error("Analysis failed: {0}")]
    AnalysisError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Key/value storage failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", err))
    }
}

#[cfg(feature = "remote")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}
