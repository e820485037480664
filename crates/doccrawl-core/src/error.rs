use thiserror::Error;

use crate::models::FailureKind;

/// Application-wide error types for doccrawl.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page, sitemap, or robots.txt).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// LLM API call failed.
    #[error("LLM error (HTTP {status_code}): {message}")]
    LlmError { message: String, status_code: u16 },

    /// HTML-to-Markdown conversion failed.
    #[error("Cleaner error: {0}")]
    CleanerError(String),

    /// The model reply was empty or unusable.
    #[error("Transform error: {0}")]
    TransformError(String),

    /// Structured extraction returned something that is not the requested JSON.
    #[error("Schema validation error: {0}")]
    SchemaValidationError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The URL is disallowed by the site's robots.txt.
    #[error("Blocked by robots.txt: {0}")]
    RobotsDisallowed(String),

    /// Writing an artifact to disk failed.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Missing credentials or required configuration. Fatal.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The run was cancelled before the operation finished.
    #[error("Cancelled")]
    Cancelled,

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// The per-page failure class this error maps to when it surfaces
    /// inside the page pipeline.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AppError::HttpError(_)
            | AppError::Timeout(_)
            | AppError::NetworkError(_)
            | AppError::RobotsDisallowed(_) => FailureKind::Fetch,
            AppError::CleanerError(_) => FailureKind::Extraction,
            AppError::LlmError { .. }
            | AppError::TransformError(_)
            | AppError::SchemaValidationError(_)
            | AppError::SerializationError(_)
            | AppError::RateLimitExceeded => FailureKind::Transform,
            AppError::PersistenceError(_) => FailureKind::Persistence,
            AppError::ConfigError(_) | AppError::Cancelled | AppError::Generic(_) => {
                FailureKind::Other
            }
        }
    }

    /// Returns true if this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::ConfigError(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::PersistenceError(e.to_string())
    }
}
