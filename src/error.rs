//! Custom error types for tubecache

use serde::Serialize;
use thiserror::Error;

/// Main error type for tubecache operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Rate limited: gave up after {retries} retries: {url}")]
    RateLimited { url: String, retries: u32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage failure. Only carries context; the driver error is logged where it happens.
    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Event error: {0}")]
    Event(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for tubecache
pub type Result<T> = std::result::Result<T, Error>;

/// Wrap a storage failure without leaking driver detail to callers.
pub(crate) fn db_error(context: &str, err: sqlx::Error) -> Error {
    tracing::error!("{}: {:?}", context, err);
    Error::Database(context.to_string())
}

impl Error {
    /// Whether the error came from the upstream provider (including retry exhaustion)
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Upstream(_) | Error::RateLimited { .. } | Error::Http(_)
        )
    }

    /// HTTP-equivalent status for the entry layer
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::Validation(_) | Error::Database(_) => 400,
            e if e.is_upstream() => 502,
            _ => 500,
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            e if e.is_upstream() => "UPSTREAM_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Failure body returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: &'static str,
}

impl ErrorResponse {
    /// Build a client-facing body. Unclassified errors get a generic message.
    pub fn from_error(err: &Error) -> Self {
        let message = match err {
            Error::NotFound(_) | Error::Validation(_) | Error::Database(_) => err.to_string(),
            e if e.is_upstream() => "Upstream provider unavailable".to_string(),
            _ => {
                tracing::error!("Unhandled error: {:?}", err);
                "Internal Server Error".to_string()
            }
        };
        Self {
            success: false,
            message,
            error_code: err.error_code(),
        }
    }
}

/// Success body returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}
