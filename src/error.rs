//! Error types for feedhook.

use thiserror::Error;

/// Common error type for feedhook.
#[derive(Error, Debug)]
pub enum FeedhookError {
    /// The feed could not be fetched (transport, timeout, status or body).
    #[error("fetch error for {url}: {message}")]
    Fetch {
        /// URL that was requested.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Human readable reason.
        message: String,
    },

    /// The feed body is malformed or misses a required field.
    #[error("parse error: {0}")]
    Parse(String),

    /// Database query failure.
    ///
    /// Raised for statement-level problems such as constraint violations.
    /// The connection itself is still usable.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// The webhook rejected the message or could not be reached.
    #[error("delivery error: {message}")]
    Delivery {
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Human readable reason.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedhookError {
    /// Build a fetch error without an HTTP status.
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        FeedhookError::Fetch {
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Build a delivery error without an HTTP status.
    pub fn delivery(message: impl Into<String>) -> Self {
        FeedhookError::Delivery {
            status: None,
            message: message.into(),
        }
    }

    /// Whether the store could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, FeedhookError::DatabaseConnection(_))
    }

    /// HTTP status attached to a fetch or delivery error.
    pub fn status(&self) -> Option<u16> {
        match self {
            FeedhookError::Fetch { status, .. } | FeedhookError::Delivery { status, .. } => *status,
            _ => None,
        }
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for FeedhookError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => FeedhookError::DatabaseConnection(e.to_string()),
            other => FeedhookError::Database(other.to_string()),
        }
    }
}

/// Result type alias for feedhook operations.
pub type Result<T> = std::result::Result<T, FeedhookError>;
