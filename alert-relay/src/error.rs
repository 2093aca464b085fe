//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while turning an inbound event into channel text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("alert status '{0}' is neither firing nor resolved")]
    InvalidStatus(String),

    #[error("commonLabels.severity is required for telegram rendering")]
    MissingSeverity,

    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("field '{field}' has an unsupported value: {reason}")]
    UnsupportedValue { field: String, reason: String },

    #[error("rendered message is empty")]
    EmptyMessage,
}

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No destination matched {source_kind} alert '{key}'")]
    NoDestination {
        source_kind: &'static str,
        key: String,
    },

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{channel} delivery failed: {reason}")]
    Delivery {
        channel: &'static str,
        reason: String,
    },

    #[error("Directory lookup failed: {0}")]
    Directory(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn no_destination(source_kind: &'static str, key: impl Into<String>) -> Self {
        Self::NoDestination {
            source_kind,
            key: key.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn delivery(channel: &'static str, reason: impl Into<String>) -> Self {
        Self::Delivery {
            channel,
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
