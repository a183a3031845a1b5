// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV encoding/decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// A single portal request failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A persisted snapshot exists but cannot be used
    #[error("Snapshot {path} is unreadable: {message}")]
    Snapshot { path: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a snapshot error for the given file.
    pub fn snapshot(path: &Path, message: impl fmt::Display) -> Self {
        Self::Snapshot {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

/// Failure of one portal request. Always carries the requested URL.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, TLS or body transfer failed
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The per-request deadline elapsed
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Non-2xx response
    #[error("request to {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Request URL could not be built
    #[error("cannot build request URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Body was not the expected JSON shape
    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Classify a reqwest error, separating timeouts from other transport faults.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Transport { url, source }
        }
    }

    /// The URL of the failed request.
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. }
            | Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::InvalidUrl { url, .. }
            | Self::Decode { url, .. } => url,
        }
    }
}

/// A shop object that cannot become a record.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("record has no {0}")]
    MissingField(&'static str),

    #[error("invalid coordinate {0:?}")]
    InvalidCoordinate(String),

    #[error("record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}
