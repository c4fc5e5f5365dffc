//! Error handling and custom error types
//!
//! Provides unified error handling across the function using thiserror.
//! Every variant that wraps an underlying failure exposes it through
//! [`std::error::Error::source`], and [`Error::report`] renders the whole chain.

use crate::transport::RequestDescription;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Error in {} request: {} - {}", .request.method, status_label(.status), .request)]
    RemoteRequest {
        request: RequestDescription,
        status: Option<StatusCode>,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Invalid JSON in response to {request}")]
    ResponseParse {
        request: RequestDescription,
        #[source]
        source: serde_json::Error,
    },

    #[error("Transcode error")]
    Transcode(#[from] TranscodeError),

    #[error("Failed to process documents")]
    BatchFailure(#[source] Box<Error>),

    #[error("Invalid content version id {0:?}")]
    InvalidContentVersionId(String),

    #[error("Invalid invocation payload: {0}")]
    InvalidPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("unsupported target format {}", .0.as_deref().map(|ext| format!("'{}'", ext)).unwrap_or_else(|| "(none)".to_string()))]
    UnsupportedFormat(Option<String>),

    #[error("invalid encoding option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("input is not a decodable image")]
    Decode(#[source] image::ImageError),

    #[error("encoder rejected image")]
    Encode(#[source] image::ImageError),

    #[error("transcode task failed: {0}")]
    Worker(String),
}

fn status_label(status: &Option<StatusCode>) -> String {
    match status {
        Some(status) => format!("HTTP {}", status),
        None => "transport failure".to_string(),
    }
}

impl Error {
    /// Wraps an error that escaped the per-file isolation boundary.
    pub fn batch_failure(cause: Error) -> Self {
        Error::BatchFailure(Box::new(cause))
    }

    /// One-line summary of this error followed by each underlying cause.
    pub fn report(&self) -> String {
        let mut summary = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            summary.push_str(": ");
            summary.push_str(&cause.to_string());
            source = cause.source();
        }
        summary
    }

    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Error::Transcode(TranscodeError::UnsupportedFormat(_)))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
