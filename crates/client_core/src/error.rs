//! Error types for the colorize client.

use std::path::PathBuf;

use reqwest::StatusCode;
use shared::{domain::ImageId, error::ProtocolException};
use thiserror::Error;

/// Failure talking to the colorize service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("API error: {status}")]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolException),
}

impl ServiceError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            Self::Protocol(_) => None,
        }
    }
}

/// Failure recorded in a session. `Display` is the inline message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("API error: {}", .status.as_u16())]
    Transport { status: StatusCode },
    #[error("Failed to process image: {0}")]
    Request(String),
    #[error("The colorization service returned neither a colorized nor an original image")]
    UnexpectedResponseShape,
    #[error("Colorization of image {image_id} failed: {reason}")]
    FallbackFailure { image_id: ImageId, reason: String },
    #[error("Failed to read {}: {reason}", .path.display())]
    SourceRead { path: PathBuf, reason: String },
    #[error("Processing was interrupted before the service responded")]
    Cancelled,
}

impl From<ServiceError> for WorkflowError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Status { status, .. } => Self::Transport { status },
            other => Self::Request(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid colorize API url '{url}': {source}")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("colorize API url '{0}' must use http or https")]
    UnsupportedScheme(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
