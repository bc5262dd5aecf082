//! Upstream client errors.

use thiserror::Error;

use crate::types::VersionParseError;

/// The caller cancelled the operation.
///
/// This is the only failure an [`UpstreamClient`](super::UpstreamClient)
/// surfaces; everything else degrades to an empty or absent result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Failure talking to a single upstream feed.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("version not found: {package}@{version}")]
    VersionNotFound { package: String, version: String },

    #[error("invalid feed entry: {0}")]
    InvalidEntry(String),

    #[error("service index has no {0} resource")]
    MissingResource(&'static str),

    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid version: {0}")]
    Version(#[from] VersionParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl UpstreamError {
    /// Not-found is the expected outcome when probing feeds, not a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            UpstreamError::PackageNotFound(_) | UpstreamError::VersionNotFound { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UpstreamError::Cancelled(_))
    }
}
