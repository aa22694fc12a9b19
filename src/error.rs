//! Error types
//!
//! Every failure the coordinator can hit, together with the policy that
//! decides whether it reaches the user or only the log.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Unsupported image format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Error opening image {basename}: {message}")]
    MetadataExtractionFailed { basename: String, message: String },

    #[error("Cannot read directory {}: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Release check failed: {0}")]
    NetworkOrParseFailure(String),

    #[error("Invalid version format: {0:?}")]
    InvalidVersionFormat(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),
}

/// Where a failure ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Shown to the user through the error reporter
    Surface,
    /// Written to the log and otherwise swallowed
    LogOnly,
}

impl CoordinatorError {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::UnsupportedFormat { .. } | Self::MetadataExtractionFailed { .. } => {
                Disposition::Surface
            }
            Self::DirectoryUnreadable { .. }
            | Self::NetworkOrParseFailure(_)
            | Self::InvalidVersionFormat(_)
            | Self::DownloadFailed(_) => Disposition::LogOnly,
        }
    }
}

impl From<reqwest::Error> for CoordinatorError {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkOrParseFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
