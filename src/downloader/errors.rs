// Error types for acquisition and muxing

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::extractors::FailureCause;
use super::models::StreamKind;

/// Which resolver call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Metadata,
    Stream(StreamKind),
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => f.write_str("metadata lookup"),
            Self::Stream(kind) => write!(f, "{} fetch", kind),
        }
    }
}

/// Failure while resolving metadata or transferring a stream
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// yt-dlp (binary or python module) could not be found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The tool could not be started or waited on
    #[error("Execution error: {0}")]
    Execution(String),

    /// The tool did not finish in time
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Failed to parse yt-dlp output
    #[error("Parse error: {0}")]
    Parse(String),

    /// The resolver ran but reported an error
    #[error("{stage} failed ({}): {details}", .cause.description())]
    Rejected {
        stage: FetchStage,
        cause: FailureCause,
        details: String,
    },
}

impl FetchFailure {
    /// Classify resolver stderr into a rejection
    pub fn from_stderr(stage: FetchStage, stderr: &str) -> Self {
        let cause = super::extractors::diagnose_error(stderr);
        Self::Rejected {
            stage,
            cause,
            details: super::extractors::error_excerpt(stderr),
        }
    }

    pub fn cause(&self) -> Option<FailureCause> {
        match self {
            Self::Rejected { cause, .. } => Some(*cause),
            Self::Timeout(_) => Some(FailureCause::NetworkTimeout),
            _ => None,
        }
    }
}

/// Failure while combining the streams into the output container
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MuxFailure(pub String);

impl MuxFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Non-fatal failure to delete a temporary artifact
#[derive(Debug, Error)]
#[error("Error cleaning up temporary file {}: {source}", .path.display())]
pub struct CleanupWarning {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Top-level error for a download request
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchFailure),

    #[error("Failed to merge video and audio: {0}")]
    Mux(#[from] MuxFailure),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No downloadable video formats found")]
    NoQualities,

    #[error("Quality not available: {0}")]
    QualityNotFound(String),
}

impl DownloadError {
    /// Message suitable for showing to the user, with a hint when the
    /// failure cause is known.
    pub fn user_message(&self) -> String {
        let hint = match self {
            Self::Fetch(failure) => failure.cause().map(|c| c.suggestion()),
            _ => None,
        };

        match hint {
            Some(hint) => format!("Error: {}\n\n{}", self, hint),
            None => format!("Error: {}", self),
        }
    }
}
