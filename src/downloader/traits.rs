// Resolver, muxer and sink capabilities

use std::path::Path;

use async_trait::async_trait;

use super::errors::{FetchFailure, MuxFailure};
use super::models::{FetchRequest, FetchedStream, MediaInfo, ProgressStatus, ProgressUpdate};

/// Lists remote streams and transfers one of them to disk
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Name of the resolver (for logging)
    fn name(&self) -> &'static str;

    /// Get title and stream list without downloading
    async fn resolve(&self, url: &str) -> Result<MediaInfo, FetchFailure>;

    /// Download one format, reporting progress as it goes
    async fn fetch(
        &self,
        request: FetchRequest<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<FetchedStream, FetchFailure>;
}

/// Combines a video file and an optional audio file into one container
#[async_trait]
pub trait Muxer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn mux(
        &self,
        video: &Path,
        audio: Option<&Path>,
        output: &Path,
    ) -> Result<(), MuxFailure>;
}

/// Receives progress from inside the fetch loop. Must not block.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: ProgressUpdate);
}

/// Receives user-facing status and error messages
pub trait MessageSink: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sink that forwards everything to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_progress(&self, update: ProgressUpdate) {
        match &update.status {
            ProgressStatus::Downloading {
                downloaded_bytes,
                total_bytes,
            } => tracing::trace!(
                kind = %update.kind,
                downloaded_bytes,
                total_bytes,
                percent = update.fraction().map(|f| f * 100.0),
                "download progress"
            ),
            ProgressStatus::Finished => tracing::debug!(kind = %update.kind, "download finished"),
            ProgressStatus::Other(status) => tracing::debug!(kind = %update.kind, "{}", status),
        }
    }
}

impl MessageSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _update: ProgressUpdate) {}
}

impl MessageSink for NullSink {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}
