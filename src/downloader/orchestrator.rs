// Orchestrator: metadata lookup and acquisition of the video/audio pair

use std::path::PathBuf;
use std::sync::Arc;

use super::errors::DownloadError;
use super::format_selector::FormatSelector;
use super::models::{FetchRequest, FetchResult, MediaInfo, QualityOption, StreamKind};
use super::scratch::ScratchSpace;
use super::traits::{MessageSink, ProgressSink, Resolver};

pub struct Downloader {
    resolver: Arc<dyn Resolver>,
    progress: Arc<dyn ProgressSink>,
    messages: Arc<dyn MessageSink>,
    scratch_root: Option<PathBuf>,
}

impl Downloader {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        progress: Arc<dyn ProgressSink>,
        messages: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            resolver,
            progress,
            messages,
            scratch_root: None,
        }
    }

    /// Parent directory for scratch space; the system temp dir when `None`
    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    pub async fn get_media_info(&self, url: &str) -> Result<MediaInfo, DownloadError> {
        tracing::debug!(resolver = self.resolver.name(), url, "[Downloader] resolving");
        let info = self.resolver.resolve(url).await?;
        Ok(info)
    }

    /// Resolve and normalize. An empty catalog is reported as `NoQualities`.
    pub async fn list_qualities(&self, url: &str) -> Result<Vec<QualityOption>, DownloadError> {
        let info = self.get_media_info(url).await?;
        let options = FormatSelector::build_quality_options(&info.formats);
        tracing::info!(
            title = %info.title,
            streams = info.formats.len(),
            options = options.len(),
            "[Downloader] catalog normalized"
        );
        if options.is_empty() {
            return Err(DownloadError::NoQualities);
        }
        Ok(options)
    }

    /// Fetch the chosen video stream and its paired audio stream into a
    /// fresh scratch directory. On failure the scratch directory is gone
    /// by the time the error is returned.
    pub async fn acquire(
        &self,
        url: &str,
        quality: &QualityOption,
    ) -> Result<FetchResult, DownloadError> {
        let mut scratch = ScratchSpace::create(self.scratch_root.as_deref(), self.messages.clone())?;
        let dir = scratch.dir().to_path_buf();

        tracing::info!(
            quality = %quality.label,
            video = %quality.format_id,
            audio = quality.audio_format_id.as_deref().unwrap_or("none"),
            dir = %dir.display(),
            "[Downloader] acquiring streams"
        );

        let video = self.resolver.fetch(
            FetchRequest {
                url,
                format_id: &quality.format_id,
                kind: StreamKind::Video,
                dir: &dir,
            },
            self.progress.as_ref(),
        );

        let audio = async {
            match quality.audio_format_id.as_deref() {
                Some(format_id) => self
                    .resolver
                    .fetch(
                        FetchRequest {
                            url,
                            format_id,
                            kind: StreamKind::Audio,
                            dir: &dir,
                        },
                        self.progress.as_ref(),
                    )
                    .await
                    .map(Some),
                None => {
                    tracing::warn!("[Downloader] no audio stream available, output will be video-only");
                    self.messages
                        .warn("No separate audio stream found; the file will have no added soundtrack");
                    Ok(None)
                }
            }
        };

        // The first failure drops the other fetch; `scratch` is released on return
        let (video, audio) = tokio::try_join!(video, audio).map_err(|e| {
            tracing::warn!("[Downloader] ✗ acquisition failed: {}", e);
            e
        })?;

        scratch.set_path(StreamKind::Video, video.path);
        if let Some(audio) = audio {
            scratch.set_path(StreamKind::Audio, audio.path);
        }

        let title = match video.title.filter(|t| !t.trim().is_empty()) {
            Some(title) => title,
            None => {
                let message = format!(
                    "Resolver returned no title, using format id {} instead",
                    quality.format_id
                );
                tracing::warn!("[Downloader] {}", message);
                self.messages.warn(&message);
                quality.format_id.clone()
            }
        };

        tracing::info!(title = %title, "[Downloader] ✓ streams acquired");
        Ok(FetchResult { scratch, title })
    }
}
