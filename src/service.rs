// MediaService - the entry point a front end talks to
//
// Wires the resolver, orchestrator and mux engine together and turns
// every failure into one user-facing message.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::downloader::delivery::{self, Delivery};
use crate::downloader::extractors::YtDlpResolver;
use crate::downloader::muxer::{FfmpegMuxer, MuxEngine};
use crate::downloader::{
    DownloadError, Downloader, MessageSink, Muxer, ProgressSink, QualityOption, Resolver,
};

pub struct MediaService {
    downloader: Downloader,
    engine: MuxEngine,
    messages: Arc<dyn MessageSink>,
    output_dir: PathBuf,
}

impl MediaService {
    pub fn new(
        config: &Config,
        resolver: Arc<dyn Resolver>,
        muxer: Arc<dyn Muxer>,
        progress: Arc<dyn ProgressSink>,
        messages: Arc<dyn MessageSink>,
    ) -> Self {
        let downloader = Downloader::new(resolver, progress, messages.clone())
            .with_scratch_root(config.scratch_dir.clone());
        let engine = MuxEngine::new(muxer, messages.clone());

        Self {
            downloader,
            engine,
            messages,
            output_dir: config.output_dir.clone(),
        }
    }

    /// yt-dlp + ffmpeg as configured
    pub fn from_config(
        config: &Config,
        progress: Arc<dyn ProgressSink>,
        messages: Arc<dyn MessageSink>,
    ) -> Self {
        Self::new(
            config,
            Arc::new(YtDlpResolver::new(config.clone())),
            Arc::new(FfmpegMuxer::from_config(config)),
            progress,
            messages,
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn list_qualities(&self, url: &str) -> Result<Vec<QualityOption>, DownloadError> {
        self.report(self.downloader.list_qualities(url).await)
    }

    /// Acquire both streams, mux them into `<output_dir>/<title>.mp4` and
    /// return that path.
    pub async fn download(&self, url: &str, quality: &QualityOption) -> Result<PathBuf, DownloadError> {
        let result = self.download_inner(url, quality).await;
        self.report(result)
    }

    async fn download_inner(&self, url: &str, quality: &QualityOption) -> Result<PathBuf, DownloadError> {
        delivery::ensure_output_dir(&self.output_dir)?;

        self.messages
            .info(&format!("Downloading {} from {}", quality.label, url));
        let fetch = self.downloader.acquire(url, quality).await?;

        let output = delivery::output_path_for(&self.output_dir, &fetch.title);
        self.messages
            .info(&format!("Merging video and audio into {}", output.display()));
        let path = self.engine.finish(fetch, &output).await?;

        self.messages.info(&format!("Saved {}", path.display()));
        Ok(path)
    }

    pub async fn deliver(&self, path: &Path) -> Result<Delivery, DownloadError> {
        let result = Delivery::from_path(path).await.map_err(DownloadError::from);
        self.report(result)
    }

    fn report<T>(&self, result: Result<T, DownloadError>) -> Result<T, DownloadError> {
        if let Err(e) = &result {
            self.messages.error(&e.user_message());
        }
        result
    }
}
