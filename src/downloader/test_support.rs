// Fakes shared by the orchestrator, mux engine and service tests

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::errors::{FetchFailure, FetchStage, MuxFailure};
use super::models::{
    FetchRequest, FetchedStream, MediaInfo, ProgressUpdate, StreamDescriptor, StreamKind,
};
use super::traits::{MessageSink, Muxer, ProgressSink, Resolver};

pub fn video_descriptor(format_id: &str, height: u32, size: u64) -> StreamDescriptor {
    StreamDescriptor {
        format_id: format_id.to_string(),
        video_codec: Some("avc1.640028".to_string()),
        audio_codec: Some("none".to_string()),
        height: Some(height),
        extension: Some("mp4".to_string()),
        file_size: Some(size),
    }
}

pub fn audio_descriptor(format_id: &str, size: u64) -> StreamDescriptor {
    StreamDescriptor {
        format_id: format_id.to_string(),
        video_codec: Some("none".to_string()),
        audio_codec: Some("mp4a.40.2".to_string()),
        height: None,
        extension: Some("m4a".to_string()),
        file_size: Some(size),
    }
}

/// Writes `<stem>.mp4` / `<stem>.m4a` into the requested directory
pub struct FakeResolver {
    pub formats: Vec<StreamDescriptor>,
    pub title: Option<String>,
    pub fail_video: bool,
    pub fail_audio: bool,
    /// Directories fetches were asked to write into
    pub dirs: Mutex<Vec<PathBuf>>,
    pub fetched: Mutex<Vec<(StreamKind, String)>>,
}

impl Default for FakeResolver {
    fn default() -> Self {
        Self {
            formats: vec![
                video_descriptor("137", 1080, 50_000_000),
                video_descriptor("136", 720, 20_000_000),
                audio_descriptor("140", 5_000_000),
            ],
            title: Some("Test Clip".to_string()),
            fail_video: false,
            fail_audio: false,
            dirs: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }
}

impl FakeResolver {
    pub fn failing(kind: StreamKind) -> Self {
        Self {
            fail_video: kind == StreamKind::Video,
            fail_audio: kind == StreamKind::Audio,
            ..Self::default()
        }
    }

    pub fn scratch_dirs(&self) -> Vec<PathBuf> {
        self.dirs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn resolve(&self, _url: &str) -> Result<MediaInfo, FetchFailure> {
        Ok(MediaInfo {
            id: "fake".to_string(),
            title: self.title.clone().unwrap_or_default(),
            uploader: "nobody".to_string(),
            duration_seconds: 10,
            formats: self.formats.clone(),
        })
    }

    async fn fetch(
        &self,
        request: FetchRequest<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<FetchedStream, FetchFailure> {
        self.dirs.lock().unwrap().push(request.dir.to_path_buf());
        self.fetched
            .lock()
            .unwrap()
            .push((request.kind, request.format_id.to_string()));

        let ext = match request.kind {
            StreamKind::Video => "mp4",
            StreamKind::Audio => "m4a",
        };
        let path = request
            .dir
            .join(format!("{}.{}", request.kind.file_stem(), ext));

        let fails = match request.kind {
            StreamKind::Video => self.fail_video,
            StreamKind::Audio => self.fail_audio,
        };
        if fails {
            // Leave a partial file behind, as an interrupted transfer would
            std::fs::write(path.with_extension(format!("{}.part", ext)), b"partial").unwrap();
            return Err(FetchFailure::from_stderr(
                FetchStage::Stream(request.kind),
                "ERROR: HTTP Error 403: Forbidden",
            ));
        }

        progress.on_progress(ProgressUpdate::downloading(request.kind, 512, 0));
        std::fs::write(&path, request.kind.file_stem()).unwrap();
        progress.on_progress(ProgressUpdate::downloading(request.kind, 1024, 1024));

        Ok(FetchedStream {
            path,
            title: self.title.clone(),
        })
    }
}

/// Concatenates its inputs into the output, or fails after writing a
/// partial output.
#[derive(Default)]
pub struct FakeMuxer {
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<(PathBuf, Option<PathBuf>)>>,
}

impl FakeMuxer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Muxer for FakeMuxer {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn mux(&self, video: &Path, audio: Option<&Path>, output: &Path) -> Result<(), MuxFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((video.to_path_buf(), audio.map(Path::to_path_buf)));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail {
            std::fs::write(output, b"truncated").unwrap();
            return Err(MuxFailure::new("Conversion failed!"));
        }

        let mut bytes = std::fs::read(video).map_err(|e| MuxFailure::new(e.to_string()))?;
        if let Some(audio) = audio {
            bytes.extend(std::fs::read(audio).map_err(|e| MuxFailure::new(e.to_string()))?);
        }
        std::fs::write(output, bytes).map_err(|e| MuxFailure::new(e.to_string()))
    }
}

/// Keeps every message for inspection
#[derive(Default)]
pub struct RecordingSink {
    pub infos: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub progress: Mutex<Vec<ProgressUpdate>>,
}

impl MessageSink for RecordingSink {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, update: ProgressUpdate) {
        self.progress.lock().unwrap().push(update);
    }
}
