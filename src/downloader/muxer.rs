// Mux engine: combine the acquired streams into one MP4, then clean up
//
// ffmpeg re-encodes with a fixed codec pair (libx264 + aac). Without an
// audio file only the video input is mapped and the result is video-only.
// The muxer writes `<output>.part`, which replaces `<output>` only once the
// mux has succeeded, so a failed run never touches an existing file.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::errors::{CleanupWarning, DownloadError, MuxFailure};
use super::models::FetchResult;
use super::tools::{ToolManager, ToolType};
use super::traits::{MessageSink, Muxer};
use super::utils::{run_output_with_timeout, RunError};
use crate::config::Config;

pub const VIDEO_CODEC: &str = "libx264";
pub const AUDIO_CODEC: &str = "aac";

/// Lines of ffmpeg stderr kept in a failure message
const STDERR_TAIL_LINES: usize = 5;

pub struct FfmpegMuxer {
    ffmpeg: PathBuf,
    timeout_secs: Option<u64>,
}

impl FfmpegMuxer {
    pub fn new(ffmpeg: PathBuf, timeout_secs: Option<u64>) -> Self {
        Self {
            ffmpeg,
            timeout_secs,
        }
    }

    /// Use the configured or discovered ffmpeg. A missing binary surfaces
    /// as a `MuxFailure` on first use.
    pub fn from_config(config: &Config) -> Self {
        let ffmpeg = ToolManager::from_config(config)
            .locate(ToolType::Ffmpeg)
            .unwrap_or_else(|| PathBuf::from(ToolType::Ffmpeg.as_str()));
        Self::new(ffmpeg, config.mux_timeout_secs)
    }

    pub fn build_args(video: &Path, audio: Option<&Path>, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(video.into());

        match audio {
            Some(audio) => {
                args.push("-i".into());
                args.push(audio.into());
                args.extend(["-map", "0:v:0", "-map", "1:a:0"].map(OsString::from));
            }
            // Keep whatever audio the video file itself carries, if any
            None => args.extend(["-map", "0:v:0", "-map", "0:a?"].map(OsString::from)),
        }

        // The target may be a `.part` file, so the container is named explicitly
        args.extend(
            [
                "-c:v",
                VIDEO_CODEC,
                "-c:a",
                AUDIO_CODEC,
                "-movflags",
                "+faststart",
                "-f",
                "mp4",
            ]
            .map(OsString::from),
        );
        args.push(output.into());
        args
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn mux(&self, video: &Path, audio: Option<&Path>, output: &Path) -> Result<(), MuxFailure> {
        let args = Self::build_args(video, audio, output);
        tracing::debug!(
            video = %video.display(),
            audio = ?audio,
            output = %output.display(),
            "[ffmpeg] merging"
        );

        let result = run_output_with_timeout(self.ffmpeg.as_os_str(), &args, self.timeout_secs)
            .await
            .map_err(|e| match e {
                RunError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                    MuxFailure::new(format!("ffmpeg not found at {}", self.ffmpeg.display()))
                }
                other => MuxFailure::new(other.to_string()),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(MuxFailure::new(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                if tail.is_empty() { "no error output" } else { tail.as_str() }
            )));
        }

        if !output.exists() {
            return Err(MuxFailure::new("ffmpeg finished but wrote no output"));
        }
        Ok(())
    }
}

/// Sibling the muxer writes into, e.g. `Clip.mp4.part`
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    output.with_file_name(name)
}

/// Canonical parent joined with the file name, so different spellings of
/// one path compare equal. Falls back to the path as given.
fn claim_key(output: &Path) -> PathBuf {
    let (Some(parent), Some(name)) = (output.parent(), output.file_name()) else {
        return output.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    parent
        .canonicalize()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|_| output.to_path_buf())
}

/// Marks an output path as being written until dropped
struct OutputClaim<'a> {
    in_flight: &'a Mutex<HashSet<PathBuf>>,
    key: PathBuf,
}

impl<'a> OutputClaim<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<PathBuf>>, output: &Path) -> Option<Self> {
        let key = claim_key(output);
        let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        set.insert(key.clone()).then(|| Self { in_flight, key })
    }
}

impl Drop for OutputClaim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

pub struct MuxEngine {
    muxer: Arc<dyn Muxer>,
    messages: Arc<dyn MessageSink>,
    in_flight: Mutex<HashSet<PathBuf>>,
}

impl MuxEngine {
    pub fn new(muxer: Arc<dyn Muxer>, messages: Arc<dyn MessageSink>) -> Self {
        Self {
            muxer,
            messages,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Mux `fetch` into `output`. The scratch space is released on every
    /// path; cleanup problems are reported as warnings and never replace
    /// the mux result.
    pub async fn finish(&self, mut fetch: FetchResult, output: &Path) -> Result<PathBuf, DownloadError> {
        let result = self.mux_into(&fetch, output).await;
        // Warnings were already logged and sent to the message sink
        let _ = fetch.scratch.release();
        result
    }

    async fn mux_into(&self, fetch: &FetchResult, output: &Path) -> Result<PathBuf, DownloadError> {
        let video = fetch
            .video_path()
            .ok_or_else(|| MuxFailure::new("no video file to merge"))?;

        let _claim = OutputClaim::acquire(&self.in_flight, output).ok_or_else(|| {
            MuxFailure::new(format!("{} is already being written", output.display()))
        })?;

        tracing::info!(
            muxer = self.muxer.name(),
            output = %output.display(),
            video_only = fetch.audio_path().is_none(),
            "[MuxEngine] merging streams"
        );

        let partial = partial_path(output);
        if let Err(failure) = self.muxer.mux(video, fetch.audio_path(), &partial).await {
            tracing::warn!("[MuxEngine] ✗ merge failed: {}", failure);
            self.discard_partial(&partial);
            return Err(failure.into());
        }

        if let Err(e) = tokio::fs::rename(&partial, output).await {
            tracing::warn!("[MuxEngine] ✗ could not move merged file into place: {}", e);
            self.discard_partial(&partial);
            return Err(e.into());
        }

        tracing::info!(output = %output.display(), "[MuxEngine] ✓ merge complete");
        Ok(output.to_path_buf())
    }

    fn discard_partial(&self, partial: &Path) {
        match std::fs::remove_file(partial) {
            Ok(()) => tracing::debug!(path = %partial.display(), "removed partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                let warning = CleanupWarning {
                    path: partial.to_path_buf(),
                    source,
                };
                tracing::warn!("{}", warning);
                self.messages.warn(&warning.to_string());
            }
        }
    }
}
