// yt-dlp resolver
//
// Two ways to run yt-dlp:
// - CLI mode: the native `yt-dlp` binary (faster, no Python dependency)
// - Python mode: `python3 -m yt_dlp` (interpreter overridable via YTDLP_PYTHON)
// Auto picks the binary and falls back to the Python module.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use super::progress::{self, ToolLine};
use crate::config::Config;
use crate::downloader::errors::{FetchFailure, FetchStage};
use crate::downloader::models::{
    FetchRequest, FetchedStream, MediaInfo, ProgressStatus, ProgressUpdate, StreamDescriptor,
    StreamKind,
};
use crate::downloader::tools::{ToolManager, ToolType};
use crate::downloader::traits::{ProgressSink, Resolver};
use crate::downloader::utils::{
    get_cookie_args, get_proxy_args, get_timeout_args, run_output_with_timeout, RunError,
};

/// Lines of stderr kept for error reporting
const STDERR_TAIL: usize = 50;

/// Extraction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorMode {
    /// Python module yt_dlp
    Python,
    /// CLI binary yt-dlp
    Cli,
    /// Binary first, Python module as fallback
    #[default]
    Auto,
}

impl fmt::Display for ExtractorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Cli => write!(f, "cli"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// How to start yt-dlp: a program plus the arguments that come before ours
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    program: PathBuf,
    prefix_args: Vec<String>,
}

impl Launcher {
    pub fn binary(path: PathBuf) -> Self {
        Self {
            program: path,
            prefix_args: Vec::new(),
        }
    }

    pub fn python_module(python: PathBuf) -> Self {
        Self {
            program: python,
            prefix_args: vec!["-m".to_string(), "yt_dlp".to_string()],
        }
    }

    pub fn program(&self) -> &OsStr {
        self.program.as_os_str()
    }

    fn with_args(&self, args: Vec<String>) -> Vec<String> {
        let mut full = self.prefix_args.clone();
        full.extend(args);
        full
    }
}

/// Resolver backed by the external yt-dlp tool
pub struct YtDlpResolver {
    launcher: Option<Launcher>,
    config: Config,
}

impl YtDlpResolver {
    pub fn new(config: Config) -> Self {
        let tools = ToolManager::from_config(&config);
        let launcher = Self::select_launcher(&tools, config.extractor_mode);
        match &launcher {
            Some(l) => tracing::debug!(
                mode = %config.extractor_mode,
                program = %l.program.display(),
                "selected yt-dlp launcher"
            ),
            None => tracing::warn!(mode = %config.extractor_mode, "yt-dlp not found"),
        }
        Self { launcher, config }
    }

    pub fn with_launcher(launcher: Launcher, config: Config) -> Self {
        Self {
            launcher: Some(launcher),
            config,
        }
    }

    fn select_launcher(tools: &ToolManager, mode: ExtractorMode) -> Option<Launcher> {
        let cli = || tools.locate(ToolType::YtDlp).map(Launcher::binary);
        let python = || {
            tools
                .locate(ToolType::Python)
                .filter(|p| ToolManager::python_has_ytdlp(p))
                .map(Launcher::python_module)
        };

        match mode {
            ExtractorMode::Cli => cli(),
            ExtractorMode::Python => python(),
            ExtractorMode::Auto => cli().or_else(python),
        }
    }

    fn launcher(&self) -> Result<&Launcher, FetchFailure> {
        self.launcher.as_ref().ok_or_else(|| {
            FetchFailure::ToolNotFound(format!(
                "yt-dlp ({} mode); install it or set ytdlp_path",
                self.config.extractor_mode
            ))
        })
    }

    fn network_args(&self) -> Vec<String> {
        let mut args = get_timeout_args(&self.config);
        args.extend(get_proxy_args(&self.config));
        args.extend(get_cookie_args(&self.config));
        args
    }

    fn build_info_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(self.network_args());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn build_fetch_args(&self, request: &FetchRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            request.format_id.to_string(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--no-simulate".to_string(),
            "--progress-template".to_string(),
            progress::progress_template(),
        ];
        for template in progress::print_templates() {
            args.push("--print".to_string());
            args.push(template);
        }
        args.push("-o".to_string());
        args.push(request.output_template().to_string_lossy().to_string());
        args.extend(self.network_args());
        args.push("--".to_string());
        args.push(request.url.to_string());
        args
    }

    /// Parse `--dump-json` output
    pub fn parse_media_info(stdout: &[u8]) -> Result<MediaInfo, FetchFailure> {
        let json: serde_json::Value = serde_json::from_slice(stdout)
            .map_err(|e| FetchFailure::Parse(format!("Invalid JSON: {}", e)))?;

        if !json.is_object() {
            return Err(FetchFailure::Parse("expected a JSON object".to_string()));
        }

        // Some extractors describe a single stream at the top level only
        let formats = match json["formats"].as_array() {
            Some(list) => list.iter().filter_map(Self::parse_format).collect(),
            None => Self::parse_format(&json).into_iter().collect(),
        };

        Ok(MediaInfo {
            id: json["id"].as_str().unwrap_or("unknown").to_string(),
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            uploader: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
            duration_seconds: json["duration"].as_f64().unwrap_or(0.0) as u64,
            formats,
        })
    }

    fn parse_format(f: &serde_json::Value) -> Option<StreamDescriptor> {
        let format_id = f["format_id"].as_str()?.to_string();
        let height = f["height"]
            .as_u64()
            .or_else(|| f["height"].as_f64().map(|h| h as u64))
            .and_then(|h| u32::try_from(h).ok());

        Some(StreamDescriptor {
            format_id,
            video_codec: f["vcodec"].as_str().map(str::to_string),
            audio_codec: f["acodec"].as_str().map(str::to_string),
            height,
            extension: f["ext"].as_str().map(str::to_string),
            file_size: f["filesize"]
                .as_u64()
                .or_else(|| f["filesize_approx"].as_u64()),
        })
    }

    /// Find `<stem>.<ext>` in `dir` when yt-dlp did not print the final path
    fn find_output(dir: &Path, kind: StreamKind) -> Option<PathBuf> {
        let prefix = format!("{}.", kind.file_stem());
        std::fs::read_dir(dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .find(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                name.starts_with(&prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl")
            })
    }
}

fn map_run_error(error: RunError) -> FetchFailure {
    match error {
        RunError::Spawn { program, source } if source.kind() == std::io::ErrorKind::NotFound => {
            FetchFailure::ToolNotFound(program)
        }
        RunError::Timeout(secs) => FetchFailure::Timeout(secs),
        other => FetchFailure::Execution(other.to_string()),
    }
}

#[derive(Default)]
struct FetchState {
    path: Option<PathBuf>,
    title: Option<String>,
    stderr_tail: VecDeque<String>,
}

impl FetchState {
    fn handle_line(&mut self, line: &str, kind: StreamKind, progress: &dyn ProgressSink) {
        match progress::parse_line(line) {
            Some(ToolLine::Progress {
                downloaded_bytes,
                total_bytes,
            }) => progress.on_progress(ProgressUpdate::downloading(
                kind,
                downloaded_bytes,
                total_bytes,
            )),
            Some(ToolLine::FilePath(path)) => self.path = Some(path),
            Some(ToolLine::Title(title)) => self.title = Some(title),
            Some(ToolLine::AlreadyDownloaded) => progress.on_progress(ProgressUpdate {
                kind,
                status: ProgressStatus::Other("already downloaded".to_string()),
            }),
            None => tracing::trace!(%kind, "[yt-dlp] {}", line),
        }
    }

    fn remember_stderr(&mut self, line: String) {
        if self.stderr_tail.len() == STDERR_TAIL {
            self.stderr_tail.pop_front();
        }
        self.stderr_tail.push_back(line);
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn resolve(&self, url: &str) -> Result<MediaInfo, FetchFailure> {
        let launcher = self.launcher()?;
        let args = launcher.with_args(self.build_info_args(url));
        tracing::debug!(url, "[yt-dlp] fetching media info");

        let output = run_output_with_timeout(
            launcher.program(),
            &args,
            Some(self.config.info_timeout_secs),
        )
        .await
        .map_err(map_run_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(url, "[yt-dlp] info failed: {}", stderr.trim());
            return Err(FetchFailure::from_stderr(FetchStage::Metadata, &stderr));
        }

        let info = Self::parse_media_info(&output.stdout)?;
        tracing::info!(
            title = %info.title,
            formats = info.formats.len(),
            "[yt-dlp] media info fetched"
        );
        Ok(info)
    }

    async fn fetch(
        &self,
        request: FetchRequest<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<FetchedStream, FetchFailure> {
        let launcher = self.launcher()?;
        let kind = request.kind;
        let args = launcher.with_args(self.build_fetch_args(&request));
        tracing::info!(%kind, format_id = request.format_id, "[yt-dlp] starting download");

        let mut child = TokioCommand::new(launcher.program())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                map_run_error(RunError::Spawn {
                    program: launcher.program().to_string_lossy().to_string(),
                    source,
                })
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchFailure::Execution("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchFailure::Execution("Failed to capture stderr".to_string()))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let (mut out_done, mut err_done) = (false, false);
        let mut state = FetchState::default();

        // Progress may arrive on either stream depending on quiet mode
        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => match line {
                    Ok(Some(line)) => state.handle_line(&line, kind, progress),
                    _ => out_done = true,
                },
                line = err_lines.next_line(), if !err_done => match line {
                    Ok(Some(line)) => {
                        state.handle_line(&line, kind, progress);
                        state.remember_stderr(line);
                    }
                    _ => err_done = true,
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| FetchFailure::Execution(format!("Process error: {}", e)))?;

        if !status.success() {
            let stderr = state.stderr_tail.make_contiguous().join("\n");
            tracing::warn!(%kind, "[yt-dlp] download failed: {}", stderr.trim());
            return Err(FetchFailure::from_stderr(FetchStage::Stream(kind), &stderr));
        }

        let path = state
            .path
            .filter(|p| p.exists())
            .or_else(|| Self::find_output(request.dir, kind))
            .ok_or_else(|| {
                FetchFailure::Parse(format!("yt-dlp did not produce a {} file", kind))
            })?;

        progress.on_progress(ProgressUpdate {
            kind,
            status: ProgressStatus::Finished,
        });
        tracing::info!(%kind, path = %path.display(), "[yt-dlp] download finished");

        Ok(FetchedStream {
            path,
            title: state.title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const SAMPLE_JSON: &str = r#"{
        "id": "abc123",
        "title": "Sample Clip",
        "uploader": "Someone",
        "duration": 125.4,
        "formats": [
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "filesize": 5000000},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "filesize_approx": 50000000},
            {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none", "height": 90},
            {"ext": "mp4", "height": 720}
        ]
    }"#;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressUpdate>>);

    impl ProgressSink for Recorder {
        fn on_progress(&self, update: ProgressUpdate) {
            self.0.lock().unwrap().push(update);
        }
    }

    fn resolver_with(launcher: Launcher) -> YtDlpResolver {
        YtDlpResolver::with_launcher(launcher, Config::default())
    }

    #[test]
    fn test_parse_media_info() {
        let info = YtDlpResolver::parse_media_info(SAMPLE_JSON.as_bytes()).unwrap();

        assert_eq!(info.id, "abc123");
        assert_eq!(info.title, "Sample Clip");
        assert_eq!(info.duration_seconds, 125);
        // The entry without a format_id is dropped
        assert_eq!(info.formats.len(), 3);

        let video = &info.formats[1];
        assert_eq!(video.format_id, "137");
        assert_eq!(video.height, Some(1080));
        assert_eq!(video.file_size, Some(50_000_000));
        assert!(video.has_video());

        assert!(info.formats[0].is_audio_only());
        assert!(!info.formats[2].has_video());
    }

    #[test]
    fn test_parse_single_format_media() {
        let json = r#"{"title": "Direct", "format_id": "0", "ext": "mp4", "vcodec": "h264", "acodec": "aac", "height": 480}"#;
        let info = YtDlpResolver::parse_media_info(json.as_bytes()).unwrap();
        assert_eq!(info.formats.len(), 1);
        assert_eq!(info.formats[0].height, Some(480));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            YtDlpResolver::parse_media_info(b"not json"),
            Err(FetchFailure::Parse(_))
        ));
        assert!(matches!(
            YtDlpResolver::parse_media_info(b"[1, 2]"),
            Err(FetchFailure::Parse(_))
        ));
    }

    #[test]
    fn test_fetch_args() {
        let config = Config {
            proxy: Some("socks5://127.0.0.1:1080".to_string()),
            ..Config::default()
        };
        let resolver = YtDlpResolver::with_launcher(
            Launcher::python_module(PathBuf::from("python3")),
            config,
        );
        let dir = Path::new("/tmp/ytmux-x");
        let request = FetchRequest {
            url: "https://example.com/watch?v=1",
            format_id: "137",
            kind: StreamKind::Video,
            dir,
        };

        let args = resolver
            .launcher()
            .unwrap()
            .with_args(resolver.build_fetch_args(&request));

        assert_eq!(&args[..4], &["-m", "yt_dlp", "-f", "137"]);
        let o = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o + 1], "/tmp/ytmux-x/video.%(ext)s");
        assert!(args.windows(2).any(|w| w == ["--proxy", "socks5://127.0.0.1:1080"]));
        assert_eq!(args[args.len() - 2], "--");
        assert_eq!(args.last().unwrap(), "https://example.com/watch?v=1");
    }

    #[test]
    fn test_info_args_end_with_url() {
        let resolver = resolver_with(Launcher::binary(PathBuf::from("/usr/bin/yt-dlp")));
        let args = resolver.build_info_args("https://example.com/v");
        assert_eq!(args[0], "--dump-json");
        assert!(args.contains(&"--no-playlist".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/v");
    }

    #[tokio::test]
    async fn test_missing_launcher_is_tool_not_found() {
        let resolver = YtDlpResolver {
            launcher: None,
            config: Config::default(),
        };
        let err = resolver.resolve("https://example.com/v").await.unwrap_err();
        assert!(matches!(err, FetchFailure::ToolNotFound(_)));
    }

    // A shell script stands in for yt-dlp; it is run through `sh` rather than
    // executed directly.
    #[cfg(unix)]
    const FAKE_YTDLP: &str = r#"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
if [ -n "$FAIL" ]; then
  echo "ERROR: [generic] Requested format is not available" >&2
  exit 1
fi
file=$(printf '%s' "$out" | sed 's/%(ext)s/webm/')
echo "[ytmux-progress] 50/100/NA"
printf 'data' > "$file"
echo "[ytmux-progress] 100/NA/NA" >&2
echo "[ytmux-file] $file"
echo "[ytmux-title] Fake Title"
"#;

    #[cfg(unix)]
    fn fake_launcher(dir: &Path, fail: bool) -> Launcher {
        let script = dir.join("fake-yt-dlp.sh");
        let body = if fail {
            format!("FAIL=1\n{}", FAKE_YTDLP)
        } else {
            FAKE_YTDLP.to_string()
        };
        std::fs::write(&script, body).unwrap();
        Launcher {
            program: PathBuf::from("sh"),
            prefix_args: vec![script.to_string_lossy().to_string()],
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_reports_progress_and_path() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let resolver = resolver_with(fake_launcher(tools.path(), false));
        let recorder = Recorder::default();

        let fetched = resolver
            .fetch(
                FetchRequest {
                    url: "https://example.com/v",
                    format_id: "248",
                    kind: StreamKind::Video,
                    dir: work.path(),
                },
                &recorder,
            )
            .await
            .unwrap();

        assert_eq!(fetched.path, work.path().join("video.webm"));
        assert!(fetched.path.exists());
        assert_eq!(fetched.title.as_deref(), Some("Fake Title"));

        let updates = recorder.0.lock().unwrap();
        assert!(updates.contains(&ProgressUpdate::downloading(StreamKind::Video, 50, 100)));
        assert!(updates.contains(&ProgressUpdate::downloading(StreamKind::Video, 100, 0)));
        assert_eq!(
            updates.last().map(|u| &u.status),
            Some(&ProgressStatus::Finished)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_failure_is_classified() {
        let tools = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let resolver = resolver_with(fake_launcher(tools.path(), true));

        let err = resolver
            .fetch(
                FetchRequest {
                    url: "https://example.com/v",
                    format_id: "999",
                    kind: StreamKind::Audio,
                    dir: work.path(),
                },
                &crate::downloader::traits::NullSink,
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.cause(),
            Some(crate::downloader::extractors::FailureCause::FormatUnavailable)
        );
        assert!(err.to_string().starts_with("audio fetch failed"));
    }

    #[test]
    fn test_stderr_tail_keeps_latest_lines() {
        let mut state = FetchState::default();
        for i in 0..STDERR_TAIL + 10 {
            state.remember_stderr(format!("line {}", i));
        }

        assert_eq!(state.stderr_tail.len(), STDERR_TAIL);
        assert_eq!(state.stderr_tail.front().map(String::as_str), Some("line 10"));
        assert_eq!(
            state.stderr_tail.back().map(String::as_str),
            Some(format!("line {}", STDERR_TAIL + 9).as_str())
        );
    }

    #[test]
    fn test_find_output_skips_partials() {
        let work = tempfile::tempdir().unwrap();
        std::fs::write(work.path().join("audio.m4a.part"), b"x").unwrap();
        assert_eq!(YtDlpResolver::find_output(work.path(), StreamKind::Audio), None);

        std::fs::write(work.path().join("audio.m4a"), b"x").unwrap();
        assert_eq!(
            YtDlpResolver::find_output(work.path(), StreamKind::Audio),
            Some(work.path().join("audio.m4a"))
        );
    }
}
