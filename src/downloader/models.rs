// Common data models for the downloader

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::scratch::ScratchSpace;

/// Codec value the resolver uses for "stream has no such track"
pub const NO_CODEC: &str = "none";

/// One stream as listed by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Format ID (e.g., "137", "140")
    pub format_id: String,
    /// Video codec (avc1, vp9, av01, "none")
    pub video_codec: Option<String>,
    /// Audio codec (mp4a, opus, "none")
    pub audio_codec: Option<String>,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Container extension (mp4, webm, m4a)
    pub extension: Option<String>,
    /// File size in bytes
    pub file_size: Option<u64>,
}

impl StreamDescriptor {
    pub fn has_video(&self) -> bool {
        is_usable_codec(self.video_codec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        is_usable_codec(self.audio_codec.as_deref())
    }

    /// Audio track present and no video track
    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }

    /// Size in bytes, 0 when unknown
    pub fn size_or_zero(&self) -> u64 {
        self.file_size.unwrap_or(0)
    }
}

fn is_usable_codec(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if !c.is_empty() && c != NO_CODEC)
}

/// Quality option for selection, one per `(height, extension)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityOption {
    /// Display label (e.g., "1080p (mp4)")
    pub label: String,
    pub height: u32,
    pub extension: String,
    /// Video stream to fetch
    pub format_id: String,
    /// Best audio stream to pair with it
    pub audio_format_id: Option<String>,
    /// Largest size seen for this label, 0 when unknown
    pub file_size: u64,
}

impl QualityOption {
    pub fn make_label(height: u32, extension: &str) -> String {
        format!("{}p ({})", height, extension)
    }

    /// Format file size for display
    pub fn display_size(&self) -> Option<String> {
        if self.file_size == 0 {
            return None;
        }
        let mb = self.file_size as f64 / 1_048_576.0;
        if mb >= 1024.0 {
            Some(format!("{:.1} GB", mb / 1024.0))
        } else {
            Some(format!("{:.0} MB", mb))
        }
    }
}

impl fmt::Display for QualityOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_size() {
            Some(size) => write!(f, "{} - {}", self.label, size),
            None => write!(f, "{} - unknown size", self.label),
        }
    }
}

/// Metadata returned by the resolver without transferring anything
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub formats: Vec<StreamDescriptor>,
}

/// Which half of the pair a fetch is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    /// File stem used inside the scratch directory
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// One transfer to perform
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub format_id: &'a str,
    pub kind: StreamKind,
    /// Directory the stream is written into as `<stem>.<ext>`
    pub dir: &'a Path,
}

impl FetchRequest<'_> {
    /// yt-dlp style output template, e.g. `/tmp/x/video.%(ext)s`
    pub fn output_template(&self) -> PathBuf {
        self.dir.join(format!("{}.%(ext)s", self.kind.file_stem()))
    }
}

/// Result of a single transfer
#[derive(Debug, Clone)]
pub struct FetchedStream {
    pub path: PathBuf,
    pub title: Option<String>,
}

/// Both streams on local disk, plus the media title
#[derive(Debug)]
pub struct FetchResult {
    pub(crate) scratch: ScratchSpace,
    pub title: String,
}

impl FetchResult {
    pub fn video_path(&self) -> Option<&Path> {
        self.scratch.video_path()
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.scratch.audio_path()
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.dir()
    }
}

/// State reported by a fetch in progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    /// `total_bytes` is 0 when unknown
    Downloading {
        downloaded_bytes: u64,
        total_bytes: u64,
    },
    Finished,
    Other(String),
}

/// Download progress information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub kind: StreamKind,
    pub status: ProgressStatus,
}

impl ProgressUpdate {
    pub fn downloading(kind: StreamKind, downloaded_bytes: u64, total_bytes: u64) -> Self {
        Self {
            kind,
            status: ProgressStatus::Downloading {
                downloaded_bytes,
                total_bytes,
            },
        }
    }

    /// Completed fraction in `0.0..=1.0`, or `None` when the total is unknown
    pub fn fraction(&self) -> Option<f32> {
        match self.status {
            ProgressStatus::Downloading {
                downloaded_bytes,
                total_bytes,
            } if total_bytes > 0 => {
                Some((downloaded_bytes as f64 / total_bytes as f64).min(1.0) as f32)
            }
            ProgressStatus::Finished => Some(1.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(vcodec: Option<&str>, acodec: Option<&str>) -> StreamDescriptor {
        StreamDescriptor {
            format_id: "x".to_string(),
            video_codec: vcodec.map(str::to_string),
            audio_codec: acodec.map(str::to_string),
            height: None,
            extension: None,
            file_size: None,
        }
    }

    #[test]
    fn test_none_sentinel_is_not_a_codec() {
        assert!(descriptor(None, Some("mp4a.40.2")).is_audio_only());
        assert!(descriptor(Some("none"), Some("opus")).is_audio_only());
        assert!(!descriptor(Some("avc1"), Some("mp4a")).is_audio_only());
        assert!(!descriptor(Some("none"), Some("none")).is_audio_only());
        assert!(!descriptor(Some(""), None).has_video());
    }

    #[test]
    fn test_fraction_with_unknown_total() {
        let update = ProgressUpdate::downloading(StreamKind::Video, 500, 0);
        assert_eq!(update.fraction(), None);

        let update = ProgressUpdate::downloading(StreamKind::Audio, 250, 1000);
        assert_eq!(update.fraction(), Some(0.25));
    }

    #[test]
    fn test_display_size() {
        let mut option = QualityOption {
            label: QualityOption::make_label(720, "webm"),
            height: 720,
            extension: "webm".to_string(),
            format_id: "247".to_string(),
            audio_format_id: None,
            file_size: 0,
        };
        assert_eq!(option.label, "720p (webm)");
        assert_eq!(option.display_size(), None);
        assert_eq!(option.to_string(), "720p (webm) - unknown size");

        option.file_size = 50 * 1_048_576;
        assert_eq!(option.display_size().as_deref(), Some("50 MB"));

        option.file_size = 3 * 1024 * 1_048_576;
        assert_eq!(option.display_size().as_deref(), Some("3.0 GB"));
    }

    #[test]
    fn test_output_template() {
        let dir = Path::new("/tmp/scratch");
        let request = FetchRequest {
            url: "https://example.com/v",
            format_id: "140",
            kind: StreamKind::Audio,
            dir,
        };
        assert_eq!(
            request.output_template(),
            PathBuf::from("/tmp/scratch/audio.%(ext)s")
        );
    }
}
