// Output directory, file naming and hand-off of the finished file

use std::io;
use std::path::{Path, PathBuf};

pub const MP4_MIME: &str = "video/mp4";
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Used when a title sanitizes down to nothing
const FALLBACK_NAME: &str = "video";

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Create the output directory (and parents). Existing directories are fine.
pub fn ensure_output_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    tracing::debug!(dir = %dir.display(), "output directory ready");
    Ok(())
}

/// Make a remote title safe to use as a file name.
///
/// Path separators, characters Windows rejects and control characters are
/// replaced with `_`, leading/trailing dots and whitespace are trimmed.
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<dir>/<sanitized title>.mp4`
pub fn output_path_for(dir: &Path, title: &str) -> PathBuf {
    dir.join(format!("{}.{}", sanitize_title(title), OUTPUT_EXTENSION))
}

/// A finished file ready to hand to a client for saving
#[derive(Debug, Clone)]
pub struct Delivery {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    /// Suggested name for the saved file
    pub file_name: String,
}

impl Delivery {
    pub async fn from_path(path: &Path) -> io::Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                )
            })?;
        let bytes = tokio::fs::read(path).await?;

        Ok(Self {
            bytes,
            mime: MP4_MIME,
            file_name,
        })
    }
}
