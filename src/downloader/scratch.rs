// Scoped temporary storage for one acquisition
//
// Holds the temp directory plus whichever of the video/audio paths have
// been filled in so far. `release` removes them once; `Drop` calls it so
// early returns and failed fetches are covered too.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use super::errors::CleanupWarning;
use super::models::StreamKind;
use super::traits::MessageSink;

const SCRATCH_PREFIX: &str = "ytmux-";

pub struct ScratchSpace {
    dir: Option<TempDir>,
    dir_path: PathBuf,
    video: Option<PathBuf>,
    audio: Option<PathBuf>,
    messages: Arc<dyn MessageSink>,
}

impl ScratchSpace {
    /// Create a fresh, uniquely named directory under `root`, or under the
    /// system temp dir when `root` is `None`.
    pub fn create(root: Option<&Path>, messages: Arc<dyn MessageSink>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let dir_path = dir.path().to_path_buf();
        tracing::debug!(dir = %dir_path.display(), "created scratch directory");

        Ok(Self {
            dir: Some(dir),
            dir_path,
            video: None,
            audio: None,
            messages,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir_path
    }

    pub fn video_path(&self) -> Option<&Path> {
        self.video.as_deref()
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.audio.as_deref()
    }

    pub fn set_path(&mut self, kind: StreamKind, path: PathBuf) {
        match kind {
            StreamKind::Video => self.video = Some(path),
            StreamKind::Audio => self.audio = Some(path),
        }
    }

    pub fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// Delete video, audio and the directory. Safe to call more than once;
    /// only the first call does anything. Failures are reported as warnings
    /// and returned, never raised.
    pub fn release(&mut self) -> Vec<CleanupWarning> {
        let mut warnings = Vec::new();

        for path in [self.video.take(), self.audio.take()].into_iter().flatten() {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => warnings.push(CleanupWarning { path, source }),
            }
        }

        if let Some(dir) = self.dir.take() {
            // Recursive, so `.part` leftovers from an aborted fetch go too
            if let Err(source) = dir.close() {
                warnings.push(CleanupWarning {
                    path: self.dir_path.clone(),
                    source,
                });
            } else {
                tracing::debug!(dir = %self.dir_path.display(), "removed scratch directory");
            }
        }

        for warning in &warnings {
            tracing::warn!("{}", warning);
            self.messages.warn(&warning.to_string());
        }

        warnings
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ScratchSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchSpace")
            .field("dir", &self.dir_path)
            .field("video", &self.video)
            .field("audio", &self.audio)
            .field("released", &self.is_released())
            .finish()
    }
}
