// Runtime configuration
//
// Precedence: defaults < config file < YTMUX_* environment < CLI flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::downloader::extractors::ExtractorMode;
use crate::downloader::DownloadError;

const CONFIG_DIR_NAME: &str = "ytmux";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where finished files go, relative to the working directory
    pub output_dir: PathBuf,
    /// Parent for per-download scratch directories (system temp when unset)
    pub scratch_dir: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub extractor_mode: ExtractorMode,
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,
    /// Path to a Netscape cookies.txt file
    pub cookies_path: Option<PathBuf>,
    pub socket_timeout_secs: u32,
    /// Limit for metadata extraction
    pub info_timeout_secs: u64,
    /// Limit for a single ffmpeg run; unlimited when unset
    pub mux_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            scratch_dir: None,
            ytdlp_path: None,
            ffmpeg_path: None,
            extractor_mode: ExtractorMode::Auto,
            proxy: None,
            cookies_path: None,
            socket_timeout_secs: 30,
            info_timeout_secs: 60,
            mux_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the per-user config file if it exists,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, DownloadError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// `<config_dir>/ytmux/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn from_file(path: &Path) -> Result<Self, DownloadError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DownloadError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&content).map_err(|e| {
            DownloadError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("YTMUX_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(proxy) = lookup("YTMUX_PROXY") {
            self.proxy = Some(proxy);
        }
        if let Some(path) = lookup("YTMUX_YTDLP") {
            self.ytdlp_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("YTMUX_FFMPEG") {
            self.ffmpeg_path = Some(PathBuf::from(path));
        }
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.output_dir = dir;
        }
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        if proxy.is_some() {
            self.proxy = proxy;
        }
        self
    }

    pub fn with_scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }
}
