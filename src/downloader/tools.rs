// External tool discovery (yt-dlp, ffmpeg, python)

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
    Python,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::Python => "python3",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "-version",
            _ => "--version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

/// Finds tools: explicit override first, then common install prefixes,
/// then `which`.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    ytdlp_override: Option<PathBuf>,
    ffmpeg_override: Option<PathBuf>,
    python_override: Option<PathBuf>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            ytdlp_override: config.ytdlp_path.clone(),
            ffmpeg_override: config.ffmpeg_path.clone(),
            // Allow overriding the interpreter (e.g. a venv with yt_dlp installed)
            python_override: std::env::var_os("YTDLP_PYTHON").map(PathBuf::from),
        }
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.locate(tool_type);
        let version = path.as_deref().and_then(|p| Self::get_version(p, tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            is_available: path.as_deref().map_or(false, Path::exists),
            version,
            path,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::Ffmpeg),
            self.get_tool_info(ToolType::Python),
        ]
    }

    /// Path to the tool, if it can be found
    pub fn locate(&self, tool_type: ToolType) -> Option<PathBuf> {
        let overridden = match tool_type {
            ToolType::YtDlp => self.ytdlp_override.as_ref(),
            ToolType::Ffmpeg => self.ffmpeg_override.as_ref(),
            ToolType::Python => self.python_override.as_ref(),
        };
        if let Some(path) = overridden {
            // Bare names ("yt-dlp-nightly") are resolved through PATH
            if path.components().count() == 1 {
                return Self::which(&path.to_string_lossy()).or_else(|| Some(path.clone()));
            }
            return Some(path.clone());
        }

        let binary_name = tool_type.as_str();

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];
        if let Some(found) = common_paths.iter().map(PathBuf::from).find(|p| p.exists()) {
            return Some(found);
        }

        // 2. Try PATH
        Self::which(binary_name)
    }

    /// Whether `python -c "import yt_dlp"` works
    pub fn python_has_ytdlp(python: &Path) -> bool {
        match Command::new(python).args(["-c", "import yt_dlp"]).output() {
            Ok(out) => out.status.success(),
            Err(_) => false,
        }
    }

    fn which(binary_name: &str) -> Option<PathBuf> {
        let output = Command::new("which").arg(binary_name).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }

    fn get_version(path: &Path, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                // python prints to stderr on old versions, ffmpeg prints a banner
                let text = if output.stdout.is_empty() {
                    String::from_utf8_lossy(&output.stderr).to_string()
                } else {
                    String::from_utf8_lossy(&output.stdout).to_string()
                };
                text.lines().next().map(|l| l.trim().to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_override_is_used_verbatim() {
        let manager = ToolManager {
            ytdlp_override: Some(PathBuf::from("/custom/bin/yt-dlp")),
            ..ToolManager::default()
        };
        assert_eq!(
            manager.locate(ToolType::YtDlp),
            Some(PathBuf::from("/custom/bin/yt-dlp"))
        );
    }

    #[test]
    fn test_missing_tool_info() {
        let manager = ToolManager {
            ffmpeg_override: Some(PathBuf::from("/definitely/not/here/ffmpeg")),
            ..ToolManager::default()
        };
        let info = manager.get_tool_info(ToolType::Ffmpeg);
        assert_eq!(info.name, "ffmpeg");
        assert!(!info.is_available);
        assert_eq!(info.version, None);
    }
}
