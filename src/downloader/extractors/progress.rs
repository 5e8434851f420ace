// Parsing of yt-dlp output lines during a fetch
//
// The fetch asks yt-dlp for a machine-readable progress template and for
// the final path/title via `--print after_move:`. Older builds that ignore
// the template still print the classic line:
// [download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)
// which is handled as a fallback.

use std::path::PathBuf;

use regex::Regex;

pub const PROGRESS_MARKER: &str = "[ytmux-progress]";
pub const FILE_MARKER: &str = "[ytmux-file]";
pub const TITLE_MARKER: &str = "[ytmux-title]";

/// Value for `--progress-template`
pub fn progress_template() -> String {
    format!(
        "download:{} %(progress.downloaded_bytes)s/%(progress.total_bytes)s/%(progress.total_bytes_estimate)s",
        PROGRESS_MARKER
    )
}

/// Values for `--print`, one per line of interest
pub fn print_templates() -> [String; 2] {
    [
        format!("after_move:{} %(filepath)s", FILE_MARKER),
        format!("after_move:{} %(title)s", TITLE_MARKER),
    ]
}

/// A line of interest from yt-dlp
#[derive(Debug, Clone, PartialEq)]
pub enum ToolLine {
    /// `total_bytes` is 0 when unknown
    Progress {
        downloaded_bytes: u64,
        total_bytes: u64,
    },
    FilePath(PathBuf),
    Title(String),
    AlreadyDownloaded,
}

pub fn parse_line(line: &str) -> Option<ToolLine> {
    lazy_static::lazy_static! {
        static ref CLASSIC_RE: Regex = Regex::new(
            r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*)\s*([KMGT]?i?B)"
        ).unwrap();
        static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
    }

    let line = line.trim_end();

    if let Some(rest) = line.trim_start().strip_prefix(PROGRESS_MARKER) {
        let mut fields = rest.trim().split('/').map(parse_byte_count);
        let downloaded = fields.next().flatten();
        let total = fields.next().flatten();
        let estimate = fields.next().flatten();
        return Some(ToolLine::Progress {
            downloaded_bytes: downloaded.unwrap_or(0),
            total_bytes: total.or(estimate).unwrap_or(0),
        });
    }

    if let Some(rest) = line.strip_prefix(FILE_MARKER) {
        let path = rest.trim_start();
        return (!path.is_empty()).then(|| ToolLine::FilePath(PathBuf::from(path)));
    }

    if let Some(rest) = line.strip_prefix(TITLE_MARKER) {
        return Some(ToolLine::Title(rest.trim_start().to_string()));
    }

    if let Some(caps) = CLASSIC_RE.captures(line) {
        let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
        let amount: f64 = caps.get(2)?.as_str().parse().ok()?;
        let total = (amount * unit_multiplier(caps.get(3)?.as_str())) as u64;
        let downloaded = (total as f64 * percent.clamp(0.0, 100.0) / 100.0) as u64;
        return Some(ToolLine::Progress {
            downloaded_bytes: downloaded,
            total_bytes: total,
        });
    }

    if ALREADY_RE.is_match(line) {
        return Some(ToolLine::AlreadyDownloaded);
    }

    None
}

/// "12345", "12345.0" or "NA"
fn parse_byte_count(field: &str) -> Option<u64> {
    let field = field.trim();
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

fn unit_multiplier(unit: &str) -> f64 {
    match unit {
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        _ => 1.0,
    }
}
