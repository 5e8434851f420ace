// Failure diagnostics - classifies resolver stderr
//
// Maps yt-dlp error text onto a small set of causes so a failed fetch can
// be shown with an actionable hint instead of a raw stack of log lines.

use serde::{Deserialize, Serialize};

/// Why a resolver request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    /// HTTP 403 or similar access denial
    Forbidden,

    /// 429 / too many requests / bot checks
    RateLimited,

    /// The requested format id does not exist for this media
    FormatUnavailable,

    /// Geographic restriction
    GeoBlocked,

    /// Age gate, private or members-only media
    LoginRequired,

    /// Deleted or otherwise gone
    ContentUnavailable,

    /// DRM-protected content; cannot be downloaded at all
    DrmProtected,

    /// Network timeout or unreachable host
    NetworkTimeout,

    Unknown,
}

impl FailureCause {
    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Forbidden => "access denied",
            Self::RateLimited => "rate limited",
            Self::FormatUnavailable => "requested format is not available",
            Self::GeoBlocked => "geographic restriction",
            Self::LoginRequired => "login required",
            Self::ContentUnavailable => "media unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::NetworkTimeout => "network timeout",
            Self::Unknown => "unknown error",
        }
    }

    /// What the user can try next
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Forbidden => {
                "What to try:\n\
                 1) Use a proxy (--proxy)\n\
                 2) Use a cookies file from a logged-in browser\n\
                 3) Update yt-dlp"
            }
            Self::RateLimited => {
                "What to try:\n\
                 1) Wait 10-15 minutes\n\
                 2) Use a different IP (proxy)"
            }
            Self::FormatUnavailable => {
                "The selected quality disappeared from the stream list.\n\
                 List the formats again and pick another quality."
            }
            Self::GeoBlocked => "Media is blocked in your region. Try a proxy in another country.",
            Self::LoginRequired => "Media needs an account. Provide a cookies file (cookies_path).",
            Self::ContentUnavailable => "The media has been removed or made private.",
            Self::DrmProtected => "The media is DRM-protected and cannot be downloaded as a file.",
            Self::NetworkTimeout => {
                "What to try:\n\
                 1) Check your internet connection\n\
                 2) Use a proxy\n\
                 3) Try again later"
            }
            Self::Unknown => {
                "What to try:\n\
                 1) Check the URL\n\
                 2) Update yt-dlp\n\
                 3) Try again later"
            }
        }
    }
}

/// Analyze error text and return the most specific cause
pub fn diagnose_error(error: &str) -> FailureCause {
    let lower = error.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    // Most specific first: DRM is permanent and often mentions 403 too
    if has(&["drm", "widevine", "playready", "fairplay", "encrypted media"]) {
        return FailureCause::DrmProtected;
    }

    if has(&["requested format is not available", "format not available"]) {
        return FailureCause::FormatUnavailable;
    }

    if has(&[
        "sign in to confirm your age",
        "age-restricted",
        "private video",
        "video is private",
        "members only",
        "members-only",
        "login required",
    ]) {
        return FailureCause::LoginRequired;
    }

    if has(&[
        "video unavailable",
        "video has been removed",
        "no longer available",
        "is unavailable",
    ]) {
        return FailureCause::ContentUnavailable;
    }

    if has(&["not available in your country", "blocked in your country", "geo restrict"]) {
        return FailureCause::GeoBlocked;
    }

    if has(&["429", "rate limit", "too many requests", "confirm you're not a bot", "captcha"]) {
        return FailureCause::RateLimited;
    }

    if has(&["403", "forbidden"]) {
        return FailureCause::Forbidden;
    }

    if has(&["timeout", "timed out", "connection refused", "network is unreachable"]) {
        return FailureCause::NetworkTimeout;
    }

    FailureCause::Unknown
}

/// Short excerpt for messages: the `ERROR:` lines if any, otherwise the
/// last non-empty line.
pub fn error_excerpt(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .take(2)
        .collect();

    if !errors.is_empty() {
        return errors.join(" | ");
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no error output")
        .chars()
        .take(200)
        .collect()
}
