// Extractor module - everything that talks to yt-dlp
//
// - diagnostics: classify yt-dlp failures (403, geo block, login, ...)
// - progress: parse progress/file/title lines from a running fetch
// - ytdlp: the Resolver implementation, in CLI or Python mode

mod diagnostics;
mod progress;
mod ytdlp;

pub use diagnostics::{diagnose_error, error_excerpt, FailureCause};
pub use ytdlp::{ExtractorMode, Launcher, YtDlpResolver};
