// Downloader module - catalog, acquisition, muxing and delivery

pub mod delivery;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod muxer;
pub mod orchestrator;
pub mod scratch;
pub mod tools;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::{CleanupWarning, DownloadError, FetchFailure, MuxFailure};
pub use format_selector::FormatSelector;
pub use models::{
    FetchResult, MediaInfo, ProgressStatus, ProgressUpdate, QualityOption, StreamDescriptor,
    StreamKind,
};
pub use orchestrator::Downloader;
pub use traits::{MessageSink, Muxer, NullSink, ProgressSink, Resolver, TracingSink};
