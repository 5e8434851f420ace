pub mod config;
pub mod downloader;
pub mod service;

pub use config::Config;
pub use downloader::{DownloadError, FormatSelector, QualityOption};
pub use service::MediaService;
