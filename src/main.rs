use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use ytmux_lib::downloader::tools::ToolManager;
use ytmux_lib::downloader::{
    MessageSink, ProgressSink, ProgressStatus, ProgressUpdate, StreamKind, TracingSink,
};
use ytmux_lib::{Config, DownloadError, FormatSelector, MediaService, QualityOption};

#[derive(Debug, Parser)]
#[command(name = "ytmux", version, about = "Download a video at a chosen quality as one MP4")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to <config dir>/ytmux/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for finished files (overrides YTMUX_OUTPUT_DIR)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Proxy URL passed to yt-dlp, e.g. socks5://127.0.0.1:1080 (overrides YTMUX_PROXY)
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors, no progress lines
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the available qualities
    Formats { url: String },

    /// Download, merge and save as <title>.mp4
    Download {
        url: String,

        /// Exact quality label, e.g. "1080p (mp4)"
        #[arg(long, conflicts_with = "height")]
        quality: Option<String>,

        /// Video height, e.g. 720
        #[arg(long)]
        height: Option<u32>,
    },

    /// Show detected yt-dlp, ffmpeg and python
    Tools,
}

/// Prints whole-percent progress lines to stderr
#[derive(Default)]
struct StderrProgress {
    last: Mutex<[Option<u32>; 2]>,
}

impl ProgressSink for StderrProgress {
    fn on_progress(&self, update: ProgressUpdate) {
        let slot = match update.kind {
            StreamKind::Video => 0,
            StreamKind::Audio => 1,
        };
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        match (&update.status, update.fraction()) {
            (ProgressStatus::Finished, _) => eprintln!("{}: done", update.kind),
            (ProgressStatus::Downloading { .. }, Some(fraction)) => {
                let percent = (fraction * 100.0) as u32;
                if last[slot] != Some(percent) {
                    last[slot] = Some(percent);
                    eprintln!("{}: {:>3}%", update.kind, percent);
                }
            }
            (ProgressStatus::Downloading { downloaded_bytes, .. }, None) => {
                // Unknown total: report every MiB
                let mib = (downloaded_bytes / 1_048_576) as u32;
                if last[slot] != Some(mib) {
                    last[slot] = Some(mib);
                    eprintln!("{}: {} MiB", update.kind, mib);
                }
            }
            (ProgressStatus::Other(status), _) => eprintln!("{}: {}", update.kind, status),
        }
    }
}

/// Status lines go through `tracing`, errors straight to stderr
struct CliMessages;

impl MessageSink for CliMessages {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("{}", message);
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    // Errors have already been shown to the user by the time they get here
    if let Err(e) = run(args).await {
        tracing::debug!("exiting after error: {:?}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), DownloadError> {
    let messages = Arc::new(CliMessages);
    let report = |e: DownloadError| {
        messages.error(&e.user_message());
        e
    };

    // Environment overrides are applied by `Config::load`; flags win over them
    let config = Config::load(args.config.as_deref())
        .map_err(report)?
        .with_output_dir(args.output_dir)
        .with_proxy(args.proxy);
    let quiet = args.quiet;
    let service = || {
        let progress: Arc<dyn ProgressSink> = if quiet {
            Arc::new(TracingSink)
        } else {
            Arc::new(StderrProgress::default())
        };
        MediaService::from_config(&config, progress, messages.clone())
    };

    match args.command {
        Commands::Formats { url } => {
            for option in service().list_qualities(&url).await? {
                println!("{}", option);
            }
        }

        Commands::Download {
            url,
            quality,
            height,
        } => {
            let service = service();
            let options = service.list_qualities(&url).await?;
            let chosen = choose(&options, quality.as_deref(), height).map_err(report)?;
            let path = service.download(&url, chosen).await?;
            println!("{}", path.display());
        }

        Commands::Tools => {
            for tool in ToolManager::from_config(&config).get_all_tools() {
                let path = tool
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<8} {:<10} {} {}",
                    tool.name,
                    if tool.is_available { "found" } else { "missing" },
                    path,
                    tool.version.as_deref().unwrap_or("")
                );
            }
        }
    }

    Ok(())
}

fn choose<'a>(
    options: &'a [QualityOption],
    label: Option<&str>,
    height: Option<u32>,
) -> Result<&'a QualityOption, DownloadError> {
    match (label, height) {
        (Some(label), _) => FormatSelector::find_by_label(options, label)
            .ok_or_else(|| DownloadError::QualityNotFound(label.to_string())),
        (None, Some(height)) => FormatSelector::find_by_height(options, height)
            .ok_or_else(|| DownloadError::QualityNotFound(format!("{}p", height))),
        (None, None) => options.first().ok_or(DownloadError::NoQualities),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_env_is_left_to_config() {
        let command = Args::command();
        assert!(command.get_arguments().all(|arg| arg.get_env().is_none()));
    }

    #[test]
    fn test_flags_parse() {
        let args = Args::try_parse_from([
            "ytmux",
            "download",
            "https://example.com/v",
            "--height",
            "720",
            "--output-dir",
            "out",
        ])
        .unwrap();

        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert!(args.proxy.is_none());
        assert!(matches!(args.command, Commands::Download { height: Some(720), .. }));
    }
}
