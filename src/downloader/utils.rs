// Helper functions shared by the resolver and the muxer

use std::ffi::OsStr;
use std::process::{Output, Stdio};

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Io(String),
}

/// Run a command to completion, capturing stdout and stderr. The child is
/// killed if `timeout_secs` elapses first.
pub async fn run_output_with_timeout<S: AsRef<OsStr>>(
    program: &OsStr,
    args: &[S],
    timeout_secs: Option<u64>,
) -> Result<Output, RunError> {
    let program_name = program.to_string_lossy().to_string();
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunError::Spawn {
            program: program_name.clone(),
            source,
        })?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| RunError::Io(format!("Failed to capture stdout from {}", program_name)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| RunError::Io(format!("Failed to capture stderr from {}", program_name)))?;

    // Drain both pipes while waiting so a chatty child cannot fill them and stall
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let status = match timeout_secs {
        Some(secs) => match timeout(Duration::from_secs(secs), child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(RunError::Timeout(secs));
            }
        },
        None => child.wait().await,
    }
    .map_err(|e| RunError::Io(format!("Failed to wait for {}: {}", program_name, e)))?;

    let stdout = join_pipe(stdout_task, "stdout").await?;
    let stderr = join_pipe(stderr_task, "stderr").await?;

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    name: &str,
) -> Result<Vec<u8>, RunError> {
    task.await
        .map_err(|e| RunError::Io(format!("{} task failed: {}", name, e)))?
        .map_err(|e| RunError::Io(format!("Failed to read {}: {}", name, e)))
}

/// Build proxy arguments for yt-dlp
pub fn get_proxy_args(config: &Config) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(proxy) = &config.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    args
}

/// Build timeout and retry arguments for yt-dlp
pub fn get_timeout_args(config: &Config) -> Vec<String> {
    vec![
        "--socket-timeout".to_string(),
        config.socket_timeout_secs.to_string(),
        "--retries".to_string(),
        "3".to_string(),
    ]
}

/// Build cookie arguments for yt-dlp
pub fn get_cookie_args(config: &Config) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(path) = &config.cookies_path {
        args.push("--cookies".to_string());
        args.push(path.to_string_lossy().to_string());
    }

    args
}
