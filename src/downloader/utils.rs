// Helper functions shared by the engine adapter, the ladder and the batch controller

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};

use super::errors::FetchError;
use super::traits::EngineFailure;

/// Output template for a single video
pub const VIDEO_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Output template for a single audio track; keeps a same-titled video intact
pub const AUDIO_TEMPLATE: &str = "%(title)s [audio].%(ext)s";

/// Output template for playlist items, one folder per playlist
pub const COLLECTION_VIDEO_TEMPLATE: &str = "%(playlist_title)s/%(playlist_index)s - %(title)s.%(ext)s";

pub const COLLECTION_AUDIO_TEMPLATE: &str =
    "%(playlist_title)s/%(playlist_index)s - %(title)s [audio].%(ext)s";

/// Full output path template for a single-item download
pub fn single_item_template(output_dir: &Path, audio_only: bool) -> PathBuf {
    output_dir.join(if audio_only {
        AUDIO_TEMPLATE
    } else {
        VIDEO_TEMPLATE
    })
}

/// Full output path template for a playlist download
pub fn collection_template(output_dir: &Path, audio_only: bool) -> PathBuf {
    output_dir.join(if audio_only {
        COLLECTION_AUDIO_TEMPLATE
    } else {
        COLLECTION_VIDEO_TEMPLATE
    })
}

/// mkdir -p; safe to call concurrently for the same directory
pub async fn ensure_output_dir(dir: &Path) -> Result<(), FetchError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        tracing::warn!(dir = %dir.display(), error = %e, "failed to create output directory");
        FetchError::from(e)
    })
}

/// Run command with timeout, collecting stdout and stderr
pub async fn run_output_with_timeout(
    program: &Path,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, EngineFailure> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EngineFailure::new(format!("Failed to start {}: {}", program.display(), e)))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| EngineFailure::new("Failed to capture stdout"))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| EngineFailure::new("Failed to capture stderr"))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| EngineFailure::new(format!("Failed to read stdout: {}", e)))?;
        Ok::<Vec<u8>, EngineFailure>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| EngineFailure::new(format!("Failed to read stderr: {}", e)))?;
        Ok::<Vec<u8>, EngineFailure>(buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| EngineFailure::new(format!("Failed to wait for process: {}", e)))?;
            let stdout = stdout_task
                .await
                .map_err(|e| EngineFailure::new(format!("stdout task failed: {}", e)))??;
            let stderr = stderr_task
                .await
                .map_err(|e| EngineFailure::new(format!("stderr task failed: {}", e)))??;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(EngineFailure::new(format!("Timed out after {}s", timeout_secs)))
        }
    }
}
