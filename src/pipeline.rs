//! Media pipeline: download, normalization, and audio extraction.
//!
//! Each request gets its own set of artifact paths so concurrent runs never
//! collide on the filesystem. The per-request flow is linear: download →
//! transcode → (optional) audio extraction → delivery, with an absorbing
//! error state; every artifact is removed before the run finishes, on
//! success and on every error path.

use std::path::PathBuf;
use std::time::Duration;

use teloxide::types::{ChatId, MessageId};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;

/// Fixed delivery encoding profile
const VIDEO_CODEC: &str = "libx264";
const VIDEO_PRESET: &str = "fast";
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "128k";
const CONTAINER_FLAGS: &str = "+faststart";

/// Max characters of stderr carried into an internal error message
const STDERR_TAIL_CHARS: usize = 400;

/// What the user asked to receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAction {
    Video,
    Audio,
}

impl MediaAction {
    /// Action name used in callback payloads (`{action}:{token}`)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "download_video",
            Self::Audio => "download_audio",
        }
    }

    /// Parse a callback action name.
    #[must_use]
    pub fn from_callback_name(name: &str) -> Option<Self> {
        match name {
            "download_video" => Some(Self::Video),
            "download_audio" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Status line shown while the run is in flight
    #[must_use]
    pub const fn status_text(self) -> &'static str {
        match self {
            Self::Video => "Downloading video…",
            Self::Audio => "Downloading audio…",
        }
    }
}

/// One user request travelling through the pipeline.
///
/// Created when a button press resolves a token, dropped when the run
/// completes; nothing about it is persisted.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub chat_id: ChatId,
    pub url: String,
    pub action: MediaAction,
    /// Status message to replace with the result or an error notice
    pub status_msg: MessageId,
}

/// Request-scoped artifact paths, generated at pipeline start and threaded
/// through every step.
#[derive(Debug)]
pub struct ArtifactSet {
    /// Raw fetch before normalization
    pub raw: PathBuf,
    /// Normalized video ready for delivery
    pub video: PathBuf,
    /// Extracted audio-only file
    pub audio: PathBuf,
}

/// Invokes yt-dlp and ffmpeg and owns the temporary-file lifecycle.
#[derive(Debug)]
pub struct MediaPipeline {
    download_dir: PathBuf,
    command_timeout: Duration,
}

impl MediaPipeline {
    #[must_use]
    pub fn new(download_dir: PathBuf, command_timeout: Duration) -> Self {
        Self {
            download_dir,
            command_timeout,
        }
    }

    /// Create the artifact directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns the underlying io error when the directory cannot be created.
    pub async fn ensure_workdir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.download_dir).await
    }

    /// Fresh artifact paths for one request.
    #[must_use]
    pub fn new_artifacts(&self) -> ArtifactSet {
        let id = Uuid::new_v4();
        ArtifactSet {
            raw: self.download_dir.join(format!("{id}.orig.mp4")),
            video: self.download_dir.join(format!("{id}.mp4")),
            audio: self.download_dir.join(format!("{id}.mp3")),
        }
    }

    /// Fetch the media and normalize it for delivery.
    ///
    /// Runs yt-dlp against the raw path, then re-encodes with the fixed
    /// profile (H.264 + AAC, faststart layout). The raw fetch is removed as
    /// soon as the normalized copy exists. Both steps are terminal on
    /// failure; no partial video is ever delivered.
    ///
    /// # Errors
    ///
    /// `Download` when the fetch fails, `Transcode` when re-encoding fails.
    pub async fn download(&self, url: &str, artifacts: &ArtifactSet) -> Result<(), AppError> {
        info!(url = %url, "starting media download");
        let mut fetch = Command::new("yt-dlp");
        fetch.arg("-o").arg(&artifacts.raw).arg(url);
        self.run("yt-dlp", &mut fetch)
            .await
            .map_err(AppError::Download)?;

        info!(output = %artifacts.video.display(), "normalizing container for delivery");
        let mut transcode = Command::new("ffmpeg");
        transcode
            .arg("-y")
            .arg("-i")
            .arg(&artifacts.raw)
            .args(["-c:v", VIDEO_CODEC, "-preset", VIDEO_PRESET])
            .args(["-c:a", AUDIO_CODEC, "-b:a", AUDIO_BITRATE])
            .args(["-movflags", CONTAINER_FLAGS])
            .arg(&artifacts.video);
        self.run("ffmpeg", &mut transcode)
            .await
            .map_err(AppError::Transcode)?;

        remove_quiet(&artifacts.raw).await;
        Ok(())
    }

    /// Produce the audio-only file from an already-normalized video.
    ///
    /// The video artifact stays on disk; its fate is the caller's decision.
    ///
    /// # Errors
    ///
    /// `Extraction` when ffmpeg fails to produce the audio file.
    pub async fn extract_audio(&self, artifacts: &ArtifactSet) -> Result<(), AppError> {
        info!(input = %artifacts.video.display(), "extracting audio track");
        let mut extract = Command::new("ffmpeg");
        extract
            .arg("-y")
            .arg("-i")
            .arg(&artifacts.video)
            .args(["-q:a", "0", "-map", "a"])
            .arg(&artifacts.audio);
        self.run("ffmpeg", &mut extract)
            .await
            .map_err(AppError::Extraction)?;
        Ok(())
    }

    /// Remove every artifact of a run, tolerating ones that were never
    /// created or already deleted.
    pub async fn cleanup(&self, artifacts: &ArtifactSet) {
        for path in [&artifacts.raw, &artifacts.video, &artifacts.audio] {
            remove_quiet(path).await;
        }
    }

    /// Run an external command to completion under the configured timeout.
    ///
    /// The returned error string is internal-only; callers wrap it into the
    /// step-specific `AppError` variant.
    async fn run(&self, program: &'static str, command: &mut Command) -> Result<(), String> {
        debug!(program, "spawning external command");
        let output = match timeout(self.command_timeout, command.output()).await {
            Ok(result) => result.map_err(|e| format!("failed to start {program}: {e}"))?,
            Err(_) => {
                return Err(format!(
                    "{program} timed out after {}s",
                    self.command_timeout.as_secs()
                ))
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr_tail(&stderr)
            ))
        }
    }
}

async fn remove_quiet(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove artifact"),
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pipeline(command_timeout: Duration) -> MediaPipeline {
        MediaPipeline::new(std::env::temp_dir(), command_timeout)
    }

    #[test]
    fn artifact_paths_are_unique_per_request() {
        let pipeline = test_pipeline(Duration::from_secs(5));
        let a = pipeline.new_artifacts();
        let b = pipeline.new_artifacts();

        assert_ne!(a.raw, b.raw);
        assert_ne!(a.video, b.video);
        assert_ne!(a.audio, b.audio);
        assert!(a.video.starts_with(std::env::temp_dir()));
    }

    #[test]
    fn action_names_round_trip() {
        for action in [MediaAction::Video, MediaAction::Audio] {
            assert_eq!(
                MediaAction::from_callback_name(action.as_str()),
                Some(action)
            );
        }
        assert_eq!(MediaAction::from_callback_name("download_gif"), None);
    }

    #[tokio::test]
    async fn run_succeeds_on_zero_exit() {
        let pipeline = test_pipeline(Duration::from_secs(5));
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 0"]);
        assert!(pipeline.run("sh", &mut cmd).await.is_ok());
    }

    #[tokio::test]
    async fn run_reports_nonzero_exit() {
        let pipeline = test_pipeline(Duration::from_secs(5));
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        let err = pipeline.run("sh", &mut cmd).await.expect_err("must fail");
        assert!(err.contains("exited"));
        assert!(err.contains("boom"));
    }

    #[tokio::test]
    async fn run_enforces_timeout() {
        let pipeline = test_pipeline(Duration::from_millis(100));
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let err = pipeline.run("sh", &mut cmd).await.expect_err("must time out");
        assert!(err.contains("timed out"));
    }

    #[tokio::test]
    async fn cleanup_removes_all_artifacts() {
        let pipeline = test_pipeline(Duration::from_secs(5));
        let artifacts = pipeline.new_artifacts();

        for path in [&artifacts.raw, &artifacts.video, &artifacts.audio] {
            tokio::fs::write(path, b"stub").await.expect("write stub");
        }

        pipeline.cleanup(&artifacts).await;

        for path in [&artifacts.raw, &artifacts.video, &artifacts.audio] {
            assert!(!path.exists(), "{} should be gone", path.display());
        }

        // A second pass over already-absent files must not panic or error.
        pipeline.cleanup(&artifacts).await;
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        let long = "x".repeat(1000) + "tail-marker";
        let tail = stderr_tail(&long);
        assert!(tail.ends_with("tail-marker"));
        assert!(tail.chars().count() <= STDERR_TAIL_CHARS);
    }
}
