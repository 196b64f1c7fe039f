//! Invocation of the external media toolchain (ffmpeg/ffprobe).
//!
//! The toolchain is treated as an opaque subprocess: argv construction is
//! kept separate from process execution so the command shapes can be tested
//! without the binaries installed. Children are spawned with kill-on-drop so
//! a cancelled request tears down its in-flight conversion.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::sync::SyncPlan;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("ffprobe reported an unparsable duration: {raw:?}")]
    BadProbeOutput { raw: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Toolchain binaries and encode settings, fixed at startup from config.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub preset: String,
    pub audio_bitrate: String,
}

impl Toolchain {
    /// Probe a media file's container duration in seconds.
    pub async fn probe_duration(&self, path: &Path) -> Result<f64, ToolchainError> {
        let output = self.run(&self.ffprobe, &probe_args(path)).await?;
        let raw = String::from_utf8_lossy(&output.stdout);
        raw.trim()
            .parse::<f64>()
            .map_err(|_| ToolchainError::BadProbeOutput {
                raw: raw.trim().to_string(),
            })
    }

    /// Merge `audio` onto `video`, rescaling video timestamps per `plan` and
    /// trimming both tracks to `sync_duration` seconds.
    pub async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        out: &Path,
        plan: &SyncPlan,
        sync_duration: f64,
    ) -> Result<(), ToolchainError> {
        let args = merge_args(
            video,
            audio,
            out,
            plan,
            sync_duration,
            &self.preset,
            &self.audio_bitrate,
        );
        self.run(&self.ffmpeg, &args).await?;
        Ok(())
    }

    /// Concatenate videos by stream copy, in order. Inputs are not
    /// re-encoded or normalized; mismatched parameters are the caller's
    /// responsibility.
    pub async fn stitch(&self, inputs: &[impl AsRef<Path>], out: &Path) -> Result<(), ToolchainError> {
        let list_path = out.with_extension("concat.txt");
        tokio::fs::write(&list_path, concat_list(inputs)).await?;

        let result = self.run(&self.ffmpeg, &stitch_args(&list_path, out)).await;
        let _ = tokio::fs::remove_file(&list_path).await;
        result?;
        Ok(())
    }

    /// Extract the single frame at `timestamp` seconds as a jpeg.
    pub async fn extract_frame(
        &self,
        video: &Path,
        timestamp: f64,
        out: &Path,
    ) -> Result<(), ToolchainError> {
        self.run(&self.ffmpeg, &extract_frame_args(video, timestamp, out))
            .await?;
        Ok(())
    }

    async fn run(&self, tool: &str, args: &[String]) -> Result<std::process::Output, ToolchainError> {
        debug!(tool, ?args, "Running toolchain command");

        let output = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ToolchainError::Spawn {
                tool: tool.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolchainError::Failed {
                tool: tool.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output)
    }
}

fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        path.display().to_string(),
    ]
}

/// Filter graph that rescales video timestamps and trims both tracks to the
/// sync duration. The video's own audio is dropped; only the supplied audio
/// track is mapped.
fn merge_filter(plan: &SyncPlan, sync_duration: f64) -> String {
    format!(
        "[0:v]setpts=PTS*{speed},trim=duration={d}[v];[1:a]atrim=0:{d}[a]",
        speed = plan.speed_factor,
        d = sync_duration,
    )
}

fn merge_args(
    video: &Path,
    audio: &Path,
    out: &Path,
    plan: &SyncPlan,
    sync_duration: f64,
    preset: &str,
    audio_bitrate: &str,
) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        video.display().to_string(),
        "-i".into(),
        audio.display().to_string(),
        "-filter_complex".into(),
        merge_filter(plan, sync_duration),
        "-map".into(),
        "[v]".into(),
        "-map".into(),
        "[a]".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        preset.into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        audio_bitrate.into(),
        "-shortest".into(),
        out.display().to_string(),
    ]
}

/// Body of an ffmpeg concat demuxer list file, one `file '...'` line per
/// input. Paths are service-generated, so no quote escaping is needed.
fn concat_list(inputs: &[impl AsRef<Path>]) -> String {
    inputs
        .iter()
        .map(|path| format!("file '{}'\n", path.as_ref().display()))
        .collect()
}

fn stitch_args(list: &Path, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list.display().to_string(),
        "-c".into(),
        "copy".into(),
        out.display().to_string(),
    ]
}

fn extract_frame_args(video: &Path, timestamp: f64, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-ss".into(),
        timestamp.to_string(),
        "-i".into(),
        video.display().to_string(),
        "-frames:v".into(),
        "1".into(),
        "-q:v".into(),
        "2".into(),
        out.display().to_string(),
    ]
}
