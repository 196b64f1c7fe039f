use crate::error::ServiceError;
use crate::sync::SyncRequest;
use crate::{AppState, fetch};
use axum::body::Body;
use axum::extract::Extension;
use axum::http::{Response, header};
use axum::response::Json;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use mime_guess::from_path;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::info;

#[derive(Serialize, Deserialize)]
pub struct MergeRequest {
    pub video_url: String,
    pub audio_url: String,
    #[serde(default)]
    pub target_duration: Option<f64>,
}

#[derive(Serialize, Deserialize)]
pub struct StitchRequest {
    pub video_urls: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct FrameExtractRequest {
    pub video_url: String,
    pub timestamps: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
pub struct FrameData {
    pub timestamp: f64,
    pub frame_number: usize,
    pub image_base64: String,
    pub mime_type: String,
    pub filename: String,
}

#[derive(Serialize, Deserialize)]
pub struct ExtractFramesResponse {
    pub success: bool,
    pub video_url: String,
    pub video_duration: f64,
    pub frames_count: usize,
    pub frames: Vec<FrameData>,
}

/// First timestamp that falls outside the playable range, if any.
fn first_invalid_timestamp(timestamps: &[f64], duration: f64) -> Option<f64> {
    timestamps
        .iter()
        .copied()
        .find(|&ts| !ts.is_finite() || ts < 0.0 || ts > duration)
}

fn frame_filename(frame_number: usize, timestamp: f64) -> String {
    format!("frame_{frame_number}_at_{timestamp}s.jpg")
}

/// Merge an audio track onto a video track, adjusting video speed so both
/// end together, and respond with the encoded mp4.
#[axum::debug_handler]
pub async fn merge(
    Extension(state): Extension<AppState>,
    Json(request): Json<MergeRequest>,
) -> Result<Response<Body>, ServiceError> {
    // Everything request-scoped lives in one scratch dir, removed on drop
    // whether the request succeeds or fails.
    let scratch = tempfile::tempdir_in(state.temp_dir())?;

    info!(video_url = %request.video_url, "Downloading video");
    let video_path = scratch.path().join("input.mp4");
    fetch::download(&state.client, &request.video_url, &video_path).await?;

    info!(audio_url = %request.audio_url, "Downloading audio");
    let audio_path = scratch.path().join("input.mp3");
    fetch::download(&state.client, &request.audio_url, &audio_path).await?;

    let video_duration = state.toolchain.probe_duration(&video_path).await?;
    let audio_duration = state.toolchain.probe_duration(&audio_path).await?;
    info!(video_duration, audio_duration, "Probed input durations");

    let plan = SyncRequest {
        audio: audio_duration,
        video: video_duration,
        target: request.target_duration,
    }
    .plan()?;

    // Trim length: the explicit target when given, else the shorter of the
    // two tracks. The plan's speed factor still rescales video onto audio.
    let sync_duration = request
        .target_duration
        .unwrap_or_else(|| video_duration.min(audio_duration));

    info!(
        speed_factor = plan.speed_factor,
        sync_duration, "Merging audio and video"
    );
    let output = scratch.path().join("output.mp4");
    state
        .toolchain
        .merge(&video_path, &audio_path, &output, &plan, sync_duration)
        .await?;

    serve_output(&output, "merged_output.mp4").await
}

/// Concatenate two or more videos by stream copy and respond with the result.
pub async fn stitch(
    Extension(state): Extension<AppState>,
    Json(request): Json<StitchRequest>,
) -> Result<Response<Body>, ServiceError> {
    if request.video_urls.len() < 2 {
        return Err(ServiceError::BadRequest(
            "At least 2 videos are required".into(),
        ));
    }

    let scratch = tempfile::tempdir_in(state.temp_dir())?;

    let mut video_paths = Vec::with_capacity(request.video_urls.len());
    for (i, video_url) in request.video_urls.iter().enumerate() {
        info!(
            %video_url,
            "Downloading video {}/{}",
            i + 1,
            request.video_urls.len()
        );
        let path = scratch.path().join(format!("input_{i}.mp4"));
        fetch::download(&state.client, video_url, &path).await?;
        video_paths.push(path);
    }

    info!(count = video_paths.len(), "Stitching videos together");
    let output = scratch.path().join("output.mp4");
    state.toolchain.stitch(&video_paths, &output).await?;

    serve_output(&output, "stitched_output.mp4").await
}

/// Extract one jpeg per requested timestamp and return them inline as
/// base64.
pub async fn extract_frames(
    Extension(state): Extension<AppState>,
    Json(request): Json<FrameExtractRequest>,
) -> Result<Json<ExtractFramesResponse>, ServiceError> {
    if request.timestamps.is_empty() {
        return Err(ServiceError::BadRequest(
            "At least one timestamp is required".into(),
        ));
    }

    let scratch = tempfile::tempdir_in(state.temp_dir())?;

    info!(video_url = %request.video_url, "Downloading video");
    let video_path = scratch.path().join("input.mp4");
    fetch::download(&state.client, &request.video_url, &video_path).await?;

    let video_duration = state.toolchain.probe_duration(&video_path).await?;
    if let Some(ts) = first_invalid_timestamp(&request.timestamps, video_duration) {
        return Err(ServiceError::BadRequest(format!(
            "Timestamp {ts}s is out of range. Video duration is {video_duration}s"
        )));
    }

    info!(
        count = request.timestamps.len(),
        video_duration, "Extracting frames"
    );

    let mut frames = Vec::with_capacity(request.timestamps.len());
    for (frame_number, &timestamp) in request.timestamps.iter().enumerate() {
        let frame_path = scratch.path().join(format!("frame_{frame_number}.jpg"));
        state
            .toolchain
            .extract_frame(&video_path, timestamp, &frame_path)
            .await?;

        let image = tokio::fs::read(&frame_path).await?;
        frames.push(FrameData {
            timestamp,
            frame_number,
            image_base64: BASE64.encode(&image),
            mime_type: "image/jpeg".into(),
            filename: frame_filename(frame_number, timestamp),
        });
    }

    Ok(Json(ExtractFramesResponse {
        success: true,
        video_url: request.video_url,
        video_duration,
        frames_count: frames.len(),
        frames,
    }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Stream `path` back as a downloadable file. The caller's scratch dir may
/// be dropped right after this returns; the open descriptor keeps the bytes
/// readable after the unlink.
async fn serve_output(path: &Path, filename: &str) -> Result<Response<Body>, ServiceError> {
    let file = tokio::fs::File::open(path).await?;
    let size = file.metadata().await?.len();
    let stream = ReaderStream::new(file);

    let mut res = Response::new(Body::from_stream(stream));
    let headers = res.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        from_path(filename)
            .first_or_octet_stream()
            .to_string()
            .parse()
            .unwrap(),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{filename}\"").parse().unwrap(),
    );
    headers.insert(header::CONTENT_LENGTH, size.to_string().parse().unwrap());
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_invalid_timestamp() {
        assert_eq!(first_invalid_timestamp(&[0.0, 1.5, 10.0], 10.0), None);

        // Out of range cases
        assert_eq!(first_invalid_timestamp(&[-0.5], 10.0), Some(-0.5));
        assert_eq!(first_invalid_timestamp(&[1.0, 10.1], 10.0), Some(10.1));
        assert_eq!(
            first_invalid_timestamp(&[f64::NAN], 10.0).map(f64::is_nan),
            Some(true)
        );
    }

    #[test]
    fn test_frame_filename() {
        assert_eq!(frame_filename(0, 1.5), "frame_0_at_1.5s.jpg");
        assert_eq!(frame_filename(2, 10.0), "frame_2_at_10s.jpg");
    }

    #[test]
    fn merge_request_accepts_optional_target() {
        let req: MergeRequest = serde_json::from_str(
            r#"{"video_url":"http://v","audio_url":"http://a"}"#,
        )
        .unwrap();
        assert_eq!(req.target_duration, None);

        let req: MergeRequest = serde_json::from_str(
            r#"{"video_url":"http://v","audio_url":"http://a","target_duration":8.0}"#,
        )
        .unwrap();
        assert_eq!(req.target_duration, Some(8.0));
    }
}
