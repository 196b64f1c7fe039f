//! Duration sync planning.
//!
//! Given the probed durations of an audio track and a video track, work out
//! how fast the video has to play for the two to line up. The audio track is
//! the reference: without an explicit target, the video is rescaled onto the
//! audio's duration.

use serde::Serialize;
use thiserror::Error;

/// A duration input was unusable for ratio computation.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid {input} duration {value}s: must be a finite, positive number of seconds")]
pub struct InvalidDurationError {
    pub input: &'static str,
    pub value: f64,
}

/// The durations a caller wants reconciled, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncRequest {
    pub audio: f64,
    pub video: f64,
    /// Explicit target duration. Defaults to the audio duration when absent.
    pub target: Option<f64>,
}

impl SyncRequest {
    pub fn plan(&self) -> Result<SyncPlan, InvalidDurationError> {
        compute_sync_plan(self.audio, self.video, self.target)
    }
}

/// How to rescale the video so both tracks end together.
///
/// `speed_factor > 1.0` speeds the video up (shortens it), `< 1.0` slows it
/// down. Feeds directly into a `setpts=PTS*{speed_factor}` filter expression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyncPlan {
    pub speed_factor: f64,
    pub final_duration: f64,
}

fn checked(input: &'static str, value: f64) -> Result<f64, InvalidDurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(InvalidDurationError { input, value })
    }
}

/// Compute the speed adjustment that maps `video` seconds of video onto
/// `target` seconds (the audio duration when no target is given).
///
/// Pure and deterministic; the returned `final_duration` is the target
/// exactly, with no rounding beyond the inputs' own precision.
pub fn compute_sync_plan(
    audio: f64,
    video: f64,
    target: Option<f64>,
) -> Result<SyncPlan, InvalidDurationError> {
    let audio = checked("audio", audio)?;
    let video = checked("video", video)?;
    let target = match target {
        Some(explicit) => checked("target", explicit)?,
        None => audio,
    };

    Ok(SyncPlan {
        speed_factor: video / target,
        final_duration: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_factor_is_video_over_audio_without_target() {
        let plan = compute_sync_plan(10.0, 12.0, None).unwrap();
        assert_eq!(plan.speed_factor, 1.2);
        assert_eq!(plan.final_duration, 10.0);
    }

    #[test]
    fn explicit_target_sets_final_duration() {
        let plan = compute_sync_plan(10.0, 8.0, Some(10.0)).unwrap();
        assert_eq!(plan.speed_factor, 0.8);
        assert_eq!(plan.final_duration, 10.0);

        let plan = compute_sync_plan(4.0, 6.0, Some(3.0)).unwrap();
        assert_eq!(plan.speed_factor, 2.0);
        assert_eq!(plan.final_duration, 3.0);
    }

    #[test]
    fn equal_durations_need_no_adjustment() {
        let plan = compute_sync_plan(10.0, 10.0, None).unwrap();
        assert_eq!(plan.speed_factor, 1.0);
        assert_eq!(plan.final_duration, 10.0);
    }

    #[test]
    fn speed_factor_is_strictly_positive() {
        for (a, v) in [(0.001, 9000.0), (9000.0, 0.001), (1.0, 1.0)] {
            let plan = compute_sync_plan(a, v, None).unwrap();
            assert!(plan.speed_factor > 0.0);
            assert_eq!(plan.speed_factor, v / a);
        }
    }

    #[test]
    fn rejects_non_positive_and_non_finite_inputs() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(compute_sync_plan(bad, 10.0, None).is_err());
            assert!(compute_sync_plan(10.0, bad, None).is_err());
            assert!(compute_sync_plan(10.0, 10.0, Some(bad)).is_err());
        }
    }

    #[test]
    fn error_names_the_offending_input() {
        let err = compute_sync_plan(10.0, -2.0, None).unwrap_err();
        assert_eq!(err.input, "video");
        assert_eq!(err.value, -2.0);

        let err = compute_sync_plan(10.0, 10.0, Some(0.0)).unwrap_err();
        assert_eq!(err.input, "target");
    }

    #[test]
    fn request_form_matches_free_function() {
        let request = SyncRequest {
            audio: 10.0,
            video: 12.0,
            target: None,
        };
        assert_eq!(request.plan().unwrap(), compute_sync_plan(10.0, 12.0, None).unwrap());
    }
}
