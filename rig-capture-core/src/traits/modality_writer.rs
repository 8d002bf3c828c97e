use std::path::{Path, PathBuf};

use crate::models::capture_models::{Matrix3, Modality};
use crate::models::error::CaptureError;
use crate::models::recording_id::RecordingId;
use crate::models::recording_result::ArtifactStatus;

/// Writer for exactly one recorded modality.
///
/// `update` never blocks: it hands the sample to the writer's own serial
/// queue and returns whether the job was accepted. Writes happen in FIFO
/// order off the calling thread. `finish` drains the queue; any `update`
/// arriving after `finish` has begun is ignored.
pub trait ModalityWriter: Send + Sync {
    type Sample: Send + 'static;

    fn modality(&self) -> Modality;

    /// Reset counters and open a fresh output context for `recording_id`
    /// under `output_directory`. Waits for any previous recording's queued
    /// writes to drain first.
    fn prepare(&self, output_directory: &Path, recording_id: &RecordingId) -> Result<(), CaptureError>;

    /// Enqueue one sample to be written as frame `frame_index`.
    fn update(&self, sample: Self::Sample, frame_index: u64) -> bool;

    /// Stop accepting samples, wait for queued writes and report.
    fn finish(&self) -> WriterReport;
}

/// Counters and outcome reported by a writer at `finish`.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterReport {
    pub modality: Modality,
    pub folder: Option<PathBuf>,
    /// Wire encoding of the side files (e.g. `float32_le`).
    pub encoding: String,
    pub frames_submitted: u64,
    /// Rejected because the queue was full.
    pub frames_dropped: u64,
    pub frames_written: u64,
    pub frames_failed: u64,
    pub bytes_written: u64,
    /// `[height, width]` of the first written frame, empty for pose.
    pub resolution: Vec<u32>,
    /// Intrinsics of the first written frame (pose only).
    pub intrinsics: Option<Matrix3>,
    pub last_error: Option<CaptureError>,
    /// The queue did not drain within the finish timeout.
    pub timed_out: bool,
}

impl WriterReport {
    pub fn new(modality: Modality, encoding: impl Into<String>) -> Self {
        Self {
            modality,
            folder: None,
            encoding: encoding.into(),
            frames_submitted: 0,
            frames_dropped: 0,
            frames_written: 0,
            frames_failed: 0,
            bytes_written: 0,
            resolution: Vec::new(),
            intrinsics: None,
            last_error: None,
            timed_out: false,
        }
    }

    pub fn status(&self) -> ArtifactStatus {
        if self.timed_out {
            return ArtifactStatus::Failed(CaptureError::Timeout);
        }
        let lost = self.frames_failed + self.frames_dropped;
        if self.frames_written == 0 {
            return match &self.last_error {
                Some(error) if lost > 0 => ArtifactStatus::Failed(error.clone()),
                _ if lost > 0 => ArtifactStatus::Partial { frames_failed: lost },
                _ => ArtifactStatus::Empty,
            };
        }
        if lost > 0 {
            ArtifactStatus::Partial { frames_failed: lost }
        } else {
            ArtifactStatus::Complete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reflects_counters() {
        let mut report = WriterReport::new(Modality::Depth, "float32_le");
        assert_eq!(report.status(), ArtifactStatus::Empty);

        report.frames_submitted = 3;
        report.frames_written = 3;
        assert_eq!(report.status(), ArtifactStatus::Complete);

        report.frames_failed = 1;
        assert_eq!(report.status(), ArtifactStatus::Partial { frames_failed: 1 });

        report.timed_out = true;
        assert_eq!(report.status(), ArtifactStatus::Failed(CaptureError::Timeout));
    }

    #[test]
    fn nothing_written_with_error_is_failed() {
        let mut report = WriterReport::new(Modality::Pose, "float32_le");
        report.frames_submitted = 2;
        report.frames_failed = 2;
        report.last_error = Some(CaptureError::StorageError("disk full".into()));
        assert!(report.status().is_failed());
    }
}
