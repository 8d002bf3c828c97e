use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::capture_models::{DeviceInfo, Modality};
use super::error::CaptureError;
use super::recording_id::RecordingId;

/// Description of one recorded stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalityStreamInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub modality: Modality,
    pub encoding: String,
    /// Samples per second (frames for image/pose streams, audio sample rate
    /// for audio).
    pub frequency: f64,
    pub number_of_frames: u64,
    pub file_extension: String,
    /// `[height, width]`, empty for non-image streams.
    pub resolution: Vec<u32>,
    /// Row-major 3x3 camera intrinsics of the first recorded frame.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub intrinsics: Option<Vec<f32>>,
}

/// Metadata written once per completed recording as `<recordingId>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    pub recording_id: RecordingId,
    pub created_at: String,
    pub duration_secs: f64,
    pub streams: Vec<ModalityStreamInfo>,
    /// Number of files in the recording folder, metadata file included.
    pub file_count: u64,
    /// Capture hardware the recording was made with.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub device: Option<DeviceInfo>,
}

impl RecordingMetadata {
    pub fn stream(&self, modality: Modality) -> Option<&ModalityStreamInfo> {
        self.streams.iter().find(|s| s.modality == modality)
    }
}

/// Outcome for one artifact of a finished recording.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactStatus {
    Complete,
    /// Some frames could not be written; the artifact is usable but has gaps.
    Partial { frames_failed: u64 },
    Failed(CaptureError),
    /// Nothing was written (e.g. the muxer never received a sample).
    Empty,
}

impl ArtifactStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactReport {
    pub modality: Modality,
    pub path: Option<PathBuf>,
    pub status: ArtifactStatus,
}

/// Result delivered to the stop completion once every writer has finished.
///
/// A result is produced even when individual artifacts failed; inspect
/// `artifacts` to learn which ones.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub recording_id: RecordingId,
    pub output_directory: PathBuf,
    /// The muxed audio/video file, when one was written.
    pub primary_output_path: Option<PathBuf>,
    pub metadata_path: Option<PathBuf>,
    pub metadata: RecordingMetadata,
    pub artifacts: Vec<ArtifactReport>,
    /// SHA-256 of the muxed file.
    pub checksum: Option<String>,
    pub frame_count: u64,
    pub duration_secs: f64,
    pub library_asset_id: Option<String>,
    pub library_error: Option<CaptureError>,
}

impl RecordingResult {
    pub fn artifact(&self, modality: Modality) -> Option<&ArtifactReport> {
        self.artifacts.iter().find(|a| a.modality == modality)
    }

    pub fn failed_artifacts(&self) -> Vec<&ArtifactReport> {
        self.artifacts.iter().filter(|a| a.status.is_failed()).collect()
    }

    /// True when every artifact was written completely.
    pub fn is_complete(&self) -> bool {
        self.artifacts
            .iter()
            .all(|a| matches!(a.status, ArtifactStatus::Complete))
    }
}
