use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::media_time::MediaTime;
use super::sample_buffer::{PixelFormat, SampleBuffer};

/// A distinct captured signal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Color,
    Depth,
    Confidence,
    Pose,
    Audio,
}

impl Modality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Depth => "depth",
            Self::Confidence => "confidence",
            Self::Pose => "pose",
            Self::Audio => "audio",
        }
    }
}

/// Row-major 3x3 matrix.
pub type Matrix3 = [[f32; 3]; 3];

/// Camera-to-world transform as delivered by the tracking subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PoseTransform {
    /// Full homogeneous 4x4 transform, row-major.
    Homogeneous([[f32; 4]; 4]),
    /// Extrinsic matrix with four rows of three columns, row-major.
    Extrinsic([[f32; 3]; 4]),
}

impl PoseTransform {
    pub fn identity() -> Self {
        Self::Homogeneous([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// `(rows, columns)` of the serialized matrix.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Homogeneous(_) => (4, 4),
            Self::Extrinsic(_) => (4, 3),
        }
    }

    /// Row-major flattening.
    pub fn to_row_major(&self) -> Vec<f32> {
        match self {
            Self::Homogeneous(m) => m.iter().flatten().copied().collect(),
            Self::Extrinsic(m) => m.iter().flatten().copied().collect(),
        }
    }

    fn is_finite(&self) -> bool {
        self.to_row_major().iter().all(|v| v.is_finite())
    }
}

/// Camera pose and calibration for one synchronized tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub timestamp: MediaTime,
    pub intrinsics: Matrix3,
    pub transform: PoseTransform,
    pub euler_angles: Option<[f32; 3]>,
    pub exposure_duration: Option<f64>,
}

impl CameraPose {
    pub fn new(timestamp: MediaTime, intrinsics: Matrix3, transform: PoseTransform) -> Self {
        Self {
            timestamp,
            intrinsics,
            transform,
            euler_angles: None,
            exposure_duration: None,
        }
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        let intrinsics_finite = self.intrinsics.iter().flatten().all(|v| v.is_finite());
        if !intrinsics_finite || !self.transform.is_finite() {
            return Err(CaptureError::InvalidSample("pose contains non-finite values".into()));
        }
        Ok(())
    }
}

/// One synchronized capture tick: color + depth (+ confidence) + pose.
///
/// Ownership moves into the synchronizer, which fans the parts out to the
/// writers and keeps nothing afterwards. `depth` is optional because the
/// capture subsystem can deliver a tick whose depth was dropped; such ticks
/// are not recorded.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub timestamp: MediaTime,
    pub color: SampleBuffer,
    pub depth: Option<SampleBuffer>,
    pub confidence: Option<SampleBuffer>,
    pub pose: CameraPose,
}

/// Interleaved f32 audio delivered by the audio capture session, stamped on
/// that session's clock.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSampleBuffer {
    pub presentation_time: MediaTime,
    pub sample_rate: f64,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioSampleBuffer {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.sample_rate <= 0.0 || self.channels == 0 {
            return Err(CaptureError::InvalidSample(format!(
                "audio buffer with {} Hz / {} channels",
                self.sample_rate, self.channels
            )));
        }
        if self.samples.len() % self.channels as usize != 0 {
            return Err(CaptureError::InvalidSample("audio samples not a whole number of frames".into()));
        }
        Ok(())
    }
}

/// Active format of the depth camera, as negotiated by the capture driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureFormat {
    pub color_width: u32,
    pub color_height: u32,
    pub frame_rate: f64,
    pub depth_format: PixelFormat,
    pub depth_width: u32,
    pub depth_height: u32,
}

/// Identity of the capture hardware backing a session, recorded in the
/// metadata of every recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub has_lidar: bool,
}
