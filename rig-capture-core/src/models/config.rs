use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::capture_models::CaptureFormat;
use super::sample_buffer::PixelFormat;

/// Video codec declared on the muxed video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Hevc,
    /// Uncompressed frames, stored as delivered.
    Raw,
}

impl VideoCodec {
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            Self::H264 => *b"avc1",
            Self::Hevc => *b"hvc1",
            Self::Raw => *b"raw ",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Raw => "raw",
        }
    }
}

/// Audio codec declared on the muxed audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    /// 16-bit little-endian PCM.
    Pcm16,
}

impl AudioCodec {
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            Self::Aac => *b"mp4a",
            Self::Pcm16 => *b"sowt",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Pcm16 => "pcm16_le",
        }
    }
}

/// How a tick's capture timestamp becomes its presentation (content) time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameTiming {
    /// Content time is the capture timestamp.
    Native,
    /// Content time advances by exactly one frame at the target frame rate
    /// per recorded tick, starting one frame after the first tick.
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrackSettings {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation applied on playback to correct sensor mounting.
    pub rotation_degrees: u16,
}

impl Default for VideoTrackSettings {
    fn default() -> Self {
        Self {
            codec: VideoCodec::Raw,
            width: 1920,
            height: 1080,
            rotation_degrees: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrackSettings {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u32,
}

impl Default for AudioTrackSettings {
    fn default() -> Self {
        Self {
            codec: AudioCodec::Pcm16,
            sample_rate: 44100,
            channels: 2,
            bit_rate: 64000,
        }
    }
}

/// Bounded wait for a container track to become ready for more data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessRetry {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ReadinessRetry {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_millis(2),
        }
    }
}

/// Configuration for a recording session.
#[derive(Debug, Clone)]
pub struct RecorderConfiguration {
    /// Directory under which one folder per recording is created.
    pub output_directory: PathBuf,

    /// Target frame rate in Hz (default: 30).
    pub target_frame_rate: f64,

    /// Content-time policy for video presentation times (default: native).
    pub frame_timing: FrameTiming,

    /// Video track settings. Width/height are overridden by the device's
    /// active format at `start_recording` when one is reported.
    pub video: VideoTrackSettings,

    /// Audio track settings, or None to record without audio.
    pub audio: Option<AudioTrackSettings>,

    /// Depth pixel format readers expect. Ticks carrying another depth
    /// format are dropped.
    pub depth_format: PixelFormat,

    /// Prefix each depth file with little-endian i32 width and height.
    pub depth_dimensions_header: bool,

    /// Write confidence side files when the tick carries confidence.
    pub record_confidence: bool,

    /// Pending jobs allowed per writer queue before frames are dropped.
    pub writer_queue_capacity: usize,

    /// Muxer retry policy when a track reports it is not ready.
    pub readiness_retry: ReadinessRetry,

    /// Upper bound on waiting for each writer to drain at stop.
    pub finish_timeout: Duration,
}

impl RecorderConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.target_frame_rate <= 0.0 || !self.target_frame_rate.is_finite() {
            return Err("target frame rate must be positive".into());
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err("video dimensions must be non-zero".into());
        }
        if self.video.rotation_degrees % 90 != 0 || self.video.rotation_degrees >= 360 {
            return Err(format!("unsupported video rotation: {}", self.video.rotation_degrees));
        }
        if !self.depth_format.is_depth() {
            return Err(format!("unsupported depth format: {:?}", self.depth_format));
        }
        if self.writer_queue_capacity == 0 {
            return Err("writer queue capacity must be at least 1".into());
        }
        if self.finish_timeout.is_zero() {
            return Err("finish timeout must be non-zero".into());
        }
        if let Some(audio) = &self.audio {
            if ![8000, 16000, 22050, 44100, 48000].contains(&audio.sample_rate) {
                return Err(format!("unsupported audio sample rate: {}", audio.sample_rate));
            }
            if ![1, 2].contains(&audio.channels) {
                return Err(format!("unsupported channel count: {}", audio.channels));
            }
        }
        Ok(())
    }

    /// Adopt the resolution and frame rate the device actually negotiated.
    pub fn apply_format(&mut self, format: &CaptureFormat) {
        if format.color_width > 0 && format.color_height > 0 {
            self.video.width = format.color_width;
            self.video.height = format.color_height;
        }
        if format.frame_rate > 0.0 {
            self.target_frame_rate = format.frame_rate;
        }
    }
}

impl Default for RecorderConfiguration {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("."),
            target_frame_rate: 30.0,
            frame_timing: FrameTiming::Native,
            video: VideoTrackSettings::default(),
            audio: Some(AudioTrackSettings::default()),
            depth_format: PixelFormat::DepthFloat32,
            depth_dimensions_header: true,
            record_confidence: true,
            writer_queue_capacity: 120,
            readiness_retry: ReadinessRetry::default(),
            finish_timeout: Duration::from_secs(10),
        }
    }
}
