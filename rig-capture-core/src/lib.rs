//! # rig-capture-core
//!
//! Platform-agnostic recording core for RGB-D capture rigs.
//!
//! Records synchronized color, depth, depth confidence, camera pose and
//! microphone audio into one folder per recording: a muxed color+audio
//! container, numbered per-frame side files for depth, confidence and pose,
//! and a JSON metadata file describing every stream. Platform drivers
//! implement `CaptureDevice` and feed the session through `CaptureSink`.
//!
//! ## Architecture
//!
//! ```text
//! rig-capture-core (this crate)
//! ├── traits/       ← CaptureDevice, CaptureSink, ModalityWriter, ContainerFormat, RecordingDelegate
//! ├── models/       ← CaptureError, RecordingState, RecorderConfiguration, SampleBuffer, etc.
//! ├── processing/   ← ClockBridge, depth/matrix encoding, audio conforming, frame timing
//! ├── session/      ← RecordingSession (orchestrator), FrameSynchronizer
//! └── storage/      ← Depth/Confidence/Pose writers, VideoAudioMuxer, metadata
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use models::capture_models::{AudioSampleBuffer, CameraPose, CaptureFormat, CaptureFrame, Modality, PoseTransform};
pub use models::config::{AudioTrackSettings, FrameTiming, RecorderConfiguration, VideoTrackSettings};
pub use models::error::CaptureError;
pub use models::media_time::MediaTime;
pub use models::recording_id::RecordingId;
pub use models::recording_result::{ArtifactStatus, RecordingMetadata, RecordingResult};
pub use models::sample_buffer::{PixelFormat, SampleBuffer};
pub use models::state::{MuxerState, RecordingState};
pub use processing::clock_bridge::{ClockBridge, ReferenceClock};
pub use session::recording::RecordingSession;
pub use session::synchronizer::FrameSynchronizer;
pub use storage::confidence_writer::ConfidenceWriter;
pub use storage::depth_writer::DepthWriter;
pub use storage::muxer::VideoAudioMuxer;
pub use storage::pose_writer::PoseWriter;
pub use traits::asset_library::AssetLibrary;
pub use traits::capture_device::{CaptureDevice, CaptureSink};
pub use traits::container_writer::{ContainerFormat, ContainerWriter};
pub use traits::modality_writer::{ModalityWriter, WriterReport};
pub use traits::recording_delegate::RecordingDelegate;
