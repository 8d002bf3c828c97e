use std::sync::Arc;

use crate::models::capture_models::{AudioSampleBuffer, CaptureFormat, CaptureFrame, DeviceInfo};
use crate::models::error::CaptureError;
use crate::processing::clock_bridge::ReferenceClock;

/// The capture hardware a recording session records from.
///
/// Implemented by platform drivers. Queried once at `start_recording` to
/// decide whether a recording can start and to correlate the clocks of the
/// video and audio capture sessions.
pub trait CaptureDevice: Send + Sync {
    /// Whether the depth camera is present and usable.
    fn is_available(&self) -> bool;

    /// The format the driver negotiated, or `FormatUnavailable`.
    fn active_format(&self) -> Result<CaptureFormat, CaptureError>;

    fn microphone_available(&self) -> bool;

    /// Synchronization clock of the color/depth session, if it exposes one.
    fn video_clock(&self) -> Option<Arc<dyn ReferenceClock>>;

    /// Synchronization clock of the audio session, if it exposes one.
    fn audio_clock(&self) -> Option<Arc<dyn ReferenceClock>>;

    fn device_info(&self) -> DeviceInfo;
}

/// Receiver of captured data.
///
/// Both methods are called on driver threads and must return quickly.
pub trait CaptureSink: Send + Sync {
    /// One synchronized color + depth (+ confidence) + pose tick.
    fn on_frame(&self, frame: CaptureFrame);

    /// One audio buffer stamped on the audio session's clock.
    fn on_audio(&self, buffer: AudioSampleBuffer);
}
