use std::path::Path;

use crate::models::config::{AudioTrackSettings, VideoTrackSettings};
use crate::models::error::CaptureError;
use crate::models::media_time::MediaTime;
use crate::models::sample_buffer::SampleBuffer;

/// Track of a muxed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Track declarations committed when the container is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLayout {
    pub video: VideoTrackSettings,
    pub audio: Option<AudioTrackSettings>,
}

/// A container file format the muxer can write.
///
/// Platform backends with real codecs plug in here.
pub trait ContainerFormat: Send + Sync {
    fn file_extension(&self) -> &str;

    /// Whether this format can carry the declared tracks. Checked once at
    /// `start_recording`.
    fn supports(&self, layout: &TrackLayout) -> Result<(), CaptureError>;

    /// Create the output file and declare its tracks.
    fn open(&self, path: &Path, layout: &TrackLayout) -> Result<Box<dyn ContainerWriter>, CaptureError>;
}

/// An open container being written.
///
/// Only ever driven from the muxer's serial queue.
pub trait ContainerWriter: Send {
    /// Start the muxing session anchored at `start`.
    fn begin_session(&mut self, start: MediaTime) -> Result<(), CaptureError>;

    /// Whether `track` can take another sample right now.
    fn is_ready_for_more_data(&self, track: TrackKind) -> bool;

    fn append_video(&mut self, frame: &SampleBuffer, pts: MediaTime) -> Result<(), CaptureError>;

    /// Append conformed PCM audio holding `frames` frames.
    fn append_audio(&mut self, pcm: &[u8], frames: usize, pts: MediaTime) -> Result<(), CaptureError>;

    /// Mark all inputs finished, flush and close the file.
    fn finish(&mut self) -> Result<(), CaptureError>;
}
