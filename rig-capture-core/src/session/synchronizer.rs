use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::capture_models::{CameraPose, CaptureFrame};
use crate::models::config::FrameTiming;
use crate::models::error::CaptureError;
use crate::models::sample_buffer::{PixelFormat, SampleBuffer};
use crate::processing::frame_timing::{FrameClock, FrameStamp};
use crate::storage::muxer::VideoAudioMuxer;
use crate::traits::modality_writer::ModalityWriter;

/// Destinations the synchronizer fans a tick out to.
pub struct SynchronizerTargets {
    pub depth: Arc<dyn ModalityWriter<Sample = SampleBuffer>>,
    pub confidence: Arc<dyn ModalityWriter<Sample = SampleBuffer>>,
    pub pose: Arc<dyn ModalityWriter<Sample = CameraPose>>,
    pub muxer: Arc<VideoAudioMuxer>,
}

/// Why a tick was not recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    MissingDepth,
    DepthFormat(PixelFormat),
    Malformed(CaptureError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Recorded(FrameStamp),
    Dropped(DropReason),
}

struct SyncState {
    clock: FrameClock,
    first: Option<FrameStamp>,
    last: Option<FrameStamp>,
}

/// Splits synchronized ticks into per-modality samples.
///
/// A tick is recorded only when its depth is present, in the expected format
/// and every required buffer is well formed. A recorded tick takes the next
/// frame index, so dropped ticks never leave a gap in the index sequence. A
/// malformed confidence map is skipped on its own without dropping the tick.
pub struct FrameSynchronizer {
    targets: SynchronizerTargets,
    depth_format: PixelFormat,
    record_confidence: bool,
    frame_rate: Mutex<f64>,
    state: Mutex<SyncState>,
    frame_count: AtomicU64,
}

impl FrameSynchronizer {
    pub fn new(targets: SynchronizerTargets, depth_format: PixelFormat, record_confidence: bool) -> Self {
        Self {
            targets,
            depth_format,
            record_confidence,
            frame_rate: Mutex::new(30.0),
            state: Mutex::new(SyncState {
                clock: FrameClock::new(FrameTiming::Native, 30.0),
                first: None,
                last: None,
            }),
            frame_count: AtomicU64::new(0),
        }
    }

    /// Start counting from zero for a new recording.
    pub fn reset(&self, timing: FrameTiming, frame_rate: f64) {
        let mut state = self.state.lock();
        state.clock = FrameClock::new(timing, frame_rate);
        state.first = None;
        state.last = None;
        *self.frame_rate.lock() = frame_rate;
        self.frame_count.store(0, Ordering::SeqCst);
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::SeqCst)
    }

    /// Recorded duration: first to last tick plus one frame.
    pub fn duration_secs(&self) -> f64 {
        let state = self.state.lock();
        match (state.first, state.last) {
            (Some(first), Some(last)) => {
                let span = last.display_secs - first.display_secs;
                span + 1.0 / *self.frame_rate.lock()
            }
            _ => 0.0,
        }
    }

    pub fn on_frame(&self, frame: CaptureFrame) -> FrameOutcome {
        let CaptureFrame {
            timestamp,
            color,
            depth,
            confidence,
            pose,
        } = frame;

        let Some(depth) = depth else {
            log::warn!("Dropping tick at {} ns: no depth", timestamp.as_nanos());
            return FrameOutcome::Dropped(DropReason::MissingDepth);
        };
        if depth.pixel_format() != self.depth_format {
            log::warn!("Dropping tick: depth is {:?}", depth.pixel_format());
            return FrameOutcome::Dropped(DropReason::DepthFormat(depth.pixel_format()));
        }
        if let Err(e) = color.validate().and(depth.validate()).and(pose.validate()) {
            log::warn!("Dropping malformed tick: {}", e);
            return FrameOutcome::Dropped(DropReason::Malformed(e));
        }
        let confidence = confidence.filter(|_| self.record_confidence).and_then(|buffer| {
            let valid = buffer.pixel_format() == PixelFormat::ConfidenceUInt8 && buffer.validate().is_ok();
            if !valid {
                log::warn!("Skipping malformed confidence map");
            }
            valid.then_some(buffer)
        });

        // one tick at a time claims an index
        let mut state = self.state.lock();
        let index = self.frame_count.load(Ordering::SeqCst);
        let stamp = state.clock.stamp(timestamp, index);

        self.targets.muxer.append_video(color, stamp.content_time);
        self.targets.depth.update(depth, index);
        if let Some(confidence) = confidence {
            self.targets.confidence.update(confidence, index);
        }
        self.targets.pose.update(pose, index);

        state.first.get_or_insert(stamp);
        state.last = Some(stamp);
        self.frame_count.store(index + 1, Ordering::SeqCst);
        log::debug!("Recorded tick {} at {:.3}s", index, stamp.display_secs);
        FrameOutcome::Recorded(stamp)
    }
}
