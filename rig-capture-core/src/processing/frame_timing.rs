use crate::models::config::FrameTiming;
use crate::models::media_time::MediaTime;

/// Times assigned to one recorded tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStamp {
    /// Zero-based index of the tick within the recording.
    pub index: u64,
    /// Seconds since the first recorded tick; used for progress reporting.
    pub display_secs: f64,
    /// Presentation time for the muxed video sample, on the video clock.
    pub content_time: MediaTime,
}

/// Converts capture timestamps into display and content times.
///
/// The first tick stamped after `reset` becomes the anchor. With
/// [`FrameTiming::Synthesized`] the content time of tick `i` is
/// `anchor + (i + 1) / fps`, one frame ahead of the anchor so the muxed
/// track starts strictly after the session start.
#[derive(Debug, Clone)]
pub struct FrameClock {
    timing: FrameTiming,
    frame_rate: f64,
    anchor: Option<MediaTime>,
}

impl FrameClock {
    pub fn new(timing: FrameTiming, frame_rate: f64) -> Self {
        Self {
            timing,
            frame_rate,
            anchor: None,
        }
    }

    pub fn reset(&mut self) {
        self.anchor = None;
    }

    pub fn anchor(&self) -> Option<MediaTime> {
        self.anchor
    }

    pub fn stamp(&mut self, timestamp: MediaTime, index: u64) -> FrameStamp {
        let anchor = *self.anchor.get_or_insert(timestamp);
        let content_time = match self.timing {
            FrameTiming::Native => timestamp,
            FrameTiming::Synthesized => {
                let nanos = ((index + 1) as f64 * 1_000_000_000.0 / self.frame_rate).round() as i64;
                anchor.offset_by(nanos)
            }
        };
        FrameStamp {
            index,
            display_secs: timestamp.nanos_since(anchor) as f64 / 1_000_000_000.0,
            content_time,
        }
    }
}
