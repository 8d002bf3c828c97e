//! Correlation between independently started capture clocks.
//!
//! Color and depth are stamped on the video capture session's clock while
//! audio arrives from a separately started session with its own origin. The
//! bridge measures the offset between the two once, at recording start, and
//! applies that fixed offset to every audio presentation time. Keeping the
//! offset fixed makes `remap` a pure, strictly monotonic function.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::models::media_time::MediaTime;

/// A monotonic time source owned by one capture session.
pub trait ReferenceClock: Send + Sync {
    fn now(&self) -> MediaTime;
}

/// Process-wide monotonic host clock, the fallback when a session exposes no
/// synchronization clock of its own.
#[derive(Debug)]
pub struct HostClock {
    origin: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// The shared instance every fallback resolves to.
    pub fn shared() -> Arc<dyn ReferenceClock> {
        static SHARED: OnceLock<Arc<HostClock>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(HostClock::new())).clone()
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceClock for HostClock {
    fn now(&self) -> MediaTime {
        let nanos = i64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(i64::MAX);
        MediaTime::from_nanos(nanos)
    }
}

/// Clock domains a recording deals with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockId {
    /// The color/depth capture session; the muxed file's timeline.
    Video,
    /// The independently started audio capture session.
    Audio,
}

/// Fixed offset between the audio and video clock domains of one recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockBridge {
    audio_to_video_nanos: i64,
}

impl ClockBridge {
    /// Both domains share one clock.
    pub fn identity() -> Self {
        Self {
            audio_to_video_nanos: 0,
        }
    }

    /// Bridge with a known offset: `video_time = audio_time + offset`.
    pub fn with_offset(audio_to_video_nanos: i64) -> Self {
        Self { audio_to_video_nanos }
    }

    /// Resolve each session's clock (falling back to the shared host clock)
    /// and measure the offset between them.
    pub fn correlate(
        video_clock: Option<Arc<dyn ReferenceClock>>,
        audio_clock: Option<Arc<dyn ReferenceClock>>,
    ) -> Self {
        let video = video_clock.unwrap_or_else(HostClock::shared);
        let audio = audio_clock.unwrap_or_else(HostClock::shared);
        if Arc::ptr_eq(&video, &audio) {
            return Self::identity();
        }
        let bridge = Self::measure(video.as_ref(), audio.as_ref());
        log::info!(
            "Clock bridge: audio→video offset {} ns",
            bridge.audio_to_video_nanos
        );
        bridge
    }

    /// Sample video, audio, video and pair the audio reading with the
    /// midpoint of the two video readings.
    pub fn measure(video: &dyn ReferenceClock, audio: &dyn ReferenceClock) -> Self {
        let before = video.now();
        let audio_now = audio.now();
        let after = video.now();
        let midpoint = before.offset_by(after.nanos_since(before) / 2);
        Self {
            audio_to_video_nanos: midpoint.nanos_since(audio_now),
        }
    }

    /// Signed offset to add to a time on `from` to express it on `to`.
    pub fn offset_nanos(&self, from: ClockId, to: ClockId) -> i64 {
        match (from, to) {
            (ClockId::Audio, ClockId::Video) => self.audio_to_video_nanos,
            (ClockId::Video, ClockId::Audio) => self.audio_to_video_nanos.saturating_neg(),
            _ => 0,
        }
    }

    /// Express `timestamp`, taken on clock `from`, on clock `to`.
    ///
    /// The result saturates at the `i64` nanosecond limits, so times within
    /// the offset of `i64::MAX` (or `i64::MIN`) collapse onto the limit and
    /// only keep non-strict ordering there.
    pub fn remap(&self, timestamp: MediaTime, from: ClockId, to: ClockId) -> MediaTime {
        timestamp.offset_by(self.offset_nanos(from, to))
    }
}

impl Default for ClockBridge {
    fn default() -> Self {
        Self::identity()
    }
}
