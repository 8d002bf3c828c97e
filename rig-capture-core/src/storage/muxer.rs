use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use parking_lot::{Mutex, RwLock};

use crate::models::capture_models::AudioSampleBuffer;
use crate::models::config::{ReadinessRetry, RecorderConfiguration};
use crate::models::error::CaptureError;
use crate::models::media_time::MediaTime;
use crate::models::recording_id::RecordingId;
use crate::models::recording_result::ArtifactStatus;
use crate::models::sample_buffer::SampleBuffer;
use crate::models::state::MuxerState;
use crate::processing::audio_conform::AudioConformer;
use crate::processing::clock_bridge::{ClockBridge, ClockId};
use crate::storage::serial_queue::SerialQueue;
use crate::traits::container_writer::{ContainerFormat, ContainerWriter, TrackKind, TrackLayout};

/// Outcome of a muxer `finish`.
#[derive(Debug, Clone, PartialEq)]
pub struct MuxerReport {
    pub state: MuxerState,
    /// Set once the container is finalized.
    pub path: Option<PathBuf>,
    pub session_start: Option<MediaTime>,
    pub video_samples: u64,
    pub audio_samples: u64,
    pub video_dropped: u64,
    pub audio_dropped: u64,
    pub error: Option<CaptureError>,
}

impl MuxerReport {
    fn timed_out() -> Self {
        Self {
            state: MuxerState::Failed,
            path: None,
            session_start: None,
            video_samples: 0,
            audio_samples: 0,
            video_dropped: 0,
            audio_dropped: 0,
            error: Some(CaptureError::Timeout),
        }
    }

    pub fn status(&self) -> ArtifactStatus {
        match self.state {
            MuxerState::Unopened | MuxerState::Writing => ArtifactStatus::Empty,
            MuxerState::Failed => {
                ArtifactStatus::Failed(self.error.clone().unwrap_or(CaptureError::WriterState("failed".into())))
            }
            MuxerState::Finished if self.video_dropped > 0 => ArtifactStatus::Partial {
                frames_failed: self.video_dropped,
            },
            MuxerState::Finished => ArtifactStatus::Complete,
        }
    }
}

/// Samples turned away because the muxer queue was full. Counted outside
/// the inner lock so the capture thread never waits on container I/O.
#[derive(Debug, Default)]
struct RejectedSamples {
    video: AtomicU64,
    audio: AtomicU64,
}

impl RejectedSamples {
    fn reset(&self) {
        self.video.store(0, Ordering::Relaxed);
        self.audio.store(0, Ordering::Relaxed);
    }

    fn apply(&self, report: &mut MuxerReport) {
        report.video_dropped += self.video.load(Ordering::Relaxed);
        report.audio_dropped += self.audio.load(Ordering::Relaxed);
    }
}

/// Clock routing for audio, fixed for one recording.
#[derive(Debug, Clone, Copy)]
struct AudioRoute {
    bridge: ClockBridge,
    enabled: bool,
}

struct MuxerInner {
    state: MuxerState,
    layout: Option<TrackLayout>,
    path: Option<PathBuf>,
    writer: Option<Box<dyn ContainerWriter>>,
    conformer: Option<AudioConformer>,
    session_start: Option<MediaTime>,
    video_samples: u64,
    audio_samples: u64,
    video_dropped: u64,
    audio_dropped: u64,
    last_error: Option<CaptureError>,
}

impl MuxerInner {
    fn new() -> Self {
        Self {
            state: MuxerState::Unopened,
            layout: None,
            path: None,
            writer: None,
            conformer: None,
            session_start: None,
            video_samples: 0,
            audio_samples: 0,
            video_dropped: 0,
            audio_dropped: 0,
            last_error: None,
        }
    }

    /// Open the container on the first sample. Returns whether samples can
    /// be appended.
    fn ensure_writing(&mut self, format: &dyn ContainerFormat, start: MediaTime) -> bool {
        match self.state {
            MuxerState::Writing => true,
            MuxerState::Finished | MuxerState::Failed => false,
            MuxerState::Unopened => match self.open(format, start) {
                Ok(()) => {
                    log::info!("Muxer writing, session start {} ns", start.as_nanos());
                    true
                }
                Err(e) => {
                    self.fail(e);
                    false
                }
            },
        }
    }

    fn open(&mut self, format: &dyn ContainerFormat, start: MediaTime) -> Result<(), CaptureError> {
        let (Some(path), Some(layout)) = (self.path.as_ref(), self.layout.as_ref()) else {
            return Err(CaptureError::WriterState("muxer not prepared".into()));
        };
        let mut writer = format.open(path, layout)?;
        writer.begin_session(start)?;
        self.writer = Some(writer);
        self.session_start = Some(start);
        self.state = MuxerState::Writing;
        Ok(())
    }

    fn fail(&mut self, error: CaptureError) {
        log::error!("Muxer failed: {}", error);
        self.state = MuxerState::Failed;
        self.writer = None;
        self.last_error = Some(error);
    }

    fn append_video(&mut self, format: &dyn ContainerFormat, frame: &SampleBuffer, pts: MediaTime, retry: ReadinessRetry) {
        if !self.ensure_writing(format, pts) {
            self.video_dropped += 1;
            return;
        }
        if self.session_start.is_some_and(|start| pts < start) {
            log::debug!("Dropping video stamped before session start");
            self.video_dropped += 1;
            return;
        }
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if !wait_until_ready(writer.as_ref(), TrackKind::Video, retry) {
            log::warn!("Video track not ready, dropping frame at {} ns", pts.as_nanos());
            self.video_dropped += 1;
            return;
        }
        match writer.append_video(frame, pts) {
            Ok(()) => self.video_samples += 1,
            Err(e) => self.append_failed(TrackKind::Video, e),
        }
    }

    fn append_audio(&mut self, format: &dyn ContainerFormat, buffer: &AudioSampleBuffer, pts: MediaTime, retry: ReadinessRetry) {
        if !self.ensure_writing(format, pts) {
            self.audio_dropped += 1;
            return;
        }
        if self.session_start.is_some_and(|start| pts < start) {
            log::debug!("Dropping audio stamped before session start");
            self.audio_dropped += 1;
            return;
        }
        let (Some(writer), Some(conformer)) = (self.writer.as_mut(), self.conformer.as_ref()) else {
            self.audio_dropped += 1;
            return;
        };
        if !wait_until_ready(writer.as_ref(), TrackKind::Audio, retry) {
            log::warn!("Audio track not ready, dropping buffer at {} ns", pts.as_nanos());
            self.audio_dropped += 1;
            return;
        }
        let (pcm, frames) = conformer.conform(buffer);
        match writer.append_audio(&pcm, frames, pts) {
            Ok(()) => self.audio_samples += 1,
            Err(e) => self.append_failed(TrackKind::Audio, e),
        }
    }

    fn append_failed(&mut self, track: TrackKind, error: CaptureError) {
        if matches!(error, CaptureError::WriterState(_)) {
            self.fail(error);
            return;
        }
        log::error!("Failed to append {:?} sample: {}", track, error);
        match track {
            TrackKind::Video => self.video_dropped += 1,
            TrackKind::Audio => self.audio_dropped += 1,
        }
        self.last_error = Some(error);
    }

    fn finalize(&mut self) -> MuxerReport {
        match self.state {
            MuxerState::Unopened => log::info!("Muxer never received a sample, nothing to finalize"),
            MuxerState::Writing => {
                let result = match self.writer.as_mut() {
                    Some(writer) => writer.finish(),
                    None => Err(CaptureError::WriterState("writer missing".into())),
                };
                match result {
                    Ok(()) => {
                        self.writer = None;
                        self.state = MuxerState::Finished;
                        log::info!(
                            "Muxer finished: {} video, {} audio samples",
                            self.video_samples,
                            self.audio_samples
                        );
                    }
                    Err(e) => self.fail(e),
                }
            }
            MuxerState::Finished | MuxerState::Failed => {}
        }
        self.report()
    }

    fn report(&self) -> MuxerReport {
        MuxerReport {
            state: self.state,
            path: (self.state == MuxerState::Finished).then(|| self.path.clone()).flatten(),
            session_start: self.session_start,
            video_samples: self.video_samples,
            audio_samples: self.audio_samples,
            video_dropped: self.video_dropped,
            audio_dropped: self.audio_dropped,
            error: self.last_error.clone(),
        }
    }
}

/// Bounded wait for track readiness: `attempts` retries `interval` apart.
fn wait_until_ready(writer: &dyn ContainerWriter, track: TrackKind, retry: ReadinessRetry) -> bool {
    for attempt in 0..=retry.attempts {
        if writer.is_ready_for_more_data(track) {
            return true;
        }
        if attempt < retry.attempts {
            thread::sleep(retry.interval);
        }
    }
    false
}

/// Interleaves color frames and clock-corrected audio into one container.
///
/// State machine:
/// ```text
/// unopened → writing → finished
///     ↘         ↓
///          failed
/// ```
/// The first accepted sample, video or audio, opens the container and
/// anchors the session at its presentation time. Every append runs on the
/// muxer's serial queue; callers never block.
pub struct VideoAudioMuxer {
    format: Arc<dyn ContainerFormat>,
    queue: SerialQueue,
    accepting: RwLock<bool>,
    route: RwLock<AudioRoute>,
    retry: ReadinessRetry,
    finish_timeout: Duration,
    inner: Arc<Mutex<MuxerInner>>,
    rejected: Arc<RejectedSamples>,
}

impl VideoAudioMuxer {
    pub fn new(format: Arc<dyn ContainerFormat>, config: &RecorderConfiguration) -> Self {
        Self {
            format,
            queue: SerialQueue::new("muxer", config.writer_queue_capacity),
            accepting: RwLock::new(false),
            route: RwLock::new(AudioRoute {
                bridge: ClockBridge::identity(),
                enabled: false,
            }),
            retry: config.readiness_retry,
            finish_timeout: config.finish_timeout,
            inner: Arc::new(Mutex::new(MuxerInner::new())),
            rejected: Arc::new(RejectedSamples::default()),
        }
    }

    pub fn file_extension(&self) -> &str {
        self.format.file_extension()
    }

    /// Check the track layout against the container format.
    pub fn supports(&self, layout: &TrackLayout) -> Result<(), CaptureError> {
        self.format.supports(layout)
    }

    /// Reset to `Unopened` for a new recording. The file itself is only
    /// created when the first sample arrives.
    pub fn prepare(
        &self,
        output_directory: &Path,
        recording_id: &RecordingId,
        layout: TrackLayout,
        bridge: ClockBridge,
    ) -> Result<(), CaptureError> {
        self.format.supports(&layout)?;
        let mut accepting = self.accepting.write();
        if !self.queue.drain_timeout(self.finish_timeout) {
            return Err(CaptureError::Timeout);
        }

        let path = output_directory
            .join(recording_id.as_str())
            .join(format!("{}.{}", recording_id, self.format.file_extension()));

        let mut inner = self.inner.lock();
        *inner = MuxerInner::new();
        self.rejected.reset();
        inner.conformer = layout
            .audio
            .as_ref()
            .map(|audio| AudioConformer::new(audio.sample_rate as f64, audio.channels));
        *self.route.write() = AudioRoute {
            bridge,
            enabled: layout.audio.is_some(),
        };
        inner.layout = Some(layout);
        inner.path = Some(path);
        *accepting = true;
        Ok(())
    }

    /// Enqueue a color frame with its content time on the video clock.
    pub fn append_video(&self, frame: SampleBuffer, pts: MediaTime) -> bool {
        let accepting = self.accepting.read();
        if !*accepting {
            return false;
        }
        let inner = Arc::clone(&self.inner);
        let format = Arc::clone(&self.format);
        let retry = self.retry;
        self.dispatch(TrackKind::Video, move || {
            inner.lock().append_video(format.as_ref(), &frame, pts, retry);
        })
    }

    /// Enqueue an audio buffer stamped on the audio clock. Its presentation
    /// time is moved onto the video clock before it is queued.
    pub fn append_audio(&self, buffer: AudioSampleBuffer) -> bool {
        let accepting = self.accepting.read();
        if !*accepting {
            return false;
        }
        let route = *self.route.read();
        if !route.enabled {
            return false;
        }
        if let Err(e) = buffer.validate() {
            log::warn!("Dropping audio buffer: {}", e);
            return false;
        }
        let pts = route.bridge.remap(buffer.presentation_time, ClockId::Audio, ClockId::Video);
        let inner = Arc::clone(&self.inner);
        let format = Arc::clone(&self.format);
        let retry = self.retry;
        self.dispatch(TrackKind::Audio, move || {
            inner.lock().append_audio(format.as_ref(), &buffer, pts, retry);
        })
    }

    fn dispatch(&self, track: TrackKind, job: impl FnOnce() + Send + 'static) -> bool {
        match self.queue.dispatch(job) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Dropping {:?} sample: {}", track, e);
                let counter = match track {
                    TrackKind::Video => &self.rejected.video,
                    TrackKind::Audio => &self.rejected.audio,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Stop accepting samples and finalize the container on the muxer
    /// queue, after every sample queued before this call. `completion`
    /// runs on the muxer queue.
    pub fn finish(&self, completion: impl FnOnce(MuxerReport) + Send + 'static) {
        {
            let mut accepting = self.accepting.write();
            *accepting = false;
        }
        let inner = Arc::clone(&self.inner);
        let rejected = Arc::clone(&self.rejected);
        let completion = Arc::new(Mutex::new(Some(completion)));
        let job_completion = Arc::clone(&completion);
        let queued = self.queue.dispatch_timeout(
            move || {
                let mut report = inner.lock().finalize();
                rejected.apply(&mut report);
                if let Some(completion) = job_completion.lock().take() {
                    completion(report);
                }
            },
            self.finish_timeout,
        );
        if let Err(e) = queued {
            log::error!("Could not queue muxer finish: {}", e);
            if let Some(completion) = completion.lock().take() {
                completion(MuxerReport::timed_out());
            }
        }
    }

    /// [`finish`](Self::finish) and block until the container is closed or
    /// the finish timeout elapses.
    pub fn finish_and_wait(&self) -> MuxerReport {
        let (tx, rx) = bounded(1);
        self.finish(move |report| {
            let _ = tx.send(report);
        });
        rx.recv_timeout(self.finish_timeout).unwrap_or_else(|_| {
            log::error!("Muxer did not finish within {:?}", self.finish_timeout);
            MuxerReport::timed_out()
        })
    }

    pub fn state(&self) -> MuxerState {
        self.inner.lock().state
    }

    pub fn report(&self) -> MuxerReport {
        let mut report = self.inner.lock().report();
        self.rejected.apply(&mut report);
        report
    }
}
