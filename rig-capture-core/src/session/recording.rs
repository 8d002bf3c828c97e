use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};

use crate::models::capture_models::{AudioSampleBuffer, CaptureFrame, DeviceInfo, Modality};
use crate::models::config::RecorderConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_id::RecordingId;
use crate::models::recording_result::{
    ArtifactReport, ArtifactStatus, ModalityStreamInfo, RecordingMetadata, RecordingResult,
};
use crate::models::state::{MuxerState, RecordingState};
use crate::processing::clock_bridge::ClockBridge;
use crate::session::notifier::Notifier;
use crate::session::synchronizer::{FrameOutcome, FrameSynchronizer, SynchronizerTargets};
use crate::storage::binary_file::BinaryFileStore;
use crate::storage::confidence_writer::ConfidenceWriter;
use crate::storage::container::InterleavedContainerFormat;
use crate::storage::depth_writer::DepthWriter;
use crate::storage::metadata;
use crate::storage::muxer::{MuxerReport, VideoAudioMuxer};
use crate::storage::pose_writer::PoseWriter;
use crate::traits::asset_library::AssetLibrary;
use crate::traits::capture_device::{CaptureDevice, CaptureSink};
use crate::traits::container_writer::{ContainerFormat, TrackLayout};
use crate::traits::modality_writer::{ModalityWriter, WriterReport};
use crate::traits::recording_delegate::RecordingDelegate;
use crate::traits::side_file_store::SideFileStore;

/// Progress updates are sent at most this often (in recorded seconds).
const TIME_UPDATE_INTERVAL_SECS: f64 = 0.25;

/// Facts about the recording in progress, fixed at `start_recording`.
struct ActiveRecording {
    id: RecordingId,
    folder: PathBuf,
    created_at: DateTime<Local>,
    config: RecorderConfiguration,
    device: DeviceInfo,
}

/// State guarded by the control lock. Only the control thread takes it.
struct Control {
    state: RecordingState,
    active: Option<ActiveRecording>,
}

/// Recording orchestrator.
///
/// Owns the frame synchronizer, every modality writer and the muxer, and
/// drives them through one recording at a time:
/// ```text
/// [CaptureDevice] ─ on_frame ─→ [FrameSynchronizer] ─┬→ [VideoAudioMuxer]  color
///                                                    ├→ [DepthWriter]       depth_NNNN
///                                                    ├→ [ConfidenceWriter]  confidence_NNNN
///                                                    └→ [PoseWriter]        intrinsic_/transform_NNNN
/// [CaptureDevice] ─ on_audio ─→ [ClockBridge] ─→ [VideoAudioMuxer]  audio
/// ```
///
/// The capture callbacks only enqueue. `is_recording` is the one flag they
/// read; `stop_recording` flips it behind a write gate so no tick is being
/// fanned out once finalization begins.
pub struct RecordingSession<D: CaptureDevice> {
    device: D,
    config: RecorderConfiguration,
    depth: Arc<DepthWriter>,
    confidence: Arc<ConfidenceWriter>,
    pose: Arc<PoseWriter>,
    muxer: Arc<VideoAudioMuxer>,
    side_file_extension: String,
    synchronizer: FrameSynchronizer,
    library: Option<Arc<dyn AssetLibrary>>,
    notifier: Notifier,
    control: Mutex<Control>,
    is_recording: AtomicBool,
    frame_gate: RwLock<()>,
    time_ticks: AtomicU64,
}

impl<D: CaptureDevice> RecordingSession<D> {
    /// Session writing `.bin` side files and a `.cap` container.
    pub fn new(device: D, config: RecorderConfiguration) -> Result<Self, CaptureError> {
        Self::with_backends(
            device,
            config,
            Arc::new(BinaryFileStore::new()),
            Arc::new(InterleavedContainerFormat),
        )
    }

    pub fn with_backends(
        device: D,
        config: RecorderConfiguration,
        store: Arc<dyn SideFileStore>,
        format: Arc<dyn ContainerFormat>,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        let side_file_extension = store.file_extension().to_string();
        let depth = Arc::new(DepthWriter::new(Arc::clone(&store), &config));
        let confidence = Arc::new(ConfidenceWriter::new(Arc::clone(&store), &config));
        let pose = Arc::new(PoseWriter::new(store, &config));
        let muxer = Arc::new(VideoAudioMuxer::new(format, &config));
        let synchronizer = FrameSynchronizer::new(
            SynchronizerTargets {
                depth: depth.clone(),
                confidence: confidence.clone(),
                pose: pose.clone(),
                muxer: muxer.clone(),
            },
            config.depth_format,
            config.record_confidence,
        );

        Ok(Self {
            device,
            notifier: Notifier::new(config.finish_timeout),
            config,
            depth,
            confidence,
            pose,
            muxer,
            side_file_extension,
            synchronizer,
            library: None,
            control: Mutex::new(Control {
                state: RecordingState::Idle,
                active: None,
            }),
            is_recording: AtomicBool::new(false),
            frame_gate: RwLock::new(()),
            time_ticks: AtomicU64::new(0),
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn RecordingDelegate>) {
        self.notifier.set_delegate(delegate);
    }

    /// Save each finished muxed file to `library`.
    pub fn set_asset_library(&mut self, library: Arc<dyn AssetLibrary>) {
        self.library = Some(library);
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn state(&self) -> RecordingState {
        self.control.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::Acquire)
    }

    /// Ticks recorded so far in the current (or last) recording.
    pub fn frame_count(&self) -> u64 {
        self.synchronizer.frame_count()
    }

    pub fn recording_id(&self) -> Option<RecordingId> {
        self.control.lock().active.as_ref().map(|a| a.id.clone())
    }

    /// Block until every delegate notification and completion raised so far
    /// has run.
    pub fn wait_for_callbacks(&self) {
        self.notifier.flush();
    }

    /// Start a new recording. Transitions: idle → preparing → recording.
    ///
    /// Configuration errors are returned synchronously and leave the session
    /// idle. A call while not idle is rejected with `InvalidState`.
    pub fn start_recording(&self) -> Result<RecordingId, CaptureError> {
        let mut control = self.control.lock();
        if !control.state.is_idle() {
            return Err(CaptureError::InvalidState(format!(
                "cannot start while {:?}",
                control.state
            )));
        }
        self.set_state(&mut control, RecordingState::Preparing);

        let active = match self.prepare_recording() {
            Ok(active) => active,
            Err(e) => {
                log::error!("Could not start recording: {}", e);
                self.set_state(&mut control, RecordingState::Idle);
                return Err(e);
            }
        };

        let id = active.id.clone();
        log::info!("Recording {} started in {}", id, active.folder.display());
        control.active = Some(active);
        self.time_ticks.store(0, Ordering::SeqCst);
        {
            let _gate = self.frame_gate.write();
            self.is_recording.store(true, Ordering::Release);
        }
        self.set_state(&mut control, RecordingState::Recording);
        Ok(id)
    }

    fn prepare_recording(&self) -> Result<ActiveRecording, CaptureError> {
        if !self.device.is_available() {
            return Err(CaptureError::DeviceUnavailable);
        }
        let format = self.device.active_format()?;
        if format.depth_format != self.config.depth_format {
            log::error!(
                "Device delivers {:?} depth, recording expects {:?}",
                format.depth_format,
                self.config.depth_format
            );
            return Err(CaptureError::FormatUnavailable);
        }
        if self.config.audio.is_some() && !self.device.microphone_available() {
            return Err(CaptureError::MicrophoneUnavailable);
        }

        let mut config = self.config.clone();
        config.apply_format(&format);
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        let layout = TrackLayout {
            video: config.video.clone(),
            audio: config.audio.clone(),
        };
        self.muxer.supports(&layout)?;

        let id = RecordingId::generate();
        let folder = config.output_directory.join(id.as_str());
        fs::create_dir_all(&folder)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("cannot create {}: {}", folder.display(), e)))?;

        let bridge = if config.audio.is_some() {
            ClockBridge::correlate(self.device.video_clock(), self.device.audio_clock())
        } else {
            ClockBridge::identity()
        };

        let output_directory = config.output_directory.clone();
        self.depth.prepare(&output_directory, &id)?;
        self.confidence.prepare(&output_directory, &id)?;
        self.pose.prepare(&output_directory, &id)?;
        self.muxer.prepare(&output_directory, &id, layout, bridge)?;
        self.synchronizer.reset(config.frame_timing, config.target_frame_rate);

        Ok(ActiveRecording {
            id,
            folder,
            created_at: Local::now(),
            config,
            device: self.device.device_info(),
        })
    }

    /// Stop the current recording and finalize every artifact.
    /// Transitions: recording → finishing → idle.
    ///
    /// Blocks until all writers have drained and the muxed file is closed,
    /// then delivers `completion` on the callback queue and returns the
    /// result. Returns `None` without side effects when no recording is in
    /// progress, including for a second call racing the first.
    pub fn stop_recording(
        &self,
        completion: impl FnOnce(RecordingResult) + Send + 'static,
    ) -> Option<RecordingResult> {
        let active = {
            let mut control = self.control.lock();
            if !control.state.is_recording() {
                log::debug!("stop_recording ignored in state {:?}", control.state);
                return None;
            }
            {
                // waits for a tick being fanned out right now
                let _gate = self.frame_gate.write();
                self.is_recording.store(false, Ordering::Release);
            }
            match control.active.take() {
                Some(active) => {
                    self.set_state(&mut control, RecordingState::Finishing);
                    active
                }
                None => {
                    self.set_state(&mut control, RecordingState::Idle);
                    return None;
                }
            }
        };

        let result = self.finalize(&active);

        self.set_state(&mut self.control.lock(), RecordingState::Idle);
        log::info!(
            "Recording {} finished: {} frames, {:.2}s",
            result.recording_id,
            result.frame_count,
            result.duration_secs
        );

        self.notifier.finished(result.clone());
        let delivered = result.clone();
        self.notifier.deliver(move || completion(delivered));
        Some(result)
    }

    /// Finish writers in a fixed order, then write metadata.
    fn finalize(&self, active: &ActiveRecording) -> RecordingResult {
        let depth = self.depth.finish();
        let confidence = self.confidence.finish();
        let pose = self.pose.finish();
        let muxer = self.muxer.finish_and_wait();

        let frame_count = self.synchronizer.frame_count();
        let duration_secs = self.synchronizer.duration_secs();

        let (library_asset_id, library_error) = self.save_to_library(&muxer);
        let checksum = muxer.path.as_ref().and_then(|path| match metadata::sha256_file(path) {
            Ok(checksum) => Some(checksum),
            Err(e) => {
                log::error!("Failed to checksum {}: {}", path.display(), e);
                None
            }
        });

        let streams = self.stream_infos(active, &depth, &confidence, &pose, &muxer);
        let mut artifacts = vec![ArtifactReport {
            modality: Modality::Color,
            path: muxer.path.clone(),
            status: muxer.status(),
        }];
        for report in [&depth, &confidence, &pose] {
            if report.modality == Modality::Confidence && !active.config.record_confidence {
                continue;
            }
            artifacts.push(ArtifactReport {
                modality: report.modality,
                path: report.folder.clone(),
                status: report.status(),
            });
        }

        // the metadata file counts itself
        let file_count = metadata::count_files(&active.folder).unwrap_or(0) + 1;
        let recording_metadata = RecordingMetadata {
            recording_id: active.id.clone(),
            created_at: active.created_at.to_rfc3339(),
            duration_secs,
            streams,
            file_count,
            device: Some(active.device.clone()),
        };
        let metadata_path = match metadata::write_metadata(&recording_metadata, &active.folder) {
            Ok(path) => Some(path),
            Err(e) => {
                log::error!("Failed to write metadata: {}", e);
                self.notifier.error(e);
                None
            }
        };

        let result = RecordingResult {
            recording_id: active.id.clone(),
            output_directory: active.folder.clone(),
            primary_output_path: muxer.path.clone(),
            metadata_path,
            metadata: recording_metadata,
            artifacts,
            checksum,
            frame_count,
            duration_secs,
            library_asset_id,
            library_error,
        };
        for artifact in result.failed_artifacts() {
            if let ArtifactStatus::Failed(e) = &artifact.status {
                log::error!("{} artifact failed: {}", artifact.modality.as_str(), e);
                self.notifier.error(e.clone());
            }
        }
        result
    }

    fn save_to_library(&self, muxer: &MuxerReport) -> (Option<String>, Option<CaptureError>) {
        let (Some(library), Some(path)) = (self.library.as_ref(), muxer.path.as_ref()) else {
            return (None, None);
        };
        match library.save_video(path) {
            Ok(asset_id) => {
                log::info!("Saved {} to library as {}", path.display(), asset_id);
                (Some(asset_id), None)
            }
            Err(e) => {
                log::warn!("Library save failed, keeping local recording: {}", e);
                self.notifier.error(e.clone());
                (None, Some(e))
            }
        }
    }

    /// One entry per stream that produced at least one artifact on disk.
    fn stream_infos(
        &self,
        active: &ActiveRecording,
        depth: &WriterReport,
        confidence: &WriterReport,
        pose: &WriterReport,
        muxer: &MuxerReport,
    ) -> Vec<ModalityStreamInfo> {
        let config = &active.config;
        let frequency = config.target_frame_rate;
        let intrinsics = pose.intrinsics.map(|k| k.iter().flatten().copied().collect::<Vec<f32>>());
        let container_ext = self.muxer.file_extension().to_string();
        let mut streams = Vec::new();

        if muxer.state == MuxerState::Finished && muxer.video_samples > 0 {
            streams.push(ModalityStreamInfo {
                id: "color_stream".into(),
                modality: Modality::Color,
                encoding: config.video.codec.as_str().into(),
                frequency,
                number_of_frames: muxer.video_samples,
                file_extension: container_ext.clone(),
                resolution: vec![config.video.height, config.video.width],
                intrinsics: intrinsics.clone(),
            });
        }
        for report in [depth, confidence] {
            if report.frames_written > 0 {
                streams.push(side_file_stream(report, frequency, &self.side_file_extension, None));
            }
        }
        if pose.frames_written > 0 {
            streams.push(side_file_stream(pose, frequency, &self.side_file_extension, intrinsics));
        }
        if let Some(audio) = config.audio.as_ref() {
            if muxer.state == MuxerState::Finished && muxer.audio_samples > 0 {
                streams.push(ModalityStreamInfo {
                    id: "audio_stream".into(),
                    modality: Modality::Audio,
                    encoding: audio.codec.as_str().into(),
                    frequency: audio.sample_rate as f64,
                    number_of_frames: muxer.audio_samples,
                    file_extension: container_ext,
                    resolution: Vec::new(),
                    intrinsics: None,
                });
            }
        }
        streams
    }

    fn set_state(&self, control: &mut Control, state: RecordingState) {
        if control.state == state {
            return;
        }
        log::info!("Recording state: {:?} → {:?}", control.state, state);
        control.state = state;
        self.notifier.state_changed(state);
    }

    fn report_time(&self, display_secs: f64) {
        let tick = (display_secs / TIME_UPDATE_INTERVAL_SECS) as u64 + 1;
        if self.time_ticks.fetch_max(tick, Ordering::Relaxed) < tick {
            self.notifier.recorded_time(display_secs);
        }
    }
}

fn side_file_stream(
    report: &WriterReport,
    frequency: f64,
    extension: &str,
    intrinsics: Option<Vec<f32>>,
) -> ModalityStreamInfo {
    ModalityStreamInfo {
        id: format!("{}_stream", report.modality.as_str()),
        modality: report.modality,
        encoding: report.encoding.clone(),
        frequency,
        number_of_frames: report.frames_written,
        file_extension: extension.into(),
        resolution: report.resolution.clone(),
        intrinsics,
    }
}

impl<D: CaptureDevice> CaptureSink for RecordingSession<D> {
    fn on_frame(&self, frame: CaptureFrame) {
        // a stop in progress holds the gate; the tick is simply not recorded
        let Some(_gate) = self.frame_gate.try_read() else {
            return;
        };
        if !self.is_recording.load(Ordering::Acquire) {
            return;
        }
        if let FrameOutcome::Recorded(stamp) = self.synchronizer.on_frame(frame) {
            self.report_time(stamp.display_secs);
        }
    }

    fn on_audio(&self, buffer: AudioSampleBuffer) {
        let Some(_gate) = self.frame_gate.try_read() else {
            return;
        };
        if !self.is_recording.load(Ordering::Acquire) {
            return;
        }
        self.muxer.append_audio(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::models::capture_models::CaptureFormat;
    use crate::models::config::{AudioTrackSettings, VideoCodec};
    use crate::models::media_time::MediaTime;
    use crate::models::sample_buffer::PixelFormat;
    use crate::storage::container::read_container_summary;
    use crate::testing::{
        audio_buffer, sample_frame, AcceptingLibrary, DatStore, DenyingLibrary, FailingStore, MockDevice,
        RecordingDelegateSpy, TICK_NANOS,
    };

    fn config(dir: &std::path::Path) -> RecorderConfiguration {
        RecorderConfiguration {
            output_directory: dir.to_path_buf(),
            audio: None,
            finish_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn session(dir: &std::path::Path) -> RecordingSession<MockDevice> {
        RecordingSession::new(MockDevice::default(), config(dir)).unwrap()
    }

    fn record(session: &RecordingSession<MockDevice>, ticks: u64) {
        for i in 0..ticks {
            session.on_frame(sample_frame(i));
        }
    }

    #[test]
    fn records_every_modality() {
        let dir = tempfile::tempdir().unwrap();
        let spy = Arc::new(RecordingDelegateSpy::default());
        let mut session = session(dir.path());
        session.set_delegate(spy.clone());

        let id = session.start_recording().unwrap();
        assert!(session.is_recording());
        record(&session, 50);
        let result = session.stop_recording(|_| {}).unwrap();
        session.wait_for_callbacks();

        assert_eq!(result.recording_id, id);
        assert_eq!(result.frame_count, 50);
        assert!((result.duration_secs - 50.0 / 30.0).abs() < 1e-3);
        assert!(result.is_complete());

        let folder = dir.path().join(id.as_str());
        assert_eq!(result.output_directory, folder);
        let names = BinaryFileStore::new().list(&folder).unwrap();
        for prefix in ["depth_", "confidence_", "intrinsic_", "transform_"] {
            assert_eq!(names.iter().filter(|n| n.starts_with(prefix)).count(), 50, "{}", prefix);
        }
        assert!(names.contains(&"depth_0000.bin".to_string()));
        assert!(names.contains(&"depth_0049.bin".to_string()));

        let container = result.primary_output_path.clone().unwrap();
        assert_eq!(container, folder.join(format!("{}.cap", id)));
        let summary = read_container_summary(&container).unwrap();
        assert!(summary.finalized);
        assert_eq!(summary.video_pts.len(), 50);
        assert_eq!(result.checksum, Some(metadata::sha256_file(&container).unwrap()));

        let stored = metadata::read_metadata(result.metadata_path.as_ref().unwrap()).unwrap();
        assert_eq!(stored, result.metadata);
        assert_eq!(stored.file_count, 4 * 50 + 2);
        for modality in [Modality::Color, Modality::Depth, Modality::Confidence, Modality::Pose] {
            assert_eq!(stored.stream(modality).unwrap().number_of_frames, 50, "{:?}", modality);
        }
        assert!(stored.stream(Modality::Audio).is_none());
        let depth = stored.stream(Modality::Depth).unwrap();
        assert_eq!(depth.resolution, vec![3, 4]);
        assert_eq!(depth.encoding, "float32_le");
        assert_eq!(stored.stream(Modality::Color).unwrap().file_extension, "cap");
        assert_eq!(stored.stream(Modality::Pose).unwrap().intrinsics.as_ref().unwrap().len(), 9);
        assert_eq!(stored.device, Some(MockDevice::default().device_info()));

        assert_eq!(
            spy.states(),
            vec![
                RecordingState::Preparing,
                RecordingState::Recording,
                RecordingState::Finishing,
                RecordingState::Idle
            ]
        );
        assert!(!spy.times().is_empty());
        assert_eq!(spy.finished().len(), 1);
        assert!(spy.errors().is_empty());
    }

    #[test]
    fn failed_depth_write_skips_only_that_frame() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FailingStore::new(BinaryFileStore::new(), &["depth_0007"]));
        let session = RecordingSession::with_backends(
            MockDevice::default(),
            config(dir.path()),
            store,
            Arc::new(InterleavedContainerFormat),
        )
        .unwrap();

        session.start_recording().unwrap();
        record(&session, 50);
        let (tx, rx) = crossbeam_channel::bounded(1);
        session.stop_recording(move |result| tx.send(result).unwrap());
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let metadata = &result.metadata;
        assert_eq!(metadata.stream(Modality::Depth).unwrap().number_of_frames, 49);
        assert_eq!(metadata.stream(Modality::Pose).unwrap().number_of_frames, 50);
        assert_eq!(metadata.stream(Modality::Color).unwrap().number_of_frames, 50);
        assert_eq!(
            result.artifact(Modality::Depth).unwrap().status,
            ArtifactStatus::Partial { frames_failed: 1 }
        );
        assert!(!result.output_directory.join("depth_0007.bin").exists());
        assert!(result.output_directory.join("depth_0008.bin").exists());
    }

    #[test]
    fn side_file_streams_report_store_extension() {
        let dir = tempfile::tempdir().unwrap();
        let session = RecordingSession::with_backends(
            MockDevice::default(),
            config(dir.path()),
            Arc::new(DatStore),
            Arc::new(InterleavedContainerFormat),
        )
        .unwrap();

        session.start_recording().unwrap();
        record(&session, 3);
        let result = session.stop_recording(|_| {}).unwrap();

        for modality in [Modality::Depth, Modality::Confidence, Modality::Pose] {
            assert_eq!(result.metadata.stream(modality).unwrap().file_extension, "dat", "{:?}", modality);
        }
        assert_eq!(result.metadata.stream(Modality::Color).unwrap().file_extension, "cap");
        assert!(result.output_directory.join("depth_0002.dat").exists());
        assert!(result.output_directory.join("transform_0000.dat").exists());
        assert!(!result.output_directory.join("depth_0000.bin").exists());
    }

    #[test]
    fn stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        assert!(session.stop_recording(|_| {}).is_none());

        session.start_recording().unwrap();
        record(&session, 3);
        assert!(session.stop_recording(|_| {}).is_some());
        assert!(session.stop_recording(|_| panic!("second completion")).is_none());
        assert_eq!(session.state(), RecordingState::Idle);
        session.wait_for_callbacks();
    }

    #[test]
    fn concurrent_stops_finalize_once() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        session.start_recording().unwrap();
        record(&session, 5);

        let results: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| s.spawn(|| session.stop_recording(|_| {}).is_some()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results.iter().filter(|stopped| **stopped).count(), 1);
        assert_eq!(session.state(), RecordingState::Idle);
    }

    #[test]
    fn second_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        session.start_recording().unwrap();
        assert!(matches!(session.start_recording(), Err(CaptureError::InvalidState(_))));
        assert!(session.is_recording());
        session.stop_recording(|_| {});
    }

    #[test]
    fn configuration_errors_leave_session_idle() {
        let dir = tempfile::tempdir().unwrap();

        let device = MockDevice {
            available: false,
            ..Default::default()
        };
        let session = RecordingSession::new(device, config(dir.path())).unwrap();
        assert_eq!(session.start_recording(), Err(CaptureError::DeviceUnavailable));
        assert_eq!(session.state(), RecordingState::Idle);

        let device = MockDevice {
            microphone: false,
            ..Default::default()
        };
        let with_audio = RecorderConfiguration {
            audio: Some(AudioTrackSettings::default()),
            ..config(dir.path())
        };
        let session = RecordingSession::new(device, with_audio).unwrap();
        assert_eq!(session.start_recording(), Err(CaptureError::MicrophoneUnavailable));

        let device = MockDevice {
            format: CaptureFormat {
                depth_format: PixelFormat::DepthFloat16,
                ..MockDevice::default().format
            },
            ..Default::default()
        };
        let session = RecordingSession::new(device, config(dir.path())).unwrap();
        assert_eq!(session.start_recording(), Err(CaptureError::FormatUnavailable));

        let mut hevc = config(dir.path());
        hevc.video.codec = VideoCodec::Hevc;
        let session = RecordingSession::new(MockDevice::default(), hevc).unwrap();
        assert!(matches!(session.start_recording(), Err(CaptureError::ConfigurationFailed(_))));
        assert!(!session.is_recording());

        let invalid = RecorderConfiguration {
            target_frame_rate: -1.0,
            ..config(dir.path())
        };
        assert!(matches!(
            RecordingSession::new(MockDevice::default(), invalid),
            Err(CaptureError::ConfigurationFailed(_))
        ));

        // nothing was created for the failed starts
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn ticks_outside_a_recording_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        session.on_frame(sample_frame(0));
        assert_eq!(session.frame_count(), 0);

        session.start_recording().unwrap();
        session.on_frame(sample_frame(1));
        let mut no_depth = sample_frame(2);
        no_depth.depth = None;
        session.on_frame(no_depth);
        session.on_frame(sample_frame(3));
        let result = session.stop_recording(|_| {}).unwrap();

        session.on_frame(sample_frame(4));
        assert_eq!(session.frame_count(), 2);
        assert_eq!(result.frame_count, 2);
        let names = BinaryFileStore::new().list(&result.output_directory).unwrap();
        let depth: Vec<_> = names.iter().filter(|n| n.starts_with("depth_")).collect();
        assert_eq!(depth, vec!["depth_0000.bin", "depth_0001.bin"]);
    }

    #[test]
    fn stop_without_ticks_writes_metadata_only() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        session.start_recording().unwrap();
        let result = session.stop_recording(|_| {}).unwrap();

        assert_eq!(result.frame_count, 0);
        assert_eq!(result.primary_output_path, None);
        assert_eq!(result.checksum, None);
        assert!(result.metadata.streams.is_empty());
        assert_eq!(result.metadata.file_count, 1);
        assert_eq!(result.artifact(Modality::Color).unwrap().status, ArtifactStatus::Empty);
    }

    #[test]
    fn audio_is_muxed_with_video() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfiguration {
            audio: Some(AudioTrackSettings::default()),
            ..config(dir.path())
        };
        let session = RecordingSession::new(MockDevice::default(), config).unwrap();
        session.start_recording().unwrap();

        for i in 0..10 {
            session.on_frame(sample_frame(i));
            session.on_audio(audio_buffer(MediaTime::from_nanos(i as i64 * TICK_NANOS + 1_000), 1470));
        }
        let result = session.stop_recording(|_| {}).unwrap();

        let audio = result.metadata.stream(Modality::Audio).unwrap();
        assert_eq!(audio.number_of_frames, 10);
        assert_eq!(audio.encoding, "pcm16_le");
        assert_eq!(audio.frequency, 44100.0);
        let summary = read_container_summary(result.primary_output_path.as_ref().unwrap()).unwrap();
        assert_eq!(summary.audio_pts.len(), 10);
        assert_eq!(summary.video_pts.len(), 10);
    }

    #[test]
    fn denied_library_keeps_local_recording() {
        let dir = tempfile::tempdir().unwrap();
        let spy = Arc::new(RecordingDelegateSpy::default());
        let mut session = session(dir.path());
        session.set_delegate(spy.clone());
        session.set_asset_library(Arc::new(DenyingLibrary));

        session.start_recording().unwrap();
        record(&session, 3);
        let result = session.stop_recording(|_| {}).unwrap();
        session.wait_for_callbacks();

        assert_eq!(result.library_error, Some(CaptureError::LibraryAccessDenied));
        assert_eq!(result.library_asset_id, None);
        assert!(result.primary_output_path.unwrap().exists());
        assert_eq!(spy.errors(), vec![CaptureError::LibraryAccessDenied]);
    }

    #[test]
    fn saved_to_library() {
        let dir = tempfile::tempdir().unwrap();
        let library = Arc::new(AcceptingLibrary::default());
        let mut session = session(dir.path());
        session.set_asset_library(library.clone());

        session.start_recording().unwrap();
        record(&session, 2);
        let result = session.stop_recording(|_| {}).unwrap();
        assert_eq!(result.library_asset_id.as_deref(), Some("asset-1"));
        assert_eq!(library.saved(), vec![result.primary_output_path.unwrap()]);
    }

    #[test]
    fn sessions_can_record_again() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path());
        session.start_recording().unwrap();
        record(&session, 4);
        let first = session.stop_recording(|_| {}).unwrap();

        session.start_recording().unwrap();
        record(&session, 2);
        let second = session.stop_recording(|_| {}).unwrap();

        assert_ne!(first.recording_id, second.recording_id);
        assert_eq!(first.frame_count, 4);
        assert_eq!(second.frame_count, 2);
        let names = BinaryFileStore::new().list(&second.output_directory).unwrap();
        assert_eq!(names.iter().filter(|n| n.starts_with("transform_")).count(), 2);
    }
}
