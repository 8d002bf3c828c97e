//! Fixtures and test doubles shared by the unit tests.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::capture_models::{
    AudioSampleBuffer, CameraPose, CaptureFormat, CaptureFrame, DeviceInfo, Matrix3, PoseTransform,
};
use crate::models::error::CaptureError;
use crate::models::media_time::MediaTime;
use crate::models::recording_result::RecordingResult;
use crate::models::sample_buffer::{PixelFormat, SampleBuffer};
use crate::models::state::RecordingState;
use crate::processing::clock_bridge::ReferenceClock;
use crate::storage::binary_file::BinaryFileStore;
use crate::traits::asset_library::AssetLibrary;
use crate::traits::capture_device::CaptureDevice;
use crate::traits::container_writer::{ContainerFormat, ContainerWriter, TrackKind, TrackLayout};
use crate::traits::recording_delegate::RecordingDelegate;
use crate::traits::side_file_store::SideFileStore;

/// Nanoseconds between ticks at 30 fps.
pub const TICK_NANOS: i64 = 33_333_333;

pub const INTRINSICS: Matrix3 = [[500.0, 0.0, 320.0], [0.0, 500.0, 240.0], [0.0, 0.0, 1.0]];

/// Luma-only color frame.
pub fn color_buffer(width: u32, height: u32) -> SampleBuffer {
    let bytes = (0..width * height).map(|i| (i % 251) as u8).collect();
    SampleBuffer::packed(width, height, PixelFormat::ColorYCbCr8, bytes).unwrap()
}

/// Float32 depth map filled with `value` meters.
pub fn depth_buffer(width: u32, height: u32, value: f32) -> SampleBuffer {
    let bytes = (0..width * height).flat_map(|_| value.to_le_bytes()).collect();
    SampleBuffer::packed(width, height, PixelFormat::DepthFloat32, bytes).unwrap()
}

pub fn confidence_buffer(width: u32, height: u32) -> SampleBuffer {
    let bytes = (0..width * height).map(|i| (i % 3) as u8).collect();
    SampleBuffer::packed(width, height, PixelFormat::ConfidenceUInt8, bytes).unwrap()
}

pub fn sample_pose(timestamp: MediaTime) -> CameraPose {
    CameraPose::new(timestamp, INTRINSICS, PoseTransform::identity())
}

/// 44.1 kHz stereo buffer of a quiet ramp.
pub fn audio_buffer(presentation_time: MediaTime, frames: usize) -> AudioSampleBuffer {
    AudioSampleBuffer {
        presentation_time,
        sample_rate: 44100.0,
        channels: 2,
        samples: (0..frames * 2).map(|i| (i % 100) as f32 / 1000.0).collect(),
    }
}

/// Complete tick `index` at 30 fps: 8x6 color, 4x3 depth and confidence.
pub fn sample_frame(index: u64) -> CaptureFrame {
    let timestamp = MediaTime::from_nanos(index as i64 * TICK_NANOS);
    CaptureFrame {
        timestamp,
        color: color_buffer(8, 6),
        depth: Some(depth_buffer(4, 3, 1.5)),
        confidence: Some(confidence_buffer(4, 3)),
        pose: sample_pose(timestamp),
    }
}

/// Store that fails writes for the listed file names.
pub struct FailingStore {
    inner: BinaryFileStore,
    failing: HashSet<String>,
}

impl FailingStore {
    pub fn new(inner: BinaryFileStore, names: &[&str]) -> Self {
        Self {
            inner,
            failing: names.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl SideFileStore for FailingStore {
    fn file_extension(&self) -> &str {
        self.inner.file_extension()
    }

    fn write(&self, folder: &Path, name: &str, data: &[u8]) -> Result<PathBuf, CaptureError> {
        if self.failing.contains(name) {
            return Err(CaptureError::StorageError(format!("injected failure for {}", name)));
        }
        self.inner.write(folder, name, data)
    }

    fn remove(&self, folder: &Path, name: &str) -> Result<(), CaptureError> {
        self.inner.remove(folder, name)
    }
}

/// Store that writes `.dat` files.
#[derive(Default)]
pub struct DatStore;

impl SideFileStore for DatStore {
    fn file_extension(&self) -> &str {
        "dat"
    }

    fn write(&self, folder: &Path, name: &str, data: &[u8]) -> Result<PathBuf, CaptureError> {
        fs::create_dir_all(folder)?;
        let path = folder.join(format!("{}.dat", name));
        fs::write(&path, data)?;
        Ok(path)
    }

    fn remove(&self, folder: &Path, name: &str) -> Result<(), CaptureError> {
        fs::remove_file(folder.join(format!("{}.dat", name)))?;
        Ok(())
    }
}

/// Store that sleeps before every write and remembers the write order.
pub struct SlowStore {
    inner: BinaryFileStore,
    delay: Duration,
    written: Mutex<Vec<String>>,
}

impl SlowStore {
    pub fn new(inner: BinaryFileStore, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn written(&self) -> Vec<String> {
        self.written.lock().clone()
    }
}

impl SideFileStore for SlowStore {
    fn file_extension(&self) -> &str {
        self.inner.file_extension()
    }

    fn write(&self, folder: &Path, name: &str, data: &[u8]) -> Result<PathBuf, CaptureError> {
        thread::sleep(self.delay);
        let path = self.inner.write(folder, name, data)?;
        self.written.lock().push(name.to_string());
        Ok(path)
    }

    fn remove(&self, folder: &Path, name: &str) -> Result<(), CaptureError> {
        self.inner.remove(folder, name)
    }
}

#[derive(Default)]
struct MockContainerState {
    not_ready: AtomicBool,
    fail_open: AtomicBool,
    fail_appends: AtomicBool,
    readiness_checks: AtomicUsize,
    finished: AtomicUsize,
    video_pts: Mutex<Vec<MediaTime>>,
    audio_pts: Mutex<Vec<MediaTime>>,
}

/// In-memory container whose readiness and open result can be scripted.
#[derive(Default)]
pub struct MockContainerFormat {
    state: Arc<MockContainerState>,
}

impl MockContainerFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.not_ready.store(!ready, Ordering::SeqCst);
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make video appends fail the way a closed container does.
    pub fn fail_appends(&self, fail: bool) {
        self.state.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn readiness_checks(&self) -> usize {
        self.state.readiness_checks.load(Ordering::SeqCst)
    }

    pub fn finished_count(&self) -> usize {
        self.state.finished.load(Ordering::SeqCst)
    }

    pub fn video_pts(&self) -> Vec<MediaTime> {
        self.state.video_pts.lock().clone()
    }

    pub fn audio_pts(&self) -> Vec<MediaTime> {
        self.state.audio_pts.lock().clone()
    }
}

impl ContainerFormat for MockContainerFormat {
    fn file_extension(&self) -> &str {
        "mock"
    }

    fn supports(&self, _layout: &TrackLayout) -> Result<(), CaptureError> {
        Ok(())
    }

    fn open(&self, _path: &Path, _layout: &TrackLayout) -> Result<Box<dyn ContainerWriter>, CaptureError> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(CaptureError::StorageError("injected open failure".into()));
        }
        Ok(Box::new(MockContainerWriter {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockContainerWriter {
    state: Arc<MockContainerState>,
}

impl ContainerWriter for MockContainerWriter {
    fn begin_session(&mut self, _start: MediaTime) -> Result<(), CaptureError> {
        Ok(())
    }

    fn is_ready_for_more_data(&self, _track: TrackKind) -> bool {
        self.state.readiness_checks.fetch_add(1, Ordering::SeqCst);
        !self.state.not_ready.load(Ordering::SeqCst)
    }

    fn append_video(&mut self, _frame: &SampleBuffer, pts: MediaTime) -> Result<(), CaptureError> {
        if self.state.fail_appends.load(Ordering::SeqCst) {
            return Err(CaptureError::WriterState("injected write failure".into()));
        }
        self.state.video_pts.lock().push(pts);
        Ok(())
    }

    fn append_audio(&mut self, _pcm: &[u8], _frames: usize, pts: MediaTime) -> Result<(), CaptureError> {
        self.state.audio_pts.lock().push(pts);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CaptureError> {
        self.state.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scriptable depth camera.
pub struct MockDevice {
    pub available: bool,
    pub microphone: bool,
    pub format: CaptureFormat,
    pub video_clock: Option<Arc<dyn ReferenceClock>>,
    pub audio_clock: Option<Arc<dyn ReferenceClock>>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            available: true,
            microphone: true,
            format: CaptureFormat {
                color_width: 8,
                color_height: 6,
                frame_rate: 30.0,
                depth_format: PixelFormat::DepthFloat32,
                depth_width: 4,
                depth_height: 3,
            },
            video_clock: None,
            audio_clock: None,
        }
    }
}

impl CaptureDevice for MockDevice {
    fn is_available(&self) -> bool {
        self.available
    }

    fn active_format(&self) -> Result<CaptureFormat, CaptureError> {
        Ok(self.format)
    }

    fn microphone_available(&self) -> bool {
        self.microphone
    }

    fn video_clock(&self) -> Option<Arc<dyn ReferenceClock>> {
        self.video_clock.clone()
    }

    fn audio_clock(&self) -> Option<Arc<dyn ReferenceClock>> {
        self.audio_clock.clone()
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            id: "mock-0".into(),
            name: "Mock Depth Camera".into(),
            has_lidar: true,
        }
    }
}

/// Records every delegate notification.
#[derive(Default)]
pub struct RecordingDelegateSpy {
    states: Mutex<Vec<RecordingState>>,
    times: Mutex<Vec<f64>>,
    errors: Mutex<Vec<CaptureError>>,
    finished: Mutex<Vec<RecordingResult>>,
}

impl RecordingDelegateSpy {
    pub fn states(&self) -> Vec<RecordingState> {
        self.states.lock().clone()
    }

    pub fn times(&self) -> Vec<f64> {
        self.times.lock().clone()
    }

    pub fn errors(&self) -> Vec<CaptureError> {
        self.errors.lock().clone()
    }

    pub fn finished(&self) -> Vec<RecordingResult> {
        self.finished.lock().clone()
    }
}

impl RecordingDelegate for RecordingDelegateSpy {
    fn on_state_changed(&self, state: RecordingState) {
        self.states.lock().push(state);
    }

    fn on_recorded_time_update(&self, seconds: f64) {
        self.times.lock().push(seconds);
    }

    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().push(error.clone());
    }

    fn on_recording_finished(&self, result: &RecordingResult) {
        self.finished.lock().push(result.clone());
    }
}

/// Library that accepts every save and hands out sequential ids.
#[derive(Default)]
pub struct AcceptingLibrary {
    saved: Mutex<Vec<PathBuf>>,
}

impl AcceptingLibrary {
    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().clone()
    }
}

impl AssetLibrary for AcceptingLibrary {
    fn save_video(&self, path: &Path) -> Result<String, CaptureError> {
        let mut saved = self.saved.lock();
        saved.push(path.to_path_buf());
        Ok(format!("asset-{}", saved.len()))
    }
}

/// Library the user never granted access to.
pub struct DenyingLibrary;

impl AssetLibrary for DenyingLibrary {
    fn save_video(&self, _path: &Path) -> Result<String, CaptureError> {
        Err(CaptureError::LibraryAccessDenied)
    }
}
