use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::RecordingState;

/// Observer for recording session notifications.
///
/// All methods are called on the session's callback queue, never on the
/// capture thread or a writer queue. Implementations should marshal to the
/// UI thread if needed.
pub trait RecordingDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: RecordingState);

    /// Called with the seconds recorded so far, at most a few times a second.
    fn on_recorded_time_update(&self, seconds: f64);

    /// Called when something goes wrong that does not stop the recording.
    fn on_error(&self, error: &CaptureError);

    /// Called once per recording after every artifact is finalized.
    fn on_recording_finished(&self, result: &RecordingResult);
}
