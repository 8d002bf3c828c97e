use std::sync::Arc;
use std::time::Duration;

use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::RecordingState;
use crate::storage::serial_queue::SerialQueue;
use crate::traits::recording_delegate::RecordingDelegate;

const CALLBACK_QUEUE_CAPACITY: usize = 256;

/// Delivers delegate notifications and stop completions on a dedicated
/// callback queue, in the order they were raised.
pub struct Notifier {
    queue: SerialQueue,
    delegate: Option<Arc<dyn RecordingDelegate>>,
    delivery_timeout: Duration,
}

impl Notifier {
    pub fn new(delivery_timeout: Duration) -> Self {
        Self {
            queue: SerialQueue::new("recording-callbacks", CALLBACK_QUEUE_CAPACITY),
            delegate: None,
            delivery_timeout,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn RecordingDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state_changed(&self, state: RecordingState) {
        self.with_delegate(move |d| d.on_state_changed(state));
    }

    /// Progress updates are best effort; a full callback queue drops them.
    pub fn recorded_time(&self, seconds: f64) {
        if let Some(delegate) = self.delegate.clone() {
            let _ = self.queue.dispatch(move || delegate.on_recorded_time_update(seconds));
        }
    }

    pub fn error(&self, error: CaptureError) {
        self.with_delegate(move |d| d.on_error(&error));
    }

    pub fn finished(&self, result: RecordingResult) {
        self.with_delegate(move |d| d.on_recording_finished(&result));
    }

    /// Run an arbitrary completion on the callback queue.
    pub fn deliver(&self, job: impl FnOnce() + Send + 'static) {
        if let Err(e) = self.queue.dispatch_timeout(job, self.delivery_timeout) {
            log::error!("Failed to deliver callback: {}", e);
        }
    }

    /// Wait until every notification raised so far has been delivered.
    pub fn flush(&self) {
        self.queue.drain();
    }

    fn with_delegate(&self, f: impl FnOnce(&dyn RecordingDelegate) + Send + 'static) {
        if let Some(delegate) = self.delegate.clone() {
            self.deliver(move || f(delegate.as_ref()));
        }
    }
}
