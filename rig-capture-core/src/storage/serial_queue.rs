use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::models::error::CaptureError;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Barrier(Sender<()>),
}

/// A named worker thread running jobs one at a time in submission order.
///
/// The backlog is bounded. `dispatch` never blocks: when the backlog is full
/// the job is rejected and the caller drops the unit of work. `drain` is a
/// join point that returns once every job dispatched before it has run.
pub struct SerialQueue {
    label: String,
    sender: Mutex<Option<Sender<Message>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SerialQueue {
    pub fn new(label: &str, capacity: usize) -> Self {
        let (sender, receiver) = bounded::<Message>(capacity.max(1));
        let handle = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || run_worker(receiver))
            .expect("failed to spawn serial queue thread");

        Self {
            label: label.to_string(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enqueue without blocking.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> Result<(), CaptureError> {
        let guard = self.sender.lock();
        let sender = guard
            .as_ref()
            .ok_or_else(|| CaptureError::WriterState(format!("{} is shut down", self.label)))?;
        match sender.try_send(Message::Run(Box::new(job))) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(CaptureError::QueueFull(self.label.clone())),
            Err(TrySendError::Disconnected(_)) => {
                Err(CaptureError::WriterState(format!("{} worker exited", self.label)))
            }
        }
    }

    /// Enqueue, waiting up to `timeout` for room in the backlog. Used for
    /// control jobs that must not be dropped.
    pub fn dispatch_timeout(&self, job: impl FnOnce() + Send + 'static, timeout: Duration) -> Result<(), CaptureError> {
        let sender = self.sender_clone()?;
        sender
            .send_timeout(Message::Run(Box::new(job)), timeout)
            .map_err(|_| CaptureError::Timeout)
    }

    /// Block until every previously dispatched job has run.
    pub fn drain(&self) {
        let Ok(sender) = self.sender_clone() else {
            return;
        };
        let (done_tx, done_rx) = bounded(1);
        if sender.send(Message::Barrier(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }

    /// Like [`drain`](Self::drain) but gives up after `timeout`. Returns
    /// whether the queue drained in time.
    pub fn drain_timeout(&self, timeout: Duration) -> bool {
        let Ok(sender) = self.sender_clone() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        let (done_tx, done_rx) = bounded(1);
        if sender.send_deadline(Message::Barrier(done_tx), deadline).is_err() {
            return false;
        }
        done_rx.recv_deadline(deadline).is_ok()
    }

    /// Stop accepting work, let the backlog run and join the thread.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                log::error!("Serial queue {} panicked", self.label);
            }
        }
    }

    fn sender_clone(&self) -> Result<Sender<Message>, CaptureError> {
        self.sender
            .lock()
            .clone()
            .ok_or_else(|| CaptureError::WriterState(format!("{} is shut down", self.label)))
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(receiver: Receiver<Message>) {
    for message in receiver {
        match message {
            Message::Run(job) => job(),
            Message::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}
