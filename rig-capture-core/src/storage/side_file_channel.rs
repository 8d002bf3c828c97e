use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::models::capture_models::{Matrix3, Modality};
use crate::models::error::CaptureError;
use crate::models::recording_id::RecordingId;
use crate::storage::serial_queue::SerialQueue;
use crate::traits::modality_writer::WriterReport;
use crate::traits::side_file_store::SideFileStore;

/// One encoded side file: base name (without extension) and contents.
pub(crate) type SideFile = (String, Vec<u8>);

/// Per-frame facts an encode job reports alongside its files.
#[derive(Debug, Default)]
pub(crate) struct FrameFacts {
    pub resolution: Option<[u32; 2]>,
    pub intrinsics: Option<Matrix3>,
}

pub(crate) type EncodeJob = Box<dyn FnOnce() -> Result<(Vec<SideFile>, FrameFacts), CaptureError> + Send + 'static>;

/// Serial queue + store + counters shared by the side-file writers.
///
/// Encoding runs on the queue, not on the caller's thread. A failed encode
/// or write is logged and counted; the frame is skipped and later frames are
/// unaffected.
pub(crate) struct SideFileChannel {
    store: Arc<dyn SideFileStore>,
    queue: SerialQueue,
    accepting: RwLock<bool>,
    report: Arc<Mutex<WriterReport>>,
    finish_timeout: Duration,
}

impl SideFileChannel {
    pub fn new(
        modality: Modality,
        encoding: &str,
        store: Arc<dyn SideFileStore>,
        queue_capacity: usize,
        finish_timeout: Duration,
    ) -> Self {
        Self {
            store,
            queue: SerialQueue::new(&format!("{}-writer", modality.as_str()), queue_capacity),
            accepting: RwLock::new(false),
            report: Arc::new(Mutex::new(WriterReport::new(modality, encoding))),
            finish_timeout,
        }
    }

    pub fn prepare(&self, output_directory: &Path, recording_id: &RecordingId) -> Result<(), CaptureError> {
        let mut accepting = self.accepting.write();
        // a previous recording's backlog must not land in the new folder
        if !self.queue.drain_timeout(self.finish_timeout) {
            return Err(CaptureError::Timeout);
        }

        let folder = output_directory.join(recording_id.as_str());
        let mut report = self.report.lock();
        let fresh = WriterReport::new(report.modality, report.encoding.clone());
        *report = WriterReport {
            folder: Some(folder),
            ..fresh
        };
        *accepting = true;
        Ok(())
    }

    /// Enqueue one frame. Returns false if the channel is not accepting or
    /// the backlog is full.
    pub fn submit(&self, encode: EncodeJob) -> bool {
        let accepting = self.accepting.read();
        if !*accepting {
            return false;
        }

        let folder = {
            let mut report = self.report.lock();
            report.frames_submitted += 1;
            report.folder.clone()
        };
        let Some(folder) = folder else {
            return false;
        };

        let store = Arc::clone(&self.store);
        let report = Arc::clone(&self.report);
        let dispatched = self.queue.dispatch(move || write_frame(store.as_ref(), &folder, &report, encode));

        if let Err(e) = dispatched {
            let mut report = self.report.lock();
            log::warn!("Dropping {} frame: {}", report.modality.as_str(), e);
            report.frames_dropped += 1;
            report.last_error = Some(e);
            return false;
        }
        true
    }

    pub fn finish(&self) -> WriterReport {
        {
            let mut accepting = self.accepting.write();
            *accepting = false;
        }
        let drained = self.queue.drain_timeout(self.finish_timeout);

        let mut report = self.report.lock();
        if !drained {
            log::error!(
                "{} writer did not drain within {:?}",
                report.modality.as_str(),
                self.finish_timeout
            );
            report.timed_out = true;
            report.last_error = Some(CaptureError::Timeout);
        }
        log::info!(
            "{} writer finished: {} written, {} failed, {} dropped",
            report.modality.as_str(),
            report.frames_written,
            report.frames_failed,
            report.frames_dropped
        );
        report.clone()
    }
}

fn write_frame(store: &dyn SideFileStore, folder: &Path, report: &Mutex<WriterReport>, encode: EncodeJob) {
    let result = encode().and_then(|(files, facts)| {
        let mut bytes = 0u64;
        for (index, (name, data)) in files.iter().enumerate() {
            if let Err(e) = store.write(folder, name, data) {
                discard(store, folder, &files[..index]);
                return Err(e);
            }
            bytes += data.len() as u64;
        }
        Ok((bytes, facts))
    });

    let mut report = report.lock();
    match result {
        Ok((bytes, facts)) => {
            report.frames_written += 1;
            report.bytes_written += bytes;
            if report.resolution.is_empty() {
                if let Some([height, width]) = facts.resolution {
                    report.resolution = vec![height, width];
                }
            }
            if report.intrinsics.is_none() {
                report.intrinsics = facts.intrinsics;
            }
        }
        Err(e) => {
            log::error!("Failed to write {} frame: {}", report.modality.as_str(), e);
            report.frames_failed += 1;
            report.last_error = Some(e);
        }
    }
}

/// Remove the files of a frame that could not be written completely, so a
/// failed frame leaves nothing behind.
fn discard(store: &dyn SideFileStore, folder: &Path, written: &[SideFile]) {
    for (name, _) in written {
        if let Err(e) = store.remove(folder, name) {
            log::warn!("Failed to remove partial side file {}: {}", name, e);
        }
    }
}
