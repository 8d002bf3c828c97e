use std::path::Path;
use std::sync::Arc;

use crate::models::capture_models::Modality;
use crate::models::config::RecorderConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_id::RecordingId;
use crate::models::sample_buffer::{PixelFormat, SampleBuffer};
use crate::processing::depth_format;
use crate::storage::side_file_channel::{FrameFacts, SideFileChannel};
use crate::traits::modality_writer::{ModalityWriter, WriterReport};
use crate::traits::side_file_store::SideFileStore;

/// Writes one `depth_NNNN` side file per recorded tick.
///
/// Only buffers in the configured depth format are accepted, so every file
/// of a recording shares one sample width.
pub struct DepthWriter {
    channel: SideFileChannel,
    format: PixelFormat,
    with_header: bool,
}

impl DepthWriter {
    pub fn new(store: Arc<dyn SideFileStore>, config: &RecorderConfiguration) -> Self {
        Self {
            channel: SideFileChannel::new(
                Modality::Depth,
                config.depth_format.encoding_name(),
                store,
                config.writer_queue_capacity,
                config.finish_timeout,
            ),
            format: config.depth_format,
            with_header: config.depth_dimensions_header,
        }
    }

    pub fn file_name(frame_index: u64) -> String {
        format!("depth_{:04}", frame_index)
    }
}

impl ModalityWriter for DepthWriter {
    type Sample = SampleBuffer;

    fn modality(&self) -> Modality {
        Modality::Depth
    }

    fn prepare(&self, output_directory: &Path, recording_id: &RecordingId) -> Result<(), CaptureError> {
        self.channel.prepare(output_directory, recording_id)
    }

    fn update(&self, sample: SampleBuffer, frame_index: u64) -> bool {
        if sample.pixel_format() != self.format {
            log::warn!(
                "Depth frame {} is {:?}, expected {:?}",
                frame_index,
                sample.pixel_format(),
                self.format
            );
            return false;
        }
        let with_header = self.with_header;
        self.channel.submit(Box::new(move || {
            let data = depth_format::encode_depth(&sample, with_header)?;
            let facts = FrameFacts {
                resolution: Some(sample.resolution()),
                intrinsics: None,
            };
            Ok((vec![(Self::file_name(frame_index), data)], facts))
        }))
    }

    fn finish(&self) -> WriterReport {
        self.channel.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::binary_file::BinaryFileStore;
    use crate::testing::{depth_buffer, FailingStore};

    fn config(dir: &Path) -> RecorderConfiguration {
        RecorderConfiguration {
            output_directory: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn writes_indexed_files_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DepthWriter::new(Arc::new(BinaryFileStore::new()), &config(dir.path()));
        let id = RecordingId::from("rec");
        writer.prepare(dir.path(), &id).unwrap();

        for i in 0..3 {
            assert!(writer.update(depth_buffer(4, 3, i as f32), i));
        }
        let report = writer.finish();
        assert_eq!(report.frames_written, 3);
        assert_eq!(report.resolution, vec![3, 4]);
        assert_eq!(report.encoding, "float32_le");

        let folder = dir.path().join("rec");
        let data = BinaryFileStore::new().read(&folder, "depth_0002").unwrap();
        let map = depth_format::decode_depth(&data, PixelFormat::DepthFloat32).unwrap();
        assert_eq!((map.width, map.height), (4, 3));
        assert!(map.values.iter().all(|v| *v == 2.0));
    }

    #[test]
    fn rejects_wrong_format_and_late_updates() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DepthWriter::new(Arc::new(BinaryFileStore::new()), &config(dir.path()));
        writer.prepare(dir.path(), &RecordingId::from("rec")).unwrap();

        let half = SampleBuffer::packed(1, 1, PixelFormat::DepthFloat16, vec![0, 0x3c]).unwrap();
        assert!(!writer.update(half, 0));

        writer.finish();
        assert!(!writer.update(depth_buffer(1, 1, 1.0), 1));
        assert_eq!(writer.finish().frames_submitted, 0);
    }

    #[test]
    fn failed_frame_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FailingStore::new(BinaryFileStore::new(), &["depth_0001"]));
        let writer = DepthWriter::new(store, &config(dir.path()));
        writer.prepare(dir.path(), &RecordingId::from("rec")).unwrap();

        for i in 0..3 {
            writer.update(depth_buffer(2, 2, 0.5), i);
        }
        let report = writer.finish();
        assert_eq!(report.frames_written, 2);
        assert_eq!(report.frames_failed, 1);
        assert!(matches!(report.last_error, Some(CaptureError::StorageError(_))));

        let names = BinaryFileStore::new().list(&dir.path().join("rec")).unwrap();
        assert_eq!(names, vec!["depth_0000.bin", "depth_0002.bin"]);
    }

    #[test]
    fn prepare_starts_a_fresh_recording() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DepthWriter::new(Arc::new(BinaryFileStore::new()), &config(dir.path()));
        writer.prepare(dir.path(), &RecordingId::from("first")).unwrap();
        writer.update(depth_buffer(1, 1, 1.0), 0);
        writer.finish();

        writer.prepare(dir.path(), &RecordingId::from("second")).unwrap();
        writer.update(depth_buffer(1, 1, 1.0), 0);
        let report = writer.finish();
        assert_eq!(report.frames_written, 1);
        assert_eq!(report.folder, Some(dir.path().join("second")));
    }
}
