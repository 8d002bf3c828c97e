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

/// Writes one `confidence_NNNN` side file (u8 per pixel) per tick that
/// carried a confidence map.
pub struct ConfidenceWriter {
    channel: SideFileChannel,
    with_header: bool,
}

impl ConfidenceWriter {
    pub fn new(store: Arc<dyn SideFileStore>, config: &RecorderConfiguration) -> Self {
        Self {
            channel: SideFileChannel::new(
                Modality::Confidence,
                PixelFormat::ConfidenceUInt8.encoding_name(),
                store,
                config.writer_queue_capacity,
                config.finish_timeout,
            ),
            with_header: config.depth_dimensions_header,
        }
    }

    pub fn file_name(frame_index: u64) -> String {
        format!("confidence_{:04}", frame_index)
    }
}

impl ModalityWriter for ConfidenceWriter {
    type Sample = SampleBuffer;

    fn modality(&self) -> Modality {
        Modality::Confidence
    }

    fn prepare(&self, output_directory: &Path, recording_id: &RecordingId) -> Result<(), CaptureError> {
        self.channel.prepare(output_directory, recording_id)
    }

    fn update(&self, sample: SampleBuffer, frame_index: u64) -> bool {
        if sample.pixel_format() != PixelFormat::ConfidenceUInt8 {
            log::warn!("Confidence frame {} is {:?}", frame_index, sample.pixel_format());
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
