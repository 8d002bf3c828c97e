use std::path::Path;
use std::sync::Arc;

use crate::models::capture_models::{CameraPose, Modality};
use crate::models::config::RecorderConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_id::RecordingId;
use crate::processing::depth_format;
use crate::storage::side_file_channel::{FrameFacts, SideFileChannel};
use crate::traits::modality_writer::{ModalityWriter, WriterReport};
use crate::traits::side_file_store::SideFileStore;

/// Writes `intrinsic_NNNN` (3x3) and `transform_NNNN` (4x4 or 4x3) per tick,
/// both row-major little-endian f32.
///
/// A frame counts as written only when both files were written. If the
/// transform fails, the intrinsics file of that tick is removed again.
pub struct PoseWriter {
    channel: SideFileChannel,
}

impl PoseWriter {
    pub const ENCODING: &'static str = "float32_le";

    pub fn new(store: Arc<dyn SideFileStore>, config: &RecorderConfiguration) -> Self {
        Self {
            channel: SideFileChannel::new(
                Modality::Pose,
                Self::ENCODING,
                store,
                config.writer_queue_capacity,
                config.finish_timeout,
            ),
        }
    }

    pub fn intrinsic_file_name(frame_index: u64) -> String {
        format!("intrinsic_{:04}", frame_index)
    }

    pub fn transform_file_name(frame_index: u64) -> String {
        format!("transform_{:04}", frame_index)
    }
}

impl ModalityWriter for PoseWriter {
    type Sample = CameraPose;

    fn modality(&self) -> Modality {
        Modality::Pose
    }

    fn prepare(&self, output_directory: &Path, recording_id: &RecordingId) -> Result<(), CaptureError> {
        self.channel.prepare(output_directory, recording_id)
    }

    fn update(&self, pose: CameraPose, frame_index: u64) -> bool {
        self.channel.submit(Box::new(move || {
            pose.validate()?;
            let files = vec![
                (
                    Self::intrinsic_file_name(frame_index),
                    depth_format::serialize_matrix3(&pose.intrinsics),
                ),
                (
                    Self::transform_file_name(frame_index),
                    depth_format::serialize_transform(&pose.transform),
                ),
            ];
            let facts = FrameFacts {
                resolution: None,
                intrinsics: Some(pose.intrinsics),
            };
            Ok((files, facts))
        }))
    }

    fn finish(&self) -> WriterReport {
        self.channel.finish()
    }
}
