pub mod binary_file;
pub mod confidence_writer;
pub mod container;
pub mod depth_writer;
pub mod metadata;
pub mod muxer;
pub mod pose_writer;
pub mod serial_queue;
pub(crate) mod side_file_channel;
