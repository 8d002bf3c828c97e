pub mod asset_library;
pub mod capture_device;
pub mod container_writer;
pub mod modality_writer;
pub mod recording_delegate;
pub mod side_file_store;
