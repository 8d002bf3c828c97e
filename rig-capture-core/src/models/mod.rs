pub mod capture_models;
pub mod config;
pub mod error;
pub mod media_time;
pub mod recording_id;
pub mod recording_result;
pub mod sample_buffer;
pub mod state;
