pub mod audio_conform;
pub mod clock_bridge;
pub mod depth_format;
pub mod frame_timing;
