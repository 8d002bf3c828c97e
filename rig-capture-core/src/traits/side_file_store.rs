use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;

/// Destination for per-frame side files.
///
/// Implementations must be safe to call from several writer queues at once;
/// each writer only ever touches its own file names.
pub trait SideFileStore: Send + Sync {
    /// Extension appended to every file name, without the dot.
    fn file_extension(&self) -> &str;

    /// Write `data` as `<folder>/<name>.<ext>`, creating `folder` if needed.
    fn write(&self, folder: &Path, name: &str, data: &[u8]) -> Result<PathBuf, CaptureError>;

    /// Remove `<folder>/<name>.<ext>`. Used to discard the partial output of
    /// a frame whose later files failed.
    fn remove(&self, folder: &Path, name: &str) -> Result<(), CaptureError>;
}
