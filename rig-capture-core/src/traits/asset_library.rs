use std::path::Path;

use crate::models::error::CaptureError;

/// Optional gallery the muxed video is saved to after a recording.
///
/// Return `LibraryAccessDenied` when the user has not granted access; the
/// local recording is kept either way.
pub trait AssetLibrary: Send + Sync {
    /// Save the file and return the library's identifier for the new asset.
    fn save_video(&self, path: &Path) -> Result<String, CaptureError>;
}
