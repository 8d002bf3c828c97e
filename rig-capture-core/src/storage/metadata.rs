use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::models::recording_id::RecordingId;
use crate::models::recording_result::RecordingMetadata;

/// Path of the metadata file inside a recording folder: `<recordingId>.json`.
pub fn metadata_path(folder: &Path, recording_id: &RecordingId) -> PathBuf {
    folder.join(format!("{}.json", recording_id))
}

/// Write recording metadata as `<recordingId>.json` in the recording folder.
pub fn write_metadata(metadata: &RecordingMetadata, folder: &Path) -> Result<PathBuf, CaptureError> {
    let path = metadata_path(folder, &metadata.recording_id);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::create_dir_all(folder)
        .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
    fs::write(&path, json).map_err(|e| CaptureError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(path)
}

/// Read recording metadata back from its JSON file.
pub fn read_metadata(path: &Path) -> Result<RecordingMetadata, CaptureError> {
    let json =
        fs::read_to_string(path).map_err(|e| CaptureError::StorageError(format!("failed to read metadata: {}", e)))?;
    let metadata: RecordingMetadata = serde_json::from_str(&json)
        .map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}

/// Number of regular files directly inside `folder`.
pub fn count_files(folder: &Path) -> Result<u64, CaptureError> {
    let mut count = 0;
    for entry in fs::read_dir(folder)? {
        if entry?.file_type()?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

/// SHA-256 hex digest of a file, streamed.
pub fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let mut file =
        File::open(path).map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
