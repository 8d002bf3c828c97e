use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::traits::side_file_store::SideFileStore;

/// Side-file store writing plain `.bin` files on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct BinaryFileStore;

impl BinaryFileStore {
    pub const EXTENSION: &'static str = "bin";

    pub fn new() -> Self {
        Self
    }

    pub fn path_for(folder: &Path, name: &str) -> PathBuf {
        folder.join(format!("{}.{}", name, Self::EXTENSION))
    }

    /// Read a side file written by this store.
    pub fn read(&self, folder: &Path, name: &str) -> Result<Vec<u8>, CaptureError> {
        let path = Self::path_for(folder, name);
        fs::read(&path).map_err(|e| CaptureError::StorageError(format!("failed to read {}: {}", path.display(), e)))
    }

    /// File names in `folder`, sorted.
    pub fn list(&self, folder: &Path) -> Result<Vec<String>, CaptureError> {
        let entries = fs::read_dir(folder)
            .map_err(|e| CaptureError::StorageError(format!("failed to list {}: {}", folder.display(), e)))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove a recording folder and everything in it.
    pub fn delete_folder(&self, folder: &Path) -> Result<(), CaptureError> {
        if !folder.exists() {
            return Ok(());
        }
        fs::remove_dir_all(folder)
            .map_err(|e| CaptureError::StorageError(format!("failed to delete {}: {}", folder.display(), e)))
    }
}

impl SideFileStore for BinaryFileStore {
    fn file_extension(&self) -> &str {
        Self::EXTENSION
    }

    fn write(&self, folder: &Path, name: &str, data: &[u8]) -> Result<PathBuf, CaptureError> {
        fs::create_dir_all(folder)
            .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
        let path = Self::path_for(folder, name);
        fs::write(&path, data)
            .map_err(|e| CaptureError::StorageError(format!("failed to write {}: {}", path.display(), e)))?;
        Ok(path)
    }

    fn remove(&self, folder: &Path, name: &str) -> Result<(), CaptureError> {
        let path = Self::path_for(folder, name);
        fs::remove_file(&path)
            .map_err(|e| CaptureError::StorageError(format!("failed to remove {}: {}", path.display(), e)))
    }
}
