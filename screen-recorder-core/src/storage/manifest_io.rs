use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::WriterError;
use crate::models::manifest::OutputManifest;

/// Sidecar location for a session: `{directory}/{stem}.manifest.json`.
pub fn manifest_path(directory: &Path, stem: &str) -> PathBuf {
    directory.join(format!("{}.manifest.json", stem))
}

/// Write the output manifest as a JSON sidecar next to the track files.
pub fn write_manifest(manifest: &OutputManifest, directory: &Path, stem: &str) -> Result<PathBuf, WriterError> {
    fs::create_dir_all(directory)
        .map_err(|e| WriterError::FinishFailed(format!("failed to create directory: {}", e)))?;
    let path = manifest_path(directory, stem);
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| WriterError::FinishFailed(format!("failed to serialize manifest: {}", e)))?;
    fs::write(&path, json).map_err(|e| WriterError::FinishFailed(format!("failed to write manifest: {}", e)))?;
    Ok(path)
}

/// Read a manifest previously written by [`write_manifest`].
pub fn read_manifest(directory: &Path, stem: &str) -> Result<OutputManifest, WriterError> {
    let path = manifest_path(directory, stem);
    let json = fs::read_to_string(&path)
        .map_err(|e| WriterError::FinishFailed(format!("failed to read manifest: {}", e)))?;
    serde_json::from_str(&json).map_err(|e| WriterError::FinishFailed(format!("failed to parse manifest: {}", e)))
}
