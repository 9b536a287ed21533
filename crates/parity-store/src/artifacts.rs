//! Reading persisted JSON artifacts.

use crate::error::StoreError;
use parity_kernel::ProfileArtifacts;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Read and deserialize a JSON file.
pub fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, StoreError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| StoreError::parse(path, e))
}

/// Like [`read_json_file`], but a missing file is `Ok(None)`.
pub fn read_json_file_if_exists<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Option<T>, StoreError> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::parse(path, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

pub fn read_profile_artifacts(path: impl AsRef<Path>) -> Result<ProfileArtifacts, StoreError> {
    read_json_file(path)
}
