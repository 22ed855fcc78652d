use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::DataBackendError;

/// Default location for artifacts, relative to the working directory.
pub const ARTIFACT_STORE_ROOT: &str = ".databackend/artifacts";

/// Artifact store keeping serialized blobs as flat files under one root
/// directory, one file per artifact id.
pub struct FileSystemArtifactStore {
    root: PathBuf,
    name: String,
}

impl FileSystemArtifactStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        FileSystemArtifactStore {
            root: root.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("file://{}", self.root.display())
    }

    /// Artifact ids become file names, so path-like ids are rejected.
    fn artifact_path(&self, file_id: &str) -> Result<PathBuf, DataBackendError> {
        if file_id.is_empty()
            || file_id == "."
            || file_id == ".."
            || file_id.contains('/')
            || file_id.contains('\\')
        {
            return Err(DataBackendError::ArtifactError(format!(
                "'{file_id}' is not a usable artifact id"
            )));
        }
        Ok(self.root.join(file_id))
    }

    /// Store bytes under the given id. Ids are single-use; storing new
    /// content means storing it under a new id.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactError` for a bad or already-taken id, or the
    /// underlying I/O error.
    pub fn put_bytes(&self, bytes: &[u8], file_id: &str) -> Result<(), DataBackendError> {
        let path = self.artifact_path(file_id)?;
        fs::create_dir_all(&self.root)?;
        if path.exists() {
            return Err(DataBackendError::ArtifactError(format!(
                "an artifact is already stored under '{file_id}'"
            )));
        }
        debug!("writing artifact '{}' ({} bytes)", file_id, bytes.len());
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Read an artifact's bytes back.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactError` when no artifact has that id.
    pub fn get_bytes(&self, file_id: &str) -> Result<Vec<u8>, DataBackendError> {
        let path = self.artifact_path(file_id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DataBackendError::ArtifactError(
                format!("no artifact stored under '{file_id}'"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether an artifact with this id is stored.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactError` for a bad id.
    pub fn exists(&self, file_id: &str) -> Result<bool, DataBackendError> {
        Ok(self.artifact_path(file_id)?.is_file())
    }

    /// Remove one artifact.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactError` when no artifact has that id.
    pub fn delete_artifact(&self, file_id: &str) -> Result<(), DataBackendError> {
        let path = self.artifact_path(file_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DataBackendError::ArtifactError(
                format!("no artifact stored under '{file_id}'"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the whole store. Without `force` only an empty store (or one
    /// whose root was never created) is dropped.
    ///
    /// # Errors
    ///
    /// Refuses with `ArtifactError` when the store still holds artifacts
    /// and `force` is not set.
    pub fn drop_store(&self, force: bool) -> Result<(), DataBackendError> {
        if !force {
            let occupied = match fs::read_dir(&self.root) {
                Ok(mut entries) => entries.next().is_some(),
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => return Err(e.into()),
            };
            if occupied {
                return Err(DataBackendError::ArtifactError(
                    "refusing to drop a non-empty artifact store without force".to_string(),
                ));
            }
        }
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileSystemArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemArtifactStore::new(dir.path().join("artifacts"), "sql");
        (dir, store)
    }

    #[test]
    fn put_get_round_trip() {
        let (_dir, store) = store();
        store.put_bytes(b"model-weights", "weights-v1").unwrap();
        assert!(store.exists("weights-v1").unwrap());
        assert_eq!(store.get_bytes("weights-v1").unwrap(), b"model-weights");
    }

    #[test]
    fn get_missing_artifact_fails() {
        let (_dir, store) = store();
        let err = store.get_bytes("nothing-here").unwrap_err();
        assert!(matches!(err, DataBackendError::ArtifactError(_)));
    }

    #[test]
    fn duplicate_put_fails() {
        let (_dir, store) = store();
        store.put_bytes(b"first", "taken").unwrap();
        let err = store.put_bytes(b"second", "taken").unwrap_err();
        assert!(matches!(err, DataBackendError::ArtifactError(_)));
        // The original content is untouched.
        assert_eq!(store.get_bytes("taken").unwrap(), b"first");
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let (_dir, store) = store();
        assert!(store.put_bytes(b"x", "../escape").is_err());
        assert!(store.put_bytes(b"x", "a/b").is_err());
        assert!(store.put_bytes(b"x", "").is_err());
    }

    #[test]
    fn delete_then_exists_is_false() {
        let (_dir, store) = store();
        store.put_bytes(b"x", "gone-soon").unwrap();
        store.delete_artifact("gone-soon").unwrap();
        assert!(!store.exists("gone-soon").unwrap());
        assert!(store.delete_artifact("gone-soon").is_err());
    }

    #[test]
    fn drop_refuses_non_empty_store_without_force() {
        let (_dir, store) = store();
        store.put_bytes(b"x", "a").unwrap();
        assert!(store.drop_store(false).is_err());
        // The refused drop left the artifact alone.
        assert_eq!(store.get_bytes("a").unwrap(), b"x");
        store.drop_store(true).unwrap();
        assert!(!store.exists("a").unwrap());
        // Dropping an already-missing store is fine.
        store.drop_store(true).unwrap();
    }

    #[test]
    fn drop_without_force_accepts_an_empty_store() {
        let (_dir, store) = store();
        // Nothing was ever written, so the root does not even exist yet.
        store.drop_store(false).unwrap();

        store.put_bytes(b"x", "a").unwrap();
        store.delete_artifact("a").unwrap();
        // Emptied again, so no force is needed.
        store.drop_store(false).unwrap();
        assert!(!store.root().exists());
    }
}
