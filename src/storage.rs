use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No stored file for document {0}")]
    Missing(Uuid),
}

/// Flat on-disk store for uploaded document bytes, keyed by document id.
///
/// The database row is the source of truth for metadata; this store only
/// holds the raw bytes the extractor reads. Files are named
/// `<document_id>.<file_type>` so a stray file can always be traced back.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, document_id: &Uuid, file_type: &str) -> PathBuf {
        self.root.join(format!("{document_id}.{file_type}"))
    }

    pub fn save(
        &self,
        document_id: &Uuid,
        file_type: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = self.path_for(document_id, file_type);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn read(&self, document_id: &Uuid, file_type: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(document_id, file_type);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::Missing(*document_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, document_id: &Uuid, file_type: &str) -> bool {
        self.path_for(document_id, file_type).exists()
    }

    /// Remove a stored file. Missing files are tolerated so deletion stays
    /// idempotent.
    pub fn delete(&self, document_id: &Uuid, file_type: &str) -> Result<(), StorageError> {
        let path = self.path_for(document_id, file_type);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
