//! Library file persistence
//!
//! A [`Repository`] that keeps every local collection in one JSON file.
//! Uses atomic writes (write to temp file, then rename) to prevent
//! corruption.
//!
//! Storage location: `~/.local/share/lexsync/library.json` (configurable
//! via `Config`)

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use parking_lot::Mutex;
use tracing::warn;

use super::error::{StorageError, StorageResult};
use crate::config::Config;
use crate::models::{Document, Progress, RevealState, Tombstone, VocabularyEntry};
use crate::repository::{LibraryData, Repository};

/// File-backed repository
///
/// Reads are served from memory; every mutation rewrites the file before
/// it becomes visible.
pub struct JsonFileRepository {
    path: PathBuf,
    data: Mutex<LibraryData>,
}

impl JsonFileRepository {
    /// Open the library at the configured location
    pub fn open(config: &Config) -> StorageResult<Self> {
        Self::open_at(config.library_path())
    }

    /// Open the library at a specific path, starting empty if it doesn't exist
    pub fn open_at(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let data = load(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Path of the library file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the library file exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Size of the library file in bytes
    pub fn file_size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Copy of the current data
    pub fn data(&self) -> LibraryData {
        self.data.lock().clone()
    }

    /// Apply a change and persist it; memory is only updated if the write succeeds
    fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut LibraryData),
    {
        let mut current = self.data.lock();
        let mut next = current.clone();
        change(&mut next);

        let bytes = serde_json::to_vec_pretty(&next).map_err(StorageError::from)?;
        atomic_write(&self.path, &bytes)?;

        *current = next;
        Ok(())
    }
}

impl Repository for JsonFileRepository {
    fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.data.lock().documents.values().cloned().collect())
    }

    fn progress(&self) -> Result<Vec<Progress>> {
        Ok(self.data.lock().progress.values().cloned().collect())
    }

    fn reveal_states(&self) -> Result<Vec<RevealState>> {
        Ok(self.data.lock().reveal_state.values().cloned().collect())
    }

    fn tombstones(&self) -> Result<Vec<Tombstone>> {
        Ok(self.data.lock().tombstones.values().cloned().collect())
    }

    fn vocabulary(&self) -> Result<Vec<VocabularyEntry>> {
        Ok(self.data.lock().vocabulary.values().cloned().collect())
    }

    fn upsert_documents(&self, documents: &[Document]) -> Result<()> {
        self.mutate(|data| data.upsert_documents(documents))
    }

    fn upsert_progress(&self, rows: &[Progress]) -> Result<()> {
        self.mutate(|data| data.upsert_progress(rows))
    }

    fn upsert_reveal_states(&self, rows: &[RevealState]) -> Result<()> {
        self.mutate(|data| data.upsert_reveal_states(rows))
    }

    fn upsert_vocabulary(&self, entries: &[VocabularyEntry]) -> Result<()> {
        self.mutate(|data| data.upsert_vocabulary(entries))
    }

    fn delete_document_cascade(&self, doc_id: &str) -> Result<()> {
        self.mutate(|data| data.delete_document_cascade(doc_id))
    }

    fn replace_tombstones(&self, tombstones: &[Tombstone]) -> Result<()> {
        self.mutate(|data| data.replace_tombstones(tombstones))
    }
}

/// Load the library file
///
/// Returns `None` if the file doesn't exist. A file that can't be parsed is
/// copied aside before the error is returned.
fn load(path: &Path) -> StorageResult<Option<LibraryData>> {
    if !path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(path).map_err(|source| StorageError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    match serde_json::from_slice(&bytes) {
        Ok(data) => Ok(Some(data)),
        Err(e) => {
            let backup_path = backup_path(path);
            warn!("Library {:?} is corrupted, backing up to {:?}", path, backup_path);
            fs::copy(path, &backup_path)
                .map_err(|err| StorageError::from_io(err, backup_path.clone()))?;
            Err(StorageError::CorruptLibrary {
                path: path.to_path_buf(),
                backup_path,
                details: e.to_string(),
            })
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".corrupt.backup");
    PathBuf::from(name)
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // Create temp file in the same directory (for atomic rename)
    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("library.json")
    }

    #[test]
    fn test_open_missing_library_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::open_at(library_path(&temp_dir)).unwrap();

        assert!(!repo.exists());
        assert!(repo.documents().unwrap().is_empty());
        assert_eq!(repo.file_size(), 0);
    }

    #[test]
    fn test_mutations_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = library_path(&temp_dir);

        {
            let repo = JsonFileRepository::open_at(&path).unwrap();
            let doc = Document::with_id("d1", "Title", "Body", &["Body".to_string()]);
            repo.upsert_documents(&[doc]).unwrap();
            repo.upsert_progress(&[Progress::new("d1")]).unwrap();
            repo.upsert_reveal_states(&[RevealState::new("d1:0", 2)])
                .unwrap();
            repo.upsert_vocabulary(&[VocabularyEntry::new("Word")])
                .unwrap();
            repo.replace_tombstones(&[Tombstone::new("gone")]).unwrap();
            assert!(repo.exists());
        }

        let repo = JsonFileRepository::open_at(&path).unwrap();
        assert_eq!(repo.documents().unwrap()[0].title, "Title");
        assert_eq!(repo.progress().unwrap()[0].doc_id, "d1");
        assert_eq!(repo.reveal_states().unwrap()[0].level, 2);
        assert_eq!(repo.vocabulary().unwrap()[0].word, "word");
        assert_eq!(repo.tombstones().unwrap()[0].entity_id, "gone");
    }

    #[test]
    fn test_cascade_delete_is_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let path = library_path(&temp_dir);

        let repo = JsonFileRepository::open_at(&path).unwrap();
        repo.upsert_documents(&[Document::with_id("d1", "T", "", &[])])
            .unwrap();
        repo.upsert_progress(&[Progress::new("d1")]).unwrap();
        repo.delete_document_cascade("d1").unwrap();

        let reopened = JsonFileRepository::open_at(&path).unwrap();
        assert!(reopened.documents().unwrap().is_empty());
        assert!(reopened.progress().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_library_is_backed_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = library_path(&temp_dir);
        fs::write(&path, b"{ not json").unwrap();

        let err = JsonFileRepository::open_at(&path).err().unwrap();
        match err {
            StorageError::CorruptLibrary { backup_path, .. } => {
                assert!(backup_path.exists());
                assert_eq!(fs::read(&backup_path).unwrap(), b"{ not json");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir
            .path()
            .join("a")
            .join("b")
            .join("c")
            .join("file.txt");

        atomic_write(&nested_path, b"test data").unwrap();

        assert!(nested_path.exists());
        let content = fs::read_to_string(&nested_path).unwrap();
        assert_eq!(content, "test data");
        assert!(!nested_path.with_extension("tmp").exists());
    }
}
