//! Local repository contract
//!
//! The host application owns local storage. The sync engine only reads
//! collections and applies merge results through this narrow trait, so it
//! can run against an in-memory fake as easily as against real storage.

use std::collections::BTreeMap;

use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::models::{doc_id_of_unit, normalize_word, Document, Progress, RevealState, Tombstone, VocabularyEntry};

/// Local keyed collections for every entity type
pub trait Repository: Send + Sync {
    fn documents(&self) -> Result<Vec<Document>>;
    fn progress(&self) -> Result<Vec<Progress>>;
    fn reveal_states(&self) -> Result<Vec<RevealState>>;
    fn tombstones(&self) -> Result<Vec<Tombstone>>;
    fn vocabulary(&self) -> Result<Vec<VocabularyEntry>>;

    fn upsert_documents(&self, documents: &[Document]) -> Result<()>;
    fn upsert_progress(&self, rows: &[Progress]) -> Result<()>;
    fn upsert_reveal_states(&self, rows: &[RevealState]) -> Result<()>;
    fn upsert_vocabulary(&self, entries: &[VocabularyEntry]) -> Result<()>;

    /// Remove a document together with its progress and reveal rows
    fn delete_document_cascade(&self, doc_id: &str) -> Result<()>;

    /// Replace the tombstone set
    fn replace_tombstones(&self, tombstones: &[Tombstone]) -> Result<()>;
}

/// Everything stored locally, keyed the way each entity is identified
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryData {
    #[serde(default)]
    pub documents: BTreeMap<String, Document>,
    #[serde(default)]
    pub progress: BTreeMap<String, Progress>,
    #[serde(default)]
    pub reveal_state: BTreeMap<String, RevealState>,
    #[serde(default)]
    pub vocabulary: BTreeMap<String, VocabularyEntry>,
    #[serde(default)]
    pub tombstones: BTreeMap<String, Tombstone>,
}

impl LibraryData {
    pub fn upsert_documents(&mut self, documents: &[Document]) {
        for doc in documents {
            self.documents.insert(doc.id.clone(), doc.clone());
        }
    }

    pub fn upsert_progress(&mut self, rows: &[Progress]) {
        for row in rows {
            self.progress.insert(row.doc_id.clone(), row.clone());
        }
    }

    pub fn upsert_reveal_states(&mut self, rows: &[RevealState]) {
        for row in rows {
            self.reveal_state.insert(row.unit_id.clone(), row.clone());
        }
    }

    pub fn upsert_vocabulary(&mut self, entries: &[VocabularyEntry]) {
        for entry in entries {
            let key = normalize_word(&entry.word);
            let mut entry = entry.clone();
            entry.word = key.clone();
            self.vocabulary.insert(key, entry);
        }
    }

    pub fn delete_document_cascade(&mut self, doc_id: &str) {
        self.documents.remove(doc_id);
        self.progress.remove(doc_id);
        self.reveal_state
            .retain(|unit_id, _| doc_id_of_unit(unit_id) != Some(doc_id));
    }

    pub fn replace_tombstones(&mut self, tombstones: &[Tombstone]) {
        self.tombstones = tombstones
            .iter()
            .map(|t| (t.entity_id.clone(), t.clone()))
            .collect();
    }
}

/// Repository held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    data: Mutex<LibraryData>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing data
    pub fn with_data(data: LibraryData) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    /// Copy of the current data
    pub fn data(&self) -> LibraryData {
        self.data.lock().clone()
    }
}

impl Repository for MemoryRepository {
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
        self.data.lock().upsert_documents(documents);
        Ok(())
    }

    fn upsert_progress(&self, rows: &[Progress]) -> Result<()> {
        self.data.lock().upsert_progress(rows);
        Ok(())
    }

    fn upsert_reveal_states(&self, rows: &[RevealState]) -> Result<()> {
        self.data.lock().upsert_reveal_states(rows);
        Ok(())
    }

    fn upsert_vocabulary(&self, entries: &[VocabularyEntry]) -> Result<()> {
        self.data.lock().upsert_vocabulary(entries);
        Ok(())
    }

    fn delete_document_cascade(&self, doc_id: &str) -> Result<()> {
        self.data.lock().delete_document_cascade(doc_id);
        Ok(())
    }

    fn replace_tombstones(&self, tombstones: &[Tombstone]) -> Result<()> {
        self.data.lock().replace_tombstones(tombstones);
        Ok(())
    }
}
