//! Library operations
//!
//! The `Library` is the entry point for local edits. Every write goes
//! through the injected [`Repository`] and stamps the timestamps the sync
//! engine resolves conflicts with.
//!
//! ## Usage
//!
//! ```ignore
//! let library = Library::new(Arc::new(JsonFileRepository::open(&config)?));
//!
//! let doc = library.import_document("Article", &text)?;
//! library.record_progress(&doc.id, 3)?;
//! library.add_word("ubiquitous", Some("found everywhere".into()), None, Some(&doc.id))?;
//! ```

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::models::{
    doc_id_of_unit, normalize_word, Document, Progress, RevealState, Tombstone, VocabularyEntry,
};
use crate::repository::Repository;

/// Highest disclosure level of a unit
pub const MAX_REVEAL_LEVEL: u8 = 3;

/// Record counts of the local library
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub documents: usize,
    pub progress: usize,
    pub reveal_states: usize,
    pub vocabulary: usize,
    pub mastered: usize,
    pub tombstones: usize,
}

/// Local library backed by a repository
pub struct Library<R: ?Sized> {
    repo: Arc<R>,
}

impl<R: Repository + ?Sized> Library<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Shared handle to the repository (for the sync engine)
    pub fn repository(&self) -> Arc<R> {
        Arc::clone(&self.repo)
    }

    // ==================== Document Operations ====================

    /// Import text as a new document with a fresh progress row
    pub fn import_document(&self, title: &str, content: &str) -> Result<Document> {
        let title = title.trim();
        if title.is_empty() {
            bail!("Document title cannot be empty");
        }

        let segments = split_paragraphs(content);
        let doc = Document::new(title, content, &segments);

        self.repo
            .upsert_documents(std::slice::from_ref(&doc))
            .context("Failed to save document")?;
        self.repo
            .upsert_progress(&[Progress::new(doc.id.clone())])
            .context("Failed to create progress")?;

        debug!("Imported document {} ({} units)", doc.id, doc.units.len());
        Ok(doc)
    }

    /// Get a document by id
    pub fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.repo.documents()?.into_iter().find(|d| d.id == id))
    }

    /// All documents, most recently updated first
    pub fn list_documents(&self) -> Result<Vec<Document>> {
        let mut docs = self.repo.documents().context("Failed to get documents")?;
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(docs)
    }

    /// Resolve a full id or unique id prefix to a document id
    pub fn resolve_document_id(&self, id_or_prefix: &str) -> Result<String> {
        let docs = self.repo.documents()?;
        if docs.iter().any(|d| d.id == id_or_prefix) {
            return Ok(id_or_prefix.to_string());
        }

        let matches: Vec<&Document> = docs
            .iter()
            .filter(|d| d.id.starts_with(id_or_prefix))
            .collect();
        match matches.as_slice() {
            [] => bail!("Document not found: {}", id_or_prefix),
            [doc] => Ok(doc.id.clone()),
            _ => bail!(
                "Ambiguous id prefix '{}' matches {} documents",
                id_or_prefix,
                matches.len()
            ),
        }
    }

    /// Change a document's title
    pub fn rename_document(&self, id: &str, title: &str) -> Result<Document> {
        let mut doc = self.require_document(id)?;
        doc.set_title(title.trim());
        self.repo
            .upsert_documents(std::slice::from_ref(&doc))
            .context("Failed to update document")?;
        Ok(doc)
    }

    /// Delete a document with its progress and reveal state
    ///
    /// Leaves a tombstone so the deletion reaches other devices. Returns
    /// `false` if the document didn't exist.
    pub fn delete_document(&self, id: &str) -> Result<bool> {
        if self.get_document(id)?.is_none() {
            return Ok(false);
        }

        let mut tombstones = self.repo.tombstones()?;
        tombstones.retain(|t| t.entity_id != id);
        tombstones.push(Tombstone::new(id));

        self.repo
            .replace_tombstones(&tombstones)
            .context("Failed to record deletion")?;
        self.repo
            .delete_document_cascade(id)
            .context("Failed to delete document")?;
        debug!("Deleted document {}", id);
        Ok(true)
    }

    // ==================== Reading Operations ====================

    /// Move the reader to a unit of a document
    pub fn record_progress(&self, doc_id: &str, unit_index: u32) -> Result<Progress> {
        let doc = self.require_document(doc_id)?;
        let mut progress = self
            .get_progress(doc_id)?
            .unwrap_or_else(|| Progress::new(doc_id));

        if !progress.advance_to(&doc, unit_index) {
            bail!(
                "Unit {} out of range (document has {} units)",
                unit_index,
                doc.units.len()
            );
        }

        self.repo
            .upsert_progress(std::slice::from_ref(&progress))
            .context("Failed to save progress")?;
        Ok(progress)
    }

    /// Progress of a document
    pub fn get_progress(&self, doc_id: &str) -> Result<Option<Progress>> {
        Ok(self.repo.progress()?.into_iter().find(|p| p.doc_id == doc_id))
    }

    /// Set the disclosure level of a unit
    pub fn set_reveal_level(&self, unit_id: &str, level: u8) -> Result<RevealState> {
        if level > MAX_REVEAL_LEVEL {
            bail!("Reveal level must be between 0 and {}", MAX_REVEAL_LEVEL);
        }
        let Some(doc_id) = doc_id_of_unit(unit_id) else {
            bail!("Invalid unit id: {}", unit_id);
        };
        let doc = self.require_document(doc_id)?;
        if !doc.units.iter().any(|u| u.id == unit_id) {
            bail!("Unit not found: {}", unit_id);
        }

        let state = match self
            .repo
            .reveal_states()?
            .into_iter()
            .find(|r| r.unit_id == unit_id)
        {
            Some(mut existing) => {
                existing.set_level(level);
                existing
            }
            None => RevealState::new(unit_id, level),
        };

        self.repo
            .upsert_reveal_states(std::slice::from_ref(&state))
            .context("Failed to save reveal state")?;
        Ok(state)
    }

    /// Reveal states of a document's units
    pub fn reveal_states_for(&self, doc_id: &str) -> Result<Vec<RevealState>> {
        Ok(self
            .repo
            .reveal_states()?
            .into_iter()
            .filter(|r| r.doc_id() == Some(doc_id))
            .collect())
    }

    // ==================== Vocabulary Operations ====================

    /// Save a word, or update it if already saved
    pub fn add_word(
        &self,
        word: &str,
        definition: Option<String>,
        context: Option<String>,
        source_doc_id: Option<&str>,
    ) -> Result<VocabularyEntry> {
        let key = normalize_word(word);
        if key.is_empty() {
            bail!("Word cannot be empty");
        }

        let mut entry = self
            .get_word(&key)?
            .unwrap_or_else(|| VocabularyEntry::new(&key));
        if definition.is_some() {
            entry.set_definition(definition);
        }
        if context.is_some() {
            entry.set_context(context, source_doc_id.map(str::to_string));
        }

        self.repo
            .upsert_vocabulary(std::slice::from_ref(&entry))
            .context("Failed to save word")?;
        Ok(entry)
    }

    /// Look up a word by any spelling that normalizes to it
    pub fn get_word(&self, word: &str) -> Result<Option<VocabularyEntry>> {
        let key = normalize_word(word);
        Ok(self.repo.vocabulary()?.into_iter().find(|e| e.word == key))
    }

    /// All saved words, alphabetically
    pub fn list_words(&self) -> Result<Vec<VocabularyEntry>> {
        let mut words = self.repo.vocabulary().context("Failed to get vocabulary")?;
        words.sort_by(|a, b| a.word.cmp(&b.word));
        Ok(words)
    }

    /// Mark a saved word as learned
    pub fn mark_mastered(&self, word: &str) -> Result<VocabularyEntry> {
        let mut entry = self.require_word(word)?;
        entry.set_mastered(true);
        self.repo
            .upsert_vocabulary(std::slice::from_ref(&entry))
            .context("Failed to save word")?;
        Ok(entry)
    }

    /// Record a spaced-repetition review (quality 0-5)
    pub fn review_word(&self, word: &str, quality: u8) -> Result<VocabularyEntry> {
        let mut entry = self.require_word(word)?;
        entry.record_review(quality);
        self.repo
            .upsert_vocabulary(std::slice::from_ref(&entry))
            .context("Failed to save review")?;
        Ok(entry)
    }

    // ==================== Statistics ====================

    pub fn stats(&self) -> Result<LibraryStats> {
        let vocabulary = self.repo.vocabulary()?;
        Ok(LibraryStats {
            documents: self.repo.documents()?.len(),
            progress: self.repo.progress()?.len(),
            reveal_states: self.repo.reveal_states()?.len(),
            mastered: vocabulary.iter().filter(|e| e.mastered).count(),
            vocabulary: vocabulary.len(),
            tombstones: self.repo.tombstones()?.len(),
        })
    }

    fn require_document(&self, id: &str) -> Result<Document> {
        self.get_document(id)?
            .with_context(|| format!("Document not found: {}", id))
    }

    fn require_word(&self, word: &str) -> Result<VocabularyEntry> {
        self.get_word(word)?
            .with_context(|| format!("Word not saved: {}", normalize_word(word)))
    }
}

/// Split text into paragraphs separated by blank lines
pub fn split_paragraphs(content: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn library() -> Library<MemoryRepository> {
        Library::new(Arc::new(MemoryRepository::new()))
    }

    const TEXT: &str = "First paragraph\nstill first.\n\nSecond.\n\n\nThird.";

    #[test]
    fn test_split_paragraphs() {
        assert_eq!(
            split_paragraphs(TEXT),
            vec!["First paragraph still first.", "Second.", "Third."]
        );
        assert!(split_paragraphs("  \n\n ").is_empty());
    }

    #[test]
    fn test_import_creates_document_and_progress() {
        let library = library();
        let doc = library.import_document("  Article ", TEXT).unwrap();

        assert_eq!(doc.title, "Article");
        assert_eq!(doc.units.len(), 3);
        assert_eq!(doc.units[1].id, format!("{}:1", doc.id));

        let progress = library.get_progress(&doc.id).unwrap().unwrap();
        assert_eq!(progress.percentage, 0.0);
        assert!(library.import_document(" ", TEXT).is_err());
    }

    #[test]
    fn test_delete_leaves_tombstone_and_cascades() {
        let library = library();
        let doc = library.import_document("Article", TEXT).unwrap();
        library.set_reveal_level(&doc.units[0].id, 2).unwrap();

        assert!(library.delete_document(&doc.id).unwrap());
        assert!(!library.delete_document(&doc.id).unwrap());

        let repo = library.repository();
        let data = repo.data();
        assert!(data.documents.is_empty());
        assert!(data.progress.is_empty());
        assert!(data.reveal_state.is_empty());
        assert!(data.tombstones.contains_key(&doc.id));
    }

    #[test]
    fn test_record_progress() {
        let library = library();
        let doc = library.import_document("Article", TEXT).unwrap();

        let progress = library.record_progress(&doc.id, 2).unwrap();
        assert_eq!(progress.percentage, 100.0);
        assert_eq!(progress.current_unit_id, Some(format!("{}:2", doc.id)));

        assert!(library.record_progress(&doc.id, 7).is_err());
        assert!(library.record_progress("missing", 0).is_err());
    }

    #[test]
    fn test_set_reveal_level() {
        let library = library();
        let doc = library.import_document("Article", TEXT).unwrap();
        let unit_id = doc.units[1].id.clone();

        library.set_reveal_level(&unit_id, 1).unwrap();
        let state = library.set_reveal_level(&unit_id, 3).unwrap();
        assert_eq!(state.level, 3);
        assert_eq!(library.reveal_states_for(&doc.id).unwrap().len(), 1);

        assert!(library.set_reveal_level(&unit_id, MAX_REVEAL_LEVEL + 1).is_err());
        assert!(library.set_reveal_level(&format!("{}:9", doc.id), 1).is_err());
        assert!(library.set_reveal_level("nounit", 1).is_err());
    }

    #[test]
    fn test_add_word_upserts_by_normalized_form() {
        let library = library();
        library.add_word("  Hola ", None, None, None).unwrap();
        let entry = library
            .add_word("HOLA", Some("hello".into()), Some("Hola, amigo".into()), Some("d1"))
            .unwrap();

        assert_eq!(entry.word, "hola");
        assert_eq!(entry.definition.as_deref(), Some("hello"));
        assert_eq!(entry.source_doc_id.as_deref(), Some("d1"));
        assert_eq!(library.list_words().unwrap().len(), 1);
        assert!(library.add_word("   ", None, None, None).is_err());
    }

    #[test]
    fn test_mark_mastered_and_review() {
        let library = library();
        library.add_word("ubiquitous", None, None, None).unwrap();

        let entry = library.mark_mastered("Ubiquitous").unwrap();
        assert!(entry.mastered);

        let reviewed = library.review_word("ubiquitous", 5).unwrap();
        assert_eq!(reviewed.review_count, 1);

        assert!(library.mark_mastered("unknown").is_err());
        assert_eq!(library.stats().unwrap().mastered, 1);
    }

    #[test]
    fn test_resolve_document_id() {
        let library = library();
        let doc = library.import_document("Article", TEXT).unwrap();

        assert_eq!(library.resolve_document_id(&doc.id).unwrap(), doc.id);
        assert_eq!(library.resolve_document_id(&doc.id[..8]).unwrap(), doc.id);
        assert!(library.resolve_document_id("zzzz-not-there").is_err());
    }

    #[test]
    fn test_list_documents_newest_first() {
        let library = library();
        let first = library.import_document("First", "a").unwrap();
        let second = library.import_document("Second", "b").unwrap();
        library.rename_document(&first.id, "First, renamed").unwrap();

        let docs = library.list_documents().unwrap();
        assert_eq!(docs[0].id, first.id);
        assert_eq!(docs[1].id, second.id);
        assert_eq!(docs[0].title, "First, renamed");
    }
}
