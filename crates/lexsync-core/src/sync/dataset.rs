//! Datasets
//!
//! A dataset is a set of collections that travels as one remote snapshot.
//! Each dataset knows how to read itself from a [`Repository`], how to
//! reconcile a local and a remote snapshot, and how to apply the result back.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use tracing::debug;

use crate::merge::{merge, merge_tombstones, MergeStats, Mergeable, TombstoneRegistry};
use crate::models::{normalize_word, Document, Progress, RevealState, Tombstone, VocabularyEntry};
use crate::repository::Repository;
use crate::snapshot::{ArticleSnapshot, Snapshot, VocabularySnapshot};

/// Which dataset a cycle works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Articles,
    Vocabulary,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Articles => write!(f, "articles"),
            DatasetKind::Vocabulary => write!(f, "vocabulary"),
        }
    }
}

/// A synchronizable dataset
pub trait Dataset: Send + Sync + 'static {
    type Snapshot: Snapshot;
    type Report: Send + Sync + fmt::Debug;

    const KIND: DatasetKind;

    /// Read the local snapshot
    fn load<R: Repository + ?Sized>(repo: &R) -> Result<Self::Snapshot>;

    /// Merge local and remote into a report carrying the merged snapshot
    ///
    /// Pure: the same inputs always give the same merged collections.
    fn reconcile(
        local: &Self::Snapshot,
        remote: &Self::Snapshot,
        exported_at: DateTime<Utc>,
    ) -> Self::Report;

    /// Merged snapshot to write back
    fn merged(report: &Self::Report) -> &Self::Snapshot;

    /// Apply what the local side is missing
    fn apply<R: Repository + ?Sized>(repo: &R, report: &Self::Report) -> Result<()>;
}

/// Documents, progress, reveal state and tombstones
#[derive(Debug, Clone, Copy)]
pub struct Articles;

/// Vocabulary entries
#[derive(Debug, Clone, Copy)]
pub struct Vocabulary;

/// Records the local side needs to take from the remote
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleChanges {
    pub documents: Vec<Document>,
    pub progress: Vec<Progress>,
    pub reveal_state: Vec<RevealState>,
}

impl ArticleChanges {
    pub fn len(&self) -> usize {
        self.documents.len() + self.progress.len() + self.reveal_state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Totals for an articles cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleCounts {
    /// Documents in the merged snapshot
    pub documents: usize,
    /// Progress rows in the merged snapshot
    pub progress: usize,
    /// Reveal rows in the merged snapshot
    pub reveal_state: usize,
    /// Tombstones in the merged snapshot
    pub tombstones: usize,
    /// Documents removed because a tombstone dominates them
    pub deleted: usize,
    /// Progress or reveal rows dropped because their document is gone
    pub orphans_dropped: usize,
    /// Resolution counts across documents, progress and reveal state
    #[serde(skip)]
    pub stats: MergeStats,
}

/// Result of reconciling the articles dataset
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleReport {
    pub counts: ArticleCounts,
    pub new_to_local: ArticleChanges,
    /// Document ids to delete locally, with their progress and reveal rows
    pub deleted_to_apply: Vec<String>,
    /// Full merged tombstone set to store locally
    pub updated_tombstones: Vec<Tombstone>,
    pub snapshot: ArticleSnapshot,
}

/// Totals for a vocabulary cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyCounts {
    /// Entries in the merged snapshot
    pub entries: usize,
    #[serde(skip)]
    pub stats: MergeStats,
}

/// Result of reconciling the vocabulary dataset
#[derive(Debug, Clone, PartialEq)]
pub struct VocabularyReport {
    pub counts: VocabularyCounts,
    pub new_to_local: Vec<VocabularyEntry>,
    pub snapshot: VocabularySnapshot,
}

impl Dataset for Articles {
    type Snapshot = ArticleSnapshot;
    type Report = ArticleReport;

    const KIND: DatasetKind = DatasetKind::Articles;

    fn load<R: Repository + ?Sized>(repo: &R) -> Result<ArticleSnapshot> {
        Ok(ArticleSnapshot::from_parts(
            repo.documents()?,
            repo.progress()?,
            repo.reveal_states()?,
            repo.tombstones()?,
        ))
    }

    fn reconcile(
        local: &ArticleSnapshot,
        remote: &ArticleSnapshot,
        exported_at: DateTime<Utc>,
    ) -> ArticleReport {
        let registry = TombstoneRegistry::from_sides(&local.deleted, &remote.deleted);

        // Newest update per document across both sides
        let mut latest: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for doc in local.documents.iter().chain(remote.documents.iter()) {
            let entry = latest.entry(doc.id.as_str()).or_insert(doc.updated_at);
            if doc.updated_at > *entry {
                *entry = doc.updated_at;
            }
        }

        let dominated: BTreeSet<String> = registry
            .to_vec()
            .into_iter()
            .filter(|t| registry.dominates(&t.entity_id, latest.get(t.entity_id.as_str()).copied()))
            .map(|t| t.entity_id)
            .collect();

        let mut counts = ArticleCounts::default();

        let mut documents = merge(&local.documents, &remote.documents);
        counts.stats.absorb(documents.stats);
        let before = documents.merged.len();
        documents.merged.retain(|d| !dominated.contains(&d.id));
        documents.new_to_local.retain(|d| !dominated.contains(&d.id));
        counts.deleted = before - documents.merged.len();

        let surviving: BTreeSet<&str> = documents.merged.iter().map(|d| d.id.as_str()).collect();

        // Rows whose document is neither surviving nor deleted by a tombstone
        let is_orphan = |doc_id: Option<&str>| {
            doc_id.map_or(true, |id| !surviving.contains(id) && !dominated.contains(id))
        };

        let mut progress = merge(&local.progress, &remote.progress);
        counts.stats.absorb(progress.stats);
        counts.orphans_dropped += progress
            .merged
            .iter()
            .filter(|p| is_orphan(Some(p.doc_id.as_str())))
            .count();
        progress.merged.retain(|p| surviving.contains(p.doc_id.as_str()));
        progress.new_to_local.retain(|p| surviving.contains(p.doc_id.as_str()));

        let mut reveal = merge(&local.reveal_state, &remote.reveal_state);
        counts.stats.absorb(reveal.stats);
        counts.orphans_dropped += reveal
            .merged
            .iter()
            .filter(|r| is_orphan(r.doc_id()))
            .count();
        let keep_reveal = |r: &RevealState| r.doc_id().is_some_and(|id| surviving.contains(id));
        reveal.merged.retain(keep_reveal);
        reveal.new_to_local.retain(keep_reveal);

        let deleted_to_apply: Vec<String> = dominated
            .iter()
            .filter(|id| appears_in(local, id) || appears_in(remote, id))
            .cloned()
            .collect();

        let updated_tombstones = registry.to_vec();

        counts.documents = documents.merged.len();
        counts.progress = progress.merged.len();
        counts.reveal_state = reveal.merged.len();
        counts.tombstones = updated_tombstones.len();

        let mut snapshot = ArticleSnapshot {
            documents: documents.merged,
            progress: progress.merged,
            reveal_state: reveal.merged,
            deleted: updated_tombstones.clone(),
            ..ArticleSnapshot::default()
        };
        snapshot.stamp(exported_at);

        ArticleReport {
            counts,
            new_to_local: ArticleChanges {
                documents: documents.new_to_local,
                progress: progress.new_to_local,
                reveal_state: reveal.new_to_local,
            },
            deleted_to_apply,
            updated_tombstones,
            snapshot,
        }
    }

    fn merged(report: &ArticleReport) -> &ArticleSnapshot {
        &report.snapshot
    }

    /// Apply the report against what the repository holds now
    ///
    /// The repository isn't locked during a cycle, so local edits and
    /// deletions made meanwhile must survive: incoming rows only replace
    /// older local rows, and tombstones are merged rather than replaced.
    fn apply<R: Repository + ?Sized>(repo: &R, report: &ArticleReport) -> Result<()> {
        let tombstones = merge_tombstones(&repo.tombstones()?, &report.updated_tombstones);
        let registry = TombstoneRegistry::from_merged(&tombstones);
        let current = repo.documents()?;

        let mut latest: HashMap<String, DateTime<Utc>> = current
            .iter()
            .map(|d| (d.id.clone(), d.updated_at))
            .collect();
        for doc in &report.new_to_local.documents {
            let entry = latest.entry(doc.id.clone()).or_insert(doc.updated_at);
            if doc.updated_at > *entry {
                *entry = doc.updated_at;
            }
        }
        let dominated = |doc_id: &str| registry.dominates(doc_id, latest.get(doc_id).copied());

        for doc_id in &report.deleted_to_apply {
            if dominated(doc_id.as_str()) {
                repo.delete_document_cascade(doc_id)?;
            } else {
                debug!("Document {} changed locally during sync, keeping it", doc_id);
            }
        }

        let changes = &report.new_to_local;
        let documents: Vec<Document> = newer_than(&changes.documents, &current)
            .into_iter()
            .filter(|d| !dominated(d.id.as_str()))
            .collect();
        if !documents.is_empty() {
            repo.upsert_documents(&documents)?;
        }

        let progress: Vec<Progress> = newer_than(&changes.progress, &repo.progress()?)
            .into_iter()
            .filter(|p| !dominated(p.doc_id.as_str()))
            .collect();
        if !progress.is_empty() {
            repo.upsert_progress(&progress)?;
        }

        let reveal: Vec<RevealState> = newer_than(&changes.reveal_state, &repo.reveal_states()?)
            .into_iter()
            .filter(|r| r.doc_id().is_some_and(|id| !dominated(id)))
            .collect();
        if !reveal.is_empty() {
            repo.upsert_reveal_states(&reveal)?;
        }

        repo.replace_tombstones(&tombstones)
    }
}

/// Incoming records strictly newer than the current local copy
fn newer_than<T: Mergeable>(incoming: &[T], current: &[T]) -> Vec<T> {
    let current: HashMap<String, DateTime<Utc>> = current
        .iter()
        .map(|r| (r.merge_key(), r.modified_at()))
        .collect();
    incoming
        .iter()
        .filter(|r| {
            current
                .get(&r.merge_key())
                .map_or(true, |at| r.modified_at() > *at)
        })
        .cloned()
        .collect()
}

/// Whether any collection of the snapshot references the document
fn appears_in(snapshot: &ArticleSnapshot, doc_id: &str) -> bool {
    snapshot.documents.iter().any(|d| d.id == doc_id)
        || snapshot.progress.iter().any(|p| p.doc_id == doc_id)
        || snapshot
            .reveal_state
            .iter()
            .any(|r| r.doc_id() == Some(doc_id))
}

impl Dataset for Vocabulary {
    type Snapshot = VocabularySnapshot;
    type Report = VocabularyReport;

    const KIND: DatasetKind = DatasetKind::Vocabulary;

    fn load<R: Repository + ?Sized>(repo: &R) -> Result<VocabularySnapshot> {
        Ok(VocabularySnapshot::from_entries(repo.vocabulary()?))
    }

    fn reconcile(
        local: &VocabularySnapshot,
        remote: &VocabularySnapshot,
        exported_at: DateTime<Utc>,
    ) -> VocabularyReport {
        let mut outcome = merge(&local.vocabulary, &remote.vocabulary);
        for entry in outcome.merged.iter_mut().chain(outcome.new_to_local.iter_mut()) {
            entry.word = normalize_word(&entry.word);
        }

        let counts = VocabularyCounts {
            entries: outcome.merged.len(),
            stats: outcome.stats,
        };
        let mut snapshot = VocabularySnapshot {
            vocabulary: outcome.merged,
            ..VocabularySnapshot::default()
        };
        snapshot.stamp(exported_at);

        VocabularyReport {
            counts,
            new_to_local: outcome.new_to_local,
            snapshot,
        }
    }

    fn merged(report: &VocabularyReport) -> &VocabularySnapshot {
        &report.snapshot
    }

    fn apply<R: Repository + ?Sized>(repo: &R, report: &VocabularyReport) -> Result<()> {
        let entries = newer_than(&report.new_to_local, &repo.vocabulary()?);
        if entries.is_empty() {
            return Ok(());
        }
        repo.upsert_vocabulary(&entries)
    }
}
