//! Record-level merge
//!
//! One generic last-write-wins merge used for every entity collection:
//! documents, progress, reveal state, vocabulary and tombstones.
//!
//! ## Rules
//!
//! 1. Both sides are indexed by key; the result is the union of keys
//! 2. A key present on one side only keeps that side's record
//! 3. A key present on both sides keeps the record with the newer
//!    timestamp; local wins exact ties
//! 4. Records that came from the remote side (remote-only or remote newer)
//!    are reported in `new_to_local`
//!
//! Whole records are replaced; fields are never merged individually.
//! Output is ordered by key so that merging the same inputs twice yields
//! identical output.

pub mod tombstone;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{normalize_word, Document, Progress, RevealState, Tombstone, VocabularyEntry};

pub use tombstone::{merge_tombstones, TombstoneRegistry};

/// An entity that can take part in a merge
pub trait Mergeable: Clone {
    /// Identity key of the record
    fn merge_key(&self) -> String;

    /// Last-modified timestamp used to resolve conflicts
    fn modified_at(&self) -> DateTime<Utc>;
}

impl Mergeable for Document {
    fn merge_key(&self) -> String {
        self.id.clone()
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Mergeable for Progress {
    fn merge_key(&self) -> String {
        self.doc_id.clone()
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.last_read_at
    }
}

impl Mergeable for RevealState {
    fn merge_key(&self) -> String {
        self.unit_id.clone()
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Mergeable for VocabularyEntry {
    fn merge_key(&self) -> String {
        normalize_word(&self.word)
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Mergeable for Tombstone {
    fn merge_key(&self) -> String {
        self.entity_id.clone()
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.deleted_at
    }
}

/// How each key was resolved during a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Keys only present locally
    pub local_only: usize,
    /// Keys only present remotely
    pub remote_only: usize,
    /// Keys on both sides where the local record was newer
    pub local_newer: usize,
    /// Keys on both sides where the remote record was newer
    pub remote_newer: usize,
    /// Keys on both sides with identical timestamps (local kept)
    pub ties: usize,
}

impl MergeStats {
    /// Number of keys in the merged output
    pub fn total(&self) -> usize {
        self.local_only + self.remote_only + self.local_newer + self.remote_newer + self.ties
    }

    /// Number of records the local side has to take from the remote
    pub fn incoming(&self) -> usize {
        self.remote_only + self.remote_newer
    }

    /// Add another merge's counts into this one
    pub fn absorb(&mut self, other: MergeStats) {
        self.local_only += other.local_only;
        self.remote_only += other.remote_only;
        self.local_newer += other.local_newer;
        self.remote_newer += other.remote_newer;
        self.ties += other.ties;
    }
}

/// Result of merging two collections
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome<T> {
    /// Union of both sides, ordered by key
    pub merged: Vec<T>,
    /// Records the local side does not have yet (subset of `merged`)
    pub new_to_local: Vec<T>,
    /// Resolution counts
    pub stats: MergeStats,
}

/// Merge two collections of the same entity type
pub fn merge<T: Mergeable>(local: &[T], remote: &[T]) -> MergeOutcome<T> {
    merge_by(local, remote, T::merge_key, T::modified_at)
}

/// Merge two collections using explicit key and timestamp accessors
pub fn merge_by<T, K, M>(local: &[T], remote: &[T], key_of: K, modified_at: M) -> MergeOutcome<T>
where
    T: Clone,
    K: Fn(&T) -> String,
    M: Fn(&T) -> DateTime<Utc>,
{
    let local_index = index_by(local, &key_of, &modified_at);
    let mut remote_index = index_by(remote, &key_of, &modified_at);

    let mut stats = MergeStats::default();
    // key -> (winning record, came from remote)
    let mut resolved: BTreeMap<String, (&T, bool)> = BTreeMap::new();

    for (key, local_item) in local_index {
        let entry = match remote_index.remove(&key) {
            None => {
                stats.local_only += 1;
                (local_item, false)
            }
            Some(remote_item) => {
                let (l, r) = (modified_at(local_item), modified_at(remote_item));
                if l > r {
                    stats.local_newer += 1;
                    (local_item, false)
                } else if l == r {
                    stats.ties += 1;
                    (local_item, false)
                } else {
                    stats.remote_newer += 1;
                    (remote_item, true)
                }
            }
        };
        resolved.insert(key, entry);
    }

    for (key, remote_item) in remote_index {
        stats.remote_only += 1;
        resolved.insert(key, (remote_item, true));
    }

    let mut merged = Vec::with_capacity(resolved.len());
    let mut new_to_local = Vec::new();
    for (item, from_remote) in resolved.into_values() {
        if from_remote {
            new_to_local.push(item.clone());
        }
        merged.push(item.clone());
    }

    MergeOutcome {
        merged,
        new_to_local,
        stats,
    }
}

/// Index one side by key; duplicate keys collapse to the newest record
fn index_by<'a, T, K, M>(items: &'a [T], key_of: &K, modified_at: &M) -> BTreeMap<String, &'a T>
where
    K: Fn(&T) -> String,
    M: Fn(&T) -> DateTime<Utc>,
{
    let mut index: BTreeMap<String, &T> = BTreeMap::new();
    for item in items {
        let key = key_of(item);
        let keep_existing = index
            .get(&key)
            .is_some_and(|existing| modified_at(*existing) >= modified_at(item));
        if !keep_existing {
            index.insert(key, item);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    fn doc(id: &str, title: &str, updated: DateTime<Utc>) -> Document {
        let mut doc = Document::with_id(id, title, "", &[]);
        doc.created_at = updated;
        doc.updated_at = updated;
        doc
    }

    fn word(w: &str, definition: &str, updated: DateTime<Utc>) -> VocabularyEntry {
        let mut entry = VocabularyEntry::new(w);
        entry.definition = Some(definition.to_string());
        entry.created_at = updated;
        entry.updated_at = updated;
        entry
    }

    #[test]
    fn test_union_contains_every_key_once() {
        let local = vec![doc("a", "A", at(9, 0)), doc("b", "B", at(9, 0))];
        let remote = vec![doc("b", "B", at(9, 0)), doc("c", "C", at(9, 0))];

        let outcome = merge(&local, &remote);
        let ids: Vec<_> = outcome.merged.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(outcome.stats.local_only, 1);
        assert_eq!(outcome.stats.remote_only, 1);
        assert_eq!(outcome.stats.ties, 1);
        assert_eq!(outcome.stats.total(), 3);
    }

    #[test]
    fn test_local_only_is_not_new_to_local() {
        let local = vec![doc("d1", "Local", at(10, 0))];
        let outcome = merge(&local, &[]);
        assert_eq!(outcome.merged, local);
        assert!(outcome.new_to_local.is_empty());
    }

    #[test]
    fn test_remote_only_is_new_to_local() {
        let remote = vec![doc("d1", "Remote", at(10, 0))];
        let outcome = merge(&[], &remote);
        assert_eq!(outcome.merged, remote);
        assert_eq!(outcome.new_to_local, remote);
    }

    #[test]
    fn test_newer_side_wins() {
        let local = vec![doc("d1", "Local", at(10, 0)), doc("d2", "Local", at(12, 0))];
        let remote = vec![doc("d1", "Remote", at(11, 0)), doc("d2", "Remote", at(11, 0))];

        let outcome = merge(&local, &remote);
        assert_eq!(outcome.merged[0].title, "Remote");
        assert_eq!(outcome.merged[1].title, "Local");
        assert_eq!(outcome.new_to_local.len(), 1);
        assert_eq!(outcome.new_to_local[0].id, "d1");
        assert_eq!(outcome.stats.remote_newer, 1);
        assert_eq!(outcome.stats.local_newer, 1);
    }

    #[test]
    fn test_tie_prefers_local() {
        let local = vec![doc("d1", "Local", at(10, 0))];
        let remote = vec![doc("d1", "Remote", at(10, 0))];

        let outcome = merge(&local, &remote);
        assert_eq!(outcome.merged[0].title, "Local");
        assert!(outcome.new_to_local.is_empty());
    }

    #[test]
    fn test_vocabulary_remote_edit_wins() {
        let local = vec![word("ubiquitous", "local", at(10, 0))];
        let remote = vec![word("ubiquitous", "remote", at(10, 5))];

        let outcome = merge(&local, &remote);
        assert_eq!(outcome.merged.len(), 1);
        assert_eq!(outcome.merged[0].definition.as_deref(), Some("remote"));
        assert_eq!(outcome.new_to_local, remote);
    }

    #[test]
    fn test_vocabulary_keys_are_normalized() {
        let mut local_entry = word("Ubiquitous", "local", at(10, 0));
        local_entry.word = "Ubiquitous ".to_string();
        let remote = vec![word("ubiquitous", "remote", at(9, 0))];

        let outcome = merge(&[local_entry], &remote);
        assert_eq!(outcome.merged.len(), 1);
        assert_eq!(outcome.merged[0].definition.as_deref(), Some("local"));
    }

    #[test]
    fn test_duplicate_keys_on_one_side_keep_newest() {
        let remote = vec![doc("d1", "Old", at(8, 0)), doc("d1", "New", at(9, 0))];
        let outcome = merge(&[], &remote);
        assert_eq!(outcome.merged.len(), 1);
        assert_eq!(outcome.merged[0].title, "New");
    }

    #[test]
    fn test_merge_is_deterministic_and_idempotent() {
        let local = vec![doc("z", "Z", at(9, 0)), doc("a", "A", at(10, 0))];
        let remote = vec![doc("a", "A2", at(11, 0)), doc("m", "M", at(8, 0))];

        let first = merge(&local, &remote);
        let second = merge(&local, &remote);
        assert_eq!(first, second);

        // Merging the result with itself changes nothing
        let again = merge(&first.merged, &first.merged);
        assert_eq!(again.merged, first.merged);
        assert!(again.new_to_local.is_empty());
    }

    #[test]
    fn test_merge_by_with_custom_accessors() {
        let local = vec![("k".to_string(), at(10, 0), "local")];
        let remote = vec![("k".to_string(), at(11, 0), "remote")];

        let outcome = merge_by(&local, &remote, |t| t.0.clone(), |t| t.1);
        assert_eq!(outcome.merged[0].2, "remote");
    }

    #[test]
    fn test_stats_absorb() {
        let mut total = MergeStats::default();
        total.absorb(MergeStats {
            remote_only: 2,
            remote_newer: 1,
            ..Default::default()
        });
        total.absorb(MergeStats {
            local_only: 3,
            ..Default::default()
        });
        assert_eq!(total.incoming(), 3);
        assert_eq!(total.total(), 6);
    }
}
