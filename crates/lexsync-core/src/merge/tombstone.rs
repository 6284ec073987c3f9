//! Tombstone registry
//!
//! Tombstones are merged like any other collection (union by entity id, the
//! later `deleted_at` wins). The registry then decides, per entity id,
//! whether a deletion dominates the surviving copies of that entity.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::merge;
use crate::models::Tombstone;

/// Merge local and remote tombstones
///
/// Tombstones without a surviving entity on either side are kept so the
/// deletion keeps propagating to devices that still hold the entity.
pub fn merge_tombstones(local: &[Tombstone], remote: &[Tombstone]) -> Vec<Tombstone> {
    merge(local, remote).merged
}

/// Merged tombstones indexed by entity id
#[derive(Debug, Clone, Default)]
pub struct TombstoneRegistry {
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl TombstoneRegistry {
    /// Build the registry from both sides' tombstones
    pub fn from_sides(local: &[Tombstone], remote: &[Tombstone]) -> Self {
        Self::from_merged(&merge_tombstones(local, remote))
    }

    /// Build the registry from an already merged set
    pub fn from_merged(tombstones: &[Tombstone]) -> Self {
        let entries = tombstones
            .iter()
            .map(|t| (t.entity_id.clone(), t.deleted_at))
            .collect();
        Self { entries }
    }

    /// Deletion time recorded for an entity
    pub fn deleted_at(&self, entity_id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(entity_id).copied()
    }

    /// Whether an entity is deleted given its newest known modification
    ///
    /// `latest_update` is the newer of the local and remote timestamps of the
    /// entity, or `None` when neither side still holds it. A deletion at the
    /// same instant as the last update dominates.
    pub fn dominates(&self, entity_id: &str, latest_update: Option<DateTime<Utc>>) -> bool {
        match (self.deleted_at(entity_id), latest_update) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(deleted_at), Some(updated_at)) => deleted_at >= updated_at,
        }
    }

    /// Merged tombstones, ordered by entity id
    pub fn to_vec(&self) -> Vec<Tombstone> {
        self.entries
            .iter()
            .map(|(id, deleted_at)| Tombstone::at(id.clone(), *deleted_at))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_merge_keeps_later_deletion() {
        let local = vec![Tombstone::at("d1", at(10)), Tombstone::at("d2", at(9))];
        let remote = vec![Tombstone::at("d1", at(12)), Tombstone::at("d3", at(8))];

        let merged = merge_tombstones(&local, &remote);
        assert_eq!(
            merged,
            vec![
                Tombstone::at("d1", at(12)),
                Tombstone::at("d2", at(9)),
                Tombstone::at("d3", at(8)),
            ]
        );
    }

    #[test]
    fn test_dominance() {
        let registry = TombstoneRegistry::from_sides(&[Tombstone::at("d1", at(12))], &[]);

        // Deleted after the last edit
        assert!(registry.dominates("d1", Some(at(11))));
        // Deleted at the same instant as the last edit
        assert!(registry.dominates("d1", Some(at(12))));
        // Edited after the deletion: the entity survives
        assert!(!registry.dominates("d1", Some(at(13))));
        // No surviving copy anywhere
        assert!(registry.dominates("d1", None));
        // No tombstone
        assert!(!registry.dominates("d2", Some(at(1))));
    }

    #[test]
    fn test_registry_round_trips_to_vec() {
        let tombstones = vec![Tombstone::at("a", at(1)), Tombstone::at("b", at(2))];
        let registry = TombstoneRegistry::from_merged(&tombstones);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.to_vec(), tombstones);
    }
}
