//! Snapshot envelopes
//!
//! A snapshot is the complete state of one dataset as stored in a single
//! remote document. Two envelopes exist:
//!
//! ```text
//! articles:   { version, exportedAt, documents, progress, revealState, deleted }
//! vocabulary: { version, exportedAt, vocabulary }
//! ```
//!
//! Decoding validates the envelope shape before typed deserialization so a
//! malformed payload is rejected as a whole instead of half-read.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Document, Progress, RevealState, Tombstone, VocabularyEntry};

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors raised while reading a snapshot payload
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Payload is not valid JSON or an entity has the wrong shape
    #[error("Malformed snapshot: {0}")]
    Malformed(String),

    /// Payload is not a JSON object
    #[error("Snapshot payload is not an object")]
    NotAnObject,

    /// A required field is absent
    #[error("Snapshot is missing required field '{0}'")]
    MissingField(&'static str),

    /// A field has an unexpected JSON type
    #[error("Snapshot field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    /// Written by a newer schema than this build understands
    #[error("Snapshot version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u64, supported: u32 },

    /// Serialization failed
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Common behaviour of snapshot envelopes
pub trait Snapshot: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Names of the array fields the envelope must carry
    const COLLECTIONS: &'static [&'static str];

    /// Schema version of this snapshot
    fn version(&self) -> u32;

    /// Restamp the envelope for writing
    fn stamp(&mut self, exported_at: DateTime<Utc>);

    /// Serialize for the remote store
    fn encode(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a payload; empty content is an empty snapshot
    fn decode(content: &str) -> Result<Self, SnapshotError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value =
            serde_json::from_str(content).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
        validate_envelope(&value, Self::COLLECTIONS)?;

        serde_json::from_value(value).map_err(|e| SnapshotError::Malformed(e.to_string()))
    }
}

fn validate_envelope(value: &Value, collections: &[&'static str]) -> Result<(), SnapshotError> {
    let object = value.as_object().ok_or(SnapshotError::NotAnObject)?;

    let version = object
        .get("version")
        .ok_or(SnapshotError::MissingField("version"))?
        .as_u64()
        .ok_or(SnapshotError::WrongType {
            field: "version",
            expected: "a non-negative integer",
        })?;
    if version > u64::from(SNAPSHOT_VERSION) {
        return Err(SnapshotError::UnsupportedVersion {
            found: version,
            supported: SNAPSHOT_VERSION,
        });
    }

    for &field in collections {
        match object.get(field) {
            None => return Err(SnapshotError::MissingField(field)),
            Some(Value::Array(_)) => {}
            Some(_) => {
                return Err(SnapshotError::WrongType {
                    field,
                    expected: "an array",
                })
            }
        }
    }

    Ok(())
}

/// Articles dataset: documents with their progress, reveal state and tombstones
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub documents: Vec<Document>,
    pub progress: Vec<Progress>,
    pub reveal_state: Vec<RevealState>,
    pub deleted: Vec<Tombstone>,
}

impl Default for ArticleSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: DateTime::<Utc>::default(),
            documents: Vec::new(),
            progress: Vec::new(),
            reveal_state: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

impl ArticleSnapshot {
    /// Assemble a snapshot from local collections
    pub fn from_parts(
        documents: Vec<Document>,
        progress: Vec<Progress>,
        reveal_state: Vec<RevealState>,
        deleted: Vec<Tombstone>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            documents,
            progress,
            reveal_state,
            deleted,
        }
    }

    /// True if the snapshot carries no records at all
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
            && self.progress.is_empty()
            && self.reveal_state.is_empty()
            && self.deleted.is_empty()
    }
}

impl Snapshot for ArticleSnapshot {
    const COLLECTIONS: &'static [&'static str] =
        &["documents", "progress", "revealState", "deleted"];

    fn version(&self) -> u32 {
        self.version
    }

    fn stamp(&mut self, exported_at: DateTime<Utc>) {
        self.version = SNAPSHOT_VERSION;
        self.exported_at = exported_at;
    }
}

/// Vocabulary dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VocabularySnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub vocabulary: Vec<VocabularyEntry>,
}

impl Default for VocabularySnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: DateTime::<Utc>::default(),
            vocabulary: Vec::new(),
        }
    }
}

impl VocabularySnapshot {
    /// Assemble a snapshot from local entries
    pub fn from_entries(vocabulary: Vec<VocabularyEntry>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            vocabulary,
        }
    }
}

impl Snapshot for VocabularySnapshot {
    const COLLECTIONS: &'static [&'static str] = &["vocabulary"];

    fn version(&self) -> u32 {
        self.version
    }

    fn stamp(&mut self, exported_at: DateTime<Utc>) {
        self.version = SNAPSHOT_VERSION;
        self.exported_at = exported_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_is_empty_snapshot() {
        let snapshot = ArticleSnapshot::decode("  \n").unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn test_encode_uses_wire_field_names() {
        let mut snapshot = ArticleSnapshot::default();
        snapshot.deleted.push(Tombstone::new("d1"));
        let json: Value = serde_json::from_str(&snapshot.encode().unwrap()).unwrap();

        for field in ["version", "exportedAt", "documents", "progress", "revealState", "deleted"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["deleted"][0]["entityId"], "d1");
    }

    #[test]
    fn test_decode_round_trip() {
        let mut snapshot = VocabularySnapshot::from_entries(vec![VocabularyEntry::new("word")]);
        snapshot.stamp(Utc::now());
        let decoded = VocabularySnapshot::decode(&snapshot.encode().unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_missing_array_is_rejected() {
        let content = r#"{"version": 1, "exportedAt": "2024-01-01T00:00:00Z",
            "documents": [], "progress": [], "deleted": []}"#;
        let err = ArticleSnapshot::decode(content).unwrap_err();
        assert!(matches!(err, SnapshotError::MissingField("revealState")));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let content = r#"{"version": 1, "exportedAt": "2024-01-01T00:00:00Z", "vocabulary": {}}"#;
        let err = VocabularySnapshot::decode(content).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::WrongType {
                field: "vocabulary",
                ..
            }
        ));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let content = r#"{"version": 9, "exportedAt": "2024-01-01T00:00:00Z", "vocabulary": []}"#;
        let err = VocabularySnapshot::decode(content).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion { found: 9, .. }));
    }

    #[test]
    fn test_non_object_and_garbage_are_rejected() {
        assert!(matches!(
            VocabularySnapshot::decode("[1, 2]").unwrap_err(),
            SnapshotError::NotAnObject
        ));
        assert!(matches!(
            VocabularySnapshot::decode("{not json").unwrap_err(),
            SnapshotError::Malformed(_)
        ));
    }

    #[test]
    fn test_malformed_entity_is_rejected() {
        let content = r#"{"version": 1, "exportedAt": "2024-01-01T00:00:00Z",
            "vocabulary": [{"word": 42}]}"#;
        assert!(matches!(
            VocabularySnapshot::decode(content).unwrap_err(),
            SnapshotError::Malformed(_)
        ));
    }
}
