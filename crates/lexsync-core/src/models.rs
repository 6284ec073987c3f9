//! Data models for lexsync
//!
//! Defines the entities the sync engine reconciles: documents with their
//! segmented units, reading progress, reveal state, vocabulary entries and
//! tombstones. Field names are serialized in camelCase to match the snapshot
//! payload exchanged with the remote store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Separator between the owning document id and the unit index in a unit id
pub const UNIT_ID_SEPARATOR: char = ':';

/// Starting ease factor for a new vocabulary entry
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Lowest ease factor a review can push an entry down to
const MIN_EASE_FACTOR: f64 = 1.3;

/// A segment of a document (sentence or paragraph)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// Composite id: `{doc_id}:{index}`
    pub id: String,
    /// Position within the document
    pub index: u32,
    /// Unit text
    pub text: String,
}

impl Unit {
    /// Create a unit belonging to the given document
    pub fn new(doc_id: &str, index: u32, text: impl Into<String>) -> Self {
        Self {
            id: Self::compose_id(doc_id, index),
            index,
            text: text.into(),
        }
    }

    /// Build the stable composite id for a unit
    pub fn compose_id(doc_id: &str, index: u32) -> String {
        format!("{}{}{}", doc_id, UNIT_ID_SEPARATOR, index)
    }
}

/// Extract the owning document id from a unit id
///
/// Document ids are opaque and may themselves contain the separator, so only
/// the last one is significant.
pub fn doc_id_of_unit(unit_id: &str) -> Option<&str> {
    unit_id
        .rsplit_once(UNIT_ID_SEPARATOR)
        .map(|(doc_id, _)| doc_id)
        .filter(|doc_id| !doc_id.is_empty())
}

/// An imported reading document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Full original text
    pub content: String,
    /// Segmented units, in reading order
    #[serde(default)]
    pub units: Vec<Unit>,
    /// When this document was imported
    pub created_at: DateTime<Utc>,
    /// When this document was last modified
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document from already segmented text
    pub fn new(title: impl Into<String>, content: impl Into<String>, segments: &[String]) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, content, segments)
    }

    /// Create a document with a specific ID (for loading from storage)
    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        segments: &[String],
    ) -> Self {
        let id = id.into();
        let now = Utc::now();
        let units = build_units(&id, segments);
        Self {
            id,
            title: title.into(),
            content: content.into(),
            units,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the title
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.updated_at = Utc::now();
    }

    /// Replace content and its segmentation
    pub fn set_content(&mut self, content: impl Into<String>, segments: &[String]) {
        self.content = content.into();
        self.units = build_units(&self.id, segments);
        self.updated_at = Utc::now();
    }

    /// Look up a unit by index
    pub fn unit(&self, index: u32) -> Option<&Unit> {
        self.units.iter().find(|u| u.index == index)
    }
}

fn build_units(doc_id: &str, segments: &[String]) -> Vec<Unit> {
    segments
        .iter()
        .enumerate()
        .map(|(i, text)| Unit::new(doc_id, i as u32, text.clone()))
        .collect()
}

/// Reading progress for one document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// The document this progress belongs to
    pub doc_id: String,
    /// Unit the reader is currently on
    #[serde(default)]
    pub current_unit_id: Option<String>,
    /// Completion percentage (0-100)
    pub percentage: f64,
    /// When the reader last navigated
    pub last_read_at: DateTime<Utc>,
}

impl Progress {
    /// Fresh progress row, created when a document is imported
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            current_unit_id: None,
            percentage: 0.0,
            last_read_at: Utc::now(),
        }
    }

    /// Record a navigation step
    pub fn record(&mut self, unit_id: impl Into<String>, percentage: f64) {
        self.current_unit_id = Some(unit_id.into());
        self.percentage = percentage.clamp(0.0, 100.0);
        self.last_read_at = Utc::now();
    }

    /// Move to a unit of the given document, deriving the percentage
    pub fn advance_to(&mut self, doc: &Document, unit_index: u32) -> bool {
        let Some(unit) = doc.unit(unit_index) else {
            return false;
        };
        let total = doc.units.len().max(1) as f64;
        let percentage = (f64::from(unit.index) + 1.0) / total * 100.0;
        self.record(unit.id.clone(), percentage);
        true
    }
}

/// Progressive-disclosure state of a single unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RevealState {
    /// Composite unit id (prefixed by its document id)
    pub unit_id: String,
    /// Disclosure stage
    pub level: u8,
    /// When the level last changed
    pub updated_at: DateTime<Utc>,
}

impl RevealState {
    /// Create a reveal state at the given level
    pub fn new(unit_id: impl Into<String>, level: u8) -> Self {
        Self {
            unit_id: unit_id.into(),
            level,
            updated_at: Utc::now(),
        }
    }

    /// Owning document id
    pub fn doc_id(&self) -> Option<&str> {
        doc_id_of_unit(&self.unit_id)
    }

    /// Change the disclosure level
    pub fn set_level(&mut self, level: u8) {
        if self.level != level {
            self.level = level;
            self.updated_at = Utc::now();
        }
    }
}

/// Normalize a word into its identity key
///
/// Trims, collapses inner whitespace and lowercases.
pub fn normalize_word(word: &str) -> String {
    word.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn default_ease_factor() -> f64 {
    DEFAULT_EASE_FACTOR
}

/// A saved vocabulary word
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    /// Normalized word (identity)
    pub word: String,
    /// Pronunciation or reading
    #[serde(default)]
    pub reading: Option<String>,
    /// Definition text
    #[serde(default)]
    pub definition: Option<String>,
    /// Part of speech
    #[serde(default)]
    pub part_of_speech: Option<String>,
    /// Translation into the reader's language
    #[serde(default)]
    pub translation: Option<String>,
    /// Sentence the word was found in
    #[serde(default)]
    pub context: Option<String>,
    /// Document the word was saved from (may no longer exist)
    #[serde(default)]
    pub source_doc_id: Option<String>,
    /// Whether the reader considers the word learned
    #[serde(default)]
    pub mastered: bool,
    /// Number of completed reviews
    #[serde(default)]
    pub review_count: u32,
    /// SM-2 ease factor
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f64,
    /// Days until the next review
    #[serde(default)]
    pub interval_days: u32,
    /// When the entry is next due
    #[serde(default)]
    pub next_review_at: Option<DateTime<Utc>>,
    /// When this entry was created
    pub created_at: DateTime<Utc>,
    /// When this entry was last updated
    pub updated_at: DateTime<Utc>,
}

impl VocabularyEntry {
    /// Create a new entry; the word is normalized
    pub fn new(word: &str) -> Self {
        let now = Utc::now();
        Self {
            word: normalize_word(word),
            reading: None,
            definition: None,
            part_of_speech: None,
            translation: None,
            context: None,
            source_doc_id: None,
            mastered: false,
            review_count: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 0,
            next_review_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the definition
    pub fn set_definition(&mut self, definition: Option<String>) {
        self.definition = definition;
        self.updated_at = Utc::now();
    }

    /// Update the originating context
    pub fn set_context(&mut self, context: Option<String>, source_doc_id: Option<String>) {
        self.context = context;
        self.source_doc_id = source_doc_id;
        self.updated_at = Utc::now();
    }

    /// Mark as mastered or not
    pub fn set_mastered(&mut self, mastered: bool) {
        self.mastered = mastered;
        self.updated_at = Utc::now();
    }

    /// Record a review with an SM-2 quality grade (0-5)
    pub fn record_review(&mut self, quality: u8) {
        let quality = quality.min(5);
        let now = Utc::now();

        if quality < 3 {
            self.review_count = 0;
            self.interval_days = 1;
        } else {
            self.interval_days = match self.review_count {
                0 => 1,
                1 => 6,
                _ => (f64::from(self.interval_days) * self.ease_factor).round() as u32,
            };
            self.review_count += 1;
        }

        let q = f64::from(5 - quality);
        self.ease_factor = (self.ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(MIN_EASE_FACTOR);
        self.next_review_at = Some(now + Duration::days(i64::from(self.interval_days)));
        self.updated_at = now;
    }
}

/// Deletion marker for a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    /// Id of the deleted entity
    pub entity_id: String,
    /// When it was deleted
    pub deleted_at: DateTime<Utc>,
}

impl Tombstone {
    /// Tombstone stamped with the current time
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self::at(entity_id, Utc::now())
    }

    /// Tombstone with an explicit deletion time
    pub fn at(entity_id: impl Into<String>, deleted_at: DateTime<Utc>) -> Self {
        Self {
            entity_id: entity_id.into(),
            deleted_at,
        }
    }
}
