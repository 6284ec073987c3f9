//! Sync engine
//!
//! Reconciles the local library with the remote snapshot store. Each
//! dataset (articles, vocabulary) is synced independently:
//!
//! 1. Probe the remote (cached for a short TTL)
//! 2. Take the dataset's single-flight permit, or drop the trigger
//! 3. Fetch and decode the remote snapshot
//! 4. Merge with last-write-wins, tombstones first
//! 5. Overwrite the remote snapshot with the merged result
//! 6. Apply what the local side was missing

mod dataset;
mod engine;
mod error;
mod flight;
mod probe;

pub use dataset::{
    ArticleChanges, ArticleCounts, ArticleReport, Articles, Dataset, DatasetKind, Vocabulary,
    VocabularyCounts, VocabularyReport,
};
pub use engine::{SkipReason, SyncEngine, SyncMode, SyncOptions, SyncOutcome, SyncSummary, SyncTrigger};
pub use error::{SyncError, SyncResult};
pub use flight::{FlightEvent, FlightGuard, FlightPermit, FlightState};
pub use probe::{Availability, AvailabilityProbe};
