//! lexsync Core Library
//!
//! This crate provides the core functionality for lexsync, an offline-first
//! reading and vocabulary library that keeps several devices in step through
//! a remote snapshot store.
//!
//! # Architecture
//!
//! - **Repository**: local source of truth, injected as a trait
//! - **Snapshot store**: one remote document per dataset, overwritten as a whole
//! - **Sync engine**: last-write-wins merge with tombstones, one cycle in
//!   flight per dataset
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let repo = Arc::new(JsonFileRepository::open(&config)?);
//! let library = Library::new(Arc::clone(&repo));
//!
//! let doc = library.import_document("Article", &text)?;
//!
//! let engine = SyncEngine::from_config(GistTransport::from_config(&config.remote)?, &config);
//! engine.sync_all(repo.as_ref(), SyncMode::Interactive).await;
//! ```
//!
//! # Modules
//!
//! - `library`: Local edits (main entry point)
//! - `models`: Documents, progress, reveal state, vocabulary, tombstones
//! - `merge`: Generic last-write-wins merge and tombstone registry
//! - `snapshot`: Versioned snapshot envelopes
//! - `remote`: Remote snapshot store adapter and transports
//! - `sync`: Sync orchestration
//! - `repository`: Local repository trait and in-memory implementation
//! - `storage`: JSON file repository
//! - `config`: Application configuration

pub mod config;
pub mod library;
pub mod merge;
pub mod models;
pub mod remote;
pub mod repository;
pub mod snapshot;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use library::{Library, LibraryStats};
pub use merge::{merge, MergeOutcome, MergeStats, Mergeable, TombstoneRegistry};
pub use models::{Document, Progress, RevealState, Tombstone, Unit, VocabularyEntry};
pub use remote::{GistTransport, MemoryTransport, RemoteError, RemoteStore, SnapshotTransport};
pub use repository::{MemoryRepository, Repository};
pub use snapshot::{ArticleSnapshot, Snapshot, SnapshotError, VocabularySnapshot};
pub use storage::{JsonFileRepository, StorageError};
pub use sync::{SyncEngine, SyncError, SyncMode, SyncOutcome, SyncTrigger};
