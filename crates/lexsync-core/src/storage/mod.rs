//! Storage layer
//!
//! File-backed implementation of the local repository. The whole library
//! (documents, progress, reveal state, vocabulary and tombstones) lives in
//! a single JSON file written atomically.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::JsonFileRepository;
