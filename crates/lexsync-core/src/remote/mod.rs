//! Remote snapshot store
//!
//! The remote side holds exactly one document per dataset. This module
//! provides:
//!
//! - `SnapshotTransport`: the raw find/create/update/read contract
//! - `RemoteStore`: the adapter the sync engine talks to, which hides
//!   content truncation
//! - `GistTransport`: HTTP implementation against a gist-style API
//! - `MemoryTransport`: in-process implementation for tests

mod error;
mod gist;
mod memory;
mod store;
mod transport;

pub use error::{RemoteError, RemoteResult};
pub use gist::GistTransport;
pub use memory::{CallCounts, MemoryTransport};
pub use store::RemoteStore;
pub use transport::{ContentResponse, RemoteHandle, SnapshotTransport};
