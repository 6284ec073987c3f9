//! Snapshot transport contract
//!
//! The raw request/response shape of the remote document store. A transport
//! knows how to locate, create, update and read one named document; it never
//! interprets the content.

use async_trait::async_trait;

use super::error::RemoteResult;

/// Reference to a remote document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHandle {
    /// Service-assigned document id
    pub id: String,
    /// Revision token (changes on every write), if the service exposes one
    pub revision: Option<String>,
    /// Where the document can be viewed, if known
    pub location: Option<String>,
}

impl RemoteHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revision: None,
            location: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Answer to a content request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentResponse {
    /// The full content
    Complete(String),
    /// The service cut the content short; the rest lives elsewhere
    Truncated { overflow_location: String },
}

/// Transport to a document store holding one document per dataset
#[async_trait]
pub trait SnapshotTransport: Send + Sync {
    /// Whether credentials and endpoint are present
    fn is_configured(&self) -> bool;

    /// Cheap reachability check
    async fn ping(&self) -> RemoteResult<()>;

    /// Locate the document carrying the given name
    async fn find(&self, name: &str) -> RemoteResult<Option<RemoteHandle>>;

    /// Create a document
    async fn create(&self, name: &str, description: &str, content: &str)
        -> RemoteResult<RemoteHandle>;

    /// Replace a document's content
    async fn update(&self, handle: &RemoteHandle, name: &str, content: &str)
        -> RemoteResult<RemoteHandle>;

    /// Read a document's content, possibly truncated
    async fn get_content(&self, handle: &RemoteHandle, name: &str)
        -> RemoteResult<ContentResponse>;

    /// Read full content from an overflow location
    async fn get_content_raw(&self, overflow_location: &str) -> RemoteResult<String>;
}
