//! In-memory snapshot transport
//!
//! Keeps documents in process memory. Used by tests and by hosts that want
//! to exercise sync without a network. Clones share the same state, so a
//! test can hand one clone to the engine and inspect another.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::{RemoteError, RemoteResult};
use super::transport::{ContentResponse, RemoteHandle, SnapshotTransport};

/// Number of calls made per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub pings: usize,
    pub finds: usize,
    pub creates: usize,
    pub updates: usize,
    pub fetches: usize,
    pub raw_fetches: usize,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    id: String,
    description: String,
    content: String,
    revision: u64,
}

impl StoredDocument {
    fn handle(&self, name: &str) -> RemoteHandle {
        RemoteHandle::new(self.id.clone())
            .with_revision(format!("r{}", self.revision))
            .with_location(raw_location(&self.id, name))
    }
}

fn raw_location(id: &str, name: &str) -> String {
    format!("memory://{}/{}", id, name)
}

#[derive(Debug)]
struct MemoryState {
    configured: bool,
    reachable: bool,
    documents: BTreeMap<String, StoredDocument>,
    next_id: u64,
    truncation_limit: Option<usize>,
    fetch_failure: Option<RemoteError>,
    write_failure: Option<RemoteError>,
    raw_failure: Option<RemoteError>,
    ping_failure: Option<RemoteError>,
    foreign_write_after_fetch: bool,
    calls: CallCounts,
}

impl MemoryState {
    fn check_reachable(&self) -> RemoteResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(RemoteError::Transport("remote store unreachable".to_string()))
        }
    }

    fn document_for(&mut self, handle: &RemoteHandle, name: &str) -> RemoteResult<&mut StoredDocument> {
        match self.documents.get_mut(name) {
            Some(doc) if doc.id == handle.id => Ok(doc),
            _ => Err(RemoteError::NotFound(format!("{} ({})", name, handle.id))),
        }
    }
}

/// Transport backed by process memory
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// A configured, reachable, empty store
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                configured: true,
                reachable: true,
                documents: BTreeMap::new(),
                next_id: 1,
                truncation_limit: None,
                fetch_failure: None,
                write_failure: None,
                raw_failure: None,
                ping_failure: None,
                foreign_write_after_fetch: false,
                calls: CallCounts::default(),
            })),
        }
    }

    /// A store without credentials
    pub fn unconfigured() -> Self {
        let transport = Self::new();
        transport.state.lock().configured = false;
        transport
    }

    /// Write a document directly, as another device would
    pub fn put_document(&self, name: &str, content: &str) {
        let mut state = self.state.lock();
        if let Some(doc) = state.documents.get_mut(name) {
            doc.content = content.to_string();
            doc.revision += 1;
            return;
        }
        let id = format!("mem-{}", state.next_id);
        state.next_id += 1;
        state.documents.insert(
            name.to_string(),
            StoredDocument {
                id,
                description: String::new(),
                content: content.to_string(),
                revision: 1,
            },
        );
    }

    /// Current content of a document
    pub fn document(&self, name: &str) -> Option<String> {
        self.state.lock().documents.get(name).map(|d| d.content.clone())
    }

    /// Description a document was created with
    pub fn description(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .documents
            .get(name)
            .map(|d| d.description.clone())
    }

    /// Current revision of a document
    pub fn revision(&self, name: &str) -> Option<u64> {
        self.state.lock().documents.get(name).map(|d| d.revision)
    }

    /// Report content longer than `limit` bytes as truncated
    pub fn set_truncation_limit(&self, limit: Option<usize>) {
        self.state.lock().truncation_limit = limit;
    }

    /// Make reachability checks and calls fail
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().reachable = reachable;
    }

    /// Fail `find` and `get_content` with the given error
    pub fn fail_fetches(&self, error: Option<RemoteError>) {
        self.state.lock().fetch_failure = error;
    }

    /// Fail `create` and `update` with the given error
    pub fn fail_writes(&self, error: Option<RemoteError>) {
        self.state.lock().write_failure = error;
    }

    /// Fail overflow fetches with the given error
    pub fn fail_raw_fetches(&self, error: Option<RemoteError>) {
        self.state.lock().raw_failure = error;
    }

    /// Fail reachability checks with the given error
    pub fn fail_pings(&self, error: Option<RemoteError>) {
        self.state.lock().ping_failure = error;
    }

    /// Bump the revision right after the next content read, as if another
    /// device wrote between our fetch and our write
    pub fn simulate_concurrent_writer(&self) {
        self.state.lock().foreign_write_after_fetch = true;
    }

    /// Calls made so far
    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }
}

#[async_trait]
impl SnapshotTransport for MemoryTransport {
    fn is_configured(&self) -> bool {
        self.state.lock().configured
    }

    async fn ping(&self) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.pings += 1;
        state.check_reachable()?;
        match state.ping_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn find(&self, name: &str) -> RemoteResult<Option<RemoteHandle>> {
        let mut state = self.state.lock();
        state.calls.finds += 1;
        state.check_reachable()?;
        if let Some(err) = state.fetch_failure.clone() {
            return Err(err);
        }
        Ok(state.documents.get(name).map(|d| d.handle(name)))
    }

    async fn create(
        &self,
        name: &str,
        description: &str,
        content: &str,
    ) -> RemoteResult<RemoteHandle> {
        let mut state = self.state.lock();
        state.calls.creates += 1;
        state.check_reachable()?;
        if let Some(err) = state.write_failure.clone() {
            return Err(err);
        }
        if state.documents.contains_key(name) {
            return Err(RemoteError::Service {
                status: 422,
                message: format!("document {} already exists", name),
            });
        }

        let doc = StoredDocument {
            id: format!("mem-{}", state.next_id),
            description: description.to_string(),
            content: content.to_string(),
            revision: 1,
        };
        state.next_id += 1;
        let handle = doc.handle(name);
        state.documents.insert(name.to_string(), doc);
        Ok(handle)
    }

    async fn update(
        &self,
        handle: &RemoteHandle,
        name: &str,
        content: &str,
    ) -> RemoteResult<RemoteHandle> {
        let mut state = self.state.lock();
        state.calls.updates += 1;
        state.check_reachable()?;
        if let Some(err) = state.write_failure.clone() {
            return Err(err);
        }

        let doc = state.document_for(handle, name)?;
        doc.content = content.to_string();
        doc.revision += 1;
        Ok(doc.handle(name))
    }

    async fn get_content(
        &self,
        handle: &RemoteHandle,
        name: &str,
    ) -> RemoteResult<ContentResponse> {
        let mut state = self.state.lock();
        state.calls.fetches += 1;
        state.check_reachable()?;
        if let Some(err) = state.fetch_failure.clone() {
            return Err(err);
        }

        let limit = state.truncation_limit;
        let foreign_write = std::mem::take(&mut state.foreign_write_after_fetch);
        let doc = state.document_for(handle, name)?;

        let response = match limit {
            Some(limit) if doc.content.len() > limit => ContentResponse::Truncated {
                overflow_location: raw_location(&doc.id, name),
            },
            _ => ContentResponse::Complete(doc.content.clone()),
        };
        if foreign_write {
            doc.revision += 1;
        }
        Ok(response)
    }

    async fn get_content_raw(&self, overflow_location: &str) -> RemoteResult<String> {
        let mut state = self.state.lock();
        state.calls.raw_fetches += 1;
        state.check_reachable()?;
        if let Some(err) = state.raw_failure.clone() {
            return Err(err);
        }

        state
            .documents
            .iter()
            .find(|(name, doc)| raw_location(&doc.id, name) == overflow_location)
            .map(|(_, doc)| doc.content.clone())
            .ok_or_else(|| RemoteError::NotFound(overflow_location.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_state() {
        let transport = MemoryTransport::new();
        let other = transport.clone();

        other.put_document("a.json", "hello");
        assert_eq!(transport.document("a.json").as_deref(), Some("hello"));
        assert!(transport.find("a.json").await.unwrap().is_some());
        assert_eq!(other.calls().finds, 1);
    }

    #[tokio::test]
    async fn test_create_twice_is_rejected() {
        let transport = MemoryTransport::new();
        transport.create("a.json", "d", "1").await.unwrap();
        assert_eq!(transport.description("a.json").as_deref(), Some("d"));
        let err = transport.create("a.json", "d", "2").await.unwrap_err();
        assert!(matches!(err, RemoteError::Service { status: 422, .. }));
    }

    #[tokio::test]
    async fn test_stale_handle_is_not_found() {
        let transport = MemoryTransport::new();
        transport.create("a.json", "d", "1").await.unwrap();
        let err = transport
            .update(&RemoteHandle::new("mem-99"), "a.json", "2")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unreachable() {
        let transport = MemoryTransport::new();
        transport.set_reachable(false);
        assert!(matches!(
            transport.ping().await.unwrap_err(),
            RemoteError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn test_rejected_ping() {
        let transport = MemoryTransport::new();
        transport.fail_pings(Some(RemoteError::Unauthorized));
        assert!(matches!(
            transport.ping().await.unwrap_err(),
            RemoteError::Unauthorized
        ));

        // Other calls are unaffected
        assert!(transport.find("a.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writer_bumps_revision_after_read() {
        let transport = MemoryTransport::new();
        let handle = transport.create("a.json", "d", "1").await.unwrap();
        transport.simulate_concurrent_writer();

        transport.get_content(&handle, "a.json").await.unwrap();
        assert_eq!(transport.revision("a.json"), Some(2));

        // Only the next read is affected
        transport.get_content(&handle, "a.json").await.unwrap();
        assert_eq!(transport.revision("a.json"), Some(2));
    }
}
