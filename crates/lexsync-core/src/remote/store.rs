//! Remote snapshot store adapter
//!
//! Wraps a [`SnapshotTransport`] with the operations the sync engine needs.
//! Truncated reads are completed transparently with a raw fetch, so callers
//! only ever see full content.

use tracing::debug;

use super::error::{RemoteError, RemoteResult};
use super::transport::{ContentResponse, RemoteHandle, SnapshotTransport};

/// Adapter over a snapshot transport
pub struct RemoteStore<T> {
    transport: T,
}

impl<T: SnapshotTransport> RemoteStore<T> {
    /// Create an adapter over the given transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether the transport has credentials
    pub fn is_configured(&self) -> bool {
        self.transport.is_configured()
    }

    /// Reachability check
    pub async fn ping(&self) -> RemoteResult<()> {
        self.ensure_configured()?;
        self.transport.ping().await
    }

    /// Find the document carrying a dataset
    pub async fn find_document(&self, name: &str) -> RemoteResult<Option<RemoteHandle>> {
        self.ensure_configured()?;
        self.transport.find(name).await
    }

    /// Create the document for a dataset
    pub async fn create_document(
        &self,
        name: &str,
        description: &str,
        content: &str,
    ) -> RemoteResult<RemoteHandle> {
        self.ensure_configured()?;
        debug!("Creating remote document {}", name);
        self.transport.create(name, description, content).await
    }

    /// Overwrite the document for a dataset
    pub async fn update_document(
        &self,
        handle: &RemoteHandle,
        name: &str,
        content: &str,
    ) -> RemoteResult<RemoteHandle> {
        self.ensure_configured()?;
        debug!("Updating remote document {} ({})", name, handle.id);
        self.transport.update(handle, name, content).await
    }

    /// Read the full content of a document
    ///
    /// If the service reports the content as truncated, the overflow
    /// location is fetched; only a failure of that follow-up is reported, as
    /// [`RemoteError::Truncated`].
    pub async fn get_document_content(
        &self,
        handle: &RemoteHandle,
        name: &str,
    ) -> RemoteResult<String> {
        self.ensure_configured()?;
        match self.transport.get_content(handle, name).await? {
            ContentResponse::Complete(content) => Ok(content),
            ContentResponse::Truncated { overflow_location } => {
                debug!(
                    "Content of {} truncated, fetching {}",
                    name, overflow_location
                );
                self.transport
                    .get_content_raw(&overflow_location)
                    .await
                    .map_err(|e| RemoteError::Truncated {
                        location: overflow_location,
                        reason: e.to_string(),
                    })
            }
        }
    }

    fn ensure_configured(&self) -> RemoteResult<()> {
        if self.transport.is_configured() {
            Ok(())
        } else {
            Err(RemoteError::NotConfigured)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryTransport;

    const NAME: &str = "lexsync-articles.json";

    fn payload() -> String {
        let words: Vec<String> = (0..200).map(|i| format!("\"word-{}\"", i)).collect();
        format!("{{\"words\": [{}]}}", words.join(", "))
    }

    #[tokio::test]
    async fn test_create_find_update_read() {
        let store = RemoteStore::new(MemoryTransport::new());

        assert!(store.find_document(NAME).await.unwrap().is_none());

        let handle = store.create_document(NAME, "desc", "v1").await.unwrap();
        let found = store.find_document(NAME).await.unwrap().unwrap();
        assert_eq!(found.id, handle.id);
        assert_eq!(store.get_document_content(&found, NAME).await.unwrap(), "v1");

        let updated = store.update_document(&found, NAME, "v2").await.unwrap();
        assert_ne!(updated.revision, found.revision);
        assert_eq!(store.get_document_content(&updated, NAME).await.unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_truncated_content_is_transparent() {
        let full = payload();

        let plain = MemoryTransport::new();
        plain.put_document(NAME, &full);
        let plain_store = RemoteStore::new(plain);
        let handle = plain_store.find_document(NAME).await.unwrap().unwrap();
        let expected = plain_store.get_document_content(&handle, NAME).await.unwrap();

        let truncating = MemoryTransport::new();
        truncating.put_document(NAME, &full);
        truncating.set_truncation_limit(Some(64));
        let store = RemoteStore::new(truncating.clone());
        let handle = store.find_document(NAME).await.unwrap().unwrap();
        let content = store.get_document_content(&handle, NAME).await.unwrap();

        assert_eq!(content, expected);
        assert_eq!(truncating.calls().raw_fetches, 1);
    }

    #[tokio::test]
    async fn test_failed_overflow_fetch_is_truncation_error() {
        let transport = MemoryTransport::new();
        transport.put_document(NAME, &payload());
        transport.set_truncation_limit(Some(16));
        transport.fail_raw_fetches(Some(RemoteError::Transport("connection reset".into())));

        let store = RemoteStore::new(transport);
        let handle = store.find_document(NAME).await.unwrap().unwrap();
        let err = store.get_document_content(&handle, NAME).await.unwrap_err();

        match err {
            RemoteError::Truncated { location, reason } => {
                assert!(location.contains(NAME));
                assert!(reason.contains("connection reset"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_store_refuses_calls() {
        let store = RemoteStore::new(MemoryTransport::unconfigured());
        assert!(!store.is_configured());
        assert_eq!(
            store.find_document(NAME).await.unwrap_err(),
            RemoteError::NotConfigured
        );
        assert_eq!(store.ping().await.unwrap_err(), RemoteError::NotConfigured);
    }
}
