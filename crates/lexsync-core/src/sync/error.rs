//! Sync error handling
//!
//! Merge conflicts are never errors; they are resolved by timestamp. What
//! remains are configuration, transport, payload and local storage failures.

use thiserror::Error;

use crate::remote::RemoteError;
use crate::snapshot::SnapshotError;

/// Errors that can end a sync cycle
#[derive(Error, Debug)]
pub enum SyncError {
    /// No remote credentials
    #[error("Remote sync is not configured")]
    NotConfigured,

    /// Remote configured but the availability probe says it can't be used
    #[error("Remote store is unavailable")]
    RemoteUnavailable,

    /// Reading the remote snapshot failed
    #[error("Failed to fetch remote snapshot: {0}")]
    RemoteFetch(#[source] RemoteError),

    /// Writing the merged snapshot failed; nothing was applied locally
    #[error("Failed to write remote snapshot: {0}")]
    RemoteWrite(#[source] RemoteError),

    /// Remote content was truncated and the overflow fetch failed
    #[error("Remote snapshot was truncated and '{location}' could not be fetched: {reason}")]
    TruncatedContent { location: String, reason: String },

    /// Remote payload is malformed; the cycle stopped before writing
    #[error("Remote snapshot is malformed: {0}")]
    MergeInvariantViolation(String),

    /// Remote snapshot changed between fetch and write
    #[error("Remote snapshot '{name}' was modified by another device during sync")]
    ConcurrentModification { name: String },

    /// Local repository failure
    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

impl SyncError {
    /// Map a failure while reading the remote snapshot
    pub fn from_fetch(error: RemoteError) -> Self {
        match error {
            RemoteError::NotConfigured => SyncError::NotConfigured,
            RemoteError::Truncated { location, reason } => {
                SyncError::TruncatedContent { location, reason }
            }
            other => SyncError::RemoteFetch(other),
        }
    }

    /// Map a failure while writing the merged snapshot
    pub fn from_write(error: RemoteError) -> Self {
        match error {
            RemoteError::NotConfigured => SyncError::NotConfigured,
            other => SyncError::RemoteWrite(other),
        }
    }

    /// Whether the error should reach the user in interactive mode
    ///
    /// A missing configuration is a normal state, not a failure.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, SyncError::NotConfigured)
    }

    /// Check if running the cycle again later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::RemoteFetch(e) | SyncError::RemoteWrite(e) => e.is_retryable(),
            SyncError::RemoteUnavailable
            | SyncError::TruncatedContent { .. }
            | SyncError::ConcurrentModification { .. } => true,
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::NotConfigured => {
                Some("Set an access token with: lexsync config set remote.token <token>")
            }
            SyncError::RemoteUnavailable => Some("Check your network connection and try again."),
            SyncError::RemoteFetch(RemoteError::Unauthorized)
            | SyncError::RemoteWrite(RemoteError::Unauthorized) => {
                Some("The access token was rejected. Set a new one with: lexsync config set remote.token <token>")
            }
            SyncError::ConcurrentModification { .. } => {
                Some("Another device synced at the same time. Run the sync again.")
            }
            SyncError::MergeInvariantViolation(_) => Some(
                "The remote snapshot was left untouched. Inspect or remove the remote document, then sync again.",
            ),
            _ => None,
        }
    }
}

impl From<SnapshotError> for SyncError {
    fn from(error: SnapshotError) -> Self {
        SyncError::MergeInvariantViolation(error.to_string())
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_mapping() {
        assert!(matches!(
            SyncError::from_fetch(RemoteError::NotConfigured),
            SyncError::NotConfigured
        ));
        assert!(matches!(
            SyncError::from_fetch(RemoteError::Truncated {
                location: "raw".into(),
                reason: "reset".into()
            }),
            SyncError::TruncatedContent { .. }
        ));
        assert!(matches!(
            SyncError::from_fetch(RemoteError::Transport("x".into())),
            SyncError::RemoteFetch(_)
        ));
        assert!(matches!(
            SyncError::from_write(RemoteError::Unauthorized),
            SyncError::RemoteWrite(RemoteError::Unauthorized)
        ));
    }

    #[test]
    fn test_classification() {
        assert!(!SyncError::NotConfigured.is_user_facing());
        assert!(SyncError::RemoteUnavailable.is_user_facing());

        assert!(SyncError::RemoteFetch(RemoteError::Transport("x".into())).is_retryable());
        assert!(!SyncError::RemoteWrite(RemoteError::Unauthorized).is_retryable());
        assert!(SyncError::ConcurrentModification { name: "a".into() }.is_retryable());
        assert!(!SyncError::MergeInvariantViolation("bad".into()).is_retryable());
    }

    #[test]
    fn test_snapshot_error_becomes_invariant_violation() {
        let err: SyncError = SnapshotError::MissingField("documents").into();
        assert!(matches!(err, SyncError::MergeInvariantViolation(ref m) if m.contains("documents")));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_unauthorized_suggestion() {
        let err = SyncError::RemoteFetch(RemoteError::Unauthorized);
        assert!(err.recovery_suggestion().unwrap().contains("token"));
    }
}
