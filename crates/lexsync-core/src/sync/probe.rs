//! Availability probe
//!
//! Answers "can we sync right now?" without a round trip on every attempt.
//! Results are cached for a short TTL. A probe that fails for a transient
//! reason (network blip, server error) keeps the last known answer instead
//! of disabling sync; only a definitive rejection marks the remote as
//! unreachable.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::remote::{RemoteStore, SnapshotTransport};

/// Probe answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// No credentials; sync is off
    NotConfigured,
    /// Remote can be used
    Available,
    /// Remote rejected us
    Unreachable,
}

#[derive(Debug, Default)]
struct ProbeState {
    last_known: Option<bool>,
    checked_at: Option<Instant>,
}

/// TTL-cached availability check
#[derive(Debug)]
pub struct AvailabilityProbe {
    ttl: Duration,
    state: Mutex<ProbeState>,
}

impl AvailabilityProbe {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(ProbeState::default()),
        }
    }

    /// Cache TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check availability, probing the remote only when the cache is stale
    pub async fn check<T: SnapshotTransport>(&self, remote: &RemoteStore<T>) -> Availability {
        if !remote.is_configured() {
            return Availability::NotConfigured;
        }

        if let Some(available) = self.cached() {
            return to_availability(available);
        }

        let available = match remote.ping().await {
            Ok(()) => true,
            Err(e) if e.is_retryable() => {
                let fallback = self.state.lock().last_known.unwrap_or(true);
                warn!("Availability probe failed ({}), assuming available={}", e, fallback);
                fallback
            }
            Err(e) => {
                warn!("Remote store rejected availability probe: {}", e);
                false
            }
        };

        let mut state = self.state.lock();
        state.last_known = Some(available);
        state.checked_at = Some(Instant::now());
        debug!("Availability probe result: {}", available);
        to_availability(available)
    }

    /// Last probe result, if any
    pub fn last_known(&self) -> Option<bool> {
        self.state.lock().last_known
    }

    /// Force the next check to probe
    ///
    /// The last known value is kept as fallback.
    pub fn invalidate(&self) {
        self.state.lock().checked_at = None;
    }

    fn cached(&self) -> Option<bool> {
        let state = self.state.lock();
        match (state.last_known, state.checked_at) {
            (Some(available), Some(at)) if at.elapsed() < self.ttl => Some(available),
            _ => None,
        }
    }
}

fn to_availability(available: bool) -> Availability {
    if available {
        Availability::Available
    } else {
        Availability::Unreachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryTransport, RemoteError};

    #[tokio::test]
    async fn test_not_configured_skips_network() {
        let transport = MemoryTransport::unconfigured();
        let remote = RemoteStore::new(transport.clone());
        let probe = AvailabilityProbe::new(Duration::from_secs(30));

        assert_eq!(probe.check(&remote).await, Availability::NotConfigured);
        assert_eq!(transport.calls().pings, 0);
    }

    #[tokio::test]
    async fn test_result_is_cached_within_ttl() {
        let transport = MemoryTransport::new();
        let remote = RemoteStore::new(transport.clone());
        let probe = AvailabilityProbe::new(Duration::from_secs(60));

        assert_eq!(probe.check(&remote).await, Availability::Available);
        assert_eq!(probe.check(&remote).await, Availability::Available);
        assert_eq!(transport.calls().pings, 1);

        probe.invalidate();
        probe.check(&remote).await;
        assert_eq!(transport.calls().pings, 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_probes_every_time() {
        let transport = MemoryTransport::new();
        let remote = RemoteStore::new(transport.clone());
        let probe = AvailabilityProbe::new(Duration::ZERO);

        probe.check(&remote).await;
        probe.check(&remote).await;
        assert_eq!(transport.calls().pings, 2);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_last_known_value() {
        let transport = MemoryTransport::new();
        let remote = RemoteStore::new(transport.clone());
        let probe = AvailabilityProbe::new(Duration::ZERO);

        assert_eq!(probe.check(&remote).await, Availability::Available);

        transport.set_reachable(false);
        assert_eq!(probe.check(&remote).await, Availability::Available);
        assert_eq!(probe.last_known(), Some(true));
    }

    #[tokio::test]
    async fn test_first_transient_failure_assumes_available() {
        let transport = MemoryTransport::new();
        transport.set_reachable(false);
        let remote = RemoteStore::new(transport);
        let probe = AvailabilityProbe::new(Duration::ZERO);

        assert_eq!(probe.check(&remote).await, Availability::Available);
    }

    #[tokio::test]
    async fn test_rejection_marks_unreachable() {
        let transport = MemoryTransport::new();
        transport.fail_pings(Some(RemoteError::Unauthorized));
        let remote = RemoteStore::new(transport.clone());
        let probe = AvailabilityProbe::new(Duration::from_secs(30));

        assert_eq!(probe.check(&remote).await, Availability::Unreachable);
        assert_eq!(probe.last_known(), Some(false));

        // Rejection is definitive, unlike a transient failure
        transport.fail_pings(None);
        assert_eq!(probe.check(&remote).await, Availability::Unreachable);
        assert_eq!(transport.calls().pings, 1);
    }
}
