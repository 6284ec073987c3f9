//! Sync orchestrator
//!
//! Runs one cycle per dataset: probe, acquire the single-flight permit,
//! fetch the remote snapshot, merge, write the merged snapshot back as a
//! full overwrite and hand the report to the caller. Local changes are
//! applied only after the remote write succeeded.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dataset::{ArticleReport, Articles, Dataset, DatasetKind, Vocabulary, VocabularyReport};
use super::error::{SyncError, SyncResult};
use super::flight::{FlightGuard, FlightPermit, FlightState};
use super::probe::{Availability, AvailabilityProbe};
use crate::config::{Config, DEFAULT_ARTICLES_DOCUMENT, DEFAULT_VOCABULARY_DOCUMENT};
use crate::remote::{RemoteHandle, RemoteStore, SnapshotTransport};
use crate::repository::Repository;
use crate::snapshot::{ArticleSnapshot, Snapshot, VocabularySnapshot};

/// How errors are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// User asked for the sync; errors propagate
    Interactive,
    /// Triggered by the app; errors are logged and swallowed
    Background,
}

/// Why a cycle did not run to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    NotConfigured,
    Unavailable,
    AlreadyRunning,
    /// Background cycle failed; the error was logged
    Failed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotConfigured => write!(f, "not configured"),
            SkipReason::Unavailable => write!(f, "remote unavailable"),
            SkipReason::AlreadyRunning => write!(f, "already running"),
            SkipReason::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a cycle that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome<R> {
    Completed(R),
    Skipped(SkipReason),
}

impl<R> SyncOutcome<R> {
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed(_))
    }

    /// Report of a completed cycle
    pub fn report(&self) -> Option<&R> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            SyncOutcome::Completed(_) => None,
            SyncOutcome::Skipped(reason) => Some(*reason),
        }
    }
}

/// What caused a background sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Startup,
    Import,
    Delete,
    Edit,
    Manual,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncTrigger::Startup => "startup",
            SyncTrigger::Import => "import",
            SyncTrigger::Delete => "delete",
            SyncTrigger::Edit => "edit",
            SyncTrigger::Manual => "manual",
        };
        write!(f, "{}", name)
    }
}

/// Engine settings
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub articles_document: String,
    pub vocabulary_document: String,
    /// Description for newly created remote documents
    pub description: String,
    pub availability_ttl: Duration,
    /// Fail with `ConcurrentModification` if the remote changed since the fetch
    pub verify_revision: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            articles_document: DEFAULT_ARTICLES_DOCUMENT.to_string(),
            vocabulary_document: DEFAULT_VOCABULARY_DOCUMENT.to_string(),
            description: "lexsync data".to_string(),
            availability_ttl: Duration::from_secs(30),
            verify_revision: false,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            articles_document: config.remote.articles_document.clone(),
            vocabulary_document: config.remote.vocabulary_document.clone(),
            description: config.remote.description.clone(),
            availability_ttl: config.sync.availability_ttl(),
            verify_revision: config.sync.verify_revision,
        }
    }

    /// Remote document name for a dataset
    pub fn document_name(&self, kind: DatasetKind) -> &str {
        match kind {
            DatasetKind::Articles => &self.articles_document,
            DatasetKind::Vocabulary => &self.vocabulary_document,
        }
    }
}

/// Results of syncing both datasets
#[derive(Debug)]
pub struct SyncSummary {
    pub articles: SyncResult<SyncOutcome<ArticleReport>>,
    pub vocabulary: SyncResult<SyncOutcome<VocabularyReport>>,
}

impl SyncSummary {
    /// True if neither dataset failed
    pub fn is_ok(&self) -> bool {
        self.articles.is_ok() && self.vocabulary.is_ok()
    }
}

/// Sync orchestrator
pub struct SyncEngine<T> {
    remote: RemoteStore<T>,
    probe: AvailabilityProbe,
    articles_flight: FlightGuard,
    vocabulary_flight: FlightGuard,
    options: SyncOptions,
}

impl<T: SnapshotTransport> SyncEngine<T> {
    pub fn new(transport: T, options: SyncOptions) -> Self {
        Self {
            remote: RemoteStore::new(transport),
            probe: AvailabilityProbe::new(options.availability_ttl),
            articles_flight: FlightGuard::new(),
            vocabulary_flight: FlightGuard::new(),
            options,
        }
    }

    /// Create an engine with settings from the application config
    pub fn from_config(transport: T, config: &Config) -> Self {
        Self::new(transport, SyncOptions::from_config(config))
    }

    pub fn remote(&self) -> &RemoteStore<T> {
        &self.remote
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn probe(&self) -> &AvailabilityProbe {
        &self.probe
    }

    /// Whether the remote can be used right now
    pub async fn availability(&self) -> Availability {
        self.probe.check(&self.remote).await
    }

    /// Single-flight guard of a dataset
    pub fn flight(&self, kind: DatasetKind) -> &FlightGuard {
        match kind {
            DatasetKind::Articles => &self.articles_flight,
            DatasetKind::Vocabulary => &self.vocabulary_flight,
        }
    }

    pub fn flight_state(&self, kind: DatasetKind) -> FlightState {
        self.flight(kind).state()
    }

    /// Run one cycle for a dataset against an explicit local snapshot
    ///
    /// The caller is responsible for applying the report locally.
    pub async fn run_sync<D: Dataset>(
        &self,
        local: D::Snapshot,
        mode: SyncMode,
    ) -> SyncResult<SyncOutcome<D::Report>> {
        let result = self.sync_snapshot::<D>(local, mode).await;
        settle::<D, _>(mode, result)
    }

    pub async fn run_articles(
        &self,
        local: ArticleSnapshot,
        mode: SyncMode,
    ) -> SyncResult<SyncOutcome<ArticleReport>> {
        self.run_sync::<Articles>(local, mode).await
    }

    pub async fn run_vocabulary(
        &self,
        local: VocabularySnapshot,
        mode: SyncMode,
    ) -> SyncResult<SyncOutcome<VocabularyReport>> {
        self.run_sync::<Vocabulary>(local, mode).await
    }

    /// Run one cycle for a dataset against a repository
    ///
    /// The local snapshot is read once the permit is held, and the report is
    /// applied only after the remote write succeeded.
    pub async fn sync_with<D, R>(&self, repo: &R, mode: SyncMode) -> SyncResult<SyncOutcome<D::Report>>
    where
        D: Dataset,
        R: Repository + ?Sized,
    {
        let result = self.sync_and_apply::<D, R>(repo, mode).await;
        settle::<D, _>(mode, result)
    }

    pub async fn sync_articles<R: Repository + ?Sized>(
        &self,
        repo: &R,
        mode: SyncMode,
    ) -> SyncResult<SyncOutcome<ArticleReport>> {
        self.sync_with::<Articles, R>(repo, mode).await
    }

    pub async fn sync_vocabulary<R: Repository + ?Sized>(
        &self,
        repo: &R,
        mode: SyncMode,
    ) -> SyncResult<SyncOutcome<VocabularyReport>> {
        self.sync_with::<Vocabulary, R>(repo, mode).await
    }

    /// Sync both datasets concurrently
    pub async fn sync_all<R: Repository + ?Sized>(&self, repo: &R, mode: SyncMode) -> SyncSummary {
        let (articles, vocabulary) = tokio::join!(
            self.sync_articles(repo, mode),
            self.sync_vocabulary(repo, mode)
        );
        SyncSummary {
            articles,
            vocabulary,
        }
    }

    async fn sync_snapshot<D: Dataset>(
        &self,
        local: D::Snapshot,
        mode: SyncMode,
    ) -> SyncResult<SyncOutcome<D::Report>> {
        let _permit = match self.admit::<D>(mode).await? {
            Ok(permit) => permit,
            Err(reason) => return Ok(SyncOutcome::Skipped(reason)),
        };
        let report = self.cycle::<D>(local).await?;
        Ok(SyncOutcome::Completed(report))
    }

    async fn sync_and_apply<D, R>(&self, repo: &R, mode: SyncMode) -> SyncResult<SyncOutcome<D::Report>>
    where
        D: Dataset,
        R: Repository + ?Sized,
    {
        let _permit = match self.admit::<D>(mode).await? {
            Ok(permit) => permit,
            Err(reason) => return Ok(SyncOutcome::Skipped(reason)),
        };

        let local = D::load(repo)?;
        let report = self.cycle::<D>(local).await?;
        D::apply(repo, &report)?;
        debug!("Applied {} sync report locally", D::KIND);

        Ok(SyncOutcome::Completed(report))
    }

    /// Check availability and take the dataset's permit
    ///
    /// The inner `Err` is a reason to skip without failing.
    async fn admit<D: Dataset>(
        &self,
        mode: SyncMode,
    ) -> SyncResult<Result<FlightPermit, SkipReason>> {
        match self.probe.check(&self.remote).await {
            Availability::Available => {}
            Availability::NotConfigured => {
                debug!("Remote not configured, skipping {} sync", D::KIND);
                return match mode {
                    SyncMode::Interactive => Err(SyncError::NotConfigured),
                    SyncMode::Background => Ok(Err(SkipReason::NotConfigured)),
                };
            }
            Availability::Unreachable => {
                return match mode {
                    SyncMode::Interactive => Err(SyncError::RemoteUnavailable),
                    SyncMode::Background => Ok(Err(SkipReason::Unavailable)),
                };
            }
        }

        match self.flight(D::KIND).try_acquire() {
            Some(permit) => Ok(Ok(permit)),
            None => {
                debug!("{} sync already running, dropping trigger", D::KIND);
                Ok(Err(SkipReason::AlreadyRunning))
            }
        }
    }

    async fn cycle<D: Dataset>(&self, local: D::Snapshot) -> SyncResult<D::Report> {
        let result = self.exchange::<D>(local).await;
        if let Err(e) = &result {
            if e.is_retryable() {
                self.probe.invalidate();
            }
        }
        result
    }

    /// Fetch, merge and write back
    async fn exchange<D: Dataset>(&self, local: D::Snapshot) -> SyncResult<D::Report> {
        let name = self.options.document_name(D::KIND);
        debug!("Starting {} sync against {}", D::KIND, name);

        let handle = self
            .remote
            .find_document(name)
            .await
            .map_err(SyncError::from_fetch)?;

        let remote = match &handle {
            Some(handle) => {
                let content = self
                    .remote
                    .get_document_content(handle, name)
                    .await
                    .map_err(SyncError::from_fetch)?;
                D::Snapshot::decode(&content)?
            }
            None => {
                debug!("No remote {} snapshot yet", D::KIND);
                D::Snapshot::default()
            }
        };

        let report = D::reconcile(&local, &remote, Utc::now());
        let content = D::merged(&report).encode()?;

        if self.options.verify_revision {
            self.verify_revision(handle.as_ref(), name).await?;
        }

        let written = match &handle {
            Some(handle) => self.remote.update_document(handle, name, &content).await,
            None => {
                self.remote
                    .create_document(name, &self.options.description, &content)
                    .await
            }
        }
        .map_err(SyncError::from_write)?;

        info!(
            "Synced {}: wrote {} bytes to {}",
            D::KIND,
            content.len(),
            written.id
        );
        Ok(report)
    }

    /// Make sure nobody wrote the remote document since we read it
    async fn verify_revision(&self, fetched: Option<&RemoteHandle>, name: &str) -> SyncResult<()> {
        let current = self
            .remote
            .find_document(name)
            .await
            .map_err(SyncError::from_fetch)?;

        let unchanged = match (fetched, current.as_ref()) {
            (None, None) => true,
            (Some(fetched), Some(current)) => {
                fetched.id == current.id && fetched.revision == current.revision
            }
            _ => false,
        };

        if unchanged {
            Ok(())
        } else {
            warn!("Remote document {} changed during sync", name);
            Err(SyncError::ConcurrentModification {
                name: name.to_string(),
            })
        }
    }
}

impl<T: SnapshotTransport + 'static> SyncEngine<T> {
    /// Sync both datasets on a background task
    ///
    /// Errors are logged, never returned; overlapping triggers are dropped by
    /// the single-flight guards.
    pub fn spawn_background<R>(
        self: Arc<Self>,
        repo: Arc<R>,
        trigger: SyncTrigger,
    ) -> JoinHandle<SyncSummary>
    where
        R: Repository + 'static,
    {
        tokio::spawn(async move {
            debug!("Background sync triggered by {}", trigger);
            self.sync_all(repo.as_ref(), SyncMode::Background).await
        })
    }
}

/// Swallow errors of background cycles
fn settle<D: Dataset, O>(mode: SyncMode, result: SyncResult<SyncOutcome<O>>) -> SyncResult<SyncOutcome<O>> {
    match result {
        Err(e) if mode == SyncMode::Background => {
            warn!("Background {} sync failed: {}", D::KIND, e);
            Ok(SyncOutcome::Skipped(SkipReason::Failed))
        }
        other => other,
    }
}
