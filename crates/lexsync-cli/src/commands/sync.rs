//! Sync command handler

use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::{json, Value};

use lexsync_core::sync::{
    ArticleReport, SkipReason, SyncEngine, SyncError, SyncMode, SyncOutcome, SyncResult,
    SyncSummary, SyncTrigger, VocabularyReport,
};
use lexsync_core::{Config, Repository, SnapshotTransport};

use crate::output::{Output, OutputFormat};

/// Sync both datasets with the remote store
pub async fn sync<T, R>(engine: &SyncEngine<T>, repo: &R, config: &Config, output: &Output) -> Result<()>
where
    T: SnapshotTransport,
    R: Repository + ?Sized,
{
    if !config.remote.is_configured() {
        bail!(
            "Remote sync is not configured. Set a token with:\n  \
             lexsync config set remote.token <token>"
        );
    }

    output.message("Syncing...");
    let summary = engine.sync_all(repo, SyncMode::Interactive).await;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                json!({
                    "articles": articles_json(&summary.articles),
                    "vocabulary": vocabulary_json(&summary.vocabulary),
                })
            );
        }
        OutputFormat::Human => {
            println!("Articles:   {}", describe(&summary.articles, describe_articles));
            println!("Vocabulary: {}", describe(&summary.vocabulary, describe_vocabulary));
        }
        OutputFormat::Quiet => {}
    }

    report_failures(&summary)
}

/// Sync in the background after a write (errors are logged, not returned)
pub async fn auto_sync<T, R>(engine: Arc<SyncEngine<T>>, repo: Arc<R>, trigger: SyncTrigger, output: &Output)
where
    T: SnapshotTransport + 'static,
    R: Repository + 'static,
{
    match engine.spawn_background(repo, trigger).await {
        Ok(summary) => {
            let failed = summary.articles.as_ref().ok().and_then(SyncOutcome::skip_reason)
                == Some(SkipReason::Failed)
                || summary.vocabulary.as_ref().ok().and_then(SyncOutcome::skip_reason)
                    == Some(SkipReason::Failed);
            if failed {
                output.warn("Auto-sync failed. Run `lexsync sync` for details.");
            }
        }
        Err(e) => output.warn(&format!("Auto-sync task failed: {}", e)),
    }
}

fn report_failures(summary: &SyncSummary) -> Result<()> {
    let errors: Vec<&SyncError> = [
        summary.articles.as_ref().err(),
        summary.vocabulary.as_ref().err(),
    ]
    .into_iter()
    .flatten()
    .collect();

    let Some(first) = errors.first() else {
        return Ok(());
    };

    for error in &errors {
        if let Some(hint) = error.recovery_suggestion() {
            eprintln!("  {}", hint);
        }
    }
    bail!("Sync failed: {}", first)
}

fn describe<R>(result: &SyncResult<SyncOutcome<R>>, completed: fn(&R) -> String) -> String {
    match result {
        Ok(SyncOutcome::Completed(report)) => format!("✓ {}", completed(report)),
        Ok(SyncOutcome::Skipped(reason)) => format!("skipped ({})", reason),
        Err(e) => format!("✗ {}", e),
    }
}

fn describe_articles(report: &ArticleReport) -> String {
    let mut text = format!(
        "{} document(s), {} change(s) from remote",
        report.counts.documents,
        report.new_to_local.len()
    );
    if !report.deleted_to_apply.is_empty() {
        text.push_str(&format!(", {} deleted", report.deleted_to_apply.len()));
    }
    text
}

fn describe_vocabulary(report: &VocabularyReport) -> String {
    format!(
        "{} word(s), {} change(s) from remote",
        report.counts.entries,
        report.new_to_local.len()
    )
}

fn articles_json(result: &SyncResult<SyncOutcome<ArticleReport>>) -> Value {
    outcome_json(result, |report| {
        json!({
            "counts": report.counts,
            "newToLocal": report.new_to_local.len(),
            "deletedToApply": report.deleted_to_apply,
        })
    })
}

fn vocabulary_json(result: &SyncResult<SyncOutcome<VocabularyReport>>) -> Value {
    outcome_json(result, |report| {
        json!({
            "counts": report.counts,
            "newToLocal": report.new_to_local.len(),
        })
    })
}

fn outcome_json<R>(result: &SyncResult<SyncOutcome<R>>, completed: impl Fn(&R) -> Value) -> Value {
    match result {
        Ok(SyncOutcome::Completed(report)) => {
            json!({ "status": "completed", "report": completed(report) })
        }
        Ok(SyncOutcome::Skipped(reason)) => json!({ "status": "skipped", "reason": reason }),
        Err(e) => json!({ "status": "failed", "error": e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexsync_core::remote::{MemoryTransport, RemoteError};
    use lexsync_core::sync::SyncOptions;
    use lexsync_core::{Document, MemoryRepository};

    fn configured() -> Config {
        let mut config = Config::default();
        config.remote.token = Some("token".to_string());
        config
    }

    #[tokio::test]
    async fn test_sync_pushes_local_documents() {
        let transport = MemoryTransport::new();
        let engine = SyncEngine::new(transport.clone(), SyncOptions::default());
        let repo = MemoryRepository::new();
        repo.upsert_documents(&[Document::new("Title", "Body", &["Body".to_string()])])
            .unwrap();

        let output = Output::new(OutputFormat::Quiet);
        sync(&engine, &repo, &configured(), &output).await.unwrap();

        assert_eq!(transport.calls().creates, 2);
    }

    #[tokio::test]
    async fn test_sync_without_token_fails_early() {
        let transport = MemoryTransport::new();
        let engine = SyncEngine::new(transport.clone(), SyncOptions::default());
        let repo = MemoryRepository::new();

        let output = Output::new(OutputFormat::Quiet);
        let err = sync(&engine, &repo, &Config::default(), &output)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("remote.token"));
        assert_eq!(transport.calls().finds, 0);
    }

    #[tokio::test]
    async fn test_sync_reports_remote_failure() {
        let transport = MemoryTransport::new();
        transport.fail_writes(Some(RemoteError::Unauthorized));
        let engine = SyncEngine::new(transport, SyncOptions::default());
        let repo = MemoryRepository::new();

        let output = Output::new(OutputFormat::Quiet);
        let err = sync(&engine, &repo, &configured(), &output)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Sync failed"));
    }

    #[test]
    fn test_describe_skipped() {
        let result: SyncResult<SyncOutcome<VocabularyReport>> =
            Ok(SyncOutcome::Skipped(SkipReason::AlreadyRunning));
        assert_eq!(describe(&result, describe_vocabulary), "skipped (already running)");
    }
}
