//! Status command handler

use anyhow::Result;

use lexsync_core::sync::{Availability, DatasetKind, SyncEngine};
use lexsync_core::{Config, JsonFileRepository, Library, SnapshotTransport};

use crate::output::{Output, OutputFormat};

/// Show status information
pub async fn show<T: SnapshotTransport>(
    library: &Library<JsonFileRepository>,
    config: &Config,
    engine: &SyncEngine<T>,
    output: &Output,
) -> Result<()> {
    let stats = library.stats()?;
    let repo = library.repository();
    let availability = engine.availability().await;
    let remote = availability_label(availability);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "library": {
                        "path": repo.path(),
                        "exists": repo.exists(),
                        "size": repo.file_size(),
                    },
                    "remote": {
                        "status": remote,
                        "api_url": config.remote.api_url,
                        "articles_document": engine.options().document_name(DatasetKind::Articles),
                        "vocabulary_document": engine.options().document_name(DatasetKind::Vocabulary),
                        "auto_sync": config.auto_sync,
                        "verify_revision": config.sync.verify_revision,
                    },
                    "counts": stats,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", remote);
        }
        OutputFormat::Human => {
            println!("lexsync Status");
            println!("==============");
            println!();
            println!("Remote:");
            println!("  Status:     {}", remote);
            println!("  Server:     {}", config.remote.api_url);
            println!(
                "  Documents:  {}, {}",
                engine.options().document_name(DatasetKind::Articles),
                engine.options().document_name(DatasetKind::Vocabulary)
            );
            println!(
                "  Auto-sync:  {}",
                if config.auto_sync { "on" } else { "off" }
            );
            println!();
            println!("Storage:");
            println!("  Location: {}", repo.path().display());
            println!("  Size:     {}", format_size(repo.file_size()));
            println!();
            println!("Contents:");
            println!("  Documents:  {}", stats.documents);
            println!("  Words:      {} ({} mastered)", stats.vocabulary, stats.mastered);
            println!("  Tombstones: {}", stats.tombstones);
        }
    }

    Ok(())
}

fn availability_label(availability: Availability) -> &'static str {
    match availability {
        Availability::NotConfigured => "not configured",
        Availability::Available => "available",
        Availability::Unreachable => "unreachable",
    }
}

/// Format bytes as human-readable size
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
