//! lexsync CLI
//!
//! Command-line interface for lexsync - a reading library and vocabulary
//! notebook that syncs through a remote snapshot store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lexsync_core::sync::SyncTrigger;
use lexsync_core::{Config, GistTransport, JsonFileRepository, Library, StorageError, SyncEngine};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "lexsync")]
#[command(about = "lexsync - Offline-first reading library and vocabulary notebook")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a text file as a document
    #[command(alias = "add")]
    Import {
        /// Path to a plain text file
        file: PathBuf,
        /// Document title (defaults to the file name)
        #[arg(short = 'T', long)]
        title: Option<String>,
    },
    /// List all documents
    #[command(alias = "ls")]
    List,
    /// Show a document with its reading progress
    Show {
        /// Document ID (full UUID or prefix)
        id: String,
    },
    /// Rename a document
    Rename {
        /// Document ID (full UUID or prefix)
        id: String,
        /// New title
        title: String,
    },
    /// Delete a document
    #[command(alias = "rm")]
    Delete {
        /// Document ID (full UUID or prefix)
        id: String,
    },
    /// Set the reading position of a document
    Progress {
        /// Document ID (full UUID or prefix)
        id: String,
        /// Index of the current unit
        unit: u32,
    },
    /// Set how much of a unit is revealed
    Reveal {
        /// Unit ID
        unit_id: String,
        /// Reveal level
        level: u8,
    },
    /// Manage saved words
    Word {
        #[command(subcommand)]
        command: WordCommands,
    },
    /// Sync with the remote store
    Sync,
    /// Show library and remote status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum WordCommands {
    /// Save a word
    #[command(alias = "add")]
    Save {
        /// The word
        word: String,
        /// Definition
        #[arg(short, long)]
        definition: Option<String>,
        /// Sentence the word appeared in
        #[arg(short, long)]
        context: Option<String>,
        /// Document the word came from (ID or prefix)
        #[arg(short, long)]
        source: Option<String>,
    },
    /// List saved words
    #[command(alias = "ls")]
    List,
    /// Mark a word as mastered
    Master {
        /// The word
        word: String,
    },
    /// Record a review (quality 0-5)
    Review {
        /// The word
        word: String,
        /// How well the word was recalled
        quality: u8,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, auto_sync, remote.token, remote.api_url, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let result = run(cli, &output).await;
    if let Some(hint) = result.as_ref().err().and_then(storage_hint) {
        eprintln!("  {}", hint);
    }
    result
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    // Config commands don't need the library
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), output);
    }

    let config = Config::load()?;
    let repo = Arc::new(JsonFileRepository::open(&config)?);
    let library = Library::new(Arc::clone(&repo));
    let engine = Arc::new(SyncEngine::from_config(
        GistTransport::from_config(&config.remote)?,
        &config,
    ));

    let trigger = write_trigger(&cli.command);
    let auto_sync = config.auto_sync && config.remote.is_configured();

    // Pull before reading so listings reflect other devices
    if auto_sync && is_read(&cli.command) {
        commands::sync::auto_sync(
            Arc::clone(&engine),
            Arc::clone(&repo),
            SyncTrigger::Startup,
            output,
        )
        .await;
    }

    let result = match cli.command {
        Commands::Import { file, title } => {
            commands::document::import(&library, &file, title, output)
        }
        Commands::List => commands::document::list(&library, output),
        Commands::Show { id } => commands::document::show(&library, &id, output),
        Commands::Rename { id, title } => {
            commands::document::rename(&library, &id, &title, output)
        }
        Commands::Delete { id } => commands::document::delete(&library, &id, output),
        Commands::Progress { id, unit } => {
            commands::document::progress(&library, &id, unit, output)
        }
        Commands::Reveal { unit_id, level } => {
            commands::document::reveal(&library, &unit_id, level, output)
        }
        Commands::Word { command } => handle_word_command(command, &library, output),
        Commands::Sync => commands::sync::sync(engine.as_ref(), repo.as_ref(), &config, output).await,
        Commands::Status => commands::status::show(&library, &config, engine.as_ref(), output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    // Push local changes after a successful write
    if let Some(trigger) = trigger {
        if auto_sync && result.is_ok() {
            commands::sync::auto_sync(engine, repo, trigger, output).await;
        }
    }

    result
}

fn handle_word_command(
    command: WordCommands,
    library: &Library<JsonFileRepository>,
    output: &Output,
) -> Result<()> {
    match command {
        WordCommands::Save {
            word,
            definition,
            context,
            source,
        } => commands::word::add(library, &word, definition, context, source, output),
        WordCommands::List => commands::word::list(library, output),
        WordCommands::Master { word } => commands::word::master(library, &word, output),
        WordCommands::Review { word, quality } => {
            commands::word::review(library, &word, quality, output)
        }
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Recovery hint for a failed library read or write
fn storage_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StorageError>())
        .and_then(StorageError::recovery_suggestion)
}

/// The sync trigger for commands that change the library
fn write_trigger(command: &Commands) -> Option<SyncTrigger> {
    match command {
        Commands::Import { .. } => Some(SyncTrigger::Import),
        Commands::Delete { .. } => Some(SyncTrigger::Delete),
        Commands::Rename { .. }
        | Commands::Progress { .. }
        | Commands::Reveal { .. }
        | Commands::Word {
            command:
                WordCommands::Save { .. } | WordCommands::Master { .. } | WordCommands::Review { .. },
        } => Some(SyncTrigger::Edit),
        _ => None,
    }
}

fn is_read(command: &Commands) -> bool {
    matches!(
        command,
        Commands::List
            | Commands::Show { .. }
            | Commands::Word {
                command: WordCommands::List
            }
    )
}

/// Log to stderr; `LEXSYNC_LOG` overrides the verbosity flags
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = EnvFilter::try_from_env("LEXSYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!("lexsync_core={},lexsync_cli={}", level, level))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_word_save() {
        let cli = Cli::try_parse_from(["lexsync", "word", "add", "serendipity", "-d", "luck"]).unwrap();
        match cli.command {
            Commands::Word {
                command: WordCommands::Save { word, definition, .. },
            } => {
                assert_eq!(word, "serendipity");
                assert_eq!(definition.as_deref(), Some("luck"));
            }
            _ => panic!("expected word save"),
        }
    }

    #[test]
    fn test_write_triggers() {
        let cli = Cli::try_parse_from(["lexsync", "rm", "abc"]).unwrap();
        assert_eq!(write_trigger(&cli.command), Some(SyncTrigger::Delete));

        let cli = Cli::try_parse_from(["lexsync", "import", "story.txt"]).unwrap();
        assert_eq!(write_trigger(&cli.command), Some(SyncTrigger::Import));

        let cli = Cli::try_parse_from(["lexsync", "progress", "abc", "3"]).unwrap();
        assert_eq!(write_trigger(&cli.command), Some(SyncTrigger::Edit));

        let cli = Cli::try_parse_from(["lexsync", "ls"]).unwrap();
        assert_eq!(write_trigger(&cli.command), None);
        assert!(is_read(&cli.command));
    }

    #[test]
    fn test_storage_hint_through_context() {
        let err = anyhow::Error::new(StorageError::from_io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            PathBuf::from("/data/library.json"),
        ))
        .context("Failed to save document");
        assert!(storage_hint(&err).unwrap().contains("permissions"));

        let other = anyhow::anyhow!("Document not found: abc");
        assert_eq!(storage_hint(&other), None);
    }

    #[test]
    fn test_verbose_is_counted() {
        let cli = Cli::try_parse_from(["lexsync", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
