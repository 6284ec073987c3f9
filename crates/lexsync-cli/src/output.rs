//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use lexsync_core::models::{Document, Progress, RevealState, VocabularyEntry};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is in JSON mode
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode output: {}", e),
        }
    }

    /// Print a single document with its progress
    pub fn print_document(&self, doc: &Document, progress: Option<&Progress>, reveal: &[RevealState]) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", doc.id);
                println!("Title:    {}", doc.title);
                println!("Units:    {}", doc.units.len());
                if let Some(progress) = progress {
                    println!(
                        "Progress: {:.0}%{}",
                        progress.percentage,
                        progress
                            .current_unit_id
                            .as_deref()
                            .map(|u| format!(" (at {})", u))
                            .unwrap_or_default()
                    );
                }
                println!("Created:  {}", doc.created_at.format("%Y-%m-%d %H:%M"));
                println!("Updated:  {}", doc.updated_at.format("%Y-%m-%d %H:%M"));

                if !doc.units.is_empty() {
                    println!();
                    println!("── Units ({}) ──", doc.units.len());
                    for unit in &doc.units {
                        let level = reveal
                            .iter()
                            .find(|r| r.unit_id == unit.id)
                            .map(|r| r.level)
                            .unwrap_or(0);
                        println!("[{}] L{} {}", unit.index, level, truncate(&unit.text, 60));
                    }
                }
            }
            OutputFormat::Json => {
                self.print_json(&serde_json::json!({
                    "document": doc,
                    "progress": progress,
                    "revealState": reveal,
                }));
            }
            OutputFormat::Quiet => {
                println!("{}", doc.id);
            }
        }
    }

    /// Print a list of documents
    pub fn print_documents(&self, docs: &[Document]) {
        match self.format {
            OutputFormat::Human => {
                if docs.is_empty() {
                    println!("No documents found.");
                    return;
                }
                for doc in docs {
                    println!(
                        "{} | {} | {} unit(s) | {}",
                        short_id(&doc.id),
                        truncate(&doc.title, 40),
                        doc.units.len(),
                        doc.updated_at.format("%Y-%m-%d")
                    );
                }
                println!("\n{} document(s)", docs.len());
            }
            OutputFormat::Json => self.print_json(docs),
            OutputFormat::Quiet => {
                for doc in docs {
                    println!("{}", doc.id);
                }
            }
        }
    }

    /// Print a single vocabulary entry
    pub fn print_word(&self, entry: &VocabularyEntry) {
        match self.format {
            OutputFormat::Human => {
                println!("Word:       {}", entry.word);
                if let Some(ref definition) = entry.definition {
                    println!("Definition: {}", definition);
                }
                if let Some(ref context) = entry.context {
                    println!("Context:    {}", context);
                }
                println!("Mastered:   {}", if entry.mastered { "yes" } else { "no" });
                if let Some(next) = entry.next_review_at {
                    println!("Next review: {}", next.format("%Y-%m-%d"));
                }
            }
            OutputFormat::Json => self.print_json(entry),
            OutputFormat::Quiet => {
                println!("{}", entry.word);
            }
        }
    }

    /// Print the vocabulary list
    pub fn print_words(&self, entries: &[VocabularyEntry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No words saved.");
                    return;
                }
                for entry in entries {
                    let marker = if entry.mastered { "✓" } else { " " };
                    println!(
                        "{} {} | {}",
                        marker,
                        truncate(&entry.word, 25),
                        truncate(entry.definition.as_deref().unwrap_or(""), 50)
                    );
                }
                println!("\n{} word(s)", entries.len());
            }
            OutputFormat::Json => self.print_json(entries),
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.word);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (suppressed in quiet mode)
    pub fn warn(&self, msg: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", msg);
        }
    }
}

/// First 8 characters of an id
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Truncate a string to max length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    if first_line.chars().count() <= max_len {
        first_line.to_string()
    } else {
        let kept: String = first_line.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long title indeed", 10), "a very ...");
        assert_eq!(truncate("first\nsecond", 20), "first");
        assert_eq!(truncate("ñññññ", 4), "ñ...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
