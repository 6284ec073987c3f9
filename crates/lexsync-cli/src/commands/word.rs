//! Vocabulary command handlers

use anyhow::Result;

use lexsync_core::{Library, Repository};

use crate::output::Output;

/// Save a word
pub fn add<R: Repository + ?Sized>(
    library: &Library<R>,
    word: &str,
    definition: Option<String>,
    context: Option<String>,
    source: Option<String>,
    output: &Output,
) -> Result<()> {
    let source = match source {
        Some(id) => Some(library.resolve_document_id(&id)?),
        None => None,
    };
    let entry = library.add_word(word, definition, context, source.as_deref())?;

    output.success(&format!("Saved '{}'", entry.word));
    if !output.is_quiet() && !output.is_json() {
        output.print_word(&entry);
    }
    Ok(())
}

/// List saved words
pub fn list<R: Repository + ?Sized>(library: &Library<R>, output: &Output) -> Result<()> {
    let entries = library.list_words()?;
    output.print_words(&entries);
    Ok(())
}

/// Mark a word as learned
pub fn master<R: Repository + ?Sized>(library: &Library<R>, word: &str, output: &Output) -> Result<()> {
    let entry = library.mark_mastered(word)?;
    output.success(&format!("Marked '{}' as mastered", entry.word));
    Ok(())
}

/// Record a review of a word
pub fn review<R: Repository + ?Sized>(
    library: &Library<R>,
    word: &str,
    quality: u8,
    output: &Output,
) -> Result<()> {
    let entry = library.review_word(word, quality)?;
    output.success(&format!(
        "Reviewed '{}', next review in {} day(s)",
        entry.word, entry.interval_days
    ));
    Ok(())
}
