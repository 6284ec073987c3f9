//! Document command handlers

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use lexsync_core::{Library, Repository};

use crate::output::{short_id, Output};

/// Import a text file as a new document
pub fn import<R: Repository + ?Sized>(
    library: &Library<R>,
    file: &Path,
    title: Option<String>,
    output: &Output,
) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let title = title.unwrap_or_else(|| title_from_path(file));

    let doc = library
        .import_document(&title, &content)
        .context("Failed to import document")?;

    output.success(&format!(
        "Imported {} ({} units)",
        short_id(&doc.id),
        doc.units.len()
    ));
    if output.is_quiet() {
        println!("{}", doc.id);
    }
    Ok(())
}

/// List all documents
pub fn list<R: Repository + ?Sized>(library: &Library<R>, output: &Output) -> Result<()> {
    let docs = library.list_documents()?;
    output.print_documents(&docs);
    Ok(())
}

/// Show a document with its units
pub fn show<R: Repository + ?Sized>(library: &Library<R>, id: &str, output: &Output) -> Result<()> {
    let id = library.resolve_document_id(id)?;
    let doc = library
        .get_document(&id)?
        .ok_or_else(|| anyhow::anyhow!("Document not found: {}", id))?;
    let progress = library.get_progress(&id)?;
    let reveal = library.reveal_states_for(&id)?;

    output.print_document(&doc, progress.as_ref(), &reveal);
    Ok(())
}

/// Change the title of a document
pub fn rename<R: Repository + ?Sized>(
    library: &Library<R>,
    id: &str,
    title: &str,
    output: &Output,
) -> Result<()> {
    let id = library.resolve_document_id(id)?;
    let doc = library.rename_document(&id, title)?;
    output.success(&format!("Renamed {} to '{}'", short_id(&doc.id), doc.title));
    Ok(())
}

/// Delete a document
pub fn delete<R: Repository + ?Sized>(library: &Library<R>, id: &str, output: &Output) -> Result<()> {
    let id = library.resolve_document_id(id)?;
    library.delete_document(&id)?;
    output.success(&format!("Deleted document {}", short_id(&id)));
    Ok(())
}

/// Move the reading position of a document
pub fn progress<R: Repository + ?Sized>(
    library: &Library<R>,
    id: &str,
    unit_index: u32,
    output: &Output,
) -> Result<()> {
    let id = library.resolve_document_id(id)?;
    let progress = library.record_progress(&id, unit_index)?;

    if output.is_json() {
        output.print_json(&progress);
    } else {
        output.success(&format!(
            "Now at unit {} of {} ({:.0}%)",
            unit_index,
            short_id(&id),
            progress.percentage
        ));
    }
    Ok(())
}

/// Set the reveal level of a unit
pub fn reveal<R: Repository + ?Sized>(
    library: &Library<R>,
    unit_id: &str,
    level: u8,
    output: &Output,
) -> Result<()> {
    let state = library.set_reveal_level(unit_id, level)?;

    if output.is_json() {
        output.print_json(&state);
    } else {
        output.success(&format!("Unit {} at level {}", state.unit_id, state.level));
    }
    Ok(())
}

/// Default title: file name without extension
fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Untitled".to_string())
}
