//! File lifecycle around the pipeline: what gets listed, overwritten,
//! purged, and retired.
//!
//! All mutation here is deliberately blunt, matching the pipeline's
//! last-writer-wins semantics:
//!
//! - **Backup purge** — before a run, `~`-suffixed leftovers in the output
//!   directory are deleted (the convention editors and older tagging tools
//!   use for backup copies).
//! - **Input enumeration** — a flat, sorted listing of the input directory,
//!   admitting only the accepted raster extensions.
//! - **Collision overwrite** — an existing file at a derived output path is
//!   deleted before the new write; same-caption inputs collapse to one file.
//! - **Source retirement** — a fully processed source is deleted from the
//!   input directory. Retirement targets whatever path was last operated on
//!   for the item (the converted sibling, if conversion happened).
//!
//! Purge and retirement failures are logged and swallowed — they never
//! stop the run.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Extensions admitted from the input directory (case-insensitive).
pub const INPUT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Delete `~`-suffixed backup files from the output directory.
///
/// Returns the number of files removed. Every failure — an unreadable
/// directory, an undeletable file — is logged at warn and ignored.
pub fn purge_backups(output_dir: &Path) -> usize {
    let entries = match std::fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot scan {} for backup files: {e}", output_dir.display());
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let is_backup = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with('~'));
        if !is_backup {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed backup file: {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove backup file {}: {e}", path.display()),
        }
    }
    removed
}

/// List processable images in the input directory: regular files with an
/// accepted extension, non-recursive, sorted by name for a deterministic
/// processing order.
pub fn list_inputs(input_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in WalkDir::new(input_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() && has_accepted_extension(entry.path()) {
            inputs.push(entry.into_path());
        }
    }
    inputs.sort();
    Ok(inputs)
}

fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            INPUT_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

/// Resolve the output path for a derived filename, deleting any file
/// already there. Overwrite semantics: the last successful write for a
/// given derived name wins; a collision is never an error.
pub fn prepare_output_path(output_dir: &Path, filename: &str) -> io::Result<PathBuf> {
    let path = output_dir.join(filename);
    if path.exists() {
        std::fs::remove_file(&path)?;
        info!("Removed existing file with the same name: {}", path.display());
    }
    Ok(path)
}

/// Delete a fully processed source file. Best-effort: a missing file is a
/// no-op and a failed delete is logged, never propagated.
pub fn retire_source(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => info!("Removed original file: {}", path.display()),
        Err(e) => warn!("Failed to remove original file {}: {e}", path.display()),
    }
}
