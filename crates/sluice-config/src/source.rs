//! Reading `.sluice` sources from disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use sluice_lang::Scope;
use sluice_types::Result;

use crate::model::PipelineDescription;
use crate::resolve::{resolve_group, resolve_unit};

/// Extension of source files picked up from a directory.
pub const FILE_EXTENSION: &str = "sluice";

/// Source files directly inside `dir`, sorted by file name.
fn source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == FILE_EXTENSION) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Every source file in `dir` as a `(file name, text)` pair, sorted by name.
pub fn read_fragments(dir: &Path) -> Result<Vec<(String, String)>> {
    source_files(dir)?
        .into_iter()
        .map(|path| -> Result<(String, String)> {
            let text = fs::read_to_string(&path)?;
            Ok((display_name(&path), text))
        })
        .collect()
}

/// Every source file in `dir` concatenated into one text, sorted by name.
pub fn read_directory(dir: &Path) -> Result<String> {
    let fragments = read_fragments(dir)?;
    let mut out = String::new();
    for (_, text) in fragments {
        out.push_str(&text);
        if !text.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out)
}

/// Resolve a file, or a directory of source files.
///
/// A directory is resolved as a group of fragments, or as one concatenated
/// unit when `concat` is set.
pub fn resolve_path(path: &Path, base: &Scope, concat: bool) -> Result<PipelineDescription> {
    if path.is_dir() {
        if concat {
            debug!(dir = %path.display(), "resolving directory as one unit");
            let text = read_directory(path)?;
            resolve_unit(&path.display().to_string(), &text, base)
        } else {
            let fragments = read_fragments(path)?;
            debug!(dir = %path.display(), fragments = fragments.len(), "resolving directory as a group");
            resolve_group(fragments, base)
        }
    } else {
        let text = fs::read_to_string(path)?;
        resolve_unit(&display_name(path), &text, base)
    }
}
