//! File primitives scoped to the project root.
//!
//! Errors come back as [`ActionError`] so the dispatcher can fold them into
//! result text.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::action::ActionError;
use crate::core::paths::{clean, display_relative, escapes_base, has_excluded_segment};

/// A write destination checked against the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    pub absolute: PathBuf,
    /// Project-relative, `/`-separated.
    pub relative: String,
}

/// Resolve `path` for writing. Rejects anything that cleans to a location
/// outside `root`.
pub fn resolve_write_target(root: &Path, path: &str) -> Result<WriteTarget, ActionError> {
    let cleaned = clean(Path::new(path));
    let relative = if cleaned.is_absolute() {
        cleaned
            .strip_prefix(clean(root))
            .map(Path::to_path_buf)
            .map_err(|_| ActionError::OutsideProject(path.to_string()))?
    } else {
        cleaned
    };
    if escapes_base(&relative) {
        return Err(ActionError::OutsideProject(path.to_string()));
    }
    if relative.as_os_str().is_empty() {
        return Err(ActionError::MalformedArguments(format!(
            "write_file path {path:?} does not name a file"
        )));
    }
    Ok(WriteTarget {
        absolute: root.join(&relative),
        relative: display_relative(&relative),
    })
}

/// Read a file as text (lossy for non-UTF-8 content).
pub fn read_file(root: &Path, path: &str) -> Result<String, ActionError> {
    let content = fs::read(root.join(path)).map_err(|err| ActionError::io("reading", path, err))?;
    debug!(path, bytes = content.len(), "file read");
    Ok(String::from_utf8_lossy(&content).into_owned())
}

/// Write `content` to an already-resolved target, creating parent dirs.
pub fn write_file(target: &WriteTarget, content: &str) -> Result<(), ActionError> {
    if let Some(parent) = target.absolute.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| ActionError::io("creating directory for", &target.relative, err))?;
    }
    fs::write(&target.absolute, content)
        .map_err(|err| ActionError::io("writing", &target.relative, err))?;
    debug!(path = %target.relative, bytes = content.len(), "file written");
    Ok(())
}

/// Every file under `dir`, project-relative, sorted, one per line.
///
/// Any path with a segment exactly equal to an `excluded` name is skipped;
/// excluded directories are not descended into.
pub fn list_files(root: &Path, dir: &str, excluded: &[String]) -> Result<Vec<String>, ActionError> {
    let base = root.join(dir);
    fs::metadata(&base).map_err(|err| ActionError::io("listing", dir, err))?;

    let relative_to_root = |path: &Path| path.strip_prefix(root).unwrap_or(path).to_path_buf();

    let mut files = Vec::new();
    let walker = WalkDir::new(&base)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !has_excluded_segment(&relative_to_root(entry.path()), excluded));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(err = %err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        files.push(display_relative(&relative_to_root(entry.path())));
    }
    debug!(dir, count = files.len(), "listed files");
    Ok(files)
}
