//! Append-only record of writes in `.keke/changelog.md`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tracing::warn;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append one line for a completed write. Only appends to an existing log;
/// failures are logged and swallowed.
pub fn record_write(changelog: &Path, relative_path: &str, bytes: usize) {
    let line = write_line(Local::now().naive_local(), relative_path, bytes);
    if let Err(err) = append_line(changelog, &line) {
        warn!(err = %format!("{err:#}"), "failed to update changelog");
    }
}

fn write_line(at: NaiveDateTime, relative_path: &str, bytes: usize) -> String {
    format!("- {} wrote {relative_path} ({bytes} bytes)\n", at.format(TIME_FORMAT))
}

fn append_line(changelog: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(changelog)
        .with_context(|| format!("open {}", changelog.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append {}", changelog.display()))
}
