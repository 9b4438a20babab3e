//! Interactive restore flow for `keke rollback`.
//!
//! Local only: lists snapshots, takes one numbered selection, asks for an
//! explicit overwrite confirmation, then copies the snapshot back.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::core::paths::{clean, display_relative};
use crate::core::snapshot_name::{SnapshotRecord, group_by_original};
use crate::io::project::ProjectContext;
use crate::io::prompter::{Prompter, is_affirmative};
use crate::io::snapshot::SnapshotStore;
use crate::ui;

const STAMP_DISPLAY: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// No snapshots exist at all.
    Empty,
    /// Snapshots exist, none for the requested file.
    NoMatch(String),
    Cancelled,
    /// The answer was not a listed number.
    InvalidSelection(String),
    Restored {
        record: SnapshotRecord,
        target: PathBuf,
    },
}

pub fn run_rollback<P: Prompter>(
    project: &ProjectContext,
    filter: Option<&str>,
    prompter: &P,
) -> Result<RollbackOutcome> {
    let store = SnapshotStore::new(project);
    let mut records = store.list()?;
    if records.is_empty() {
        ui::info("No snapshots found");
        return Ok(RollbackOutcome::Empty);
    }
    if let Some(filter) = filter {
        records.retain(|record| matches_filter(record, filter));
        if records.is_empty() {
            ui::info(format!("No snapshots found for {filter}"));
            return Ok(RollbackOutcome::NoMatch(filter.to_string()));
        }
    }

    let choices = render_choices(records);

    let answer = prompter.ask("Enter number to restore (or 'c' to cancel)")?;
    if answer.is_empty() || answer.eq_ignore_ascii_case("c") {
        ui::info("Cancelled");
        return Ok(RollbackOutcome::Cancelled);
    }
    let Some(record) = answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|idx| choices.get(idx))
    else {
        ui::error(format!("Invalid selection: {answer}"));
        return Ok(RollbackOutcome::InvalidSelection(answer));
    };

    let shown = target_label(record);
    let confirm = prompter.ask(&format!(
        "Restore {shown}? This will OVERWRITE current version. (y/n)"
    ))?;
    if !is_affirmative(&confirm) {
        ui::info("Cancelled");
        return Ok(RollbackOutcome::Cancelled);
    }

    let target = store.restore(record)?;
    debug!(snapshot = %record.snapshot_file, "restored");
    ui::success(format!("Restored {shown} from {}", record.snapshot_file));
    Ok(RollbackOutcome::Restored {
        record: record.clone(),
        target,
    })
}

/// Print the numbered list, grouped by file and newest first, and return the
/// records in display order.
fn render_choices(records: Vec<SnapshotRecord>) -> Vec<SnapshotRecord> {
    ui::blank();
    ui::info("Available snapshots:");
    let mut choices = Vec::new();
    for (name, group) in group_by_original(records) {
        ui::plain(format!("  {name}"));
        for record in group {
            choices.push(record);
            let record = &choices[choices.len() - 1];
            let mut when = record.timestamp.time.format(STAMP_DISPLAY).to_string();
            if record.timestamp.seq > 0 {
                when.push_str(&format!(" #{}", record.timestamp.seq));
            }
            ui::plain(format!(
                "    [{}] {when}  -> {}",
                choices.len(),
                target_label(record)
            ));
        }
    }
    ui::blank();
    choices
}

fn target_label(record: &SnapshotRecord) -> String {
    match &record.original_path {
        Some(relative) => display_relative(relative),
        None => record.original_file.clone(),
    }
}

/// A filter matches a record by project-relative path or by base name.
fn matches_filter(record: &SnapshotRecord, filter: &str) -> bool {
    let wanted = clean(Path::new(filter));
    if let Some(relative) = &record.original_path
        && display_relative(relative) == display_relative(&wanted)
    {
        return true;
    }
    if record.original_file == filter {
        return true;
    }
    record.original_path.is_none()
        && wanted
            .file_name()
            .is_some_and(|name| name.to_string_lossy() == record.original_file)
}
