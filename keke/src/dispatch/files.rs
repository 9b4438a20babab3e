use tracing::{debug, warn};

use crate::core::action::ActionError;
use crate::io::changelog;
use crate::io::config::KekeConfig;
use crate::io::project::ProjectContext;
use crate::io::snapshot::SnapshotStore;
use crate::io::workspace::{list_files, read_file, resolve_write_target, write_file};
use crate::ui;

pub(super) fn read(project: &ProjectContext, path: &str) -> Result<String, ActionError> {
    read_file(&project.root, path)
}

/// Snapshot, write, then log. A failed snapshot does not block the write.
pub(super) fn write(
    project: &ProjectContext,
    snapshots: &SnapshotStore,
    path: &str,
    content: &str,
) -> Result<String, ActionError> {
    let target = resolve_write_target(&project.root, path)?;

    match snapshots.create(&target.absolute) {
        Ok(Some(record)) => debug!(snapshot = %record.snapshot_file, "pre-write snapshot taken"),
        Ok(None) => {}
        Err(err) => {
            warn!(err = %format!("{err:#}"), path = %target.relative, "snapshot failed");
            ui::warning(format!("Failed to create snapshot: {err}"));
        }
    }

    write_file(&target, content)?;
    changelog::record_write(&project.changelog_path, &target.relative, content.len());
    Ok(format!(
        "Successfully wrote {} bytes to {}",
        content.len(),
        target.relative
    ))
}

pub(super) fn list(
    project: &ProjectContext,
    config: &KekeConfig,
    path: &str,
) -> Result<String, ActionError> {
    let files = list_files(&project.root, path, &config.excluded_dirs)?;
    Ok(files.join("\n"))
}
