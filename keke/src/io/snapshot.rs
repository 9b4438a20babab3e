//! Snapshot store under `.keke/snapshots/`.
//!
//! Backups are taken before a destructive write and never overwritten. The
//! directory is flat: one `<base>.<stamp>.snap` file per backup plus an
//! `index.json` that remembers each backup's project-relative source path.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDateTime, Timelike};
use tracing::{debug, instrument, warn};

use super::project::ProjectContext;
use crate::core::paths::display_relative;
use crate::core::snapshot_name::{
    SnapshotRecord, SnapshotStamp, parse_snapshot_file_name, snapshot_file_name,
};

const INDEX_FILE: &str = "index.json";

type SnapshotIndex = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(project: &ProjectContext) -> Self {
        Self {
            root: project.root.clone(),
            dir: project.snapshots_dir.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Back up `target` (absolute or project-relative) if it exists.
    ///
    /// Returns `Ok(None)` when there is nothing to protect yet.
    pub fn create(&self, target: &Path) -> Result<Option<SnapshotRecord>> {
        self.create_at(target, Local::now().naive_local())
    }

    /// [`create`](Self::create) with an explicit clock reading.
    #[instrument(skip(self), fields(target = %target.display()))]
    pub fn create_at(&self, target: &Path, now: NaiveDateTime) -> Result<Option<SnapshotRecord>> {
        let target = self.root.join(target);
        let content = match fs::read(&target) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("target does not exist yet, no snapshot needed");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", target.display()));
            }
        };
        let base = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("cannot snapshot {}: no file name", target.display()))?;

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create snapshot dir {}", self.dir.display()))?;

        let mut stamp = SnapshotStamp::new(now.with_nanosecond(0).unwrap_or(now));
        let (snapshot_file, path) = loop {
            let name = snapshot_file_name(&base, &stamp);
            let path = self.dir.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(err) = file.write_all(&content) {
                        drop(file);
                        let _ = fs::remove_file(&path);
                        return Err(err).with_context(|| format!("write {}", path.display()));
                    }
                    break (name, path);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!(name = %name, "snapshot name taken, bumping sequence");
                    stamp = stamp.next();
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("create {}", path.display()));
                }
            }
        };

        let original_path = target.strip_prefix(&self.root).ok().map(Path::to_path_buf);
        if let Some(relative) = &original_path
            && let Err(err) = self.record_in_index(&snapshot_file, relative)
        {
            warn!(err = %format!("{err:#}"), "failed to update snapshot index");
        }

        debug!(snapshot = %snapshot_file, bytes = content.len(), "snapshot created");
        Ok(Some(SnapshotRecord {
            original_file: base,
            timestamp: stamp,
            snapshot_file,
            path,
            original_path,
        }))
    }

    /// Every parseable snapshot in the directory, in no particular order.
    ///
    /// A missing directory is an empty set.
    pub fn list(&self) -> Result<Vec<SnapshotRecord>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", self.dir.display()));
            }
        };
        let index = self.load_index();

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.context("read snapshot entry")?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some((original_file, timestamp)) = parse_snapshot_file_name(&name) else {
                continue;
            };
            let original_path = index.get(&name).map(PathBuf::from);
            records.push(SnapshotRecord {
                original_file,
                timestamp,
                path: entry.path(),
                snapshot_file: name,
                original_path,
            });
        }
        Ok(records)
    }

    /// Where `record` restores to.
    pub fn restore_target(&self, record: &SnapshotRecord) -> PathBuf {
        match &record.original_path {
            Some(relative) => self.root.join(relative),
            None => self.root.join(&record.original_file),
        }
    }

    /// Copy the snapshot's bytes onto its original path, unconditionally.
    #[instrument(skip(self, record), fields(snapshot = %record.snapshot_file))]
    pub fn restore(&self, record: &SnapshotRecord) -> Result<PathBuf> {
        let content = fs::read(&record.path)
            .with_context(|| format!("read snapshot {}", record.snapshot_file))?;
        let target = self.restore_target(record);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&target, content).with_context(|| format!("restore {}", target.display()))?;
        debug!(target = %target.display(), "snapshot restored");
        Ok(target)
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn load_index(&self) -> SnapshotIndex {
        let path = self.index_path();
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(path = %path.display(), err = %err, "snapshot index malformed, ignoring");
                SnapshotIndex::new()
            }),
            Err(_) => SnapshotIndex::new(),
        }
    }

    fn record_in_index(&self, snapshot_file: &str, relative: &Path) -> Result<()> {
        let mut index = self.load_index();
        index.insert(snapshot_file.to_string(), display_relative(relative));
        let mut buf = serde_json::to_string_pretty(&index).context("serialize snapshot index")?;
        buf.push('\n');
        let path = self.index_path();
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, buf).with_context(|| format!("write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path).with_context(|| format!("replace {}", path.display()))?;
        Ok(())
    }
}
