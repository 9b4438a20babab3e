//! Persistent capability grants and the interactive permission gate.
//!
//! Grants live in `.keke/permissions.json` as `{read, write, execute}`. The
//! gate only ever flips a grant from false to true; removing the file is the
//! only way to revoke. Any failure to read the file reads as "nothing granted".

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::prompter::{Prompter, is_affirmative};
use crate::core::action::PermissionKind;
use crate::ui;

/// The three independent grants for one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSet {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl PermissionSet {
    pub fn allows(&self, kind: PermissionKind) -> bool {
        match kind {
            PermissionKind::Read => self.read,
            PermissionKind::Write => self.write,
            PermissionKind::Execute => self.execute,
        }
    }

    pub fn grant(&mut self, kind: PermissionKind) {
        match kind {
            PermissionKind::Read => self.read = true,
            PermissionKind::Write => self.write = true,
            PermissionKind::Execute => self.execute = true,
        }
    }
}

/// Load grants, failing closed: a missing or unreadable file grants nothing.
pub fn load_permissions(path: &Path) -> PermissionSet {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(path = %path.display(), err = %err, "permissions unreadable, treating as none");
            return PermissionSet::default();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(set) => set,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "permissions malformed, treating as none");
            PermissionSet::default()
        }
    }
}

/// Atomically write grants to disk (temp file + rename).
pub fn write_permissions(path: &Path, set: &PermissionSet) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(set).context("serialize permissions")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("permissions path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp permissions {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace permissions {}", path.display()))?;
    Ok(())
}

/// Check-then-request gate over one project's grants.
pub struct PermissionGate<'a, P: Prompter> {
    path: PathBuf,
    prompter: &'a P,
}

impl<'a, P: Prompter> PermissionGate<'a, P> {
    pub fn new(path: impl Into<PathBuf>, prompter: &'a P) -> Self {
        Self {
            path: path.into(),
            prompter,
        }
    }

    /// Pure read of the persisted grant.
    pub fn check(&self, kind: PermissionKind) -> bool {
        load_permissions(&self.path).allows(kind)
    }

    /// Ask the user for `kind`. On acceptance, persist that single grant.
    ///
    /// Refusal, empty input, or a failed read persists nothing and returns false.
    pub fn request(&self, kind: PermissionKind, message: &str) -> bool {
        ui::blank();
        ui::warning("PERMISSION REQUEST");
        ui::plain(message);

        let answer = match self.prompter.ask(&format!("Allow {kind}? (y/n)")) {
            Ok(answer) => answer,
            Err(err) => {
                warn!(err = %err, "permission prompt failed, treating as refusal");
                String::new()
            }
        };
        if !is_affirmative(&answer) {
            ui::error("Permission denied");
            return false;
        }

        let mut set = load_permissions(&self.path);
        set.grant(kind);
        match write_permissions(&self.path, &set) {
            Ok(()) => ui::success("Permission granted and saved"),
            Err(err) => {
                warn!(err = %format!("{err:#}"), %kind, "failed to persist grant");
                ui::warning("Permission granted for this action only (could not save)");
            }
        }
        true
    }

    /// Check, and request only when not yet granted.
    pub fn ensure(&self, kind: PermissionKind, message: &str) -> bool {
        self.check(kind) || self.request(kind, message)
    }
}
