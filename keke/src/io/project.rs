//! Project context and `.keke/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use super::config::{KekeConfig, write_config};
use super::permissions::{PermissionSet, write_permissions};

/// Name of the per-project metadata directory.
pub const PROJECT_DIR_NAME: &str = ".keke";

/// Explicit project root plus every canonical path under `.keke/`.
///
/// Passed into each component instead of deriving locations from the
/// process working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub keke_dir: PathBuf,
    pub permissions_path: PathBuf,
    pub snapshots_dir: PathBuf,
    pub changelog_path: PathBuf,
    pub config_path: PathBuf,
}

impl ProjectContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let keke_dir = root.join(PROJECT_DIR_NAME);
        Self {
            root: root.clone(),
            keke_dir: keke_dir.clone(),
            permissions_path: keke_dir.join("permissions.json"),
            snapshots_dir: keke_dir.join("snapshots"),
            changelog_path: keke_dir.join("changelog.md"),
            config_path: keke_dir.join("config.toml"),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.keke_dir.is_dir()
    }

    /// Fail with a user-facing message when `.keke/` is missing.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(anyhow!("project not initialized (run `keke init`)"))
        }
    }
}

/// What `init_project` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// False when `.keke/` already existed and nothing was touched.
    pub created: bool,
    pub gitignore_updated: bool,
}

/// Create `.keke/` scaffolding in the project root.
///
/// An existing `.keke/` is left untouched so grants are never reset.
pub fn init_project(project: &ProjectContext) -> Result<InitReport> {
    if project.keke_dir.exists() {
        if !project.keke_dir.is_dir() {
            return Err(anyhow!("{PROJECT_DIR_NAME} exists but is not a directory"));
        }
        debug!(root = %project.root.display(), "project already initialized");
        return Ok(InitReport {
            created: false,
            gitignore_updated: false,
        });
    }

    create_dir(&project.keke_dir)?;
    create_dir(&project.snapshots_dir)?;
    write_permissions(&project.permissions_path, &PermissionSet::default())?;
    fs::write(&project.changelog_path, CHANGELOG_HEADER)
        .with_context(|| format!("write {}", project.changelog_path.display()))?;
    write_config(&project.config_path, &KekeConfig::default())?;

    let gitignore_updated = if project.root.join(".git").exists() {
        add_to_gitignore(&project.root)?
    } else {
        false
    };

    info!(root = %project.root.display(), "project initialized");
    Ok(InitReport {
        created: true,
        gitignore_updated,
    })
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

/// Append `.keke/` to `.gitignore` unless an entry already covers it.
fn add_to_gitignore(root: &Path) -> Result<bool> {
    let path = root.join(".gitignore");
    let existing = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    let entry = format!("{PROJECT_DIR_NAME}/");
    if existing
        .lines()
        .any(|line| line.trim() == entry || line.trim() == PROJECT_DIR_NAME)
    {
        return Ok(false);
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    if !updated.is_empty() {
        updated.push('\n');
    }
    updated.push_str(&format!("# Keke\n{entry}\n"));
    fs::write(&path, updated).with_context(|| format!("write {}", path.display()))?;
    Ok(true)
}

const CHANGELOG_HEADER: &str = "# Keke Changelog\n\nAll changes made by Keke are logged here.\n\n---\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::permissions::load_permissions;

    #[test]
    fn init_creates_expected_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = ProjectContext::new(temp.path());

        let report = init_project(&project).expect("init");

        assert!(report.created);
        assert!(!report.gitignore_updated);
        assert!(project.keke_dir.is_dir());
        assert!(project.snapshots_dir.is_dir());
        assert!(project.changelog_path.is_file());
        assert!(project.config_path.is_file());
        assert_eq!(
            load_permissions(&project.permissions_path),
            PermissionSet::default()
        );
    }

    #[test]
    fn init_twice_keeps_existing_grants() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = ProjectContext::new(temp.path());
        init_project(&project).expect("init");
        let granted = PermissionSet {
            read: true,
            write: false,
            execute: true,
        };
        write_permissions(&project.permissions_path, &granted).expect("write");

        let report = init_project(&project).expect("re-init");

        assert!(!report.created);
        assert_eq!(load_permissions(&project.permissions_path), granted);
    }

    #[test]
    fn init_adds_gitignore_entry_once_in_git_repo() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join(".git")).expect("git dir");
        fs::write(temp.path().join(".gitignore"), "target").expect("gitignore");
        let project = ProjectContext::new(temp.path());

        let report = init_project(&project).expect("init");
        assert!(report.gitignore_updated);
        let contents = fs::read_to_string(temp.path().join(".gitignore")).expect("read");
        assert_eq!(contents, "target\n\n# Keke\n.keke/\n");

        assert!(!add_to_gitignore(temp.path()).expect("second add"));
    }

    #[test]
    fn ensure_initialized_reports_missing_project() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = ProjectContext::new(temp.path())
            .ensure_initialized()
            .unwrap_err();
        assert!(err.to_string().contains("keke init"));
    }
}
