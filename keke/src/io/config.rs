//! Project configuration stored under `.keke/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::tier::ModelTier;
use crate::io::project::PROJECT_DIR_NAME;

/// Keke configuration (TOML).
///
/// Meant to be edited by humans. Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KekeConfig {
    /// URL of the remote agent endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Provider hint forwarded to the remote (e.g. `groq`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Model tier used when no `--model` flag is given.
    pub default_tier: ModelTier,

    /// Upper bound on remote rounds per request.
    pub max_iterations: u32,

    /// Total timeout for one generation call.
    pub request_timeout_secs: u64,

    /// Connect timeout for any remote call.
    pub connect_timeout_secs: u64,

    /// Wall-clock bound for `execute_command`.
    pub command_timeout_secs: u64,

    /// Truncate captured command stdout/stderr beyond this many bytes each.
    pub command_output_limit_bytes: usize,

    /// Directory names skipped by `list_files` (exact segment match).
    pub excluded_dirs: Vec<String>,
}

impl Default for KekeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            provider: None,
            default_tier: ModelTier::Smart,
            max_iterations: 20,
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            command_timeout_secs: 10 * 60,
            command_output_limit_bytes: 100_000,
            excluded_dirs: vec![
                PROJECT_DIR_NAME.to_string(),
                ".git".to_string(),
                "node_modules".to_string(),
            ],
        }
    }
}

impl KekeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(anyhow!("connect_timeout_secs must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.command_output_limit_bytes == 0 {
            return Err(anyhow!("command_output_limit_bytes must be > 0"));
        }
        if self.excluded_dirs.iter().any(|d| d.trim().is_empty()) {
            return Err(anyhow!("excluded_dirs must not contain empty names"));
        }
        if let Some(endpoint) = &self.endpoint
            && endpoint.trim().is_empty()
        {
            return Err(anyhow!("endpoint must not be empty when set"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `KekeConfig::default()`.
pub fn load_config(path: &Path) -> Result<KekeConfig> {
    if !path.exists() {
        let cfg = KekeConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: KekeConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &KekeConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, KekeConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = KekeConfig {
            endpoint: Some("https://agent.example.test/v1".to_string()),
            provider: Some("groq".to_string()),
            default_tier: ModelTier::Deep,
            ..KekeConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_iterations = 5\ndefault_tier = \"fast\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_iterations, 5);
        assert_eq!(cfg.default_tier, ModelTier::Fast);
        assert_eq!(cfg.command_timeout_secs, 600);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_iterations = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_iterations must be > 0"));
    }
}
