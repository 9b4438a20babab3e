//! Tool-call argument normalization.
//!
//! Providers disagree on how tool arguments travel: some send a JSON object,
//! some send that object serialized into a JSON string, and some send a bare
//! string for single-field tools. [`normalize`] runs an ordered chain of pure
//! decode strategies and returns the first one that yields a non-empty
//! primary field. It never fails; an empty primary field means "could not
//! extract" and is reported to the remote as malformed arguments.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Argument schema for one tool.
pub trait ArgSchema: DeserializeOwned + Default {
    /// Value used when no strategy succeeds. Only meaningful for single-field schemas.
    const DEFAULT: Option<&'static str> = None;

    /// The field whose emptiness signals a failed extraction.
    fn primary(&self) -> &str;

    /// Build the schema from a bare string. `None` for multi-field schemas.
    fn from_bare(_value: String) -> Option<Self> {
        None
    }
}

/// `execute_command` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommandArgs {
    #[serde(default)]
    pub command: String,
}

impl ArgSchema for CommandArgs {
    fn primary(&self) -> &str {
        &self.command
    }

    fn from_bare(value: String) -> Option<Self> {
        Some(Self { command: value })
    }
}

/// `read_file` / `list_files` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PathArgs {
    #[serde(default)]
    pub path: String,
}

impl ArgSchema for PathArgs {
    const DEFAULT: Option<&'static str> = Some(".");

    fn primary(&self) -> &str {
        &self.path
    }

    fn from_bare(value: String) -> Option<Self> {
        Some(Self { path: value })
    }
}

/// `write_file` arguments. Valid only when `path` is non-empty and `content`
/// was present (it may be the empty string).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WriteArgs {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl WriteArgs {
    pub fn is_complete(&self) -> bool {
        !self.path.is_empty() && self.content.is_some()
    }
}

impl ArgSchema for WriteArgs {
    fn primary(&self) -> &str {
        &self.path
    }
}

type Strategy<S> = fn(&[u8]) -> Option<S>;

/// Decode `raw` into `S` using the first strategy that produces a non-empty
/// primary field.
pub fn normalize<S: ArgSchema>(raw: &[u8]) -> S {
    let chain: [Strategy<S>; 3] = [structured, double_encoded, bare_string];
    chain
        .iter()
        .find_map(|strategy| strategy(raw))
        .or_else(|| fallback(raw))
        .unwrap_or_default()
}

/// Decode a free-form argument object, either native or double-encoded.
pub fn normalize_object(raw: &[u8]) -> Option<Map<String, Value>> {
    if let Ok(object) = serde_json::from_slice::<Map<String, Value>>(raw) {
        return Some(object);
    }
    let inner: String = serde_json::from_slice(raw).ok()?;
    serde_json::from_str(&inner).ok()
}

fn structured<S: ArgSchema>(raw: &[u8]) -> Option<S> {
    serde_json::from_slice::<S>(raw)
        .ok()
        .filter(|args| !args.primary().is_empty())
}

fn double_encoded<S: ArgSchema>(raw: &[u8]) -> Option<S> {
    let inner: String = serde_json::from_slice(raw).ok()?;
    structured(inner.as_bytes())
}

fn bare_string<S: ArgSchema>(raw: &[u8]) -> Option<S> {
    let inner: String = serde_json::from_slice(raw).ok()?;
    // An encoded object that lacks the field is malformed, not a bare value.
    if inner.is_empty() || is_json_object(inner.as_bytes()) {
        return None;
    }
    S::from_bare(inner)
}

fn fallback<S: ArgSchema>(raw: &[u8]) -> Option<S> {
    if let Some(default) = S::DEFAULT {
        return S::from_bare(default.to_string());
    }
    // Raw text is only taken verbatim when it is not JSON at all.
    if serde_json::from_slice::<Value>(raw).is_ok() {
        return None;
    }
    let text = String::from_utf8_lossy(raw).trim().to_string();
    if text.is_empty() {
        return None;
    }
    S::from_bare(text)
}

fn is_json_object(raw: &[u8]) -> bool {
    serde_json::from_slice::<Map<String, Value>>(raw).is_ok()
}
