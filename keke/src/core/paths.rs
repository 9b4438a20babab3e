//! Lexical path helpers. No filesystem access.

use std::path::{Component, Path, PathBuf};

/// Lexically clean `path`: drop `.` components and fold `name/..` pairs.
///
/// Leading `..` components that cannot be folded are kept, so callers can
/// detect traversal by inspecting the first component. Root and prefix
/// components are preserved.
pub fn clean(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Whether a cleaned relative path escapes its base via a leading `..`.
pub fn escapes_base(cleaned: &Path) -> bool {
    matches!(cleaned.components().next(), Some(Component::ParentDir))
}

/// Whether any segment of `path` exactly equals one of `excluded`.
///
/// Comparison is per segment: `gitlab/` is kept even when `.git` or `git` is
/// excluded.
pub fn has_excluded_segment(path: &Path, excluded: &[String]) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => excluded.iter().any(|ex| name == ex.as_str()),
        _ => false,
    })
}

/// Render a project-relative path with `/` separators.
pub fn display_relative(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
