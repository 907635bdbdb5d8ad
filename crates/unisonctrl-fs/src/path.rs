//! Path helpers shared by config loading and partitioning

use std::path::{Path, PathBuf};

/// Strip surrounding whitespace and trailing separators from a configured path.
///
/// A bare root (`/`) is preserved.
pub fn sanitize_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim();
    let stripped = trimmed.trim_end_matches(['/', '\\']);
    if stripped.is_empty() && !trimmed.is_empty() {
        return PathBuf::from(&trimmed[..1]);
    }
    PathBuf::from(stripped)
}

/// Express `path` relative to `root`, using forward slashes.
///
/// Returns `None` when `path` is not below `root` or is `root` itself.
pub fn relative_to(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
