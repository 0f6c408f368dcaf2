//! Remote path helpers.
//!
//! Remote paths always use `/` as separator, whatever the local OS.

/// Whether a remote path is absolute.
pub fn is_absolute_remote_path(path: &str) -> bool {
    path.starts_with('/')
}

/// Joins remote path components with `/`.
pub fn join_remote_path(base: &str, component: &str) -> String {
    if base.is_empty() {
        component.to_string()
    } else if base.ends_with('/') {
        format!("{base}{component}")
    } else {
        format!("{base}/{component}")
    }
}

/// Returns `path` with exactly one trailing slash.
pub fn with_trailing_slash(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("{trimmed}/")
    }
}

/// Whether a listing entry names the directory itself or its parent.
pub fn is_dot_entry(entry: &str) -> bool {
    let name = entry.rsplit('/').next().unwrap_or(entry);
    name == "." || name == ".."
}

/// Resolves `path` against the absolute directory `cwd`, folding `.` and
/// `..` components.
///
/// Returns `None` when the path climbs above `/`.
pub fn resolve_remote_path(cwd: &str, path: &str) -> Option<String> {
    let joined = if is_absolute_remote_path(path) {
        path.to_string()
    } else {
        join_remote_path(cwd, path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for component in joined.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }

    Some(format!("/{}", parts.join("/")))
}
