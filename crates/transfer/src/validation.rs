use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a relative path does not escape its base directory.
///
/// Rejects:
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
///
/// The empty path is accepted and refers to the base itself.
pub fn validate_relative_path(path: &str) -> Result<(), TransferError> {
    let p = Path::new(path);

    if p.is_absolute() {
        return Err(TransferError::InvalidPath(format!(
            "absolute path not allowed: {path}"
        )));
    }

    for component in p.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {path}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "absolute path not allowed: {path}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_empty_path() {
        assert!(validate_relative_path("").is_ok());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(validate_relative_path("../../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_nested_parent_dir_traversal() {
        assert!(validate_relative_path("sub/../../../escape").is_err());
    }

    #[test]
    fn rejects_absolute_unix_path() {
        assert!(validate_relative_path("/tmp/malicious").is_err());
    }

    #[test]
    fn accepts_nested_path() {
        assert!(validate_relative_path("site/assets/app.css").is_ok());
    }

    #[test]
    fn accepts_current_dir_prefix() {
        assert!(validate_relative_path("./index.html").is_ok());
    }
}
