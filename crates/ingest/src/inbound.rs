use std::io;
use std::path::{Path, PathBuf};

/// An uploaded file as handed over by the request boundary.
///
/// [`move_to`](Self::move_to) consumes the file, so it can be committed
/// at most once.
pub trait InboundFile {
    /// Client-supplied filename.
    fn name(&self) -> &str;

    /// Extension of [`name`](Self::name), without the dot; empty if none.
    fn extension(&self) -> &str {
        self.name().rsplit_once('.').map_or("", |(_, ext)| ext)
    }

    /// Declared MIME type.
    fn mime(&self) -> &str;

    /// Size in bytes.
    fn size(&self) -> u64;

    /// Relocates the underlying bytes to `destination`.
    fn move_to(self, destination: &Path) -> io::Result<()>
    where
        Self: Sized;
}

/// An upload already staged on local disk (e.g. a multipart temp file).
#[derive(Debug, Clone)]
pub struct StagedFile {
    staged_path: PathBuf,
    name: String,
    mime: String,
    size: u64,
}

impl StagedFile {
    /// Describes the staged file at `staged_path`, reading its size from disk.
    pub fn new(staged_path: impl Into<PathBuf>, name: &str, mime: &str) -> io::Result<Self> {
        let staged_path = staged_path.into();
        let size = std::fs::metadata(&staged_path)?.len();
        Ok(Self {
            staged_path,
            name: name.to_string(),
            mime: mime.to_string(),
            size,
        })
    }

    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }
}

impl InboundFile for StagedFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime(&self) -> &str {
        &self.mime
    }

    fn size(&self) -> u64 {
        self.size
    }

    /// Renames into place, falling back to copy + remove when the staging
    /// area lives on another filesystem.
    fn move_to(self, destination: &Path) -> io::Result<()> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if std::fs::rename(&self.staged_path, destination).is_ok() {
            return Ok(());
        }

        std::fs::copy(&self.staged_path, destination)?;
        if let Err(e) = std::fs::remove_file(&self.staged_path) {
            tracing::warn!(
                path = %self.staged_path.display(),
                error = %e,
                "failed to remove staged upload after copy"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn staged_file_reports_size_and_extension() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("upload-0001.tmp");
        std::fs::write(&staged, b"hello").unwrap();

        let file = StagedFile::new(&staged, "Report.Final.pdf", "application/pdf").unwrap();
        assert_eq!(file.size(), 5);
        assert_eq!(file.extension(), "pdf");
        assert_eq!(file.mime(), "application/pdf");
    }

    #[test]
    fn extension_empty_without_dot() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("blob");
        std::fs::write(&staged, b"").unwrap();
        let file = StagedFile::new(&staged, "Makefile", "text/plain").unwrap();
        assert_eq!(file.extension(), "");
    }

    #[test]
    fn move_to_relocates_bytes() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("staging.tmp");
        std::fs::write(&staged, b"payload").unwrap();
        let dest = dir.path().join("store").join("doc-1.txt");

        let file = StagedFile::new(&staged, "doc.txt", "text/plain").unwrap();
        file.move_to(&dest).unwrap();

        assert!(!staged.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn missing_staged_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(StagedFile::new(dir.path().join("nope"), "x.txt", "text/plain").is_err());
    }
}
