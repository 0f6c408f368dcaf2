//! Recursive local-to-remote directory mirroring.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::client::{ErrorMode, RemoteSyncClient};
use crate::error::{SessionError, SyncError};
use crate::path::{is_absolute_remote_path, join_remote_path, resolve_remote_path};
use crate::session::RemoteSession;

/// What a mirror run did. Failures below the root do not stop the run.
#[derive(Debug, Default)]
pub struct MirrorReport {
    /// Remote directories that had to be created.
    pub directories_created: Vec<String>,
    /// Remote paths of uploaded files.
    pub files_uploaded: Vec<String>,
    pub failures: Vec<SyncError>,
}

impl MirrorReport {
    /// Whether every directory and file was mirrored.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<S: RemoteSession> RemoteSyncClient<S> {
    /// Recreates `local_dir` and everything beneath it under `remote_dir`.
    ///
    /// Directories are visited depth-first with entries in name order; each
    /// remote directory exists before anything is uploaded into it. Files
    /// are uploaded with the transfer mode inferred from their names.
    ///
    /// Only root failures (unreadable `local_dir`, or a `remote_dir` that can
    /// neither be entered nor created) are returned as errors; in permissive
    /// mode they land in the report instead. The current remote directory is
    /// left wherever the walk ended.
    pub fn mirror(&mut self, local_dir: &Path, remote_dir: &str) -> Result<MirrorReport, SyncError> {
        let mut report = MirrorReport::default();

        match self.try_mirror(local_dir, remote_dir, &mut report) {
            Ok(()) => {
                info!(
                    local = %local_dir.display(),
                    remote = remote_dir,
                    created = report.directories_created.len(),
                    uploaded = report.files_uploaded.len(),
                    failed = report.failures.len(),
                    "mirror finished"
                );
                Ok(report)
            }
            Err(e) if self.error_mode() == ErrorMode::Permissive => {
                warn!(local = %local_dir.display(), remote = remote_dir, error = %e, "mirror failed");
                report.failures.push(e);
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }

    fn try_mirror(
        &mut self,
        local_dir: &Path,
        remote_dir: &str,
        report: &mut MirrorReport,
    ) -> Result<(), SyncError> {
        self.require_connected()?;

        // Anchor the root so nested paths survive directory changes.
        let base = if is_absolute_remote_path(remote_dir) {
            "/".to_string()
        } else {
            self.session
                .current_dir()
                .map_err(|source| SyncError::ChangeDirFailed {
                    path: remote_dir.to_string(),
                    source,
                })?
        };
        let root = resolve_remote_path(&base, remote_dir).ok_or_else(|| {
            SyncError::ChangeDirFailed {
                path: remote_dir.to_string(),
                source: SessionError::InvalidPath(remote_dir.to_string()),
            }
        })?;

        self.mirror_dir(local_dir, &root, report)
    }

    fn mirror_dir(
        &mut self,
        local_dir: &Path,
        remote_dir: &str,
        report: &mut MirrorReport,
    ) -> Result<(), SyncError> {
        let unreadable = |source: std::io::Error| SyncError::LocalDirUnreadable {
            path: local_dir.display().to_string(),
            source,
        };

        let mut entries = std::fs::read_dir(local_dir)
            .map_err(unreadable)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(unreadable)?;
        entries.sort_by_key(|e| e.file_name());

        self.ensure_remote_dir(remote_dir, report)?;

        for entry in entries {
            let local_path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %local_path.display(), "skipping entry with non UTF-8 name");
                continue;
            };
            let remote_path = join_remote_path(remote_dir, &name);

            if local_path.is_dir() {
                if let Err(e) = self.mirror_dir(&local_path, &remote_path, report) {
                    warn!(path = %local_path.display(), error = %e, "failed to mirror directory");
                    report.failures.push(e);
                }
            } else {
                match self.try_upload(&local_path, &remote_path, None, None) {
                    Ok(()) => report.files_uploaded.push(remote_path),
                    Err(e) => {
                        warn!(path = %local_path.display(), error = %e, "failed to mirror file");
                        report.failures.push(e);
                    }
                }
            }
        }

        Ok(())
    }

    /// Enters `remote_dir`, creating it first if it cannot be entered.
    fn ensure_remote_dir(&mut self, remote_dir: &str, report: &mut MirrorReport) -> Result<(), SyncError> {
        if self.try_change_directory(remote_dir).is_ok() {
            debug!(path = remote_dir, "remote directory exists");
            return Ok(());
        }

        self.try_make_directory(remote_dir, None)?;
        self.try_change_directory(remote_dir)?;
        report.directories_created.push(remote_dir.to_string());
        Ok(())
    }
}
