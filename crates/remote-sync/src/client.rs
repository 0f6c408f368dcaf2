//! Session-state and error-mode handling over a [`RemoteSession`].

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::mode::TransferMode;
use crate::path::{is_dot_entry, with_trailing_slash};
use crate::session::{RemoteSession, SessionConfig, SessionState};

/// How operation failures reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Failures are returned as [`SyncError`].
    #[default]
    Strict,
    /// Failures are logged and reported as `Ok(false)` or an empty result.
    Permissive,
}

/// Drives a [`RemoteSession`] through its connect, operate and close
/// lifecycle.
///
/// Every operation except [`connect`](Self::connect) requires a live
/// connection and fails with [`SyncError::NotConnected`] otherwise.
pub struct RemoteSyncClient<S> {
    pub(crate) session: S,
    state: SessionState,
    error_mode: ErrorMode,
}

impl<S: RemoteSession> RemoteSyncClient<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            state: SessionState::Disconnected,
            error_mode: ErrorMode::Strict,
        }
    }

    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Opens the transport, logs in, and requests passive mode if enabled.
    ///
    /// A rejected login closes the half-open connection before returning.
    /// A refused passive mode is logged and does not fail the connect.
    pub fn connect(&mut self, config: &SessionConfig) -> Result<bool, SyncError> {
        let result = self.try_connect(config);
        self.settle(result, false)
    }

    fn try_connect(&mut self, config: &SessionConfig) -> Result<bool, SyncError> {
        let host = config.normalized_host().to_string();
        let port = config.effective_port();

        match self.state {
            SessionState::Connected => {
                debug!(%host, port, "session already connected");
                return Ok(true);
            }
            SessionState::Closed => {
                return Err(SyncError::ConnectionFailed {
                    host,
                    port,
                    source: crate::SessionError::Protocol("session already closed".into()),
                });
            }
            SessionState::Disconnected => {}
        }

        self.session
            .connect(&host, port)
            .map_err(|source| SyncError::ConnectionFailed {
                host: host.clone(),
                port,
                source,
            })?;

        if let Err(source) = self.session.login(&config.username, &config.password) {
            if let Err(e) = self.session.close() {
                debug!(error = %e, "failed to close connection after rejected login");
            }
            return Err(SyncError::AuthenticationFailed {
                user: config.username.clone(),
                source,
            });
        }

        self.state = SessionState::Connected;

        if config.passive {
            if let Err(e) = self.session.set_passive(true) {
                warn!(%host, error = %e, "passive mode refused, continuing in active mode");
            }
        }

        info!(%host, port, user = %config.username, "remote session connected");
        Ok(true)
    }

    /// Ends the session. The client cannot be reconnected afterwards.
    pub fn close(&mut self) -> Result<bool, SyncError> {
        if let Err(e) = self.require_connected() {
            return self.settle(Err(e), false);
        }

        if let Err(e) = self.session.close() {
            warn!(error = %e, "error while closing remote session");
        }
        self.state = SessionState::Closed;
        info!("remote session closed");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Directories
    // ------------------------------------------------------------------

    /// Changes the current remote directory.
    ///
    /// With `suppress_errors` a failed change returns `Ok(false)` even in
    /// strict mode.
    pub fn change_directory(&mut self, path: &str, suppress_errors: bool) -> Result<bool, SyncError> {
        let result = match self.try_change_directory(path) {
            Err(SyncError::ChangeDirFailed { .. }) if suppress_errors => Ok(false),
            other => other.map(|()| true),
        };
        self.settle(result, false)
    }

    /// Heuristic existence check: tries to enter `path`.
    ///
    /// A `false` can also mean the directory exists but is not enterable.
    /// A `true` leaves `path` as the current directory.
    pub fn probe_directory_exists(&mut self, path: &str) -> Result<bool, SyncError> {
        self.change_directory(path, true)
    }

    /// Creates a remote directory, then applies `permissions` if given.
    /// An empty path returns `Ok(false)`.
    pub fn make_directory(&mut self, path: &str, permissions: Option<u32>) -> Result<bool, SyncError> {
        let result = self.try_make_directory(path, permissions);
        self.settle(result, false)
    }

    /// Deletes a directory and everything beneath it.
    pub fn delete_directory(&mut self, path: &str) -> Result<bool, SyncError> {
        let result = self.try_delete_directory(path).map(|()| true);
        self.settle(result, false)
    }

    /// Deletes `entry` as a file; if that fails, treats it as a directory
    /// and deletes it recursively.
    pub fn delete_entry_or_recurse(&mut self, entry: &str) -> Result<bool, SyncError> {
        let result = self.try_delete_entry_or_recurse(entry).map(|()| true);
        self.settle(result, false)
    }

    pub fn list_files(&mut self, path: &str) -> Result<Vec<String>, SyncError> {
        let result = self.try_list_files(path);
        self.settle(result, Vec::new())
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Uploads `local` to `remote`. With `mode` unset, the transfer mode is
    /// inferred from the local file name.
    pub fn upload(
        &mut self,
        local: &Path,
        remote: &str,
        mode: Option<TransferMode>,
        permissions: Option<u32>,
    ) -> Result<bool, SyncError> {
        let result = self.try_upload(local, remote, mode, permissions).map(|()| true);
        self.settle(result, false)
    }

    /// Downloads `remote` into `local`. With `mode` unset, the transfer mode
    /// is inferred from the remote file name.
    pub fn download(
        &mut self,
        remote: &str,
        local: &Path,
        mode: Option<TransferMode>,
    ) -> Result<bool, SyncError> {
        let result = self.try_download(remote, local, mode).map(|()| true);
        self.settle(result, false)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<bool, SyncError> {
        let result = self.try_rename(from, to).map(|()| true);
        self.settle(result, false)
    }

    /// Alias of [`rename`](Self::rename).
    pub fn move_file(&mut self, from: &str, to: &str) -> Result<bool, SyncError> {
        self.rename(from, to)
    }

    pub fn delete_file(&mut self, path: &str) -> Result<bool, SyncError> {
        let result = self.try_delete_file(path).map(|()| true);
        self.settle(result, false)
    }

    pub fn set_permissions(&mut self, path: &str, mode: u32) -> Result<bool, SyncError> {
        let result = self.try_set_permissions(path, mode).map(|()| true);
        self.settle(result, false)
    }

    // ------------------------------------------------------------------
    // Internals: strict-mode implementations
    // ------------------------------------------------------------------

    pub(crate) fn require_connected(&self) -> Result<(), SyncError> {
        if self.state == SessionState::Connected {
            Ok(())
        } else {
            Err(SyncError::NotConnected)
        }
    }

    /// Applies the error mode to an operation result.
    pub(crate) fn settle<T>(&self, result: Result<T, SyncError>, fallback: T) -> Result<T, SyncError> {
        match (result, self.error_mode) {
            (Ok(value), _) => Ok(value),
            (Err(e), ErrorMode::Strict) => Err(e),
            (Err(e), ErrorMode::Permissive) => {
                warn!(error = %e, "remote operation failed");
                Ok(fallback)
            }
        }
    }

    pub(crate) fn try_change_directory(&mut self, path: &str) -> Result<(), SyncError> {
        self.require_connected()?;
        self.session
            .change_dir(path)
            .map_err(|source| SyncError::ChangeDirFailed {
                path: path.to_string(),
                source,
            })
    }

    pub(crate) fn try_make_directory(
        &mut self,
        path: &str,
        permissions: Option<u32>,
    ) -> Result<bool, SyncError> {
        self.require_connected()?;
        if path.is_empty() {
            return Ok(false);
        }

        self.session
            .make_dir(path)
            .map_err(|source| SyncError::MkdirFailed {
                path: path.to_string(),
                source,
            })?;
        debug!(path, "remote directory created");

        if let Some(mode) = permissions {
            self.try_set_permissions(path, mode)?;
        }
        Ok(true)
    }

    pub(crate) fn try_upload(
        &mut self,
        local: &Path,
        remote: &str,
        mode: Option<TransferMode>,
        permissions: Option<u32>,
    ) -> Result<(), SyncError> {
        self.require_connected()?;
        if !local.is_file() {
            return Err(SyncError::UploadFailed {
                local: local.display().to_string(),
                remote: remote.to_string(),
                reason: "local file not found".into(),
            });
        }

        let mode = mode.unwrap_or_else(|| TransferMode::infer_path(local));
        self.session
            .put(remote, local, mode)
            .map_err(|e| SyncError::UploadFailed {
                local: local.display().to_string(),
                remote: remote.to_string(),
                reason: e.to_string(),
            })?;
        debug!(local = %local.display(), remote, ?mode, "uploaded");

        if let Some(bits) = permissions {
            self.try_set_permissions(remote, bits)?;
        }
        Ok(())
    }

    fn try_download(
        &mut self,
        remote: &str,
        local: &Path,
        mode: Option<TransferMode>,
    ) -> Result<(), SyncError> {
        self.require_connected()?;
        let mode = mode.unwrap_or_else(|| TransferMode::infer(remote));
        self.session
            .get(local, remote, mode)
            .map_err(|source| SyncError::DownloadFailed {
                remote: remote.to_string(),
                local: local.display().to_string(),
                source,
            })?;
        debug!(remote, local = %local.display(), ?mode, "downloaded");
        Ok(())
    }

    fn try_rename(&mut self, from: &str, to: &str) -> Result<(), SyncError> {
        self.require_connected()?;
        self.session
            .rename(from, to)
            .map_err(|source| SyncError::RenameFailed {
                from: from.to_string(),
                to: to.to_string(),
                source,
            })
    }

    fn try_delete_file(&mut self, path: &str) -> Result<(), SyncError> {
        self.require_connected()?;
        self.session
            .delete(path)
            .map_err(|source| SyncError::DeleteFailed {
                path: path.to_string(),
                source,
            })
    }

    fn try_set_permissions(&mut self, path: &str, mode: u32) -> Result<(), SyncError> {
        self.require_connected()?;
        self.session
            .chmod(path, mode)
            .map_err(|source| SyncError::ChmodFailed {
                path: path.to_string(),
                source,
            })
    }

    fn try_list_files(&mut self, path: &str) -> Result<Vec<String>, SyncError> {
        self.require_connected()?;
        self.session
            .list(path)
            .map_err(|source| SyncError::ListFailed {
                path: path.to_string(),
                source,
            })
    }

    fn try_delete_directory(&mut self, path: &str) -> Result<(), SyncError> {
        self.require_connected()?;
        let dir = with_trailing_slash(path);

        // An unlistable directory may still be empty and removable.
        let entries = match self.session.list(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %dir, error = %e, "listing failed before directory removal");
                Vec::new()
            }
        };

        for entry in entries.iter().filter(|e| !is_dot_entry(e)) {
            self.try_delete_entry_or_recurse(entry)?;
        }

        self.session
            .remove_dir(&dir)
            .map_err(|source| SyncError::DeleteFailed { path: dir, source })
    }

    fn try_delete_entry_or_recurse(&mut self, entry: &str) -> Result<(), SyncError> {
        self.require_connected()?;
        match self.session.delete(entry) {
            Ok(()) => {
                debug!(path = %entry, "remote file deleted");
                Ok(())
            }
            Err(e) => {
                debug!(path = %entry, error = %e, "file delete failed, retrying as directory");
                self.try_delete_directory(entry)
            }
        }
    }
}
