use std::path::Path;

use crate::DEFAULT_PORT;
use crate::error::SessionError;
use crate::mode::TransferMode;

/// Primitives of a stateful remote file session.
///
/// Implementations perform exactly one protocol action per call and report
/// failures as [`SessionError`]; connection state, error-mode handling and
/// logging belong to [`RemoteSyncClient`](crate::RemoteSyncClient).
///
/// Relative remote paths resolve against the session's current directory.
pub trait RemoteSession {
    /// Opens the transport to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), SessionError>;

    fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError>;

    /// Selects passive (`true`) or active data connections.
    fn set_passive(&mut self, enabled: bool) -> Result<(), SessionError>;

    /// Absolute path of the current remote directory.
    fn current_dir(&mut self) -> Result<String, SessionError>;

    fn change_dir(&mut self, path: &str) -> Result<(), SessionError>;

    fn make_dir(&mut self, path: &str) -> Result<(), SessionError>;

    /// Stores the local file `local` at `remote`.
    fn put(&mut self, remote: &str, local: &Path, mode: TransferMode) -> Result<(), SessionError>;

    /// Retrieves `remote` into the local file `local`.
    fn get(&mut self, local: &Path, remote: &str, mode: TransferMode) -> Result<(), SessionError>;

    /// Deletes a file. Fails on directories.
    fn delete(&mut self, path: &str) -> Result<(), SessionError>;

    /// Removes an empty directory.
    fn remove_dir(&mut self, path: &str) -> Result<(), SessionError>;

    fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError>;

    /// Sets Unix permission bits, e.g. `0o755`.
    fn chmod(&mut self, path: &str, mode: u32) -> Result<(), SessionError>;

    /// Lists the entries of a directory as paths prefixed with `path`.
    fn list(&mut self, path: &str) -> Result<Vec<String>, SessionError>;

    /// Ends the session and releases the transport.
    fn close(&mut self) -> Result<(), SessionError>;
}

/// Lifecycle of a client session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Closed,
}

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub host: String,
    /// `0` selects [`DEFAULT_PORT`].
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Request passive data connections after login.
    pub passive: bool,
}

impl SessionConfig {
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_PORT,
            username: username.to_string(),
            password: password.to_string(),
            passive: true,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    /// Host with any `scheme://` prefix removed.
    pub fn normalized_host(&self) -> &str {
        match self.host.find("://") {
            Some(idx) if idx > 0 => &self.host[idx + 3..],
            _ => &self.host,
        }
    }

    pub fn effective_port(&self) -> u16 {
        if self.port == 0 { DEFAULT_PORT } else { self.port }
    }
}
