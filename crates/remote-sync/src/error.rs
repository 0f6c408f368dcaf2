//! Error types for remote sessions and the sync client.

/// Errors reported by a [`RemoteSession`](crate::RemoteSession) backend.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server replied {code}: {message}")]
    Reply { code: u16, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid remote path: {0}")]
    InvalidPath(String),
}

/// Errors returned by [`RemoteSyncClient`](crate::RemoteSyncClient) in strict mode.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("unable to connect to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: SessionError,
    },

    #[error("login rejected for user '{user}': {source}")]
    AuthenticationFailed {
        user: String,
        #[source]
        source: SessionError,
    },

    #[error("no open session")]
    NotConnected,

    #[error("unable to create directory '{path}': {source}")]
    MkdirFailed {
        path: String,
        #[source]
        source: SessionError,
    },

    #[error("unable to upload '{local}' to '{remote}': {reason}")]
    UploadFailed {
        local: String,
        remote: String,
        reason: String,
    },

    #[error("unable to download '{remote}' to '{local}': {source}")]
    DownloadFailed {
        remote: String,
        local: String,
        #[source]
        source: SessionError,
    },

    #[error("unable to rename '{from}' to '{to}': {source}")]
    RenameFailed {
        from: String,
        to: String,
        #[source]
        source: SessionError,
    },

    #[error("unable to change permissions of '{path}': {source}")]
    ChmodFailed {
        path: String,
        #[source]
        source: SessionError,
    },

    #[error("unable to delete '{path}': {source}")]
    DeleteFailed {
        path: String,
        #[source]
        source: SessionError,
    },

    #[error("unable to change directory to '{path}': {source}")]
    ChangeDirFailed {
        path: String,
        #[source]
        source: SessionError,
    },

    #[error("unable to list '{path}': {source}")]
    ListFailed {
        path: String,
        #[source]
        source: SessionError,
    },

    #[error("unable to read local directory '{path}': {source}")]
    LocalDirUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
