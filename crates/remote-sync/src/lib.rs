//! Remote file sessions and local-to-remote mirroring.
//!
//! [`RemoteSyncClient`] wraps any [`RemoteSession`] backend with an explicit
//! connection state machine, strict or permissive error reporting, and a
//! depth-first directory [`mirror`](RemoteSyncClient::mirror). Two backends
//! ship with the crate: [`FtpSession`] and [`LocalDirSession`].

mod client;
mod error;
mod ftp;
mod local;
mod mirror;
mod mode;
pub mod path;
mod session;

use std::time::Duration;

pub use client::{ErrorMode, RemoteSyncClient};
pub use error::{SessionError, SyncError};
pub use ftp::{FtpSession, Reply};
pub use local::LocalDirSession;
pub use mirror::MirrorReport;
pub use mode::TransferMode;
pub use session::{RemoteSession, SessionConfig, SessionState};

/// Port used when none (or `0`) is configured.
pub const DEFAULT_PORT: u16 = 21;

/// Default connect and read timeout for network backends.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
