//! Remote namespace backed by a local directory.
//!
//! Useful for mounted shares, staging areas and tests. Remote paths are
//! resolved against the session's current directory and may never leave the
//! root.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SessionError;
use crate::mode::TransferMode;
use crate::path::{join_remote_path, resolve_remote_path};
use crate::session::RemoteSession;

/// A [`RemoteSession`] whose remote side is a directory on this machine.
///
/// Both ends share one byte representation, so the transfer mode does not
/// alter file contents.
#[derive(Debug)]
pub struct LocalDirSession {
    root: PathBuf,
    credentials: Option<(String, String)>,
    cwd: String,
    open: bool,
    logged_in: bool,
}

impl LocalDirSession {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            credentials: None,
            cwd: "/".to_string(),
            open: false,
            logged_in: false,
        }
    }

    /// Requires this user name and password at login.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn require_login(&self) -> Result<(), SessionError> {
        if !self.open {
            return Err(SessionError::Protocol("session is not open".into()));
        }
        if !self.logged_in {
            return Err(SessionError::Reply {
                code: 530,
                message: "Not logged in.".into(),
            });
        }
        Ok(())
    }

    /// Maps a remote path onto the local root.
    fn resolve(&self, path: &str) -> Result<(String, PathBuf), SessionError> {
        let remote = resolve_remote_path(&self.cwd, path)
            .ok_or_else(|| SessionError::InvalidPath(path.to_string()))?;
        let relative = remote.trim_start_matches('/');
        ferry_transfer::validate_relative_path(relative)
            .map_err(|e| SessionError::InvalidPath(e.to_string()))?;
        reject_symlinks(&self.root, relative)?;
        let local = if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        };
        Ok((remote, local))
    }
}

/// Refuses paths that pass through a symbolic link below the root, so no
/// operation can reach outside it. Missing components end the walk.
fn reject_symlinks(root: &Path, relative: &str) -> Result<(), SessionError> {
    let mut current = root.to_path_buf();
    for component in Path::new(relative).components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(SessionError::InvalidPath(format!(
                    "{relative}: symbolic links are not followed"
                )));
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(())
}

fn not_found(message: &str) -> SessionError {
    SessionError::Reply {
        code: 550,
        message: message.to_string(),
    }
}

impl RemoteSession for LocalDirSession {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
        if !self.root.is_dir() {
            return Err(SessionError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("root directory not found: {}", self.root.display()),
            )));
        }
        debug!(host, port, root = %self.root.display(), "local session opened");
        self.open = true;
        self.logged_in = false;
        self.cwd = "/".to_string();
        Ok(())
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        if !self.open {
            return Err(SessionError::Protocol("session is not open".into()));
        }
        if let Some((user, pass)) = &self.credentials {
            if user != username || pass != password {
                return Err(SessionError::Reply {
                    code: 530,
                    message: "Login incorrect.".into(),
                });
            }
        }
        self.logged_in = true;
        Ok(())
    }

    fn set_passive(&mut self, _enabled: bool) -> Result<(), SessionError> {
        self.require_login()
    }

    fn current_dir(&mut self) -> Result<String, SessionError> {
        self.require_login()?;
        Ok(self.cwd.clone())
    }

    fn change_dir(&mut self, path: &str) -> Result<(), SessionError> {
        self.require_login()?;
        let (remote, local) = self.resolve(path)?;
        if !local.is_dir() {
            return Err(not_found("No such directory."));
        }
        self.cwd = remote;
        Ok(())
    }

    fn make_dir(&mut self, path: &str) -> Result<(), SessionError> {
        self.require_login()?;
        let (_, local) = self.resolve(path)?;
        std::fs::create_dir(&local)?;
        Ok(())
    }

    fn put(&mut self, remote: &str, local: &Path, _mode: TransferMode) -> Result<(), SessionError> {
        self.require_login()?;
        let (_, target) = self.resolve(remote)?;
        std::fs::copy(local, &target)?;
        Ok(())
    }

    fn get(&mut self, local: &Path, remote: &str, _mode: TransferMode) -> Result<(), SessionError> {
        self.require_login()?;
        let (_, source) = self.resolve(remote)?;
        if !source.is_file() {
            return Err(not_found("No such file."));
        }
        std::fs::copy(&source, local)?;
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<(), SessionError> {
        self.require_login()?;
        let (_, local) = self.resolve(path)?;
        if local.is_dir() {
            return Err(not_found("Is a directory."));
        }
        std::fs::remove_file(&local)?;
        Ok(())
    }

    fn remove_dir(&mut self, path: &str) -> Result<(), SessionError> {
        self.require_login()?;
        let (remote, local) = self.resolve(path)?;
        if remote == "/" {
            return Err(SessionError::InvalidPath("cannot remove the root".into()));
        }
        std::fs::remove_dir(&local)?;
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError> {
        self.require_login()?;
        let (_, source) = self.resolve(from)?;
        let (_, target) = self.resolve(to)?;
        std::fs::rename(&source, &target)?;
        Ok(())
    }

    fn chmod(&mut self, path: &str, mode: u32) -> Result<(), SessionError> {
        self.require_login()?;
        let (_, local) = self.resolve(path)?;
        if !local.exists() {
            return Err(not_found("No such file or directory."));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&local, std::fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        debug!(path, mode, "permission bits not supported on this platform");

        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<Vec<String>, SessionError> {
        self.require_login()?;
        let (_, local) = self.resolve(path)?;

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&local)? {
            if let Some(name) = entry?.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        Ok(names
            .iter()
            .map(|name| join_remote_path(path, name))
            .collect())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        self.open = false;
        self.logged_in = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(root: &Path) -> LocalDirSession {
        let mut session = LocalDirSession::new(root);
        session.connect("localhost", 21).unwrap();
        session.login("anonymous", "").unwrap();
        session
    }

    #[test]
    fn paths_cannot_escape_root() {
        let dir = TempDir::new().unwrap();
        let mut session = open(dir.path());

        assert!(matches!(
            session.make_dir("../outside"),
            Err(SessionError::InvalidPath(_))
        ));
        assert!(matches!(
            session.change_dir("/a/../../etc"),
            Err(SessionError::InvalidPath(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_below_root_are_not_followed() {
        use crate::{RemoteSyncClient, SessionConfig};

        let dir = TempDir::new().unwrap();
        let outside = dir.path().join("outside");
        let root = dir.path().join("root");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::create_dir_all(root.join("www")).unwrap();
        std::fs::write(outside.join("secret.txt"), b"keep").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("www").join("link")).unwrap();

        let mut session = open(&root);
        assert!(matches!(
            session.change_dir("/www/link"),
            Err(SessionError::InvalidPath(_))
        ));
        assert!(matches!(
            session.delete("/www/link/secret.txt"),
            Err(SessionError::InvalidPath(_))
        ));
        assert!(matches!(
            session.list("/www/link"),
            Err(SessionError::InvalidPath(_))
        ));

        let mut client = RemoteSyncClient::new(LocalDirSession::new(&root));
        client.connect(&SessionConfig::new("localhost", "", "")).unwrap();
        assert!(client.delete_directory("/www").is_err());
        assert_eq!(std::fs::read(outside.join("secret.txt")).unwrap(), b"keep");
    }

    #[test]
    fn relative_paths_follow_current_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("www")).unwrap();
        let mut session = open(dir.path());

        session.change_dir("www").unwrap();
        assert_eq!(session.current_dir().unwrap(), "/www");

        session.make_dir("assets").unwrap();
        assert!(dir.path().join("www/assets").is_dir());

        session.change_dir("..").unwrap();
        assert_eq!(session.current_dir().unwrap(), "/");
    }

    #[test]
    fn operations_require_login() {
        let dir = TempDir::new().unwrap();
        let mut session = LocalDirSession::new(dir.path()).with_credentials("u", "p");
        session.connect("localhost", 21).unwrap();

        assert!(matches!(
            session.login("u", "nope"),
            Err(SessionError::Reply { code: 530, .. })
        ));
        assert!(matches!(
            session.make_dir("x"),
            Err(SessionError::Reply { code: 530, .. })
        ));

        session.login("u", "p").unwrap();
        session.make_dir("x").unwrap();
    }

    #[test]
    fn delete_refuses_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();
        let mut session = open(dir.path());
        assert!(matches!(
            session.delete("/d"),
            Err(SessionError::Reply { code: 550, .. })
        ));
    }

    #[test]
    fn closed_session_rejects_operations() {
        let dir = TempDir::new().unwrap();
        let mut session = open(dir.path());
        session.close().unwrap();
        assert!(!session.is_open());
        assert!(matches!(
            session.list("/"),
            Err(SessionError::Protocol(_))
        ));
    }
}
