//! Ferry configuration management.
//!
//! Reads/writes JSON at `~/.config/ferry/config.json` with one section per
//! service: `remote`, `ingest` and `delivery`. Missing keys take defaults;
//! an unparsable file or out-of-range values fall back to defaults with a
//! warning.

mod sections;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use sections::{DeliveryConfig, IngestConfig, RemoteConfig};

/// Errors produced while locating, reading or writing the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no configuration directory: {0} is not set")]
    NoConfigDir(&'static str),

    #[error(transparent)]
    Ingest(#[from] ferry_ingest::IngestError),
}

/// On-disk config format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    remote: RemoteConfig,
    #[serde(default)]
    ingest: IngestConfig,
    #[serde(default)]
    delivery: DeliveryConfig,
}

/// Ferry configuration.
#[derive(Debug, Clone)]
pub struct FerryConfig {
    pub remote: RemoteConfig,
    pub ingest: IngestConfig,
    pub delivery: DeliveryConfig,
    file_path: PathBuf,
}

impl FerryConfig {
    /// Defaults bound to `file_path`, without touching the disk.
    pub fn with_path(file_path: impl Into<PathBuf>) -> Self {
        Self {
            remote: RemoteConfig::default(),
            ingest: IngestConfig::default(),
            delivery: DeliveryConfig::default(),
            file_path: file_path.into(),
        }
    }

    /// Loads configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(config_file_path()?)
    }

    /// Loads configuration from `file_path`. A missing file yields defaults.
    pub fn load_from(file_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::with_path(file_path);

        if config.file_path.exists() {
            let content = std::fs::read_to_string(&config.file_path)?;
            match serde_json::from_str::<ConfigFile>(&content) {
                Ok(file) => {
                    config.remote = file.remote;
                    config.ingest = file.ingest;
                    config.delivery = file.delivery;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %config.file_path.display(),
                        error = %e,
                        "failed to parse ferry config, using defaults"
                    );
                }
            }
        }

        config.remote.sanitize();
        config.ingest.sanitize();
        config.delivery.sanitize();
        Ok(config)
    }

    /// Saves configuration to disk, readable by the owner only.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = ConfigFile {
            remote: self.remote.clone(),
            ingest: self.ingest.clone(),
            delivery: self.delivery.clone(),
        };

        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.file_path, &json)?;
        set_permissions_0600(&self.file_path);

        tracing::debug!(path = %self.file_path.display(), "ferry configuration saved");
        Ok(())
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
            tracing::warn!(path = %path.display(), error = %e, "failed to restrict config permissions");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

/// Default config file location.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_base_dir()?.join("ferry").join("config.json"))
}

fn config_base_dir() -> Result<PathBuf, ConfigError> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::NoConfigDir("APPDATA"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .map_err(|_| ConfigError::NoConfigDir("HOME"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_remote_sync::ErrorMode;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = FerryConfig::load_from(dir.path().join("config.json")).unwrap();

        assert_eq!(config.remote, RemoteConfig::default());
        assert_eq!(config.ingest.max_increment, 100);
        assert_eq!(config.delivery.chunk_size, 512 * 1024);
        assert_eq!(config.delivery.pause_ms, 1000);
        assert_eq!(config.delivery.expires_days, 7);
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = FerryConfig::with_path(&path);
        config.remote.host = "ftp://files.example.com".into();
        config.remote.password = "secret".into();
        config.ingest.allowed_extensions = "jpg,png".into();
        config.ingest.max_size = "2M".into();
        config.delivery.speed_limit = 65_536;
        config.save().unwrap();

        let loaded = FerryConfig::load_from(&path).unwrap();
        assert_eq!(loaded.remote, config.remote);
        assert_eq!(loaded.ingest, config.ingest);
        assert_eq!(loaded.delivery, config.delivery);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let config = FerryConfig::with_path(dir.path().join("config.json"));
        config.save().unwrap();

        let mode = std::fs::metadata(config.file_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn keys_are_camel_case() {
        let dir = TempDir::new().unwrap();
        let config = FerryConfig::with_path(dir.path().join("config.json"));
        config.save().unwrap();

        let json = std::fs::read_to_string(config.file_path()).unwrap();
        assert!(json.contains("\"timeoutSecs\""));
        assert!(json.contains("\"maxIncrement\""));
        assert!(json.contains("\"partialEnabled\""));
        assert!(!json.contains("\"password\""));
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "remote": { "host": "example.com" } }"#).unwrap();

        let config = FerryConfig::load_from(&path).unwrap();
        assert_eq!(config.remote.host, "example.com");
        assert_eq!(config.remote.port, 21);
        assert!(config.remote.passive);
        assert_eq!(config.ingest, IngestConfig::default());
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = FerryConfig::load_from(&path).unwrap();
        assert_eq!(config.remote, RemoteConfig::default());
    }

    #[test]
    fn invalid_values_fall_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "remote": { "timeoutSecs": 0 },
                "ingest": { "delimiter": "+", "maxIncrement": 0, "minSize": "lots", "maxSize": "5K" },
                "delivery": { "chunkSize": 0 }
            }"#,
        )
        .unwrap();

        let config = FerryConfig::load_from(&path).unwrap();
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.ingest.delimiter, "-");
        assert_eq!(config.ingest.max_increment, 100);
        assert_eq!(config.ingest.min_size, "");
        assert_eq!(config.ingest.max_size, "5K");
        assert_eq!(config.delivery.chunk_size, 512 * 1024);
    }

    #[test]
    fn conversions() {
        let dir = TempDir::new().unwrap();
        let mut config = FerryConfig::with_path(dir.path().join("config.json"));
        config.remote.host = "sftp://files.example.com".into();
        config.remote.port = 0;
        config.remote.permissive = true;
        config.ingest.target_dir = dir.path().to_path_buf();
        config.ingest.base_name = "Photo Album".into();
        config.ingest.delimiter = "_".into();
        config.ingest.allowed_extensions = ".jpg, png".into();
        config.ingest.min_size = "1K".into();
        config.delivery.partial_enabled = true;
        config.delivery.pause_ms = 250;

        let session = config.remote.session_config();
        assert_eq!(session.normalized_host(), "files.example.com");
        assert_eq!(session.effective_port(), 21);
        assert_eq!(config.remote.error_mode(), ErrorMode::Permissive);
        assert_eq!(config.remote.ftp_client().error_mode(), ErrorMode::Permissive);

        let policy = config.ingest.validation_policy().unwrap();
        assert_eq!(policy.allowed_extensions, vec!["jpg", "png"]);
        assert_eq!(policy.min_size, 1_000);
        assert_eq!(policy.max_size, 0);

        let naming = config.ingest.naming_policy();
        assert_eq!(naming.base(), "photo_album");
        assert!(config.ingest.validator().is_ok());

        let settings = config.delivery.settings();
        assert!(settings.partial_enabled);
        assert_eq!(settings.pause, Duration::from_millis(250));
        assert_eq!(settings.expires_after, Duration::from_secs(7 * 86_400));
    }

    #[test]
    fn invalid_size_is_reported_by_conversion() {
        let mut ingest = IngestConfig::default();
        ingest.max_size = "huge".into();
        assert!(matches!(
            ingest.validation_policy(),
            Err(ConfigError::Ingest(_))
        ));
    }
}
