use std::path::PathBuf;
use std::time::Duration;

use ferry_ingest::{
    DEFAULT_MAX_INCREMENT, Delimiter, IngestionValidator, NamingPolicy, ValidationPolicy,
    parse_size,
};
use ferry_remote_sync::{
    DEFAULT_PORT, DEFAULT_TIMEOUT, ErrorMode, FtpSession, RemoteSyncClient, SessionConfig,
};
use ferry_transfer::{DEFAULT_CHUNK_SIZE, DeliverySettings, RangeDelivery};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ConfigError;

// ----------------------------------------------------------------------
// Remote
// ----------------------------------------------------------------------

/// Remote server the mirror pushes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub passive: bool,
    /// Report failures as `false`/empty results instead of errors.
    pub permissive: bool,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: "anonymous".into(),
            password: String::new(),
            passive: true,
            permissive: false,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(&self.host, &self.username, &self.password)
            .with_port(self.port)
            .with_passive(self.passive)
    }

    pub fn error_mode(&self) -> ErrorMode {
        if self.permissive {
            ErrorMode::Permissive
        } else {
            ErrorMode::Strict
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// An unconnected FTP client configured from this section.
    pub fn ftp_client(&self) -> RemoteSyncClient<FtpSession> {
        RemoteSyncClient::new(FtpSession::new().with_timeout(self.timeout()))
            .with_error_mode(self.error_mode())
    }

    pub(crate) fn sanitize(&mut self) {
        if self.timeout_secs == 0 {
            warn!(
                default = DEFAULT_TIMEOUT.as_secs(),
                "remote timeout must be positive, using default"
            );
            self.timeout_secs = DEFAULT_TIMEOUT.as_secs();
        }
    }
}

// ----------------------------------------------------------------------
// Ingest
// ----------------------------------------------------------------------

/// Where uploads land and what they may be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestConfig {
    pub target_dir: PathBuf,
    pub base_name: String,
    /// `-` or `_`.
    pub delimiter: String,
    pub max_increment: u32,
    /// Comma-separated, e.g. `"jpg,png"`. Empty allows any.
    pub allowed_extensions: String,
    pub allowed_mimes: String,
    /// Size with optional unit suffix, e.g. `"200K"`. Empty is unbounded.
    pub min_size: String,
    pub max_size: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("uploads"),
            base_name: "upload".into(),
            delimiter: "-".into(),
            max_increment: DEFAULT_MAX_INCREMENT,
            allowed_extensions: String::new(),
            allowed_mimes: String::new(),
            min_size: String::new(),
            max_size: String::new(),
        }
    }
}

impl IngestConfig {
    pub fn validation_policy(&self) -> Result<ValidationPolicy, ConfigError> {
        let mut policy = ValidationPolicy::new()
            .allow_extensions(&self.allowed_extensions)
            .allow_mimes(&self.allowed_mimes);
        policy.min_size = size_or_unbounded(&self.min_size)?;
        policy.max_size = size_or_unbounded(&self.max_size)?;
        Ok(policy)
    }

    pub fn naming_policy(&self) -> NamingPolicy {
        let delimiter = if self.delimiter == "_" {
            Delimiter::Underscore
        } else {
            Delimiter::Dash
        };
        NamingPolicy::new(&self.target_dir, &self.base_name)
            .with_delimiter(delimiter)
            .with_max_increment(self.max_increment)
    }

    pub fn validator(&self) -> Result<IngestionValidator, ConfigError> {
        Ok(IngestionValidator::new(
            self.validation_policy()?,
            self.naming_policy(),
        ))
    }

    pub(crate) fn sanitize(&mut self) {
        let defaults = Self::default();

        if !matches!(self.delimiter.as_str(), "-" | "_") {
            warn!(delimiter = %self.delimiter, "unknown delimiter, using '-'");
            self.delimiter = defaults.delimiter;
        }
        if self.max_increment == 0 {
            warn!(
                default = DEFAULT_MAX_INCREMENT,
                "max increment must be positive, using default"
            );
            self.max_increment = defaults.max_increment;
        }
        if self.base_name.trim().is_empty() {
            warn!("empty base name, using default");
            self.base_name = defaults.base_name;
        }
        for (field, value) in [("minSize", &mut self.min_size), ("maxSize", &mut self.max_size)] {
            if let Err(e) = size_or_unbounded(value) {
                warn!(field, error = %e, "invalid size, removing bound");
                value.clear();
            }
        }
    }
}

fn size_or_unbounded(raw: &str) -> Result<u64, ConfigError> {
    if raw.trim().is_empty() {
        Ok(0)
    } else {
        Ok(parse_size(raw)?)
    }
}

// ----------------------------------------------------------------------
// Delivery
// ----------------------------------------------------------------------

/// How files are streamed back to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryConfig {
    pub partial_enabled: bool,
    /// Bytes per second; `0` is unlimited.
    pub speed_limit: u64,
    pub pause_ms: u64,
    pub chunk_size: usize,
    pub expires_days: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        let settings = DeliverySettings::default();
        Self {
            partial_enabled: settings.partial_enabled,
            speed_limit: settings.speed_limit,
            pause_ms: settings.pause.as_millis() as u64,
            chunk_size: settings.chunk_size,
            expires_days: settings.expires_after.as_secs() / 86_400,
        }
    }
}

impl DeliveryConfig {
    pub fn settings(&self) -> DeliverySettings {
        DeliverySettings {
            partial_enabled: self.partial_enabled,
            speed_limit: self.speed_limit,
            pause: Duration::from_millis(self.pause_ms),
            chunk_size: self.chunk_size,
            expires_after: Duration::from_secs(self.expires_days * 86_400),
        }
    }

    pub fn delivery(&self) -> RangeDelivery {
        RangeDelivery::new(self.settings())
    }

    pub(crate) fn sanitize(&mut self) {
        if self.chunk_size == 0 {
            warn!(default = DEFAULT_CHUNK_SIZE, "chunk size must be positive, using default");
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
    }
}
