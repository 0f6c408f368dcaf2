use std::path::PathBuf;

use crate::IngestError;
use crate::inbound::InboundFile;

/// Decimal size units accepted by size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    Bytes,
    Kilo,
    Mega,
    Giga,
}

impl SizeUnit {
    pub fn multiplier(self) -> u64 {
        match self {
            SizeUnit::Bytes => 1,
            SizeUnit::Kilo => 1_000,
            SizeUnit::Mega => 1_000_000,
            SizeUnit::Giga => 1_000_000_000,
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_uppercase().as_str() {
            "" | "B" => Some(SizeUnit::Bytes),
            "K" | "KB" => Some(SizeUnit::Kilo),
            "M" | "MB" => Some(SizeUnit::Mega),
            "G" | "GB" => Some(SizeUnit::Giga),
            _ => None,
        }
    }
}

/// Parses sizes such as `512`, `200K`, `10M` or `1 GB` into bytes.
pub fn parse_size(raw: &str) -> Result<u64, IngestError> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| IngestError::InvalidSize(raw.to_string()))?;
    let unit = SizeUnit::from_suffix(suffix.trim())
        .ok_or_else(|| IngestError::InvalidSize(raw.to_string()))?;

    value
        .checked_mul(unit.multiplier())
        .ok_or_else(|| IngestError::InvalidSize(raw.to_string()))
}

/// One failed check, with enough context to render a message for the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("'{file}': extension '{actual}' is not allowed (allowed: {})", .allowed.join(", "))]
    ExtensionNotAllowed {
        file: String,
        allowed: Vec<String>,
        actual: String,
    },

    #[error("'{file}': type '{actual}' is not allowed (allowed: {})", .allowed.join(", "))]
    MimeNotAllowed {
        file: String,
        allowed: Vec<String>,
        actual: String,
    },

    #[error("'{file}': {actual} bytes is below the minimum of {min} bytes")]
    SizeTooSmall { file: String, min: u64, actual: u64 },

    #[error("'{file}': {actual} bytes exceeds the maximum of {max} bytes")]
    SizeTooLarge { file: String, max: u64, actual: u64 },

    #[error("'{file}': extension '{extension}' cannot be part of a stored name")]
    UnsafeExtension { file: String, extension: String },

    #[error("no more than {max} files can be stored per upload")]
    QuotaExceeded { max: u32 },

    #[error("'{file}': could not be stored at {}: {reason}", .path.display())]
    CommitFailed {
        file: String,
        path: PathBuf,
        reason: String,
    },
}

/// Acceptance rules for inbound files. Empty lists and zero sizes mean
/// "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub allowed_extensions: Vec<String>,
    pub allowed_mimes: Vec<String>,
    pub min_size: u64,
    pub max_size: u64,
}

impl ValidationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the extension allow-list from a comma-separated list.
    pub fn allow_extensions(mut self, list: &str) -> Self {
        self.allowed_extensions = split_list(list, true);
        self
    }

    /// Sets the MIME allow-list from a comma-separated list.
    pub fn allow_mimes(mut self, list: &str) -> Self {
        self.allowed_mimes = split_list(list, false);
        self
    }

    pub fn min_size(mut self, size: u64, unit: SizeUnit) -> Self {
        self.min_size = size.saturating_mul(unit.multiplier());
        self
    }

    pub fn max_size(mut self, size: u64, unit: SizeUnit) -> Self {
        self.max_size = size.saturating_mul(unit.multiplier());
        self
    }

    /// Rejects contradictory bounds.
    pub fn check(&self) -> Result<(), IngestError> {
        if self.min_size > 0 && self.max_size > 0 && self.min_size > self.max_size {
            return Err(IngestError::InvalidPolicy(format!(
                "minimum size {} exceeds maximum size {}",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    /// Runs every configured check; failures do not short-circuit each other.
    pub fn validate<F: InboundFile + ?Sized>(&self, file: &F) -> Vec<Violation> {
        let mut violations = Vec::new();
        let name = file.name();

        if !self.allowed_extensions.is_empty() {
            let actual = file.extension();
            if !self
                .allowed_extensions
                .iter()
                .any(|ext| ext.eq_ignore_ascii_case(actual))
            {
                violations.push(Violation::ExtensionNotAllowed {
                    file: name.to_string(),
                    allowed: self.allowed_extensions.clone(),
                    actual: actual.to_string(),
                });
            }
        }

        if !self.allowed_mimes.is_empty() {
            let actual = file.mime();
            if !self
                .allowed_mimes
                .iter()
                .any(|mime| mime.eq_ignore_ascii_case(actual))
            {
                violations.push(Violation::MimeNotAllowed {
                    file: name.to_string(),
                    allowed: self.allowed_mimes.clone(),
                    actual: actual.to_string(),
                });
            }
        }

        let size = file.size();
        if self.min_size > 0 && size < self.min_size {
            violations.push(Violation::SizeTooSmall {
                file: name.to_string(),
                min: self.min_size,
                actual: size,
            });
        }
        if self.max_size > 0 && size > self.max_size {
            violations.push(Violation::SizeTooLarge {
                file: name.to_string(),
                max: self.max_size,
                actual: size,
            });
        }

        violations
    }
}

fn split_list(list: &str, strip_dot: bool) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .map(|item| if strip_dot { item.trim_start_matches('.') } else { item })
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
