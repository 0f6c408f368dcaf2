use std::path::{Component, Path, PathBuf};

use crate::{DEFAULT_MAX_INCREMENT, IngestError};

/// Word separator used when sanitizing the base filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Dash,
    Underscore,
}

impl Delimiter {
    fn as_char(self) -> char {
        match self {
            Delimiter::Dash => '-',
            Delimiter::Underscore => '_',
        }
    }
}

/// Where and under which names committed files land: `base-N.ext` in
/// `target_dir`, N counting from 1 up to `max_increment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    target_dir: PathBuf,
    base: String,
    delimiter: Delimiter,
    max_increment: u32,
}

impl NamingPolicy {
    pub fn new(target_dir: impl Into<PathBuf>, base: &str) -> Self {
        Self {
            target_dir: target_dir.into(),
            base: sanitize(base, Delimiter::Dash),
            delimiter: Delimiter::Dash,
            max_increment: DEFAULT_MAX_INCREMENT,
        }
    }

    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.base = sanitize(&self.base, delimiter);
        self.delimiter = delimiter;
        self
    }

    pub fn with_max_increment(mut self, max_increment: u32) -> Self {
        self.max_increment = max_increment;
        self
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Sanitized base filename.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    pub fn max_increment(&self) -> u32 {
        self.max_increment
    }

    /// Path for the `counter`-th file of a call, always a direct child of
    /// `target_dir`. `None` if `extension` would break out of `base-N.ext`.
    pub fn target_path(&self, counter: u32, extension: &str) -> Option<PathBuf> {
        if extension.contains(['/', '\\', '\0', ':']) {
            return None;
        }

        let filename = if extension.is_empty() {
            format!("{}-{counter}", self.base)
        } else {
            format!("{}-{counter}.{extension}", self.base)
        };
        let mut components = Path::new(&filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.target_dir.join(filename)),
            _ => None,
        }
    }

    /// Rejects policies that can never commit anything.
    pub fn check(&self) -> Result<(), IngestError> {
        if self.base.is_empty() {
            return Err(IngestError::InvalidNaming(
                "base filename is empty after sanitizing".into(),
            ));
        }
        if self.max_increment == 0 {
            return Err(IngestError::InvalidNaming(
                "maximum increment must be at least 1".into(),
            ));
        }
        if !self.target_dir.is_dir() {
            return Err(IngestError::InvalidNaming(format!(
                "target directory does not exist: {}",
                self.target_dir.display()
            )));
        }
        Ok(())
    }
}

/// Lower-cases and trims `raw`, collapses runs of spaces, dashes and
/// underscores into one `delimiter`, and drops every other non-alphanumeric
/// character.
fn sanitize(raw: &str, delimiter: Delimiter) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in raw.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push(delimiter.as_char());
            }
            pending_separator = false;
            out.push(c);
        } else if matches!(c, ' ' | '-' | '_') {
            pending_separator = true;
        }
    }

    out
}
