use std::path::Path;

/// Extensions transferred in text mode; everything else goes binary.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "text", "php", "phps", "php4", "js", "css", "htm", "html", "phtml", "shtml", "log",
    "xml",
];

/// Data representation on the wire (RFC 959 `TYPE A` / `TYPE I`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    Text,
    #[default]
    Binary,
}

impl TransferMode {
    /// Infers the mode from a file name. A name without a dot counts as
    /// `txt`.
    pub fn infer(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => "txt",
        };
        Self::for_extension(ext)
    }

    /// Infers the mode from the final component of `path`.
    pub fn infer_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        Self::infer(&name)
    }

    pub fn for_extension(ext: &str) -> Self {
        if TEXT_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(ext)) {
            TransferMode::Text
        } else {
            TransferMode::Binary
        }
    }

    /// Representation code sent with the `TYPE` command.
    pub fn type_code(self) -> &'static str {
        match self {
            TransferMode::Text => "A",
            TransferMode::Binary => "I",
        }
    }
}
