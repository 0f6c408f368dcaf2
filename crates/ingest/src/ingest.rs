use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::IngestError;
use crate::inbound::InboundFile;
use crate::naming::NamingPolicy;
use crate::policy::{ValidationPolicy, Violation};

/// A file moved into its final location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedFile {
    /// Client-supplied filename.
    pub source_name: String,
    pub path: PathBuf,
    pub size: u64,
    /// SHA-256 of the stored bytes; `None` if they could not be re-read.
    pub checksum: Option<String>,
}

/// A file left uncommitted because its target name was already taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub source_name: String,
    pub taken_path: PathBuf,
}

/// Outcome of one ingest call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub committed: Vec<CommittedFile>,
    pub skipped: Vec<SkippedFile>,
    pub violations: Vec<Violation>,
}

impl IngestReport {
    /// The call succeeded only if no violation was recorded.
    pub fn is_success(&self) -> bool {
        self.violations.is_empty()
    }

    /// Committed paths in input order.
    pub fn committed_paths(&self) -> Vec<PathBuf> {
        self.committed.iter().map(|c| c.path.clone()).collect()
    }
}

/// Validates and commits the files of one upload field.
///
/// Holds configuration only; every call starts a fresh counter and report.
#[derive(Debug, Clone)]
pub struct IngestionValidator {
    policy: ValidationPolicy,
    naming: NamingPolicy,
}

impl IngestionValidator {
    pub fn new(policy: ValidationPolicy, naming: NamingPolicy) -> Self {
        Self { policy, naming }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub fn naming(&self) -> &NamingPolicy {
        &self.naming
    }

    pub fn ingest<F, I>(&self, files: I) -> Result<IngestReport, IngestError>
    where
        F: InboundFile,
        I: IntoIterator<Item = F>,
    {
        ingest(files, &self.policy, &self.naming)
    }
}

/// Ingests `files` in order.
///
/// For each file, with a counter starting at 1:
/// 1. once the counter passes `naming.max_increment()`, a `QuotaExceeded`
///    violation is recorded and the remaining files are not processed;
/// 2. every policy check runs and its violations are recorded; a file whose
///    extension cannot form a `base-N.ext` name is recorded as
///    `UnsafeExtension` and not stored, without consuming a counter value;
/// 3. if `base-{counter}.{ext}` already exists the file is skipped, not
///    retried under another name;
/// 4. otherwise the file is moved there; a failed move is recorded as
///    `CommitFailed`.
///
/// The counter advances after steps 3 and 4 alike. Files with violations are
/// still committed; callers decide what a failed report means.
pub fn ingest<F, I>(
    files: I,
    policy: &ValidationPolicy,
    naming: &NamingPolicy,
) -> Result<IngestReport, IngestError>
where
    F: InboundFile,
    I: IntoIterator<Item = F>,
{
    policy.check()?;
    naming.check()?;

    let mut report = IngestReport::default();
    let mut counter: u32 = 1;

    for file in files {
        if counter > naming.max_increment() {
            warn!(max = naming.max_increment(), "upload quota exceeded");
            report.violations.push(Violation::QuotaExceeded {
                max: naming.max_increment(),
            });
            break;
        }

        let violations = policy.validate(&file);
        if !violations.is_empty() {
            debug!(file = file.name(), count = violations.len(), "policy violations");
        }
        report.violations.extend(violations);

        let source_name = file.name().to_string();
        let Some(target) = naming.target_path(counter, file.extension()) else {
            warn!(file = %source_name, "extension cannot be used in a stored name, file not stored");
            report.violations.push(Violation::UnsafeExtension {
                extension: file.extension().to_string(),
                file: source_name,
            });
            continue;
        };
        counter += 1;

        if target.exists() {
            warn!(
                file = %source_name,
                path = %target.display(),
                "target name already taken, file not stored"
            );
            report.skipped.push(SkippedFile {
                source_name,
                taken_path: target,
            });
            continue;
        }

        let size = file.size();
        match file.move_to(&target) {
            Ok(()) => {
                let checksum = match ferry_transfer::calculate_file_checksum(&target) {
                    Ok(sum) => Some(sum),
                    Err(e) => {
                        warn!(path = %target.display(), error = %e, "failed to checksum stored file");
                        None
                    }
                };
                info!(file = %source_name, path = %target.display(), size, "stored upload");
                report.committed.push(CommittedFile {
                    source_name,
                    path: target,
                    size,
                    checksum,
                });
            }
            Err(e) => {
                warn!(file = %source_name, path = %target.display(), error = %e, "failed to store upload");
                report.violations.push(Violation::CommitFailed {
                    file: source_name,
                    path: target,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::StagedFile;
    use crate::policy::SizeUnit;
    use std::io;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        staging: PathBuf,
        store: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let staging = dir.path().join("staging");
            let store = dir.path().join("store");
            std::fs::create_dir_all(&staging).unwrap();
            std::fs::create_dir_all(&store).unwrap();
            Self {
                _dir: dir,
                staging,
                store,
            }
        }

        fn staged(&self, name: &str, data: &[u8]) -> StagedFile {
            let path = self.staging.join(format!("{name}.part"));
            std::fs::write(&path, data).unwrap();
            StagedFile::new(path, name, "text/plain").unwrap()
        }
    }

    struct Unmovable;

    impl InboundFile for Unmovable {
        fn name(&self) -> &str {
            "locked.txt"
        }

        fn mime(&self) -> &str {
            "text/plain"
        }

        fn size(&self) -> u64 {
            1
        }

        fn move_to(self, _destination: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"))
        }
    }

    #[test]
    fn sequential_names_in_input_order() {
        let fx = Fixture::new();
        let files = vec![
            fx.staged("a.txt", b"first"),
            fx.staged("b.txt", b"second"),
            fx.staged("c.txt", b"third"),
        ];

        let report = ingest(
            files,
            &ValidationPolicy::new(),
            &NamingPolicy::new(&fx.store, "doc"),
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(
            report.committed_paths(),
            vec![
                fx.store.join("doc-1.txt"),
                fx.store.join("doc-2.txt"),
                fx.store.join("doc-3.txt"),
            ]
        );
        assert_eq!(std::fs::read(fx.store.join("doc-2.txt")).unwrap(), b"second");
        assert_eq!(
            report.committed[0].checksum.as_deref(),
            Some(ferry_transfer::checksum_bytes(b"first").as_str())
        );
    }

    #[test]
    fn collision_skips_file_and_advances_counter() {
        let fx = Fixture::new();
        std::fs::write(fx.store.join("doc-1.txt"), b"existing").unwrap();

        let first = fx.staged("a.txt", b"new-a");
        let first_staged = first.staged_path().to_path_buf();
        let files = vec![first, fx.staged("b.txt", b"new-b")];

        let report = ingest(
            files,
            &ValidationPolicy::new(),
            &NamingPolicy::new(&fx.store, "doc"),
        )
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].taken_path, fx.store.join("doc-1.txt"));
        assert_eq!(report.committed_paths(), vec![fx.store.join("doc-2.txt")]);
        assert_eq!(std::fs::read(fx.store.join("doc-1.txt")).unwrap(), b"existing");
        assert!(first_staged.exists());
    }

    #[test]
    fn quota_stops_processing() {
        let fx = Fixture::new();
        let files = vec![
            fx.staged("a.txt", b"1"),
            fx.staged("b.txt", b"2"),
            fx.staged("c.txt", b"3"),
        ];

        let report = ingest(
            files,
            &ValidationPolicy::new(),
            &NamingPolicy::new(&fx.store, "doc").with_max_increment(2),
        )
        .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.committed.len(), 2);
        assert_eq!(report.violations, vec![Violation::QuotaExceeded { max: 2 }]);
        assert!(!fx.store.join("doc-3.txt").exists());
    }

    #[test]
    fn violations_collected_for_every_file() {
        let fx = Fixture::new();
        let files = vec![
            fx.staged("ok.txt", b"fine"),
            fx.staged("bad.exe", b"nope"),
            fx.staged("tiny.txt", b""),
        ];
        let policy = ValidationPolicy::new()
            .allow_extensions("txt")
            .min_size(1, SizeUnit::Bytes);

        let report = ingest(files, &policy, &NamingPolicy::new(&fx.store, "doc")).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.violations.len(), 2);
        assert!(matches!(
            &report.violations[0],
            Violation::ExtensionNotAllowed { file, .. } if file == "bad.exe"
        ));
        assert!(matches!(
            &report.violations[1],
            Violation::SizeTooSmall { file, .. } if file == "tiny.txt"
        ));
        assert_eq!(report.committed.len(), 3);
    }

    #[test]
    fn failed_move_is_recorded() {
        let fx = Fixture::new();
        let report = ingest(
            vec![Unmovable],
            &ValidationPolicy::new(),
            &NamingPolicy::new(&fx.store, "doc"),
        )
        .unwrap();

        assert!(report.committed.is_empty());
        assert!(matches!(
            &report.violations[..],
            [Violation::CommitFailed { file, .. }] if file == "locked.txt"
        ));
    }

    #[test]
    fn reports_do_not_leak_between_calls() {
        let fx = Fixture::new();
        let validator = IngestionValidator::new(
            ValidationPolicy::new().allow_extensions("txt"),
            NamingPolicy::new(&fx.store, "batch"),
        );

        let first = validator.ingest(vec![fx.staged("x.bin", b"1")]).unwrap();
        assert_eq!(first.violations.len(), 1);

        let second = validator.ingest(vec![fx.staged("y.txt", b"2")]).unwrap();
        assert!(second.is_success());
        assert_eq!(second.committed_paths(), vec![fx.store.join("batch-2.txt")]);
    }

    #[test]
    fn extension_with_separators_is_not_stored() {
        let fx = Fixture::new();
        let path = fx.staging.join("evil.part");
        std::fs::write(&path, b"payload").unwrap();
        let evil = StagedFile::new(&path, "evil./sub/payload", "text/plain").unwrap();
        let files = vec![evil, fx.staged("a.txt", b"fine")];

        let report = ingest(
            files,
            &ValidationPolicy::new(),
            &NamingPolicy::new(&fx.store, "doc"),
        )
        .unwrap();

        assert!(!report.is_success());
        assert!(matches!(
            &report.violations[..],
            [Violation::UnsafeExtension { extension, .. }] if extension == "/sub/payload"
        ));
        assert_eq!(report.committed_paths(), vec![fx.store.join("doc-1.txt")]);
        assert!(!fx.store.join("doc-1.").exists());
        assert!(path.exists());

        let entries: Vec<_> = std::fs::read_dir(&fx.store).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn invalid_naming_is_a_programmer_error() {
        let fx = Fixture::new();
        let result = ingest(
            Vec::<StagedFile>::new(),
            &ValidationPolicy::new(),
            &NamingPolicy::new(fx.store.join("missing"), "doc"),
        );
        assert!(matches!(result, Err(IngestError::InvalidNaming(_))));
    }
}
