// Ordered encryption backends for password-protected archives

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use crate::core::compression::zip_handler::ZipHandler;
use crate::models::{ArchiveError, ArchiverConfig, SourceEntry};

/// One way of producing an encrypted ZIP
///
/// Backends are tried in order by [`write_with_first_available`]. An
/// unavailable backend is skipped, a failing one hands over to the next.
pub trait EncryptionBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the backend can run in this process at all
    fn is_available(&self) -> bool;

    /// Write `entries` into a new encrypted archive at `output`
    fn write_encrypted(
        &self,
        entries: &[SourceEntry],
        password: &str,
        output: &Path,
    ) -> Result<(), ArchiveError>;
}

/// AES-256 through the `zip` crate
pub struct NativeAesBackend {
    writer: ZipHandler,
    enabled: bool,
}

impl NativeAesBackend {
    pub fn new(config: &ArchiverConfig) -> Self {
        Self {
            writer: ZipHandler::with_config(config),
            enabled: config.native_encryption,
        }
    }
}

impl EncryptionBackend for NativeAesBackend {
    fn name(&self) -> &str {
        "native-aes"
    }

    fn is_available(&self) -> bool {
        cfg!(feature = "aes") && self.enabled
    }

    fn write_encrypted(
        &self,
        entries: &[SourceEntry],
        password: &str,
        output: &Path,
    ) -> Result<(), ArchiveError> {
        self.writer.write_archive(entries, output, Some(password))
    }
}

/// A `zip`-compatible program found on `PATH`
///
/// The password travels on the child's command line, where other local
/// users may see it in the process table.
pub struct ExternalArchiverBackend {
    program: String,
}

impl ExternalArchiverBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn resolve(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }
}

impl EncryptionBackend for ExternalArchiverBackend {
    fn name(&self) -> &str {
        &self.program
    }

    fn is_available(&self) -> bool {
        self.resolve().is_some()
    }

    /// Runs the program once per input root so that member names come out
    /// exactly as the native writer would produce them
    fn write_encrypted(
        &self,
        entries: &[SourceEntry],
        password: &str,
        output: &Path,
    ) -> Result<(), ArchiveError> {
        let program = self.resolve().ok_or_else(|| ArchiveError::StrategyExhausted(
            format!("{} is not on PATH", self.program)
        ))?;

        // zip appends ".zip" to names without an extension; give it one
        let target = output.with_file_name("external-tier.zip");

        for (root, names) in group_by_root(entries)? {
            let status = Command::new(&program)
                .current_dir(&root)
                .arg("-q")
                .arg("-P")
                .arg(password)
                .arg(&target)
                .args(&names)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map_err(|e| ArchiveError::StrategyExhausted(
                    format!("Failed to run {}: {}", self.program, e)
                ))?;

            if !status.success() {
                let _ = fs::remove_file(&target);
                return Err(ArchiveError::StrategyExhausted(
                    format!("{} exited with {}", self.program, status)
                ));
            }
        }

        fs::rename(&target, output)
            .map_err(|e| ArchiveError::DestinationUnwritable(
                format!("Failed to move {} output: {}", self.program, e)
            ))
    }
}

/// Build the default chain: native AES, then the external program
pub fn default_backends(config: &ArchiverConfig) -> Vec<Box<dyn EncryptionBackend>> {
    vec![
        Box::new(NativeAesBackend::new(config)),
        Box::new(ExternalArchiverBackend::new(config.external_archiver.clone())),
    ]
}

/// Try each backend in order until one writes `output`
///
/// Unreadable sources and unwritable destinations stop the chain, since no
/// other backend could do better. Any other failure moves on.
pub fn write_with_first_available(
    backends: &[Box<dyn EncryptionBackend>],
    entries: &[SourceEntry],
    password: &str,
    output: &Path,
) -> Result<(), ArchiveError> {
    let mut tried = Vec::new();

    for backend in backends {
        if !backend.is_available() {
            log::debug!("encryption backend {} unavailable, skipping", backend.name());
            continue;
        }

        match backend.write_encrypted(entries, password, output) {
            Ok(()) => {
                log::debug!("encrypted archive written by {}", backend.name());
                return Ok(());
            }
            Err(e @ (ArchiveError::SourceUnreadable(_) | ArchiveError::DestinationUnwritable(_))) => {
                return Err(e);
            }
            Err(e) => {
                log::debug!("encryption backend {} failed: {}", backend.name(), e);
                let _ = fs::remove_file(output);
                tried.push(format!("{}: {}", backend.name(), e));
            }
        }
    }

    let detail = if tried.is_empty() {
        "no encryption backend is available".to_string()
    } else {
        tried.join("; ")
    };
    Err(ArchiveError::StrategyExhausted(detail))
}

/// Group entries by the directory their member name is relative to
fn group_by_root(entries: &[SourceEntry]) -> Result<BTreeMap<PathBuf, Vec<String>>, ArchiveError> {
    let mut groups: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();

    for entry in entries {
        let depth = Path::new(&entry.name).components().count();
        let root = entry.path
            .ancestors()
            .nth(depth)
            .filter(|root| root.join(&entry.name) == entry.path)
            .ok_or_else(|| ArchiveError::StrategyExhausted(
                format!("Cannot derive an input root for {}", entry.name)
            ))?;

        let root = if root.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            root.to_path_buf()
        };
        groups.entry(root).or_default().push(entry.name.clone());
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FailingBackend;

    impl EncryptionBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn write_encrypted(&self, _: &[SourceEntry], _: &str, output: &Path) -> Result<(), ArchiveError> {
            fs::write(output, b"half").unwrap();
            Err(ArchiveError::CorruptArchive("simulated".to_string()))
        }
    }

    struct UnavailableBackend;

    impl EncryptionBackend for UnavailableBackend {
        fn name(&self) -> &str {
            "unavailable"
        }

        fn is_available(&self) -> bool {
            false
        }

        fn write_encrypted(&self, _: &[SourceEntry], _: &str, _: &Path) -> Result<(), ArchiveError> {
            panic!("unavailable backend must not run");
        }
    }

    fn one_entry(dir: &Path) -> Vec<SourceEntry> {
        let path = dir.join("secret.txt");
        fs::write(&path, b"top secret").unwrap();
        vec![SourceEntry::new("secret.txt", path)]
    }

    #[test]
    fn test_empty_chain_is_exhausted() {
        let temp = TempDir::new().unwrap();
        let entries = one_entry(temp.path());
        let output = temp.path().join("out.zip");

        let result = write_with_first_available(&[], &entries, "pw", &output);
        assert!(matches!(result, Err(ArchiveError::StrategyExhausted(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_unavailable_and_failing_backends_are_exhausted() {
        let temp = TempDir::new().unwrap();
        let entries = one_entry(temp.path());
        let output = temp.path().join("out.zip");
        let backends: Vec<Box<dyn EncryptionBackend>> =
            vec![Box::new(UnavailableBackend), Box::new(FailingBackend)];

        let result = write_with_first_available(&backends, &entries, "pw", &output);
        match result {
            Err(ArchiveError::StrategyExhausted(detail)) => assert!(detail.contains("failing")),
            other => panic!("Expected StrategyExhausted, got {:?}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let backend = ExternalArchiverBackend::new("iarchive-no-such-archiver");
        assert!(!backend.is_available());
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_tier_failure() {
        let temp = TempDir::new().unwrap();
        let entries = one_entry(temp.path());
        let output = temp.path().join("out.zip");
        let backend = ExternalArchiverBackend::new("false");
        if !backend.is_available() {
            return;
        }

        let result = backend.write_encrypted(&entries, "pw", &output);
        assert!(matches!(result, Err(ArchiveError::StrategyExhausted(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_native_backend_respects_config() {
        let config = ArchiverConfig {
            native_encryption: false,
            ..ArchiverConfig::default()
        };
        assert!(!NativeAesBackend::new(&config).is_available());
        assert_eq!(
            NativeAesBackend::new(&ArchiverConfig::default()).is_available(),
            cfg!(feature = "aes")
        );
    }

    #[cfg(feature = "aes")]
    #[test]
    fn test_native_backend_writes_first() {
        let temp = TempDir::new().unwrap();
        let entries = one_entry(temp.path());
        let output = temp.path().join("out.zip");
        let backends = default_backends(&ArchiverConfig::default());

        write_with_first_available(&backends, &entries, "pw", &output).unwrap();

        let mut archive = zip::ZipArchive::new(fs::File::open(&output).unwrap()).unwrap();
        assert!(archive.by_index(0).is_err());
        assert!(archive.by_index_decrypt(0, b"pw").is_ok());
    }

    #[test]
    fn test_group_by_root() {
        let entries = vec![
            SourceEntry::new("a.txt", "/in/a.txt"),
            SourceEntry::new("photos/2024/b.jpg", "/data/photos/2024/b.jpg"),
            SourceEntry::new("photos/c.jpg", "/data/photos/c.jpg"),
        ];
        let groups = group_by_root(&entries).unwrap();

        assert_eq!(groups[Path::new("/in")], vec!["a.txt"]);
        assert_eq!(groups[Path::new("/data")], vec!["photos/2024/b.jpg", "photos/c.jpg"]);
    }
}
