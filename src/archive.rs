//! Archive access for packaged extensions.
//!
//! Packages are zip-format containers, possibly holding further containers
//! (a multi-extension XPI full of inner XPIs, a theme full of jars). The
//! engine reads them through the [`ArchiveReader`] trait so checks and
//! tests can substitute in-memory fakes; [`XpiArchive`] is the production
//! implementation over the `zip` crate.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};

use crate::error::{Result, ValidationError};

/// Read access to a zip-like container. Paths are `/`-separated; directory
/// entries end in `/`.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveReader {
    /// All entry paths in the archive, sorted.
    fn entries(&self) -> Vec<String>;

    /// Whether an entry exists at `path`.
    fn contains(&self, path: &str) -> bool;

    /// Extracts an entry's bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingEntry`] for unknown paths and
    /// [`ValidationError::UnopenableArchive`] for decompression failures.
    fn read(&mut self, path: &str) -> Result<Vec<u8>>;
}

/// A zip-backed package archive.
pub struct XpiArchive<R: Read + Seek> {
    zip: zip::ZipArchive<R>,
    entries: Vec<String>,
}

impl<R: Read + Seek> XpiArchive<R> {
    /// Opens an archive from any seekable byte source.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnopenableArchive`] when the container
    /// is not a readable zip file.
    pub fn open(source: R) -> Result<Self> {
        let zip = zip::ZipArchive::new(source).map_err(|err| {
            ValidationError::UnopenableArchive {
                reason: err.to_string(),
            }
        })?;
        let mut entries: Vec<String> = zip.file_names().map(str::to_owned).collect();
        entries.sort();
        Ok(Self { zip, entries })
    }

    /// Walks the central directory to detect truncated or corrupt
    /// entries, mirroring a zip integrity test. Returns the first failure
    /// reason, if any.
    pub fn integrity_failure(&mut self) -> Option<String> {
        let names = self.entries.clone();
        for name in names {
            let mut sink = Vec::new();
            let outcome = self
                .zip
                .by_name(&name)
                .map_err(|err| err.to_string())
                .and_then(|mut entry| {
                    entry
                        .read_to_end(&mut sink)
                        .map_err(|err| err.to_string())
                });
            if let Err(reason) = outcome {
                return Some(format!("{name}: {reason}"));
            }
        }
        None
    }
}

/// Opens a nested archive from an entry's extracted bytes.
///
/// # Errors
///
/// Returns [`ValidationError::UnopenableArchive`] when the bytes are not a
/// readable zip container.
pub fn open_nested(bytes: Vec<u8>) -> Result<XpiArchive<Cursor<Vec<u8>>>> {
    XpiArchive::open(Cursor::new(bytes))
}

impl<R: Read + Seek> ArchiveReader for XpiArchive<R> {
    fn entries(&self) -> Vec<String> {
        self.entries.clone()
    }

    fn contains(&self, path: &str) -> bool {
        self.entries.binary_search_by(|entry| entry.as_str().cmp(path)).is_ok()
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut entry = match self.zip.by_name(path) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ValidationError::MissingEntry {
                    path: path.to_owned(),
                });
            }
            Err(err) => {
                return Err(ValidationError::UnopenableArchive {
                    reason: err.to_string(),
                });
            }
        };
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// In-memory archive for tests and for callers that already hold the
/// package contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryArchive {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryArchive {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any previous content at the same path.
    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.files.insert(path.into(), bytes.into());
        self
    }
}

impl ArchiveReader for MemoryArchive {
    fn entries(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ValidationError::MissingEntry {
                path: path.to_owned(),
            })
    }
}
