//! Reading asset files from disk.
//!
//! DSON files are JSON, optionally gzip-compressed, and are decoded as
//! Latin-1 text. Content libraries are frequently authored on
//! case-insensitive file systems, so paths that do not exist verbatim are
//! repaired component by component.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Where document bytes come from.
///
/// The resolver only talks to this trait, which keeps the filesystem out of
/// unit tests.
pub trait AssetSource {
    /// Read the raw (possibly compressed) bytes of a file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Check that a directory exists.
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    /// List the entries of a directory (files and subdirectories).
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }
}

/// Reads from the local filesystem with the case-insensitive fallback.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsSource;

impl AssetSource for FsSource {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = if path.exists() {
            path.to_path_buf()
        } else {
            let fixed = resolve_case_insensitive(path);
            log::debug!("Repaired path {} -> {}", path.display(), fixed.display());
            fixed
        };
        fs::read(path)
    }
}

/// In-memory file tree, used to embed documents and in tests.
///
/// Directories exist implicitly for every ancestor of an added file.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: BTreeMap<PathBuf, Vec<u8>>,
    reads: Cell<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    /// Builder form of [`add_file`](Self::add_file).
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, contents);
        self
    }

    /// Number of successful reads so far.
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }
}

impl AssetSource for MemorySource {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let bytes = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))?;
        self.reads.set(self.reads.get() + 1);
        Ok(bytes)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files.keys().any(|f| f != path && f.starts_with(path))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.is_dir(path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, path.display().to_string()));
        }
        let entries: BTreeSet<PathBuf> = self
            .files
            .keys()
            .filter_map(|f| f.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|first| path.join(first.as_os_str()))
            .collect();
        Ok(entries.into_iter().collect())
    }
}

/// Turn raw file bytes into text: gunzip if the gzip magic is present, then
/// decode as Latin-1.
pub fn decode_text(bytes: &[u8]) -> io::Result<String> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut decoded)?;
        Ok(latin1_to_string(&decoded))
    } else {
        Ok(latin1_to_string(bytes))
    }
}

/// Every Latin-1 byte maps to the code point of the same value.
fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Walk `path` component by component; whenever a component does not exist,
/// substitute the first directory entry whose name matches it
/// case-insensitively. Components without any match are kept as given, so
/// the result may still not exist.
pub fn resolve_case_insensitive(path: &Path) -> PathBuf {
    let mut components = path.components();
    let mut check = match components.next() {
        Some(first) => PathBuf::from(first.as_os_str()),
        None => return PathBuf::new(),
    };

    for component in components {
        let name = match component {
            Component::Normal(name) => name,
            other => {
                check.push(other.as_os_str());
                continue;
            }
        };
        let candidate = check.join(name);
        if candidate.exists() {
            check = candidate;
            continue;
        }

        let wanted = name.to_string_lossy().to_lowercase();
        let corrected = fs::read_dir(&check).ok().and_then(|entries| {
            let mut names: Vec<_> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name())
                .filter(|n| n.to_string_lossy().to_lowercase() == wanted)
                .collect();
            names.sort();
            names.into_iter().next()
        });

        check = match corrected {
            Some(found) => check.join(found),
            None => candidate,
        };
    }

    check
}
