//! Per-monitor-file metadata: when each monitor was last checked.
//!
//! Stored next to the monitor files as `<stem>.meta`, one record per line:
//!
//! ```text
//! <monitor name="headlines" lastcheck="1700000000" />
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::basedir::{BaseDir, FileKind};

/// Longest monitor name the line format keeps
pub const MAX_NAME_LEN: usize = 30;

pub const METADATA_EXTENSION: &str = "meta";

const LINE_PREFIX: &str = "<monitor name=\"";
const LINE_MIDDLE: &str = "\" lastcheck=\"";
const LINE_SUFFIX: &str = "\" />";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read metadata file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write metadata file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Record {
    last_check: i64,
    /// Touched during this run
    seen: bool,
}

#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    records: BTreeMap<String, Record>,
}

impl MetadataStore {
    /// Metadata store for `monitor_file`. Nothing is read yet.
    pub fn open(base_dir: &BaseDir, monitor_file: &Path) -> Self {
        let path = base_dir.build_path(FileKind::Metadata, &metadata_file_name(monitor_file));
        Self::at(path)
    }

    /// Metadata store backed by an explicit file
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            records: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read records from disk. A missing file means no records.
    pub fn load(&mut self) -> Result<(), MetadataError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no metadata yet");
                return Ok(());
            }
            Err(source) => {
                return Err(MetadataError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Some((name, last_check)) => {
                    self.records.insert(
                        normalize_name(name),
                        Record {
                            last_check,
                            seen: false,
                        },
                    );
                }
                None => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    "ignoring malformed metadata line"
                ),
            }
        }

        debug!(path = %self.path.display(), records = self.records.len(), "loaded metadata");
        Ok(())
    }

    /// Last check time of `name`, 0 if never checked
    pub fn last_check(&self, name: &str) -> i64 {
        self.records
            .get(&normalize_name(name))
            .map(|r| r.last_check)
            .unwrap_or(0)
    }

    pub fn set_last_check(&mut self, name: &str, timestamp: i64) {
        self.records.insert(
            normalize_name(name),
            Record {
                last_check: timestamp,
                seen: true,
            },
        );
    }

    /// Mark `name` as present in the monitor file without changing its time.
    pub fn touch(&mut self, name: &str) {
        self.records.entry(normalize_name(name)).or_default().seen = true;
    }

    /// Records not touched this run, sorted
    pub fn stale_names(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|(_, r)| !r.seen)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write all records, replacing the file atomically.
    pub fn save(&self) -> Result<(), MetadataError> {
        let write_err = |source| MetadataError::Write {
            path: self.path.clone(),
            source,
        };

        let stale = self.stale_names();
        if !stale.is_empty() {
            info!(path = %self.path.display(), names = ?stale, "keeping metadata of monitors not seen this run");
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
        for (name, record) in &self.records {
            writeln!(temp, "{}", format_line(name, record.last_check)).map_err(write_err)?;
        }
        temp.flush().map_err(write_err)?;
        temp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!(path = %self.path.display(), records = self.records.len(), "saved metadata");
        Ok(())
    }

    /// Drop in-memory records
    pub fn close(self) {}
}

/// `news.xml` -> `news.meta`, `news` -> `news.meta`
pub fn metadata_file_name(monitor_file: &Path) -> String {
    let stem = monitor_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}.{METADATA_EXTENSION}")
}

/// Metadata file names claimed by more than one distinct monitor file, sorted
pub fn shared_metadata_names(monitor_files: &[PathBuf]) -> Vec<String> {
    let mut owners: BTreeMap<String, BTreeSet<&Path>> = BTreeMap::new();
    for file in monitor_files {
        owners
            .entry(metadata_file_name(file))
            .or_default()
            .insert(file.as_path());
    }
    owners
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(name, _)| name)
        .collect()
}

/// Key a name is stored under: at most 30 characters on one line, no double quotes.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .take(MAX_NAME_LEN)
        .map(|c| match c {
            '"' => '\'',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect()
}

fn format_line(name: &str, last_check: i64) -> String {
    format!("{LINE_PREFIX}{name}{LINE_MIDDLE}{last_check}{LINE_SUFFIX}")
}

fn parse_line(line: &str) -> Option<(&str, i64)> {
    let rest = line.trim().strip_prefix(LINE_PREFIX)?;
    let (name, rest) = rest.split_once(LINE_MIDDLE)?;
    let timestamp = rest.strip_suffix(LINE_SUFFIX)?;
    if name.is_empty() {
        return None;
    }
    Some((name, timestamp.parse().ok()?))
}
