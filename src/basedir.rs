//! Base directory layout.
//!
//! A prepared base directory holds three subdirectories:
//!
//! - `monitor/` - monitor files
//! - `meta/` - per-monitor-file metadata (last check times)
//! - `cache/` - cached copies of monitored documents
//!
//! The special base directory `.` means "current directory mode": every file is
//! read from and written to the working directory as named, without subdirectories.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable overriding the default base directory
pub const BASE_DIR_ENV: &str = "SITEWATCH_DIR";

/// Name of the default base directory inside the user's home directory
pub const DEFAULT_DIR_NAME: &str = ".sitewatch";

#[derive(Debug, Error)]
pub enum BaseDirError {
    #[error("base directory '{0}' does not exist, please create it first")]
    Missing(PathBuf),
    #[error("base directory '{0}' is not prepared, run 'sitewatch prepare' first")]
    NotPrepared(PathBuf),
    #[error("no monitor directory in current directory mode")]
    NoMonitorDirectory,
    #[error("failed to create directory '{path}': {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read directory '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The three kinds of files managed below the base directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Monitor,
    Metadata,
    Cache,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Monitor, FileKind::Metadata, FileKind::Cache];

    /// Subdirectory name for this kind of file
    pub fn dir_name(self) -> &'static str {
        match self {
            FileKind::Monitor => "monitor",
            FileKind::Metadata => "meta",
            FileKind::Cache => "cache",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseDir {
    /// `None` in current directory mode
    root: Option<PathBuf>,
}

impl BaseDir {
    /// Current directory mode: no subdirectories, names are used as given.
    pub fn current_dir() -> Self {
        Self { root: None }
    }

    /// Use `path` as base directory. It must already exist.
    pub fn at<P: AsRef<Path>>(path: P) -> Result<Self, BaseDirError> {
        let path = path.as_ref();
        if path == Path::new(".") {
            info!("using current directory as base directory");
            return Ok(Self::current_dir());
        }
        if !path.is_dir() {
            return Err(BaseDirError::Missing(path.to_path_buf()));
        }
        info!(dir = %path.display(), "using base directory");
        Ok(Self {
            root: Some(path.to_path_buf()),
        })
    }

    /// Resolve the base directory: explicit path, then `SITEWATCH_DIR`, then
    /// `~/.sitewatch` if it exists, then the current directory.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, BaseDirError> {
        if let Some(path) = explicit {
            return Self::at(path);
        }

        if let Ok(value) = env::var(BASE_DIR_ENV) {
            if !value.is_empty() {
                return Self::at(value);
            }
        }

        match dirs::home_dir().map(|home| home.join(DEFAULT_DIR_NAME)) {
            Some(default) if default.is_dir() => {
                info!(dir = %default.display(), "using default base directory");
                Ok(Self {
                    root: Some(default),
                })
            }
            Some(default) => {
                info!(
                    dir = %default.display(),
                    "default base directory does not exist, using current directory"
                );
                Ok(Self::current_dir())
            }
            None => {
                info!("could not determine home directory, using current directory");
                Ok(Self::current_dir())
            }
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn is_current_dir(&self) -> bool {
        self.root.is_none()
    }

    /// Directory holding `config.toml`
    pub fn config_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Directory for files of `kind`
    pub fn dir(&self, kind: FileKind) -> PathBuf {
        match &self.root {
            Some(root) => root.join(kind.dir_name()),
            None => PathBuf::from("."),
        }
    }

    /// Path of the file `name` of the given kind
    pub fn build_path(&self, kind: FileKind, name: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(kind.dir_name()).join(name),
            None => PathBuf::from(name),
        }
    }

    /// Whether all subdirectories exist. Current directory mode is always prepared.
    pub fn is_prepared(&self) -> bool {
        if self.root.is_none() {
            return true;
        }
        FileKind::ALL.iter().all(|kind| self.dir(*kind).is_dir())
    }

    /// Fail with `NotPrepared` unless every subdirectory exists.
    pub fn ensure_prepared(&self) -> Result<(), BaseDirError> {
        match &self.root {
            Some(root) if !self.is_prepared() => Err(BaseDirError::NotPrepared(root.clone())),
            _ => Ok(()),
        }
    }

    /// Create missing subdirectories. Returns the directories that were created.
    pub fn prepare(&self) -> Result<Vec<PathBuf>, BaseDirError> {
        let mut created = Vec::new();
        if self.root.is_none() {
            return Ok(created);
        }

        for kind in FileKind::ALL {
            let path = self.dir(kind);
            if !path.is_dir() {
                info!(dir = %path.display(), "creating directory");
                fs::create_dir_all(&path).map_err(|source| BaseDirError::Create {
                    path: path.clone(),
                    source,
                })?;
                created.push(path);
            }
        }

        Ok(created)
    }

    /// Names of all regular files in `monitor/`, sorted.
    pub fn monitor_files(&self) -> Result<Vec<String>, BaseDirError> {
        if self.root.is_none() {
            return Err(BaseDirError::NoMonitorDirectory);
        }

        let dir = self.dir(FileKind::Monitor);
        let entries = fs::read_dir(&dir).map_err(|source| BaseDirError::Read {
            path: dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_file() {
                debug!(file = %name, "adding monitor file");
                names.push(name);
            } else {
                debug!(entry = %name, "ignoring directory entry");
            }
        }
        names.sort();

        Ok(names)
    }

    /// Resolve a monitor file argument: used as given when it exists, else
    /// looked up inside `monitor/`.
    pub fn monitor_file_path(&self, arg: &str) -> PathBuf {
        let given = PathBuf::from(arg);
        if given.is_file() {
            given
        } else {
            self.build_path(FileKind::Monitor, arg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_build_path_joins_kind_directory() {
        let temp = TempDir::new().unwrap();
        let base = BaseDir::at(temp.path()).unwrap();

        assert_eq!(
            base.build_path(FileKind::Cache, "abc.html"),
            temp.path().join("cache").join("abc.html")
        );
        assert_eq!(
            base.build_path(FileKind::Metadata, "news.meta"),
            temp.path().join("meta").join("news.meta")
        );
        assert_eq!(
            base.build_path(FileKind::Monitor, "news.xml"),
            temp.path().join("monitor").join("news.xml")
        );
    }

    #[test]
    fn test_current_dir_mode_uses_names_as_given() {
        let base = BaseDir::at(".").unwrap();
        assert!(base.is_current_dir());
        assert!(base.is_prepared());
        assert_eq!(
            base.build_path(FileKind::Cache, "x.html"),
            PathBuf::from("x.html")
        );
        assert_eq!(base.dir(FileKind::Cache), PathBuf::from("."));
    }

    #[test]
    fn test_missing_explicit_dir_is_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        let err = BaseDir::at(&missing).unwrap_err();
        assert!(matches!(err, BaseDirError::Missing(_)));
    }

    #[test]
    fn test_prepare_creates_subdirectories() {
        let temp = TempDir::new().unwrap();
        let base = BaseDir::at(temp.path()).unwrap();

        assert!(!base.is_prepared());
        assert!(matches!(
            base.ensure_prepared(),
            Err(BaseDirError::NotPrepared(_))
        ));

        let created = base.prepare().unwrap();
        assert_eq!(created.len(), 3);
        assert!(base.is_prepared());
        assert!(base.ensure_prepared().is_ok());

        // Second run creates nothing
        assert!(base.prepare().unwrap().is_empty());
    }

    #[test]
    fn test_monitor_files_lists_regular_files_sorted() {
        let temp = TempDir::new().unwrap();
        let base = BaseDir::at(temp.path()).unwrap();
        base.prepare().unwrap();

        let monitor_dir = base.dir(FileKind::Monitor);
        fs::write(monitor_dir.join("b.xml"), "").unwrap();
        fs::write(monitor_dir.join("a.xml"), "").unwrap();
        fs::create_dir(monitor_dir.join("subdir")).unwrap();

        assert_eq!(base.monitor_files().unwrap(), vec!["a.xml", "b.xml"]);
    }

    #[test]
    fn test_monitor_files_unavailable_in_current_dir_mode() {
        let base = BaseDir::current_dir();
        assert!(matches!(
            base.monitor_files(),
            Err(BaseDirError::NoMonitorDirectory)
        ));
    }

    #[test]
    fn test_monitor_file_path_prefers_existing_argument() {
        let temp = TempDir::new().unwrap();
        let base = BaseDir::at(temp.path()).unwrap();
        let direct = temp.path().join("direct.xml");
        fs::write(&direct, "").unwrap();

        assert_eq!(base.monitor_file_path(direct.to_str().unwrap()), direct);
        assert_eq!(
            base.monitor_file_path("other.xml"),
            temp.path().join("monitor").join("other.xml")
        );
    }

    #[test]
    #[serial]
    fn test_resolve_prefers_explicit_over_env() {
        let explicit = TempDir::new().unwrap();
        let from_env = TempDir::new().unwrap();
        env::set_var(BASE_DIR_ENV, from_env.path());

        let base = BaseDir::resolve(Some(explicit.path())).unwrap();
        assert_eq!(base.root(), Some(explicit.path()));

        let base = BaseDir::resolve(None).unwrap();
        assert_eq!(base.root(), Some(from_env.path()));

        env::remove_var(BASE_DIR_ENV);
    }
}
