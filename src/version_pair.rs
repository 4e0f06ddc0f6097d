//! Version pairs: the cached ("old") and freshly fetched ("current") snapshot
//! of one document URL.
//!
//! The cache file lives at `<cache-dir>/<sha256-of-url>.html` and represents the
//! document as of the last `download`. The current snapshot is fetched at most
//! once per pair and reused by every monitor of the document block.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::digest::cache_file_name;
use crate::fetch::{check_url, FetchError, Fetcher};
use crate::markup::{parse_markup, parse_markup_file, DocumentTree, MarkupError};

#[derive(Debug, Error)]
pub enum VersionPairError {
    #[error("cannot monitor URL: {0}")]
    InvalidUrl(#[source] FetchError),
    #[error("cache directory '{0}' does not exist")]
    CacheDirMissing(PathBuf),
    #[error("'{url}' is not initialized (no cached copy at {path})")]
    NotInitialized { url: String, path: PathBuf },
    #[error(transparent)]
    Fetch(FetchError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error("failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no cached copy to remove at {0}")]
    NotCached(PathBuf),
    #[error("failed to remove cache file {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct VersionPair {
    url: Url,
    cache_dir: PathBuf,
    cache_path: PathBuf,
    /// Document block this pair was opened for
    block: u64,
    current: Option<Vec<u8>>,
    fetches: u32,
    old_tree: Option<DocumentTree>,
    current_tree: Option<DocumentTree>,
}

impl VersionPair {
    /// Open the pair for `url`. Nothing is read or fetched yet.
    pub fn open(url: &str, cache_dir: &Path, block: u64) -> Result<Self, VersionPairError> {
        let parsed = check_url(url).map_err(VersionPairError::InvalidUrl)?;
        if !cache_dir.is_dir() {
            return Err(VersionPairError::CacheDirMissing(cache_dir.to_path_buf()));
        }

        let cache_path = cache_dir.join(cache_file_name(url));
        debug!(url, cache = %cache_path.display(), "opened version pair");

        Ok(Self {
            url: parsed,
            cache_dir: cache_dir.to_path_buf(),
            cache_path,
            block,
            current: None,
            fetches: 0,
            old_tree: None,
            current_tree: None,
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    /// Whether a cached copy exists on disk
    pub fn is_initialized(&self) -> bool {
        self.cache_path.is_file()
    }

    /// Number of fetches this pair performed
    pub fn fetch_count(&self) -> u32 {
        self.fetches
    }

    /// Parse the cached copy and the current document.
    ///
    /// Both trees are kept, so later calls for other monitors of the same
    /// block cost nothing. Never touches the cache file.
    pub fn parse_both(
        &mut self,
        fetcher: &dyn Fetcher,
    ) -> Result<(&DocumentTree, &DocumentTree), VersionPairError> {
        if self.old_tree.is_none() {
            if !self.is_initialized() {
                return Err(VersionPairError::NotInitialized {
                    url: self.url.to_string(),
                    path: self.cache_path.clone(),
                });
            }
            self.old_tree = Some(parse_markup_file(&self.cache_path)?);
        }

        if self.current_tree.is_none() {
            self.ensure_fetched(fetcher)?;
            let bytes = self.current.as_deref().unwrap_or_default();
            let tree = parse_markup(bytes, Some(&self.url));
            debug!(base_url = ?tree.base_url(), bytes = bytes.len(), "parsed current document");
            self.current_tree = Some(tree);
        }

        match (&self.old_tree, &self.current_tree) {
            (Some(old), Some(current)) => Ok((old, current)),
            _ => Err(VersionPairError::NotInitialized {
                url: self.url.to_string(),
                path: self.cache_path.clone(),
            }),
        }
    }

    /// Store the current document as the new cached copy.
    pub fn download(&mut self, fetcher: &dyn Fetcher) -> Result<(), VersionPairError> {
        self.ensure_fetched(fetcher)?;
        let bytes = self.current.as_deref().unwrap_or_default();
        let cache_path = &self.cache_path;
        let write_err = |source| VersionPairError::Write {
            path: cache_path.clone(),
            source,
        };

        let mut temp = NamedTempFile::new_in(&self.cache_dir).map_err(write_err)?;
        temp.write_all(bytes).map_err(write_err)?;
        temp.flush().map_err(write_err)?;
        temp.persist(cache_path).map_err(|e| write_err(e.error))?;

        // A parsed old tree still describes the copy from before this download
        info!(url = %self.url, cache = %self.cache_path.display(), "stored cached copy");
        Ok(())
    }

    /// Delete the cached copy. A missing file is an error.
    pub fn remove(&mut self) -> Result<(), VersionPairError> {
        match fs::remove_file(&self.cache_path) {
            Ok(()) => {
                info!(url = %self.url, cache = %self.cache_path.display(), "removed cached copy");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(VersionPairError::NotCached(self.cache_path.clone()))
            }
            Err(source) => Err(VersionPairError::Remove {
                path: self.cache_path.clone(),
                source,
            }),
        }
    }

    /// Release buffers and parsed trees. The cache file stays.
    pub fn close(self) {
        debug!(url = %self.url, fetches = self.fetches, "closed version pair");
    }

    /// Fetch the current document unless this pair already has it.
    fn ensure_fetched(&mut self, fetcher: &dyn Fetcher) -> Result<(), VersionPairError> {
        if self.current.is_none() {
            let bytes = fetcher
                .fetch(self.url.as_str())
                .map_err(VersionPairError::Fetch)?;
            self.fetches += 1;
            self.current = Some(bytes);
        }
        Ok(())
    }
}
