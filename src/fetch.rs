//! Document fetching.
//!
//! `http`/`https` URLs go through a blocking reqwest client with timeouts and a
//! size limit; `file` URLs are read from disk under the same limit.

use reqwest::blocking::Client;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::FetchConfig;

/// URL schemes a document may use
pub const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "file"];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("unsupported URL scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },
    #[error("'{0}' does not name a local file")]
    InvalidFilePath(String),
    #[error("failed to create HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("request to '{url}' failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("'{url}': HTTP {status} - {reason}")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },
    #[error("'{url}' exceeds maximum allowed size of {limit} bytes")]
    TooLarge { url: String, limit: u64 },
    #[error("failed to read '{url}': {source}")]
    Io {
        url: String,
        source: std::io::Error,
    },
}

/// Something that turns a URL into the raw bytes of a document.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Parse `url` and check that its scheme is one we can fetch.
pub fn check_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
        return Err(FetchError::UnsupportedScheme {
            url: url.to_string(),
            scheme: parsed.scheme().to_string(),
        });
    }
    Ok(parsed)
}

/// Fetcher backed by reqwest (network) and the filesystem (`file://`).
pub struct HttpFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_bytes: config.max_document_bytes,
        })
    }

    fn fetch_http(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            });
        }

        // Check Content-Length header if available
        if let Some(content_length) = response.content_length() {
            if content_length > self.max_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_bytes,
                });
            }
        }

        read_with_limit(response, self.max_bytes, url.as_str())
    }

    fn fetch_file(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let path: PathBuf = url
            .to_file_path()
            .map_err(|_| FetchError::InvalidFilePath(url.to_string()))?;
        let file = File::open(&path).map_err(|source| FetchError::Io {
            url: url.to_string(),
            source,
        })?;
        read_with_limit(file, self.max_bytes, url.as_str())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = check_url(url)?;
        info!(url = %parsed, "fetching document");
        let bytes = match parsed.scheme() {
            "file" => self.fetch_file(&parsed)?,
            _ => self.fetch_http(&parsed)?,
        };
        debug!(url = %parsed, bytes = bytes.len(), "fetched document");
        Ok(bytes)
    }
}

/// Stream `reader` to memory, failing once more than `max_size` bytes arrive.
pub(crate) fn read_with_limit<R: Read>(
    mut reader: R,
    max_size: u64,
    url: &str,
) -> Result<Vec<u8>, FetchError> {
    let mut bytes = Vec::new();
    let mut total_read: u64 = 0;
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer).map_err(|source| FetchError::Io {
            url: url.to_string(),
            source,
        })?;
        if n == 0 {
            break;
        }
        total_read += n as u64;
        if total_read > max_size {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: max_size,
            });
        }
        bytes.extend_from_slice(&buffer[..n]);
    }

    Ok(bytes)
}
