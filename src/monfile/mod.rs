//! Monitor files.
//!
//! ```xml
//! <monitorfile name="news">
//!   <document url="https://example.com/">
//!     <monitor name="headlines">
//!       <query>//h2</query>
//!       <interval>1d</interval>
//!       <trigger>10% more</trigger>
//!     </monitor>
//!   </document>
//! </monitorfile>
//! ```
//!
//! The file is streamed: tokens come from a [`TokenSource`], are checked by the
//! [`SchemaValidator`] and drive the [`MonitorFileReader`] state machine.

mod reader;
mod schema;
mod token;
mod xml;

pub use reader::{DocumentStep, MonitorFileReader, MonitorStep, ReaderStats};
pub use schema::SchemaValidator;
pub use token::{Token, TokenSource};
pub use xml::{XmlTokenSource, MONITOR_FILE_DTD};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort reading a whole monitor file
#[derive(Debug, Error)]
pub enum MonitorFileError {
    #[error("failed to open monitor file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed XML {0}")]
    Xml(String),
    #[error("invalid monitor file at {path}: {message}")]
    Schema { path: String, message: String },
    #[error("wrong DTD in '{0}'")]
    WrongDtd(String),
    #[error("no <monitorfile> root element")]
    MissingRoot,
    #[error("monitor file reading already failed: {0}")]
    Failed(String),
}
