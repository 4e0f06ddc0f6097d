//! The monitor-file reader state machine.

use std::fs::File;
use std::io::BufReader;
use std::mem;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use super::schema::SchemaValidator;
use super::token::{Token, TokenSource};
use super::xml::XmlTokenSource;
use super::MonitorFileError;
use crate::monitor::{Monitor, MonitorError};
use crate::version_pair::VersionPair;

/// Result of advancing to the next document block
#[derive(Debug)]
pub enum DocumentStep<'a> {
    Opened(&'a mut VersionPair),
    /// The version pair could not be opened; the block's monitors are skipped.
    Skipped { url: String, reason: String },
}

/// Result of advancing to the next monitor
#[derive(Debug)]
pub enum MonitorStep {
    Ready(Monitor),
    /// A document block whose monitors will not be yielded
    SkippedDocument { url: String, reason: String },
    /// A monitor with missing or malformed fields
    SkippedMonitor { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub blocks_opened: usize,
    pub blocks_skipped: usize,
    pub monitors_yielded: usize,
    pub monitors_skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Query,
    Interval,
    Trigger,
}

impl Field {
    fn from_element(name: &str) -> Option<Self> {
        match name {
            "query" | "xpath" => Some(Field::Query),
            "interval" => Some(Field::Interval),
            "trigger" => Some(Field::Trigger),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Field::Query => "query",
            Field::Interval => "interval",
            Field::Trigger => "trigger",
        }
    }
}

/// Fields of a `<monitor>` collected so far
#[derive(Debug, Default)]
struct MonitorDraft {
    name: String,
    query: Option<String>,
    interval: Option<String>,
    trigger: Option<String>,
    open_field: Option<Field>,
    text: String,
    problem: Option<MonitorError>,
}

impl MonitorDraft {
    fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            ..Self::default()
        }
    }

    fn start_field(&mut self, field: Field) {
        self.open_field = Some(field);
        self.text.clear();
    }

    fn push_text(&mut self, text: &str) {
        if self.open_field.is_some() {
            self.text.push_str(text);
        }
    }

    fn end_field(&mut self) {
        let Some(field) = self.open_field.take() else {
            return;
        };
        let slot = match field {
            Field::Query => &mut self.query,
            Field::Interval => &mut self.interval,
            Field::Trigger => &mut self.trigger,
        };
        if slot.is_some() {
            self.problem
                .get_or_insert(MonitorError::DuplicateField(field.label()));
        } else {
            *slot = Some(self.text.trim().to_string());
        }
    }

    fn build(self, block: u64) -> Result<Monitor, MonitorError> {
        if let Some(problem) = self.problem {
            return Err(problem);
        }
        let query = required(self.query, Field::Query)?;
        let interval = required(self.interval, Field::Interval)?;
        let trigger = required(self.trigger, Field::Trigger)?;
        Monitor::parse(&self.name, &query, &interval, &trigger, block)
    }
}

fn required(value: Option<String>, field: Field) -> Result<String, MonitorError> {
    match value {
        None => Err(MonitorError::MissingField(field.label())),
        Some(v) if v.is_empty() => Err(MonitorError::EmptyField(field.label())),
        Some(v) => Ok(v),
    }
}

#[derive(Debug)]
enum ReaderState {
    BeforeRoot,
    InMonitorFile,
    InDocument { block: u64, skip: bool },
    InMonitor { block: u64, skip: bool, draft: MonitorDraft },
    AfterRoot,
    EndOfFile,
    Failed(String),
}

/// What one token did to the reader
enum Event {
    RootOpened,
    DocumentOpened,
    DocumentSkipped { url: String, reason: String },
    DocumentClosed,
    MonitorReady(Monitor),
    MonitorSkipped { name: String, reason: String },
    Nothing,
}

pub struct MonitorFileReader<S> {
    source: S,
    validator: SchemaValidator,
    state: ReaderState,
    name: String,
    cache_dir: PathBuf,
    pair: Option<VersionPair>,
    next_block: u64,
    stats: ReaderStats,
}

impl MonitorFileReader<XmlTokenSource<BufReader<File>>> {
    /// Open a monitor file and read up to its root element.
    pub fn open(path: &Path, cache_dir: &Path) -> Result<Self, MonitorFileError> {
        Self::new(XmlTokenSource::open(path)?, cache_dir)
    }
}

impl<S: TokenSource> MonitorFileReader<S> {
    /// Start reading `source`. Fails unless a valid root element is found.
    pub fn new(source: S, cache_dir: &Path) -> Result<Self, MonitorFileError> {
        let mut reader = Self {
            source,
            validator: SchemaValidator::new(),
            state: ReaderState::BeforeRoot,
            name: String::new(),
            cache_dir: cache_dir.to_path_buf(),
            pair: None,
            next_block: 1,
            stats: ReaderStats::default(),
        };

        loop {
            match reader.step()? {
                Some(Event::RootOpened) => break,
                Some(_) => {}
                None => return Err(MonitorFileError::MissingRoot),
            }
        }
        debug!(name = %reader.name, "opened monitor file");
        Ok(reader)
    }

    /// Name declared on the root element
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Advance to the next document block, skipping monitors on the way.
    pub fn next_document(&mut self) -> Result<Option<DocumentStep<'_>>, MonitorFileError> {
        loop {
            match self.step()? {
                Some(Event::DocumentOpened) => break,
                Some(Event::DocumentSkipped { url, reason }) => {
                    return Ok(Some(DocumentStep::Skipped { url, reason }))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        if self.pair.is_none() {
            return Err(self.fail(MonitorFileError::Failed(
                "document opened without a version pair".to_string(),
            )));
        }
        Ok(self.pair.as_mut().map(DocumentStep::Opened))
    }

    /// Advance to the next monitor, crossing document blocks as needed.
    pub fn next_monitor(&mut self) -> Result<Option<MonitorStep>, MonitorFileError> {
        loop {
            match self.step()? {
                Some(Event::MonitorReady(monitor)) => return Ok(Some(MonitorStep::Ready(monitor))),
                Some(Event::MonitorSkipped { name, reason }) => {
                    return Ok(Some(MonitorStep::SkippedMonitor { name, reason }))
                }
                Some(Event::DocumentSkipped { url, reason }) => {
                    return Ok(Some(MonitorStep::SkippedDocument { url, reason }))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
    }

    /// The open version pair, if `monitor` belongs to the current block.
    pub fn pair_for(&mut self, monitor: &Monitor) -> Option<&mut VersionPair> {
        self.pair
            .as_mut()
            .filter(|pair| pair.block() == monitor.block())
    }

    /// Consume one token. `None` once the input is exhausted.
    fn step(&mut self) -> Result<Option<Event>, MonitorFileError> {
        match &self.state {
            ReaderState::EndOfFile => return Ok(None),
            ReaderState::Failed(message) => return Err(MonitorFileError::Failed(message.clone())),
            _ => {}
        }

        let token = match self.source.next_token() {
            Ok(token) => token,
            Err(e) => return Err(self.fail(e)),
        };

        let Some(token) = token else {
            if let Err(e) = self.validator.finish() {
                return Err(self.fail(e));
            }
            self.close_pair();
            self.state = ReaderState::EndOfFile;
            return Ok(None);
        };

        if let Err(e) = self.validator.check(&token) {
            return Err(self.fail(e));
        }

        let state = mem::replace(&mut self.state, ReaderState::Failed(String::new()));
        let (state, event) = match (state, token) {
            (ReaderState::BeforeRoot, token @ Token::Start { .. }) => {
                self.name = token.attribute("name").unwrap_or_default().to_string();
                (ReaderState::InMonitorFile, Event::RootOpened)
            }
            (ReaderState::InMonitorFile, token @ Token::Start { .. }) => {
                let url = token.attribute("url").unwrap_or_default().to_string();
                self.open_document(url)
            }
            (ReaderState::InMonitorFile, Token::End { .. }) => {
                (ReaderState::AfterRoot, Event::Nothing)
            }
            (ReaderState::InDocument { block, skip }, token @ Token::Start { .. }) => {
                let draft = MonitorDraft::new(token.attribute("name").unwrap_or_default());
                (ReaderState::InMonitor { block, skip, draft }, Event::Nothing)
            }
            (ReaderState::InDocument { .. }, Token::End { .. }) => {
                self.close_pair();
                (ReaderState::InMonitorFile, Event::DocumentClosed)
            }
            (ReaderState::InMonitor { block, skip, mut draft }, Token::Start { name, .. }) => {
                if let Some(field) = Field::from_element(&name) {
                    draft.start_field(field);
                }
                (ReaderState::InMonitor { block, skip, draft }, Event::Nothing)
            }
            (ReaderState::InMonitor { block, skip, mut draft }, Token::Text(text)) => {
                draft.push_text(&text);
                (ReaderState::InMonitor { block, skip, draft }, Event::Nothing)
            }
            (ReaderState::InMonitor { block, skip, mut draft }, Token::End { name })
                if name != "monitor" =>
            {
                draft.end_field();
                (ReaderState::InMonitor { block, skip, draft }, Event::Nothing)
            }
            (ReaderState::InMonitor { block, skip, draft }, Token::End { .. }) => {
                let event = self.finish_monitor(block, skip, draft);
                (ReaderState::InDocument { block, skip }, event)
            }
            // Whitespace between elements
            (state, Token::Text(_)) => (state, Event::Nothing),
            (state, token) => {
                return Err(self.fail(MonitorFileError::Failed(format!(
                    "unexpected {token:?} in state {state:?}"
                ))))
            }
        };

        self.state = state;
        Ok(Some(event))
    }

    fn open_document(&mut self, url: String) -> (ReaderState, Event) {
        let block = self.next_block;
        self.next_block += 1;

        match VersionPair::open(&url, &self.cache_dir, block) {
            Ok(pair) => {
                debug!(url = %url, block, "entering document");
                self.pair = Some(pair);
                self.stats.blocks_opened += 1;
                (
                    ReaderState::InDocument { block, skip: false },
                    Event::DocumentOpened,
                )
            }
            Err(e) => {
                warn!(url = %url, error = %e, "skipping document");
                self.stats.blocks_skipped += 1;
                (
                    ReaderState::InDocument { block, skip: true },
                    Event::DocumentSkipped {
                        url,
                        reason: e.to_string(),
                    },
                )
            }
        }
    }

    fn finish_monitor(&mut self, block: u64, skip: bool, draft: MonitorDraft) -> Event {
        let name = draft.name.clone();
        if skip {
            warn!(monitor = %name, "skipping monitor of unavailable document");
            self.stats.monitors_skipped += 1;
            return Event::Nothing;
        }

        match draft.build(block) {
            Ok(monitor) => {
                debug!(monitor = %name, "read monitor");
                self.stats.monitors_yielded += 1;
                Event::MonitorReady(monitor)
            }
            Err(e) => {
                warn!(monitor = %name, error = %e, "skipping monitor");
                self.stats.monitors_skipped += 1;
                Event::MonitorSkipped {
                    name,
                    reason: e.to_string(),
                }
            }
        }
    }

    fn close_pair(&mut self) {
        if let Some(pair) = self.pair.take() {
            pair.close();
        }
    }

    fn fail(&mut self, err: MonitorFileError) -> MonitorFileError {
        error!(error = %err, "monitor file is invalid");
        self.close_pair();
        self.state = ReaderState::Failed(err.to_string());
        err
    }
}
