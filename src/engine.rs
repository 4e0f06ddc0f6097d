//! Driving monitor files through init, check, update and remove.

use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info_span, warn, Span};

use crate::basedir::{BaseDir, FileKind};
use crate::fetch::Fetcher;
use crate::metadata::{shared_metadata_names, MetadataError, MetadataStore};
use crate::monfile::{
    DocumentStep, MonitorFileError, MonitorFileReader, MonitorStep, TokenSource,
};
use crate::monitor::Monitor;
use crate::query::TypedResult;
use crate::version_pair::{VersionPair, VersionPairError};

/// Highest exit code used for a triggered count
const MAX_TRIGGERED_EXIT: usize = 254;
/// Exit code for a run with a fatal or cache error
pub const ERROR_EXIT: i32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Store the current version of every document
    Init,
    /// Evaluate due monitors
    Check,
    /// Evaluate due monitors and store documents whose monitors triggered
    Update,
    /// Delete the stored version of every document
    Remove,
}

/// Errors that abort one monitor file
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    MonitorFile(#[from] MonitorFileError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Downloaded,
    Removed,
    /// The version pair could not be opened
    Skipped(String),
    /// Download or removal failed
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReport {
    pub url: String,
    pub outcome: DocumentOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorStatus {
    NotDue { next_check: i64 },
    Triggered { old: TypedResult, current: TypedResult },
    NotTriggered,
    NotEvaluable(String),
    /// Malformed monitor
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    pub name: String,
    pub status: MonitorStatus,
}

/// Receives outcomes while monitor files are processed
pub trait Reporter {
    fn file_started(&mut self, _path: &Path, _name: &str) {}
    fn document(&mut self, _report: &DocumentReport) {}
    fn monitor(&mut self, _report: &MonitorReport) {}
    fn file_failed(&mut self, _path: &Path, _error: &EngineError) {}
    fn file_finished(&mut self, _path: &Path, _summary: &FileSummary) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub triggered: usize,
    pub not_triggered: usize,
    pub not_due: usize,
    pub not_evaluable: usize,
    pub skipped: usize,
    /// Downloads and removals that succeeded
    pub documents_done: usize,
    /// Downloads and removals that failed
    pub cache_errors: usize,
    pub fatal: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files: usize,
    pub failed_files: usize,
    pub triggered: usize,
    pub not_evaluable: usize,
    pub cache_errors: usize,
}

impl RunSummary {
    pub fn add(&mut self, file: &FileSummary) {
        self.files += 1;
        if file.fatal {
            self.failed_files += 1;
        }
        self.triggered += file.triggered;
        self.not_evaluable += file.not_evaluable;
        self.cache_errors += file.cache_errors;
    }

    pub fn has_errors(&self) -> bool {
        self.failed_files > 0 || self.cache_errors > 0
    }

    /// 255 on error, otherwise the number of triggered monitors (capped at 254)
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            ERROR_EXIT
        } else {
            // Bounded by MAX_TRIGGERED_EXIT, so the cast is lossless
            self.triggered.min(MAX_TRIGGERED_EXIT) as i32
        }
    }
}

pub struct Engine<'a> {
    base_dir: &'a BaseDir,
    fetcher: &'a dyn Fetcher,
    force: bool,
    now: i64,
}

impl<'a> Engine<'a> {
    pub fn new(base_dir: &'a BaseDir, fetcher: &'a dyn Fetcher) -> Self {
        Self {
            base_dir,
            fetcher,
            force: false,
            now: Utc::now().timestamp(),
        }
    }

    /// Check monitors regardless of their interval
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Use `now` (Unix seconds) as the current time
    pub fn at(mut self, now: i64) -> Self {
        self.now = now;
        self
    }

    /// Process every file in order. A failing file does not stop the others.
    pub fn run(&self, action: Action, files: &[PathBuf], reporter: &mut dyn Reporter) -> RunSummary {
        if matches!(action, Action::Check | Action::Update) {
            for name in shared_metadata_names(files) {
                warn!(metadata = %name, "several monitor files share one metadata file");
            }
        }

        let mut summary = RunSummary::default();
        for file in files {
            summary.add(&self.run_file(action, file, reporter));
        }
        summary
    }

    pub fn run_file(
        &self,
        action: Action,
        path: &Path,
        reporter: &mut dyn Reporter,
    ) -> FileSummary {
        let span = info_span!("monitor_file", file = %path.display());
        let _guard = span.enter();

        let mut summary = FileSummary::default();
        let result = self.process(action, path, reporter, &mut summary);
        if let Err(e) = result {
            error!(error = %e, "giving up on monitor file");
            summary.fatal = true;
            reporter.file_failed(path, &e);
        }

        reporter.file_finished(path, &summary);
        summary
    }

    fn process(
        &self,
        action: Action,
        path: &Path,
        reporter: &mut dyn Reporter,
        summary: &mut FileSummary,
    ) -> Result<(), EngineError> {
        let cache_dir = self.base_dir.dir(FileKind::Cache);
        let mut reader = MonitorFileReader::open(path, &cache_dir)?;
        reporter.file_started(path, reader.name());

        match action {
            Action::Init => self.run_documents(&mut reader, reporter, summary, |pair| {
                pair.download(self.fetcher)
                    .map(|()| DocumentOutcome::Downloaded)
            }),
            Action::Remove => self.run_documents(&mut reader, reporter, summary, |pair| {
                pair.remove().map(|()| DocumentOutcome::Removed)
            }),
            Action::Check | Action::Update => {
                let mut store = MetadataStore::open(self.base_dir, path);
                store.load()?;
                self.run_monitors(action, &mut reader, &mut store, reporter, summary)?;
                // Not reached when the file failed, so stored times survive
                store.save()?;
                Ok(())
            }
        }
    }

    fn run_documents<S, F>(
        &self,
        reader: &mut MonitorFileReader<S>,
        reporter: &mut dyn Reporter,
        summary: &mut FileSummary,
        op: F,
    ) -> Result<(), EngineError>
    where
        S: TokenSource,
        F: Fn(&mut VersionPair) -> Result<DocumentOutcome, VersionPairError>,
    {
        while let Some(step) = reader.next_document()? {
            let report = match step {
                DocumentStep::Opened(pair) => {
                    let url = pair.url().to_string();
                    let _guard = info_span!("document", url = %url).entered();
                    match op(pair) {
                        Ok(outcome) => {
                            summary.documents_done += 1;
                            DocumentReport { url, outcome }
                        }
                        Err(e) => {
                            error!(error = %e, "cache operation failed");
                            summary.cache_errors += 1;
                            DocumentReport {
                                url,
                                outcome: DocumentOutcome::Failed(e.to_string()),
                            }
                        }
                    }
                }
                DocumentStep::Skipped { url, reason } => {
                    summary.skipped += 1;
                    DocumentReport {
                        url,
                        outcome: DocumentOutcome::Skipped(reason),
                    }
                }
            };
            reporter.document(&report);
        }
        Ok(())
    }

    fn run_monitors<S: TokenSource>(
        &self,
        action: Action,
        reader: &mut MonitorFileReader<S>,
        store: &mut MetadataStore,
        reporter: &mut dyn Reporter,
        summary: &mut FileSummary,
    ) -> Result<(), EngineError> {
        let mut document_span: Option<(u64, Span)> = None;
        let mut downloaded_block = None;

        while let Some(step) = reader.next_monitor()? {
            let report = match step {
                MonitorStep::SkippedDocument { url, reason } => {
                    summary.skipped += 1;
                    reporter.document(&DocumentReport {
                        url,
                        outcome: DocumentOutcome::Skipped(reason),
                    });
                    continue;
                }
                MonitorStep::SkippedMonitor { name, reason } => {
                    store.touch(&name);
                    summary.skipped += 1;
                    MonitorReport {
                        name,
                        status: MonitorStatus::Skipped(reason),
                    }
                }
                MonitorStep::Ready(mut monitor) => {
                    store.touch(monitor.name());
                    let Some(pair) = reader.pair_for(&monitor) else {
                        warn!(monitor = monitor.name(), "document block already closed");
                        summary.not_evaluable += 1;
                        reporter.monitor(&MonitorReport {
                            name: monitor.name().to_string(),
                            status: MonitorStatus::NotEvaluable(
                                "document block already closed".to_string(),
                            ),
                        });
                        continue;
                    };

                    if document_span.as_ref().map(|(block, _)| *block) != Some(pair.block()) {
                        let span = info_span!("document", url = %pair.url());
                        document_span = Some((pair.block(), span));
                    }
                    let doc_guard = document_span.as_ref().map(|(_, span)| span.enter());

                    let status = self.check_monitor(&mut monitor, pair, store);
                    match &status {
                        MonitorStatus::Triggered { .. } => {
                            summary.triggered += 1;
                            if action == Action::Update && downloaded_block != Some(pair.block()) {
                                // One attempt per block, successful or not
                                downloaded_block = Some(pair.block());
                                match pair.download(self.fetcher) {
                                    Ok(()) => summary.documents_done += 1,
                                    Err(e) => {
                                        error!(error = %e, "failed to store new version");
                                        summary.cache_errors += 1;
                                    }
                                }
                            }
                        }
                        MonitorStatus::NotTriggered => summary.not_triggered += 1,
                        MonitorStatus::NotDue { .. } => summary.not_due += 1,
                        MonitorStatus::NotEvaluable(_) => summary.not_evaluable += 1,
                        MonitorStatus::Skipped(_) => summary.skipped += 1,
                    }
                    drop(doc_guard);

                    MonitorReport {
                        name: monitor.name().to_string(),
                        status,
                    }
                }
            };
            reporter.monitor(&report);
        }
        Ok(())
    }

    fn check_monitor(
        &self,
        monitor: &mut Monitor,
        pair: &mut VersionPair,
        store: &mut MetadataStore,
    ) -> MonitorStatus {
        let _guard = info_span!("monitor", name = monitor.name()).entered();

        let last_check = store.last_check(monitor.name());
        if !monitor.is_due(last_check, self.now, self.force) {
            let next_check = monitor.next_check(last_check);
            debug!(next_check, "not due");
            return MonitorStatus::NotDue { next_check };
        }

        let triggered = monitor
            .evaluate(pair, self.fetcher)
            .and_then(|()| monitor.triggered());
        let triggered = match triggered {
            Ok(triggered) => triggered,
            Err(e) => {
                warn!(error = %e, "monitor not evaluable");
                return MonitorStatus::NotEvaluable(e.to_string());
            }
        };

        store.set_last_check(monitor.name(), self.now);
        match (triggered, monitor.results()) {
            (true, Some((old, current))) => MonitorStatus::Triggered {
                old: old.clone(),
                current: current.clone(),
            },
            _ => MonitorStatus::NotTriggered,
        }
    }
}
