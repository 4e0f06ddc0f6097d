//! Shared helpers: a prepared base directory with pages served over file:// URLs.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use url::Url;

use sitewatch::basedir::{BaseDir, FileKind};
use sitewatch::engine::{DocumentReport, EngineError, MonitorReport, MonitorStatus, Reporter};

/// One `<monitor>`: name, query, interval, trigger
pub type MonitorSpec<'a> = (&'a str, &'a str, &'a str, &'a str);

pub struct Workspace {
    pub temp: TempDir,
    pub base: BaseDir,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let base = BaseDir::at(temp.path()).expect("Failed to use temp directory");
        base.prepare().expect("Failed to prepare base directory");
        fs::create_dir(temp.path().join("pages")).expect("Failed to create pages directory");
        Self { temp, base }
    }

    pub fn page_path(&self, name: &str) -> PathBuf {
        self.temp.path().join("pages").join(name)
    }

    pub fn page_url(&self, name: &str) -> String {
        Url::from_file_path(self.page_path(name))
            .expect("Failed to build file URL")
            .to_string()
    }

    pub fn write_page(&self, name: &str, body: &str) {
        fs::write(self.page_path(name), body).expect("Failed to write page");
    }

    pub fn write_monitor_file(&self, file_name: &str, content: &str) -> PathBuf {
        let path = self.base.build_path(FileKind::Monitor, file_name);
        fs::write(&path, content).expect("Failed to write monitor file");
        path
    }

    pub fn meta_path(&self, file_name: &str) -> PathBuf {
        self.base.build_path(FileKind::Metadata, file_name)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.base.dir(FileKind::Cache)
    }

    pub fn cached_files(&self) -> usize {
        fs::read_dir(self.cache_dir())
            .expect("Failed to read cache directory")
            .count()
    }
}

/// Render a monitor file with the given documents
pub fn monitor_xml(name: &str, documents: &[(&str, &[MonitorSpec<'_>])]) -> String {
    let mut xml = format!("<?xml version=\"1.0\"?>\n<monitorfile name=\"{name}\">\n");
    for (url, monitors) in documents {
        xml.push_str(&format!("  <document url=\"{url}\">\n"));
        for (monitor, query, interval, trigger) in monitors.iter() {
            xml.push_str(&format!(
                "    <monitor name=\"{monitor}\">\n      <query>{query}</query>\n      <interval>{interval}</interval>\n      <trigger>{trigger}</trigger>\n    </monitor>\n"
            ));
        }
        xml.push_str("  </document>\n");
    }
    xml.push_str("</monitorfile>\n");
    xml
}

/// Reporter that keeps everything it is told
#[derive(Default)]
pub struct Recorder {
    pub started: Vec<String>,
    pub documents: Vec<DocumentReport>,
    pub monitors: Vec<MonitorReport>,
    pub failures: Vec<String>,
}

impl Recorder {
    pub fn status(&self, name: &str) -> &MonitorStatus {
        &self
            .monitors
            .iter()
            .rev()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("no report for monitor {name}"))
            .status
    }
}

impl Reporter for Recorder {
    fn file_started(&mut self, _path: &Path, name: &str) {
        self.started.push(name.to_string());
    }

    fn document(&mut self, report: &DocumentReport) {
        self.documents.push(report.clone());
    }

    fn monitor(&mut self, report: &MonitorReport) {
        self.monitors.push(report.clone());
    }

    fn file_failed(&mut self, path: &Path, error: &EngineError) {
        self.failures.push(format!("{}: {error}", path.display()));
    }
}
