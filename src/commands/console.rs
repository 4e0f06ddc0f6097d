//! Console rendering of run outcomes.

use chrono::DateTime;
use colored::Colorize;
use std::path::Path;

use crate::engine::{
    DocumentOutcome, DocumentReport, EngineError, FileSummary, MonitorReport, MonitorStatus,
    Reporter, RunSummary,
};
use crate::query::{NodeKind, ResultNode, TypedResult};

/// Longest node content shown before it is cut
const MAX_CONTENT_CHARS: usize = 72;

/// Prints outcomes as they arrive.
///
/// Quiet mode prints only triggered monitors and failures; verbose mode also
/// shows monitors that are not due yet.
pub struct ConsoleReporter {
    quiet: bool,
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self { quiet, verbose }
    }
}

impl Reporter for ConsoleReporter {
    fn file_started(&mut self, path: &Path, name: &str) {
        if self.quiet {
            return;
        }
        println!(
            "{} {} {}",
            "▸".cyan(),
            name.bold(),
            format!("({})", path.display()).dimmed()
        );
    }

    fn document(&mut self, report: &DocumentReport) {
        match &report.outcome {
            DocumentOutcome::Downloaded if !self.quiet => {
                println!("  {} stored {}", "✓".green(), report.url)
            }
            DocumentOutcome::Removed if !self.quiet => {
                println!("  {} removed {}", "✓".green(), report.url)
            }
            DocumentOutcome::Skipped(reason) => println!(
                "  {} skipped {}: {}",
                "⚠".yellow(),
                report.url,
                reason.dimmed()
            ),
            DocumentOutcome::Failed(reason) => {
                println!("  {} {}: {}", "✗".red(), report.url, reason)
            }
            _ => {}
        }
    }

    fn monitor(&mut self, report: &MonitorReport) {
        let name = &report.name;
        match &report.status {
            MonitorStatus::Triggered { old, current } => {
                println!("  {} {} triggered", "●".red().bold(), name.bold());
                for line in render_result("old", old)
                    .into_iter()
                    .chain(render_result("current", current))
                {
                    println!("      {line}");
                }
            }
            MonitorStatus::NotTriggered if !self.quiet => {
                println!("  {} {} unchanged", "○".dimmed(), name)
            }
            MonitorStatus::NotDue { next_check } if self.verbose && !self.quiet => println!(
                "  {} {} next check {}",
                "·".dimmed(),
                name,
                format_time(*next_check).dimmed()
            ),
            MonitorStatus::NotEvaluable(reason) => {
                println!("  {} {} not evaluable: {}", "⚠".yellow(), name, reason)
            }
            MonitorStatus::Skipped(reason) => {
                println!("  {} {} skipped: {}", "⚠".yellow(), name, reason)
            }
            _ => {}
        }
    }

    fn file_failed(&mut self, path: &Path, error: &EngineError) {
        println!("{} {}: {}", "✗".red().bold(), path.display(), error);
    }

    fn file_finished(&mut self, _path: &Path, summary: &FileSummary) {
        if self.quiet || summary.fatal {
            return;
        }
        println!("  {}", summarize(summary).dimmed());
    }
}

/// One-line totals for a file
pub fn summarize(summary: &FileSummary) -> String {
    let mut parts = Vec::new();
    for (count, label) in [
        (summary.triggered, "triggered"),
        (summary.not_triggered, "unchanged"),
        (summary.not_due, "not due"),
        (summary.not_evaluable, "not evaluable"),
        (summary.skipped, "skipped"),
        (summary.documents_done, "documents done"),
        (summary.cache_errors, "cache errors"),
    ] {
        if count > 0 {
            parts.push(format!("{count} {label}"));
        }
    }
    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(", ")
    }
}

/// Final line of a run
pub fn print_run_summary(summary: &RunSummary) {
    if summary.has_errors() {
        println!(
            "{} {} triggered, {} file(s) failed, {} cache error(s)",
            "✗".red().bold(),
            summary.triggered,
            summary.failed_files,
            summary.cache_errors
        );
    } else if summary.triggered > 0 {
        println!(
            "{} {} monitor(s) triggered",
            "●".red().bold(),
            summary.triggered
        );
    } else {
        println!("{} No monitor triggered", "✓".green());
    }
}

/// Lines describing one query result, labelled `old` or `current`
pub fn render_result(label: &str, result: &TypedResult) -> Vec<String> {
    match result {
        TypedResult::NodeSet(nodes) => {
            let mut lines = vec![format!("{label} node-set ({} nodes)", nodes.len())];
            lines.extend(
                nodes
                    .iter()
                    .enumerate()
                    .map(|(i, node)| format!("[{:>2}] {}", i + 1, render_node(node))),
            );
            lines
        }
        TypedResult::String(s) => vec![format!("{label} string: \"{}\"", shorten(s))],
        TypedResult::Number(n) => vec![format!("{label} number: {n}")],
        TypedResult::Boolean(b) => vec![format!("{label} boolean: {b}")],
    }
}

fn render_node(node: &ResultNode) -> String {
    let name = node.name.as_deref().unwrap_or_default();
    let content = node.content.as_deref().map(shorten).unwrap_or_default();
    match node.kind {
        NodeKind::Element => format!("(ELEM): <{name}>"),
        NodeKind::Attribute => format!("(ATTR): {name}=\"{content}\""),
        NodeKind::Text => format!("(TEXT): {content}"),
        NodeKind::Comment => format!("(COMM): {content}"),
        NodeKind::Other => "(NODE)".to_string(),
    }
}

/// Collapse whitespace and cut long content
fn shorten(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_CONTENT_CHARS {
        let cut: String = collapsed.chars().take(MAX_CONTENT_CHARS).collect();
        format!("{cut}...")
    } else {
        collapsed
    }
}

fn format_time(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
