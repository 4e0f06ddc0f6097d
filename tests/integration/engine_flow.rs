//! End-to-end runs of init, check, update and remove over file:// documents.

use std::fs;
use std::path::PathBuf;

use sitewatch::config::FetchConfig;
use sitewatch::digest::cache_file_name;
use sitewatch::engine::{Action, DocumentOutcome, Engine, MonitorStatus, ERROR_EXIT};
use sitewatch::fetch::{FetchError, Fetcher, HttpFetcher};
use sitewatch::metadata::MetadataStore;
use sitewatch::query::TypedResult;

use super::helpers::*;

const T0: i64 = 1_700_000_000;
const HOUR: i64 = 3_600;

const OLD_PAGE: &str = "<html><body><h1>Old news</h1><ul><li>a</li><li>b</li></ul></body></html>";
const NEW_PAGE: &str =
    "<html><body><h1>New news</h1><ul><li>a</li><li>b</li><li>c</li></ul></body></html>";

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(&FetchConfig::default()).expect("Failed to build fetcher")
}

/// One document with an hourly count monitor and a daily headline monitor
fn news_workspace() -> (Workspace, PathBuf, String) {
    let ws = Workspace::new();
    ws.write_page("news.html", OLD_PAGE);
    let url = ws.page_url("news.html");
    let xml = monitor_xml(
        "news",
        &[(
            url.as_str(),
            &[
                ("items", "//li", "1h", "more"),
                ("headline", "string(//h1)", "1d", "changed"),
            ],
        )],
    );
    let file = ws.write_monitor_file("news.xml", &xml);
    (ws, file, url)
}

#[test]
fn test_full_monitoring_cycle() {
    let (ws, file, url) = news_workspace();
    let fetcher = fetcher();
    let files = vec![file];

    // init stores the page
    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0)
        .run(Action::Init, &files, &mut rec);
    assert_eq!(run.exit_code(), 0);
    assert_eq!(rec.started, vec!["news"]);
    assert_eq!(rec.documents.len(), 1);
    assert_eq!(rec.documents[0].outcome, DocumentOutcome::Downloaded);
    let cache_file = ws.cache_dir().join(cache_file_name(&url));
    assert_eq!(fs::read_to_string(&cache_file).unwrap(), OLD_PAGE);

    // first check: nothing changed, both monitors stamped
    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0)
        .run(Action::Check, &files, &mut rec);
    assert_eq!(run.exit_code(), 0);
    assert_eq!(rec.status("items"), &MonitorStatus::NotTriggered);
    assert_eq!(rec.status("headline"), &MonitorStatus::NotTriggered);

    let mut store = MetadataStore::open(&ws.base, &files[0]);
    store.load().unwrap();
    assert_eq!(store.path(), ws.meta_path("news.meta"));
    assert_eq!(store.last_check("items"), T0);
    assert_eq!(store.last_check("headline"), T0);

    ws.write_page("news.html", NEW_PAGE);

    // a minute later nothing is due
    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0 + 60)
        .run(Action::Check, &files, &mut rec);
    assert_eq!(run.triggered, 0);
    assert_eq!(
        rec.status("items"),
        &MonitorStatus::NotDue {
            next_check: T0 + HOUR
        }
    );
    assert!(matches!(rec.status("headline"), MonitorStatus::NotDue { .. }));

    // two hours later only the hourly monitor is due, and it fires
    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0 + 2 * HOUR)
        .run(Action::Check, &files, &mut rec);
    assert_eq!(run.exit_code(), 1);
    match rec.status("items") {
        MonitorStatus::Triggered { old, current } => {
            assert_eq!(old.magnitude(), 2.0);
            assert_eq!(current.magnitude(), 3.0);
        }
        other => panic!("expected trigger, got {other:?}"),
    }
    assert!(matches!(rec.status("headline"), MonitorStatus::NotDue { .. }));
    // check never touches the cache
    assert_eq!(fs::read_to_string(&cache_file).unwrap(), OLD_PAGE);

    // forced update: both fire and the cache moves forward
    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0 + 3 * HOUR)
        .force(true)
        .run(Action::Update, &files, &mut rec);
    assert_eq!(run.exit_code(), 2);
    assert_eq!(
        rec.status("headline"),
        &MonitorStatus::Triggered {
            old: TypedResult::String("Old news".to_string()),
            current: TypedResult::String("New news".to_string()),
        }
    );
    assert_eq!(fs::read_to_string(&cache_file).unwrap(), NEW_PAGE);

    // after the update the page matches the cache again
    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0 + 4 * HOUR)
        .force(true)
        .run(Action::Check, &files, &mut rec);
    assert_eq!(run.exit_code(), 0);
    assert_eq!(rec.status("items"), &MonitorStatus::NotTriggered);
    assert_eq!(rec.status("headline"), &MonitorStatus::NotTriggered);

    // remove deletes the cached copy; removing again is an error
    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher).run(Action::Remove, &files, &mut rec);
    assert_eq!(run.exit_code(), 0);
    assert_eq!(rec.documents[0].outcome, DocumentOutcome::Removed);
    assert!(!cache_file.exists());

    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher).run(Action::Remove, &files, &mut rec);
    assert_eq!(run.cache_errors, 1);
    assert_eq!(run.exit_code(), ERROR_EXIT);
    assert!(matches!(
        rec.documents[0].outcome,
        DocumentOutcome::Failed(_)
    ));
}

#[test]
fn test_check_before_init_is_not_evaluable() {
    let (ws, file, _url) = news_workspace();
    let fetcher = fetcher();

    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0)
        .run(Action::Check, &[file.clone()], &mut rec);

    assert_eq!(run.not_evaluable, 2);
    assert_eq!(run.exit_code(), 0);
    assert!(matches!(rec.status("items"), MonitorStatus::NotEvaluable(reason) if reason.contains("not initialized")));

    // last check is not advanced, so the monitor stays due
    let mut store = MetadataStore::open(&ws.base, &file);
    store.load().unwrap();
    assert_eq!(store.last_check("items"), 0);
}

#[test]
fn test_unreachable_document_is_not_evaluable() {
    let (ws, file, _url) = news_workspace();
    let fetcher = fetcher();
    Engine::new(&ws.base, &fetcher).run(Action::Init, &[file.clone()], &mut Recorder::default());

    fs::remove_file(ws.page_path("news.html")).unwrap();
    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0)
        .run(Action::Check, &[file], &mut rec);

    assert_eq!(run.not_evaluable, 2);
    assert!(matches!(rec.status("headline"), MonitorStatus::NotEvaluable(_)));
}

#[test]
fn test_skipped_document_does_not_stop_siblings() {
    let ws = Workspace::new();
    ws.write_page("good.html", OLD_PAGE);
    let good = ws.page_url("good.html");
    let xml = monitor_xml(
        "mixed",
        &[
            ("gopher://example.com/", &[("lost", "//li", "1h", "changed")]),
            (good.as_str(), &[("found", "//li", "1h", "changed")]),
        ],
    );
    let file = ws.write_monitor_file("mixed.xml", &xml);
    let fetcher = fetcher();

    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher).run(Action::Init, &[file.clone()], &mut rec);
    assert_eq!(rec.documents.len(), 2);
    assert!(matches!(rec.documents[0].outcome, DocumentOutcome::Skipped(_)));
    assert_eq!(rec.documents[1].outcome, DocumentOutcome::Downloaded);
    assert_eq!(run.exit_code(), 0);
    assert_eq!(ws.cached_files(), 1);

    let mut rec = Recorder::default();
    Engine::new(&ws.base, &fetcher)
        .at(T0)
        .run(Action::Check, &[file], &mut rec);
    assert_eq!(rec.documents.len(), 1);
    assert_eq!(rec.monitors.len(), 1);
    assert_eq!(rec.status("found"), &MonitorStatus::NotTriggered);
}

#[test]
fn test_malformed_monitor_is_skipped_with_warning() {
    let ws = Workspace::new();
    ws.write_page("p.html", OLD_PAGE);
    let url = ws.page_url("p.html");
    let xml = monitor_xml(
        "p",
        &[(
            url.as_str(),
            &[("bad", "//li", "1h", "xyz"), ("good", "//li", "1h", "changed")],
        )],
    );
    let file = ws.write_monitor_file("p.xml", &xml);
    let fetcher = fetcher();
    Engine::new(&ws.base, &fetcher).run(Action::Init, &[file.clone()], &mut Recorder::default());

    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0)
        .run(Action::Check, &[file], &mut rec);

    assert!(matches!(rec.status("bad"), MonitorStatus::Skipped(reason) if reason.contains("xyz")));
    assert_eq!(rec.status("good"), &MonitorStatus::NotTriggered);
    assert_eq!(run.exit_code(), 0);
}

#[test]
fn test_fatal_file_keeps_metadata_and_other_files_run() {
    let (ws, good_file, _url) = news_workspace();
    let fetcher = fetcher();
    Engine::new(&ws.base, &fetcher).run(Action::Init, &[good_file.clone()], &mut Recorder::default());

    let broken = ws.write_monitor_file("broken.xml", "<monitorfile name=\"broken\"><document>");
    let broken_meta = ws.meta_path("broken.meta");
    let stored = "<monitor name=\"kept\" lastcheck=\"12345\" />\n";
    fs::write(&broken_meta, stored).unwrap();

    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0)
        .run(Action::Check, &[broken, good_file], &mut rec);

    assert_eq!(run.files, 2);
    assert_eq!(run.failed_files, 1);
    assert_eq!(run.exit_code(), ERROR_EXIT);
    assert_eq!(rec.failures.len(), 1);
    assert_eq!(rec.status("items"), &MonitorStatus::NotTriggered);
    assert_eq!(fs::read_to_string(&broken_meta).unwrap(), stored);
}

#[test]
fn test_missing_monitor_file_is_fatal() {
    let ws = Workspace::new();
    let fetcher = fetcher();
    let mut rec = Recorder::default();
    let missing = ws.base.monitor_file_path("nope.xml");

    let run = Engine::new(&ws.base, &fetcher).run(Action::Check, &[missing], &mut rec);
    assert_eq!(run.failed_files, 1);
    assert_eq!(rec.failures.len(), 1);
}

/// Fetches normally, then puts a directory where the cache file was, so
/// storing the fetched copy fails.
struct UnwritableCache {
    inner: HttpFetcher,
    cache_file: PathBuf,
}

impl Fetcher for UnwritableCache {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self.inner.fetch(url)?;
        if self.cache_file.is_file() {
            fs::remove_file(&self.cache_file).unwrap();
            fs::create_dir(&self.cache_file).unwrap();
        }
        Ok(bytes)
    }
}

#[test]
fn test_update_stores_each_block_at_most_once_even_on_failure() {
    let ws = Workspace::new();
    ws.write_page("news.html", OLD_PAGE);
    let url = ws.page_url("news.html");
    let xml = monitor_xml(
        "news",
        &[(
            url.as_str(),
            &[
                ("items", "//li", "1h", "more"),
                ("headline", "string(//h1)", "1h", "changed"),
                ("count", "count(//li)", "1h", "more"),
            ],
        )],
    );
    let files = vec![ws.write_monitor_file("news.xml", &xml)];
    Engine::new(&ws.base, &fetcher()).run(Action::Init, &files, &mut Recorder::default());
    ws.write_page("news.html", NEW_PAGE);

    let fetcher = UnwritableCache {
        inner: fetcher(),
        cache_file: ws.cache_dir().join(cache_file_name(&url)),
    };
    let mut rec = Recorder::default();
    let run = Engine::new(&ws.base, &fetcher)
        .at(T0)
        .force(true)
        .run(Action::Update, &files, &mut rec);

    assert_eq!(run.triggered, 3);
    assert_eq!(run.cache_errors, 1);
    assert_eq!(run.exit_code(), ERROR_EXIT);
}
