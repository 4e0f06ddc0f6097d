//! Reading real monitor files from disk.

use sitewatch::monfile::{
    DocumentStep, MonitorFileError, MonitorFileReader, MonitorStep, MONITOR_FILE_DTD,
};
use sitewatch::monitor::TriggerKind;

use super::helpers::*;

#[test]
fn test_reads_monitor_file_with_doctype_and_legacy_fields() {
    let ws = Workspace::new();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE monitorfile SYSTEM "{MONITOR_FILE_DTD}">
<!-- watched pages -->
<monitorfile name="Project pages">
  <document url="https://example.com/releases">
    <monitor name="release count">
      <xpath>count(//tr[@class='release'])</xpath>
      <interval>12h</interval>
      <trigger>1 more</trigger>
    </monitor>
    <monitor name="title">
      <query><![CDATA[//title/text()]]></query>
      <interval>1d</interval>
      <trigger>CHANGED</trigger>
    </monitor>
  </document>
</monitorfile>
"#
    );
    let path = ws.write_monitor_file("project.xml", &xml);

    let mut reader = MonitorFileReader::open(&path, &ws.cache_dir()).unwrap();
    assert_eq!(reader.name(), "Project pages");

    let mut monitors = Vec::new();
    while let Some(step) = reader.next_monitor().unwrap() {
        match step {
            MonitorStep::Ready(m) => monitors.push(m),
            other => panic!("unexpected {other:?}"),
        }
    }

    assert_eq!(monitors.len(), 2);
    assert_eq!(monitors[0].name(), "release count");
    assert_eq!(monitors[0].query(), "count(//tr[@class='release'])");
    assert_eq!(monitors[0].interval().as_secs(), 12 * 3_600);
    assert_eq!(monitors[0].trigger().kind, TriggerKind::More);
    assert_eq!(monitors[0].trigger().absolute, 1.0);
    assert_eq!(monitors[1].query(), "//title/text()");
    assert_eq!(monitors[1].trigger().kind, TriggerKind::Changed);
    assert_eq!(monitors[0].block(), monitors[1].block());
}

#[test]
fn test_wrong_dtd_is_fatal() {
    let ws = Workspace::new();
    let path = ws.write_monitor_file(
        "other.xml",
        r#"<!DOCTYPE monitorfile SYSTEM "http://example.com/other.dtd">
<monitorfile name="x"/>"#,
    );

    assert!(matches!(
        MonitorFileReader::open(&path, &ws.cache_dir()),
        Err(MonitorFileError::WrongDtd(_))
    ));
}

#[test]
fn test_schema_violation_is_fatal() {
    let ws = Workspace::new();
    let path = ws.write_monitor_file(
        "bad.xml",
        r#"<monitorfile name="x"><document url="https://example.com/"><page/></document></monitorfile>"#,
    );

    let mut reader = MonitorFileReader::open(&path, &ws.cache_dir()).unwrap();
    let err = reader.next_document().unwrap_err();
    match err {
        MonitorFileError::Schema { path, message } => {
            assert_eq!(path, "/monitorfile/document");
            assert!(message.contains("<page>"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_empty_monitor_file_is_valid() {
    let ws = Workspace::new();
    let path = ws.write_monitor_file("empty.xml", r#"<monitorfile name="empty"/>"#);

    let mut reader = MonitorFileReader::open(&path, &ws.cache_dir()).unwrap();
    assert_eq!(reader.name(), "empty");
    assert!(reader.next_document().unwrap().is_none());
}

#[test]
fn test_documents_map_to_cache_paths() {
    let ws = Workspace::new();
    let xml = monitor_xml(
        "two",
        &[
            ("https://example.com/a", &[]),
            ("https://example.com/b", &[]),
            ("https://example.com/a", &[]),
        ],
    );
    let path = ws.write_monitor_file("two.xml", &xml);

    let mut reader = MonitorFileReader::open(&path, &ws.cache_dir()).unwrap();
    let mut cache_paths = Vec::new();
    while let Some(step) = reader.next_document().unwrap() {
        match step {
            DocumentStep::Opened(pair) => cache_paths.push(pair.cache_path().to_path_buf()),
            DocumentStep::Skipped { url, reason } => panic!("skipped {url}: {reason}"),
        }
    }

    assert_eq!(cache_paths.len(), 3);
    assert_ne!(cache_paths[0], cache_paths[1]);
    assert_eq!(cache_paths[0], cache_paths[2]);
    assert!(cache_paths.iter().all(|p| p.starts_with(ws.cache_dir())));
}
