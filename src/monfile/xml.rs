//! `quick-xml` backed token source.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::token::{Token, TokenSource};
use super::MonitorFileError;

/// Published DTD for monitor files. A DOCTYPE naming any other external DTD
/// is rejected; files without a DOCTYPE are fine.
pub const MONITOR_FILE_DTD: &str = "http://webchanges.sourceforge.net/dtd/wc1.dtd";

pub struct XmlTokenSource<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// End token owed for a self-closing element
    pending_end: Option<String>,
}

impl XmlTokenSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, MonitorFileError> {
        let file = File::open(path).map_err(|source| MonitorFileError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> XmlTokenSource<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::from_reader(input),
            buf: Vec::new(),
            pending_end: None,
        }
    }
}

impl<R: BufRead> TokenSource for XmlTokenSource<R> {
    fn next_token(&mut self) -> Result<Option<Token>, MonitorFileError> {
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(Token::End { name }));
        }

        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| xml_error(self.reader.buffer_position(), e))?;

            match event {
                Event::Start(e) => return Ok(Some(start_token(&e)?)),
                Event::Empty(e) => {
                    let token = start_token(&e)?;
                    if let Token::Start { name, .. } = &token {
                        self.pending_end = Some(name.clone());
                    }
                    return Ok(Some(token));
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    return Ok(Some(Token::End { name }));
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| MonitorFileError::Xml(format!("in text: {e}")))?;
                    return Ok(Some(Token::Text(text.into_owned())));
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    return Ok(Some(Token::Text(text)));
                }
                Event::DocType(e) => check_doctype(&String::from_utf8_lossy(&e))?,
                Event::Eof => return Ok(None),
                // Declaration, comments, processing instructions
                _ => {}
            }
        }
    }
}

fn xml_error(position: impl std::fmt::Display, err: quick_xml::Error) -> MonitorFileError {
    MonitorFileError::Xml(format!("at byte {position}: {err}"))
}

fn start_token(e: &BytesStart<'_>) -> Result<Token, MonitorFileError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| MonitorFileError::Xml(format!("in <{name}>: {err}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| MonitorFileError::Xml(format!("in <{name}>: {err}")))?;
        attributes.push((key, value.into_owned()));
    }
    Ok(Token::Start { name, attributes })
}

/// Reject a DOCTYPE whose external identifier is not the monitor-file DTD.
fn check_doctype(doctype: &str) -> Result<(), MonitorFileError> {
    let ids = external_ids(doctype);
    if ids.is_empty() || ids.contains(&MONITOR_FILE_DTD) {
        Ok(())
    } else {
        Err(MonitorFileError::WrongDtd(doctype.trim().to_string()))
    }
}

/// Quoted literals of the PUBLIC/SYSTEM identifier. The internal subset,
/// starting at the first `[` outside a literal, is not looked at.
fn external_ids(doctype: &str) -> Vec<&str> {
    let mut ids = Vec::new();
    let mut chars = doctype.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '[' => break,
            '"' | '\'' => {
                let start = i + c.len_utf8();
                match chars.by_ref().find(|&(_, q)| q == c) {
                    Some((end, _)) => ids.push(&doctype[start..end]),
                    None => ids.push(&doctype[start..]),
                }
            }
            _ => {}
        }
    }
    ids
}
