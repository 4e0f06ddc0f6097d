//! Streaming validation of the monitor-file schema.
//!
//! ```text
//! monitorfile (name)   -> document*
//! document (url)       -> monitor*
//! monitor (name)       -> (query | xpath | interval | trigger)*
//! query, xpath, interval, trigger -> text
//! ```
//!
//! Which fields a monitor has, and how often, is left to the reader.

use super::token::Token;
use super::MonitorFileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    MonitorFile,
    Document,
    Monitor,
    Field,
}

impl Element {
    fn classify(parent: Option<Element>, name: &str) -> Option<Element> {
        match (parent, name) {
            (None, "monitorfile") => Some(Element::MonitorFile),
            (Some(Element::MonitorFile), "document") => Some(Element::Document),
            (Some(Element::Document), "monitor") => Some(Element::Monitor),
            (Some(Element::Monitor), "query" | "xpath" | "interval" | "trigger") => {
                Some(Element::Field)
            }
            _ => None,
        }
    }

    /// The attribute this element requires, if any. No others are allowed.
    fn required_attribute(self) -> Option<&'static str> {
        match self {
            Element::MonitorFile | Element::Monitor => Some("name"),
            Element::Document => Some("url"),
            Element::Field => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SchemaValidator {
    stack: Vec<(Element, String)>,
    root_seen: bool,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the next token against the schema.
    pub fn check(&mut self, token: &Token) -> Result<(), MonitorFileError> {
        match token {
            Token::Start { name, attributes } => {
                let parent = self.stack.last().map(|(e, _)| *e);
                if parent.is_none() && self.root_seen {
                    return Err(self.violation(format!("second root element <{name}>")));
                }

                let element = Element::classify(parent, name).ok_or_else(|| {
                    self.violation(match parent {
                        None => format!("root element must be <monitorfile>, found <{name}>"),
                        Some(_) => format!("element <{name}> is not allowed here"),
                    })
                })?;

                let required = element.required_attribute();
                for (key, _) in attributes {
                    if Some(key.as_str()) != required {
                        return Err(
                            self.violation(format!("unknown attribute '{key}' on <{name}>"))
                        );
                    }
                }
                if let Some(key) = required {
                    match token.attribute(key) {
                        Some(value) if !value.trim().is_empty() => {}
                        Some(_) => {
                            return Err(self.violation(format!(
                                "attribute '{key}' of <{name}> is empty"
                            )))
                        }
                        None => {
                            return Err(self.violation(format!(
                                "<{name}> is missing attribute '{key}'"
                            )))
                        }
                    }
                }

                self.root_seen = true;
                self.stack.push((element, name.clone()));
                Ok(())
            }
            Token::End { name } => match self.stack.pop() {
                Some((_, open)) if open == *name => Ok(()),
                Some((element, open)) => {
                    self.stack.push((element, open.clone()));
                    Err(self.violation(format!("</{name}> closes <{open}>")))
                }
                None => Err(self.violation(format!("unexpected </{name}>"))),
            },
            Token::Text(text) => match self.stack.last() {
                Some((Element::Field, _)) => Ok(()),
                _ if text.trim().is_empty() => Ok(()),
                _ => Err(self.violation(format!("unexpected text '{}'", text.trim()))),
            },
        }
    }

    /// Check that the input ended in a valid place.
    pub fn finish(&self) -> Result<(), MonitorFileError> {
        if let Some((_, name)) = self.stack.last() {
            return Err(self.violation(format!("unexpected end of file inside <{name}>")));
        }
        if !self.root_seen {
            return Err(MonitorFileError::MissingRoot);
        }
        Ok(())
    }

    fn violation(&self, message: String) -> MonitorFileError {
        let path = self
            .stack
            .iter()
            .map(|(_, name)| format!("/{name}"))
            .collect::<String>();
        MonitorFileError::Schema {
            path: if path.is_empty() { "/".to_string() } else { path },
            message,
        }
    }
}
