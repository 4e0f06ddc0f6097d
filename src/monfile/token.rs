use super::MonitorFileError;

/// One markup event of a monitor file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Text(String),
}

impl Token {
    pub fn start(name: &str, attributes: &[(&str, &str)]) -> Self {
        Token::Start {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn end(name: &str) -> Self {
        Token::End {
            name: name.to_string(),
        }
    }

    pub fn text(text: &str) -> Self {
        Token::Text(text.to_string())
    }

    /// Value of attribute `key` on a start token
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self {
            Token::Start { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Pull-style stream of tokens. `Ok(None)` marks the end of input.
pub trait TokenSource {
    fn next_token(&mut self) -> Result<Option<Token>, MonitorFileError>;
}

/// Pre-tokenized input
impl TokenSource for std::vec::IntoIter<Token> {
    fn next_token(&mut self) -> Result<Option<Token>, MonitorFileError> {
        Ok(self.next())
    }
}
