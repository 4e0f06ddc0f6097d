//! Typed query results and XPath evaluation.
//!
//! A query yields one of four result shapes. Results are converted into owned
//! values right away so they outlive the document they were computed from.

use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value};
use thiserror::Error;

use crate::markup::DocumentTree;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid query '{expr}': {message}")]
    Compile { expr: String, message: String },
    #[error("query '{0}' is empty")]
    Empty(String),
    #[error("query '{expr}' failed: {message}")]
    Execute { expr: String, message: String },
}

/// Tag of a [`TypedResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    NodeSet,
    String,
    Number,
    Boolean,
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultKind::NodeSet => write!(f, "node-set"),
            ResultKind::String => write!(f, "string"),
            ResultKind::Number => write!(f, "number"),
            ResultKind::Boolean => write!(f, "boolean"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Attribute,
    Text,
    Comment,
    /// Document root, processing instruction, namespace
    Other,
}

/// One node of a node-set result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultNode {
    pub kind: NodeKind,
    /// Element or attribute name
    pub name: Option<String>,
    /// Attribute value, text or comment content
    pub content: Option<String>,
}

impl ResultNode {
    pub fn element(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element,
            name: Some(name.into()),
            content: None,
        }
    }

    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Attribute,
            name: Some(name.into()),
            content: Some(value.into()),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            name: None,
            content: Some(content.into()),
        }
    }

    pub fn comment(content: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Comment,
            name: None,
            content: Some(content.into()),
        }
    }

    pub fn other() -> Self {
        Self {
            kind: NodeKind::Other,
            name: None,
            content: None,
        }
    }

    /// Nodes compare by kind, then:
    /// text/comment by content, element by name, attribute by name and value.
    pub fn structurally_equal(&self, other: &ResultNode) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.kind != other.kind {
            return false;
        }
        match self.kind {
            NodeKind::Text | NodeKind::Comment => self.content == other.content,
            NodeKind::Attribute => self.name == other.name && self.content == other.content,
            NodeKind::Element => self.name == other.name,
            NodeKind::Other => true,
        }
    }
}

/// Result of evaluating a query against a document
#[derive(Debug, Clone, PartialEq)]
pub enum TypedResult {
    NodeSet(Vec<ResultNode>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl TypedResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            TypedResult::NodeSet(_) => ResultKind::NodeSet,
            TypedResult::String(_) => ResultKind::String,
            TypedResult::Number(_) => ResultKind::Number,
            TypedResult::Boolean(_) => ResultKind::Boolean,
        }
    }

    /// Scalar used for threshold comparisons: node count, character count,
    /// numeric value, or 0/1.
    pub fn magnitude(&self) -> f64 {
        match self {
            TypedResult::NodeSet(nodes) => nodes.len() as f64,
            TypedResult::String(s) => s.chars().count() as f64,
            TypedResult::Number(n) => *n,
            TypedResult::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Same tag and same content. Node-sets compare positionally.
    /// Results of different kinds are never equal.
    pub fn structurally_equal(&self, other: &TypedResult) -> bool {
        match (self, other) {
            (TypedResult::NodeSet(a), TypedResult::NodeSet(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.structurally_equal(y))
            }
            (TypedResult::String(a), TypedResult::String(b)) => a == b,
            (TypedResult::Number(a), TypedResult::Number(b)) => a == b,
            (TypedResult::Boolean(a), TypedResult::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

/// Evaluate an XPath expression against the document root.
pub fn evaluate_query(tree: &DocumentTree, expr: &str) -> Result<TypedResult, QueryError> {
    let factory = Factory::new();
    let xpath = factory
        .build(expr)
        .map_err(|e| QueryError::Compile {
            expr: expr.to_string(),
            message: e.to_string(),
        })?
        .ok_or_else(|| QueryError::Empty(expr.to_string()))?;

    let context = Context::new();
    let document = tree.document();
    let value = xpath
        .evaluate(&context, document.root())
        .map_err(|e| QueryError::Execute {
            expr: expr.to_string(),
            message: e.to_string(),
        })?;

    Ok(match value {
        Value::Nodeset(nodes) => {
            TypedResult::NodeSet(nodes.document_order().into_iter().map(to_result_node).collect())
        }
        Value::String(s) => TypedResult::String(s),
        Value::Number(n) => TypedResult::Number(n),
        Value::Boolean(b) => TypedResult::Boolean(b),
    })
}

fn to_result_node(node: Node<'_>) -> ResultNode {
    match node {
        Node::Element(e) => ResultNode::element(e.name().local_part()),
        Node::Attribute(a) => ResultNode::attribute(a.name().local_part(), a.value()),
        Node::Text(t) => ResultNode::text(t.text()),
        Node::Comment(c) => ResultNode::comment(c.text()),
        _ => ResultNode::other(),
    }
}
