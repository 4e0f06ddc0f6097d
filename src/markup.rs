//! Markup parsing.
//!
//! Documents are parsed leniently as HTML with `scraper` and copied into an
//! `sxd-document` DOM, which is what XPath expressions run against.

use scraper::node::Node;
use scraper::{ElementRef, Html};
use std::fs;
use std::path::{Path, PathBuf};
use sxd_document::dom::{Document, Element};
use sxd_document::Package;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A parsed document, ready for query evaluation.
pub struct DocumentTree {
    package: Package,
    base_url: Option<Url>,
}

impl DocumentTree {
    pub fn document(&self) -> Document<'_> {
        self.package.as_document()
    }

    /// URL the document was fetched from; `None` for cached copies read from disk.
    ///
    /// Query results are compared as written in the document: no XPath
    /// operation resolves relative references against this URL.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }
}

impl std::fmt::Debug for DocumentTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentTree")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Parse raw document bytes. Invalid UTF-8 sequences are replaced.
pub fn parse_markup(bytes: &[u8], base_url: Option<&Url>) -> DocumentTree {
    let text = String::from_utf8_lossy(bytes);
    let html = Html::parse_document(&text);

    let package = Package::new();
    {
        let doc = package.as_document();
        let root = html.root_element();
        let element = doc.create_element(root.value().name());
        copy_element(&doc, root, element);
        doc.root().append_child(element);
    }

    DocumentTree {
        package,
        base_url: base_url.cloned(),
    }
}

/// Read and parse a document from disk.
pub fn parse_markup_file(path: &Path) -> Result<DocumentTree, MarkupError> {
    let bytes = fs::read(path).map_err(|source| MarkupError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_markup(&bytes, None))
}

/// Copy attributes and children of `src` into `dst`.
fn copy_element<'d>(doc: &Document<'d>, src: ElementRef<'_>, dst: Element<'d>) {
    for (name, value) in src.value().attrs() {
        dst.set_attribute_value(name, value);
    }

    for child in src.children() {
        match child.value() {
            Node::Element(el) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    let element = doc.create_element(el.name());
                    copy_element(doc, child_ref, element);
                    dst.append_child(element);
                }
            }
            Node::Text(text) => {
                dst.append_child(doc.create_text(&**text));
            }
            Node::Comment(comment) => {
                dst.append_child(doc.create_comment(&**comment));
            }
            _ => {}
        }
    }
}
