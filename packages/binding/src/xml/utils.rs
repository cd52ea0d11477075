//! XML utility functions for reading names, text and source positions from
//! parsed documents.

use quick_xml::escape::escape;
use roxmltree::{Node, TextPos};

use super::QName;
use crate::config::XML_NS_URI;

/// Get the tag name without namespace prefix.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use beanbinder::xml::get_tag_name;
///
/// let doc = Document::parse(r#"<o:order xmlns:o="urn:o"/>"#).unwrap();
/// assert_eq!(get_tag_name(doc.root_element()), "order");
/// ```
pub fn get_tag_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Get the qualified name of an element, including the prefix it was
/// written with.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use beanbinder::xml::qualified_name;
///
/// let doc = Document::parse(r#"<o:order xmlns:o="urn:o"/>"#).unwrap();
/// let name = qualified_name(doc.root_element());
/// assert_eq!(name.namespace(), Some("urn:o"));
/// assert_eq!(name.prefixed_name(), "o:order");
/// ```
pub fn qualified_name(node: Node<'_, '_>) -> QName {
    let tag = node.tag_name();
    let namespace = tag.namespace().map(str::to_string);
    let prefix = tag
        .namespace()
        .and_then(|uri| node.lookup_prefix(uri))
        .map(str::to_string);
    QName::new(namespace, tag.name(), prefix)
}

/// Concatenate the direct text children of an element.
///
/// Text of nested elements is not included.
pub fn element_text(node: Node<'_, '_>) -> String {
    node.children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect()
}

/// Collect the comments and non-whitespace text preceding an element, back
/// to its previous element sibling.
///
/// The result is markup: comments keep their delimiters and text is
/// escaped again, so it can be written back verbatim. Returns `None` when
/// there is nothing to keep.
pub fn pre_text(node: Node<'_, '_>) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = node.prev_sibling();

    while let Some(sibling) = current {
        if sibling.is_element() {
            break;
        }
        if sibling.is_comment() {
            if let Some(text) = sibling.text() {
                parts.push(format!("<!--{text}-->"));
            }
        } else if sibling.is_text() {
            if let Some(text) = sibling.text().filter(|t| !t.trim().is_empty()) {
                parts.push(escape(text.trim()).into_owned());
            }
        }
        current = sibling.prev_sibling();
    }

    if parts.is_empty() {
        None
    } else {
        parts.reverse();
        Some(parts.concat())
    }
}

/// Line and column of the start of a node in its document.
pub fn source_position(node: Node<'_, '_>) -> TextPos {
    node.document().text_pos_at(node.range().start)
}

/// Namespace declarations made on this element rather than inherited from
/// its parent. The implicit `xml` namespace is never reported.
///
/// Each entry is `(prefix, uri)`; the default namespace has no prefix.
pub fn declared_namespaces(node: Node<'_, '_>) -> Vec<(Option<String>, String)> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|parent| parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    node.namespaces()
        .filter(|ns| ns.uri() != XML_NS_URI)
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
        .collect()
}
