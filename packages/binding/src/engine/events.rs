//! Lifecycle events fired during a bind and the observer interface that
//! receives them.

use std::collections::BTreeMap;
use std::fmt;

use roxmltree::Node;

use crate::bean::BeanRef;
use crate::error::Result;
use crate::xml::{pre_text, qualified_name, source_position, QName};

/// What happened to a bean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeanLifecycle {
    /// A bean id was bound for the first time.
    Create,
    /// A bean id already in context was bound to a new instance.
    Change,
    /// A property was set or an item appended.
    Populate,
}

/// Line and column of a node in the source document, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The document node an event originated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFragment {
    /// Slash-separated element path, e.g. `/o:order/o:header`.
    pub path: String,
    /// Name of the element, or of the attribute for attribute bindings.
    pub name: QName,
    pub position: SourcePosition,
    /// Comments and text preceding the element.
    pub pre_text: Option<String>,
}

impl SourceFragment {
    /// Describe an element.
    pub(crate) fn element(node: Node<'_, '_>, path: &[QName]) -> Self {
        let position = source_position(node);
        Self {
            path: format_path(path),
            name: qualified_name(node),
            position: SourcePosition {
                line: position.row,
                column: position.col,
            },
            pre_text: pre_text(node),
        }
    }

    /// Describe an attribute of an element.
    pub(crate) fn attribute(node: Node<'_, '_>, path: &[QName], name: QName) -> Self {
        let position = source_position(node);
        Self {
            path: format!("{}/@{}", format_path(path), name.prefixed_name()),
            name,
            position: SourcePosition {
                line: position.row,
                column: position.col,
            },
            pre_text: None,
        }
    }
}

fn format_path(path: &[QName]) -> String {
    path.iter()
        .map(|name| format!("/{}", name.prefixed_name()))
        .collect()
}

/// A bean lifecycle event.
#[derive(Debug, Clone, Copy)]
pub struct BeanEvent<'a> {
    pub lifecycle: BeanLifecycle,
    pub bean_id: &'a str,
    pub bean: &'a BeanRef,
    pub source: &'a SourceFragment,
    /// Populated property; `None` for creation events and collection items.
    pub property: Option<&'a str>,
}

/// Receives events synchronously, in document order, during a bind.
///
/// An error returned by an observer aborts the bind.
pub trait BindingObserver {
    fn on_namespace_declared(&mut self, _prefix: Option<&str>, _uri: &str) -> Result<()> {
        Ok(())
    }

    fn on_bean_event(&mut self, _event: &BeanEvent<'_>) -> Result<()> {
        Ok(())
    }
}

/// Collects the namespace prefixes declared in a document.
///
/// Maps namespace URI to prefix; the first declaration of a URI wins and the
/// default namespace maps to an empty prefix.
#[derive(Debug, Clone, Default)]
pub struct NamespaceReaper {
    mappings: BTreeMap<String, String>,
}

impl NamespaceReaper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mappings(&self) -> &BTreeMap<String, String> {
        &self.mappings
    }

    #[must_use]
    pub fn into_mappings(self) -> BTreeMap<String, String> {
        self.mappings
    }
}

impl BindingObserver for NamespaceReaper {
    fn on_namespace_declared(&mut self, prefix: Option<&str>, uri: &str) -> Result<()> {
        self.mappings
            .entry(uri.to_string())
            .or_insert_with(|| prefix.unwrap_or_default().to_string());
        Ok(())
    }
}
