//! Absolute selector paths addressing elements and attributes.
//!
//! A selector is written `/step/step[/@attribute]`. Steps may carry a
//! prefix declared in the binding configuration's namespace table, e.g.
//! `/o:order/o:header/@id`.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::{validate_ncname, DOCUMENT_FRAGMENT_SELECTOR};
use crate::error::{BindingError, Result};
use crate::xml::QName;

/// One step of a selector path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorStep {
    Element(QName),
    Attribute(QName),
}

impl SelectorStep {
    #[must_use]
    pub fn name(&self) -> &QName {
        match self {
            SelectorStep::Element(name) | SelectorStep::Attribute(name) => name,
        }
    }

    #[must_use]
    pub fn is_attribute(&self) -> bool {
        matches!(self, SelectorStep::Attribute(_))
    }
}

/// A parsed, absolute selector path.
#[derive(Debug, Clone)]
pub struct SelectorPath {
    source: String,
    steps: Vec<SelectorStep>,
}

impl SelectorPath {
    /// Parse a selector, resolving prefixes against `namespaces`
    /// (prefix to URI).
    ///
    /// # Errors
    /// Returns `BindingError::Config` when the selector is empty, uses the
    /// document fragment selector, is not absolute, uses an undeclared prefix
    /// or places an attribute step anywhere but last.
    ///
    /// # Examples
    /// ```
    /// use std::collections::BTreeMap;
    /// use beanbinder::selector::SelectorPath;
    ///
    /// let namespaces = BTreeMap::from([("o".to_string(), "urn:order".to_string())]);
    /// let path = SelectorPath::parse("/o:order/header/@id", &namespaces).unwrap();
    /// assert_eq!(path.len(), 3);
    /// assert_eq!(path.root().namespace(), Some("urn:order"));
    /// assert!(path.attribute().is_some());
    ///
    /// assert!(SelectorPath::parse("#document", &namespaces).is_err());
    /// assert!(SelectorPath::parse("order/header", &namespaces).is_err());
    /// ```
    pub fn parse(selector: &str, namespaces: &BTreeMap<String, String>) -> Result<Self> {
        let source = selector.trim();

        if source.is_empty() {
            return Err(BindingError::Config(
                "All bean configurations must specify fully qualified selector paths.".to_string(),
            ));
        }
        if source.contains(DOCUMENT_FRAGMENT_SELECTOR) {
            return Err(BindingError::Config(format!(
                "Cannot use the document selector for XML binding. Must use an absolute path. Selector value '{source}'."
            )));
        }
        let Some(body) = source.strip_prefix('/') else {
            return Err(BindingError::Config(format!(
                "Invalid selector value '{source}'. Selector paths must be absolute."
            )));
        };

        let segments: Vec<&str> = body.split('/').collect();
        let mut steps = Vec::with_capacity(segments.len());

        for (index, segment) in segments.iter().enumerate() {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(BindingError::Config(format!(
                    "Invalid selector value '{source}'. Empty path step."
                )));
            }

            if let Some(attribute) = segment.strip_prefix('@') {
                if index == 0 || index + 1 != segments.len() {
                    return Err(BindingError::Config(format!(
                        "Invalid selector value '{source}'. An attribute step must be the last step of an element path."
                    )));
                }
                steps.push(SelectorStep::Attribute(parse_name(
                    attribute, namespaces, source,
                )?));
            } else {
                steps.push(SelectorStep::Element(parse_name(segment, namespaces, source)?));
            }
        }

        Ok(Self {
            source: source.to_string(),
            steps,
        })
    }

    /// Return this path with the target element step moved into `uri` when
    /// it was written without a prefix. Paths ending in an attribute step
    /// are returned unchanged.
    #[must_use]
    pub fn with_default_namespace(mut self, uri: &str, prefix: &str) -> Self {
        if let Some(SelectorStep::Element(name)) = self.steps.last_mut() {
            if name.namespace().is_none() && name.prefix().is_none() {
                *name = name
                    .clone()
                    .with_namespace(uri, Some(prefix.to_string()));
            }
        }
        self
    }

    /// The selector text as written.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn steps(&self) -> &[SelectorStep] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Name of the document root element this path starts at.
    #[must_use]
    pub fn root(&self) -> &QName {
        // Parsing guarantees a first element step.
        self.steps[0].name()
    }

    /// The last step of the path.
    #[must_use]
    pub fn target(&self) -> &SelectorStep {
        &self.steps[self.steps.len() - 1]
    }

    /// Element steps, excluding a trailing attribute step.
    pub fn element_steps(&self) -> impl Iterator<Item = &QName> {
        self.steps.iter().filter_map(|step| match step {
            SelectorStep::Element(name) => Some(name),
            SelectorStep::Attribute(_) => None,
        })
    }

    /// The trailing attribute step, if any.
    #[must_use]
    pub fn attribute(&self) -> Option<&QName> {
        match self.target() {
            SelectorStep::Attribute(name) => Some(name),
            SelectorStep::Element(_) => None,
        }
    }

    /// Check whether this path selects the element at `element_path`.
    #[must_use]
    pub fn matches_element(&self, element_path: &[QName]) -> bool {
        self.attribute().is_none()
            && self.steps.len() == element_path.len()
            && self
                .element_steps()
                .zip(element_path)
                .all(|(pattern, actual)| pattern.matches(actual))
    }

    /// Check whether this path selects attribute `attribute` of the element
    /// at `element_path`.
    #[must_use]
    pub fn matches_attribute(&self, element_path: &[QName], attribute: &QName) -> bool {
        match self.attribute() {
            Some(pattern) => {
                self.steps.len() == element_path.len() + 1
                    && pattern.matches(attribute)
                    && self
                        .element_steps()
                        .zip(element_path)
                        .all(|(pattern, actual)| pattern.matches(actual))
            }
            None => false,
        }
    }
}

impl fmt::Display for SelectorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_name(raw: &str, namespaces: &BTreeMap<String, String>, source: &str) -> Result<QName> {
    match raw.split_once(':') {
        Some((prefix, local)) => {
            validate_ncname(local)?;
            let uri = namespaces.get(prefix).ok_or_else(|| {
                BindingError::Config(format!(
                    "Undeclared namespace prefix '{prefix}' in selector '{source}'."
                ))
            })?;
            Ok(QName::new(
                Some(uri.clone()),
                local,
                Some(prefix.to_string()),
            ))
        }
        None => {
            validate_ncname(raw)?;
            Ok(QName::local(raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_namespaces() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn test_parse_element_path() {
        let path = SelectorPath::parse("/order/header/customer", &no_namespaces()).unwrap();
        let names: Vec<&str> = path.element_steps().map(QName::local_name).collect();
        assert_eq!(names, vec!["order", "header", "customer"]);
        assert!(path.attribute().is_none());
        assert_eq!(path.to_string(), "/order/header/customer");
    }

    #[test]
    fn test_document_selector_rejected() {
        let err = SelectorPath::parse("#document", &no_namespaces()).unwrap_err();
        assert!(matches!(err, BindingError::Config(_)));
        assert!(SelectorPath::parse("/#document/order", &no_namespaces()).is_err());
    }

    #[test]
    fn test_relative_selector_rejected() {
        let err = SelectorPath::parse("order/header", &no_namespaces()).unwrap_err();
        assert!(err.to_string().contains("must be absolute"));
    }

    #[test]
    fn test_attribute_position() {
        assert!(SelectorPath::parse("/@id", &no_namespaces()).is_err());
        assert!(SelectorPath::parse("/order/@id/header", &no_namespaces()).is_err());
        assert!(SelectorPath::parse("/order/@id", &no_namespaces()).is_ok());
    }

    #[test]
    fn test_undeclared_prefix() {
        let err = SelectorPath::parse("/x:order", &no_namespaces()).unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_with_default_namespace() {
        let path = SelectorPath::parse("/order/customer", &no_namespaces())
            .unwrap()
            .with_default_namespace("urn:c", "c");
        let names: Vec<&QName> = path.element_steps().collect();
        assert_eq!(names[0].namespace(), None);
        assert_eq!(names[1].namespace(), Some("urn:c"));
        assert_eq!(names[1].prefix(), Some("c"));
    }

    #[test]
    fn test_matches() {
        let namespaces = BTreeMap::from([("o".to_string(), "urn:o".to_string())]);
        let path = SelectorPath::parse("/o:order/header/@id", &namespaces).unwrap();
        let element_path = vec![
            QName::new(Some("urn:o".into()), "order", None),
            QName::local("header"),
        ];
        assert!(path.matches_attribute(&element_path, &QName::local("id")));
        assert!(!path.matches_attribute(&element_path, &QName::local("ref")));
        assert!(!path.matches_element(&element_path));

        let header = SelectorPath::parse("/o:order/header", &namespaces).unwrap();
        assert!(header.matches_element(&element_path));
        assert!(!header.matches_element(&element_path[..1]));
    }
}
