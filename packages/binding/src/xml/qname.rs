//! Qualified XML names.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A namespace-qualified XML name.
///
/// Two names are equal when their namespace URI and local name are equal.
/// The prefix is presentation only and takes no part in equality.
#[derive(Debug, Clone)]
pub struct QName {
    namespace: Option<String>,
    local: String,
    prefix: Option<String>,
}

impl QName {
    /// Create a name without a namespace.
    #[must_use]
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
            prefix: None,
        }
    }

    /// Create a name in a namespace, with an optional prefix.
    #[must_use]
    pub fn new(
        namespace: Option<String>,
        local: impl Into<String>,
        prefix: Option<String>,
    ) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()),
            local: local.into(),
            prefix: prefix.filter(|p| !p.is_empty()),
        }
    }

    /// Return this name moved into a namespace.
    #[must_use]
    pub fn with_namespace(mut self, uri: impl Into<String>, prefix: Option<String>) -> Self {
        self.namespace = Some(uri.into());
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local
    }

    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Name as written with its own prefix, e.g. `o:order`.
    #[must_use]
    pub fn prefixed_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }

    /// Check whether two names can denote the same node.
    ///
    /// Local names must match. A name without a namespace is compatible with
    /// any namespace; two namespaced names must agree.
    #[must_use]
    pub fn is_compatible(&self, other: &QName) -> bool {
        if self.local != other.local {
            return false;
        }
        match (&self.namespace, &other.namespace) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Check whether this name, used as a pattern, matches a name read from
    /// a document. A pattern without a namespace matches on local name only.
    #[must_use]
    pub fn matches(&self, actual: &QName) -> bool {
        self.local == actual.local
            && (self.namespace.is_none() || self.namespace == actual.namespace)
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local == other.local
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local.hash(state);
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.namespace, &self.prefix) {
            (_, Some(_)) => f.write_str(&self.prefixed_name()),
            (Some(ns), None) => write!(f, "{{{ns}}}{}", self.local),
            (None, None) => f.write_str(&self.local),
        }
    }
}
