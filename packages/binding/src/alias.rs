//! Strategies selected by alias.
//!
//! Bean writers and bean factories are both picked by a short alias in the
//! binding configuration. An empty alias and the reserved `default` alias
//! select the registry's fallback.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::config::{validate_alias, DEFAULT_ALIAS};
use crate::error::{BindingError, Result};

type AliasTable<T> = std::result::Result<HashMap<String, T>, String>;

/// Constructors by alias.
///
/// Declarations are checked and indexed once, on first resolution. A
/// duplicate or reserved alias fails every lookup, so a broken registry is
/// never half usable.
#[derive(Clone)]
pub struct AliasRegistry<T> {
    kind: &'static str,
    fallback: &'static str,
    declarations: Vec<(String, T)>,
    table: OnceLock<AliasTable<T>>,
}

impl<T> AliasRegistry<T> {
    /// Empty registry. `kind` names the strategy in error messages and
    /// `fallback` is the alias `default` resolves to.
    #[must_use]
    pub fn new(kind: &'static str, fallback: &'static str) -> Self {
        Self {
            kind,
            fallback,
            declarations: Vec::new(),
            table: OnceLock::new(),
        }
    }

    /// Declare an alias.
    #[must_use]
    pub fn with(mut self, alias: impl Into<String>, constructor: T) -> Self {
        self.declarations.push((alias.into(), constructor));
        self.table = OnceLock::new();
        self
    }

    /// Declared aliases, in declaration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.declarations.iter().map(|(alias, _)| alias.as_str())
    }
}

impl<T: Copy> AliasRegistry<T> {
    /// Look up the constructor for `alias`.
    ///
    /// # Errors
    /// Returns `BindingError::Config` for an unknown alias, and for every
    /// lookup when the declarations contain a duplicate or reserved alias.
    pub fn resolve(&self, alias: &str) -> Result<T> {
        let table = self
            .table
            .get_or_init(|| self.index())
            .as_ref()
            .map_err(|msg| BindingError::Config(msg.clone()))?;

        let alias = match alias.trim() {
            "" | DEFAULT_ALIAS => self.fallback,
            other => other,
        };
        table.get(alias).copied().ok_or_else(|| {
            BindingError::Config(format!("Unknown {} alias '{alias}'.", self.kind))
        })
    }

    fn index(&self) -> AliasTable<T> {
        let mut table = HashMap::with_capacity(self.declarations.len());
        for (alias, constructor) in &self.declarations {
            validate_alias(alias).map_err(|e| e.to_string())?;
            if table.insert(alias.clone(), *constructor).is_some() {
                return Err(format!("Duplicate {} alias '{alias}'.", self.kind));
            }
        }
        tracing::debug!(kind = self.kind, aliases = table.len(), "Aliases indexed");
        Ok(table)
    }
}

impl<T> fmt::Debug for AliasRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliasRegistry")
            .field("kind", &self.kind)
            .field("fallback", &self.fallback)
            .field("aliases", &self.aliases().collect::<Vec<_>>())
            .finish()
    }
}
