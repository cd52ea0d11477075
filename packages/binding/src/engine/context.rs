//! Shared registries for one binding engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bean::{ConverterRegistry, FactoryParserRegistry, TypeRegistry};
use crate::dynamic::WriterFactoryRegistry;
use crate::error::{BindingError, Result};

/// Everything a binding engine resolves against: bean types, converters,
/// namespace prefixes, writer strategies and bean factory parsers.
#[derive(Debug, Clone, Default)]
pub struct ApplicationContext {
    types: TypeRegistry,
    converters: ConverterRegistry,
    namespaces: BTreeMap<String, String>,
    writer_factories: Arc<WriterFactoryRegistry>,
    factory_parsers: Arc<FactoryParserRegistry>,
}

impl ApplicationContext {
    /// Context with the built-in converters and writers and no types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    #[must_use]
    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    #[must_use]
    pub fn with_writer_factories(mut self, factories: WriterFactoryRegistry) -> Self {
        self.writer_factories = Arc::new(factories);
        self
    }

    #[must_use]
    pub fn with_factory_parsers(mut self, parsers: FactoryParserRegistry) -> Self {
        self.factory_parsers = Arc::new(parsers);
        self
    }

    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    #[must_use]
    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Namespace prefix table (prefix to URI).
    #[must_use]
    pub fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    /// Bind a namespace prefix.
    ///
    /// # Errors
    /// Returns `BindingError::Config` when the prefix is already bound to a
    /// different URI.
    pub fn register_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        match self.namespaces.get(prefix) {
            Some(existing) if existing != uri => Err(BindingError::Config(format!(
                "Namespace prefix '{prefix}' is bound to both '{existing}' and '{uri}'."
            ))),
            Some(_) => Ok(()),
            None => {
                self.namespaces.insert(prefix.to_string(), uri.to_string());
                Ok(())
            }
        }
    }

    /// Reverse of the prefix table: namespace URI to the first prefix bound
    /// to it.
    #[must_use]
    pub fn prefixes_by_uri(&self) -> BTreeMap<String, String> {
        let mut prefixes = BTreeMap::new();
        for (prefix, uri) in &self.namespaces {
            prefixes
                .entry(uri.clone())
                .or_insert_with(|| prefix.clone());
        }
        prefixes
    }

    #[must_use]
    pub fn writer_factories(&self) -> &WriterFactoryRegistry {
        &self.writer_factories
    }

    #[must_use]
    pub fn factory_parsers(&self) -> &FactoryParserRegistry {
        &self.factory_parsers
    }
}
