//! Bean factories: beans created from a factory definition instead of as
//! empty instances of their declared type.
//!
//! A definition reads `[alias:]body`. The alias picks a parser from the
//! [`FactoryParserRegistry`]; without one the `basic` parser reads the body
//! as a type name with optional preset property values:
//!
//! ```text
//! Header(priority=false, customerName=Anonymous)
//! basic:Header
//! ```

use std::fmt;
use std::sync::Arc;

use super::{BeanInstance, BeanRef, ConverterRegistry, TypeRegistry, Value, ValueType};
use crate::alias::AliasRegistry;
use crate::config::BASIC_FACTORY_ALIAS;
use crate::error::{BindingError, Result};

/// Creates the beans of one bean model.
pub trait BeanFactory: fmt::Debug + Send + Sync {
    /// Create a new bean.
    fn create(&self) -> Result<BeanRef>;

    /// Type of the beans this factory creates.
    fn type_name(&self) -> &str;
}

/// Turns the body of a factory definition into a factory.
pub type FactoryParser =
    fn(&str, &TypeRegistry, &ConverterRegistry) -> Result<Arc<dyn BeanFactory>>;

/// Creates instances of a declared type with preset property values.
#[derive(Debug, Clone)]
pub struct BasicBeanFactory {
    type_name: String,
    presets: Vec<(String, Value)>,
}

impl BasicBeanFactory {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            presets: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_preset(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.presets.push((property.into(), value.into()));
        self
    }

    /// [`FactoryParser`] for the `basic` alias.
    ///
    /// # Errors
    /// - `BindingError::Config` for a malformed body, an unknown type or a
    ///   preset on a bean property.
    /// - `BindingError::BindingResolution` for a preset on an undeclared
    ///   property.
    /// - `BindingError::Conversion` when a preset value does not convert to
    ///   the property type.
    pub fn parse(
        body: &str,
        types: &TypeRegistry,
        converters: &ConverterRegistry,
    ) -> Result<Arc<dyn BeanFactory>> {
        let (type_name, presets) = match body.split_once('(') {
            Some((name, rest)) => {
                let presets = rest
                    .trim_end()
                    .strip_suffix(')')
                    .ok_or_else(|| invalid_definition(body, "the preset list is not closed"))?;
                (name.trim(), presets)
            }
            None => (body.trim(), ""),
        };
        types.require(type_name)?;

        let mut factory = Self::new(type_name);
        for preset in presets.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (property, raw) = preset.split_once('=').ok_or_else(|| {
                invalid_definition(body, &format!("preset '{preset}' is not property=value"))
            })?;
            let property = property.trim();
            let value_type = types.resolve_setter(type_name, property)?.value_type;
            if !value_type.is_scalar() {
                return Err(invalid_definition(
                    body,
                    &format!("property '{property}' holds a bean and cannot be preset"),
                ));
            }
            let converter = converters
                .lookup(ValueType::Text, value_type, None)
                .ok_or_else(|| {
                    invalid_definition(body, &format!("no converter for property '{property}'"))
                })?;
            let value = converter.convert(&Value::from(raw.trim()))?;
            factory = factory.with_preset(property, value);
        }
        Ok(Arc::new(factory))
    }
}

impl BeanFactory for BasicBeanFactory {
    fn create(&self) -> Result<BeanRef> {
        let mut instance = BeanInstance::new(self.type_name.as_str());
        for (property, value) in &self.presets {
            instance.set(property.as_str(), value.clone());
        }
        Ok(BeanRef::new(instance))
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }
}

fn invalid_definition(definition: &str, reason: &str) -> BindingError {
    BindingError::Config(format!(
        "Invalid factory definition '{definition}': {reason}."
    ))
}

/// Factory definition parsers by alias.
///
/// The reserved `default` alias resolves to the `basic` parser.
#[derive(Debug, Clone)]
pub struct FactoryParserRegistry {
    parsers: AliasRegistry<FactoryParser>,
}

impl FactoryParserRegistry {
    /// Registry without any parsers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            parsers: AliasRegistry::new("bean factory", BASIC_FACTORY_ALIAS),
        }
    }

    /// Declare a parser alias.
    #[must_use]
    pub fn with_parser(mut self, alias: impl Into<String>, parser: FactoryParser) -> Self {
        self.parsers = self.parsers.with(alias, parser);
        self
    }

    /// Look up the parser for `alias`.
    pub fn resolve(&self, alias: &str) -> Result<FactoryParser> {
        self.parsers.resolve(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.parsers.aliases()
    }

    /// Parse a complete `[alias:]body` definition.
    ///
    /// # Errors
    /// Returns `BindingError::Config` for an unknown alias and any error of
    /// the selected parser.
    pub fn parse(
        &self,
        definition: &str,
        types: &TypeRegistry,
        converters: &ConverterRegistry,
    ) -> Result<Arc<dyn BeanFactory>> {
        let (alias, body) = split_definition(definition);
        let parser = self.resolve(alias)?;
        parser(body, types, converters)
    }
}

impl Default for FactoryParserRegistry {
    fn default() -> Self {
        Self::empty().with_parser(BASIC_FACTORY_ALIAS, BasicBeanFactory::parse)
    }
}

/// Split off the alias. A colon inside the preset list is not an alias
/// separator.
fn split_definition(definition: &str) -> (&str, &str) {
    match definition.split_once(':') {
        Some((alias, body)) if !alias.contains('(') => (alias.trim(), body.trim()),
        _ => ("", definition.trim()),
    }
}
