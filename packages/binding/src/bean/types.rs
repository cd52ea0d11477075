//! Declared bean types and property resolution.
//!
//! The registry stands in for runtime introspection: every bindable type is
//! declared up front with its properties, and getters and setters are
//! resolved by name against those declarations.

use std::collections::HashMap;

use super::{BeanInstance, BeanRef, ValueType};
use crate::error::{BindingError, Result};

/// A declared property of a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub value_type: ValueType,
}

/// Namespace a type is written in when it is registered programmatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultNamespace {
    pub uri: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Struct { properties: Vec<PropertyDef> },
    /// Collections hold ordered items and declare no properties.
    Collection,
}

/// A bindable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    name: String,
    kind: TypeKind,
    default_namespace: Option<DefaultNamespace>,
}

impl TypeDef {
    /// Declare a struct type with no properties yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Struct {
                properties: Vec::new(),
            },
            default_namespace: None,
        }
    }

    /// Declare a collection type.
    #[must_use]
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Collection,
            default_namespace: None,
        }
    }

    /// Add a property. Has no effect on collection types.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        if let TypeKind::Struct { properties } = &mut self.kind {
            properties.push(PropertyDef {
                name: name.into(),
                value_type,
            });
        }
        self
    }

    #[must_use]
    pub fn with_default_namespace(mut self, uri: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.default_namespace = Some(DefaultNamespace {
            uri: uri.into(),
            prefix: prefix.into(),
        });
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, TypeKind::Collection)
    }

    #[must_use]
    pub fn default_namespace(&self) -> Option<&DefaultNamespace> {
        self.default_namespace.as_ref()
    }

    #[must_use]
    pub fn find_property(&self, name: &str) -> Option<&PropertyDef> {
        match &self.kind {
            TypeKind::Struct { properties } => properties.iter().find(|p| p.name == name),
            TypeKind::Collection => None,
        }
    }
}

/// Registry of bindable types, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDef>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type.
    ///
    /// Registering an identical declaration twice is allowed, since several
    /// binding configurations may declare a shared type.
    ///
    /// # Errors
    /// Returns `BindingError::Config` when a different declaration already
    /// uses the name.
    pub fn register(&mut self, def: TypeDef) -> Result<()> {
        match self.types.get(def.name()) {
            Some(existing) if *existing != def => Err(BindingError::Config(format!(
                "Conflicting declarations for bean type '{}'.",
                def.name()
            ))),
            Some(_) => Ok(()),
            None => {
                self.types.insert(def.name().to_string(), def);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Look up a type that must be declared.
    pub fn require(&self, name: &str) -> Result<&TypeDef> {
        self.get(name)
            .ok_or_else(|| BindingError::Config(format!("Unknown bean type '{name}'.")))
    }

    /// Resolve the getter for `property` on `type_name`.
    ///
    /// # Errors
    /// Returns `BindingError::BindingResolution` when the type is unknown,
    /// is a collection or declares no such property.
    pub fn resolve_getter(&self, type_name: &str, property: &str) -> Result<&PropertyDef> {
        self.get(type_name)
            .and_then(|def| def.find_property(property))
            .ok_or_else(|| BindingError::BindingResolution {
                type_name: type_name.to_string(),
                property: property.to_string(),
            })
    }

    /// Resolve the setter for `property` on `type_name`.
    ///
    /// Properties are read-write, so this resolves the same declaration as
    /// [`TypeRegistry::resolve_getter`].
    pub fn resolve_setter(&self, type_name: &str, property: &str) -> Result<&PropertyDef> {
        self.resolve_getter(type_name, property)
    }

    /// Create an empty instance of a declared type.
    pub fn instantiate(&self, type_name: &str) -> Result<BeanRef> {
        let def = self.require(type_name)?;
        Ok(BeanRef::new(BeanInstance::new(def.name())))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types
            .register(TypeDef::new("Header").property("customerName", ValueType::Text))
            .unwrap();
        types.register(TypeDef::collection("OrderItems")).unwrap();
        types
    }

    #[test]
    fn test_resolve_getter() {
        let types = registry();
        let prop = types.resolve_getter("Header", "customerName").unwrap();
        assert_eq!(prop.value_type, ValueType::Text);
    }

    #[test]
    fn test_resolve_getter_missing_property() {
        let types = registry();
        let err = types.resolve_getter("Header", "name").unwrap_err();
        assert!(matches!(err, BindingError::BindingResolution { .. }));
        assert!(types.resolve_setter("OrderItems", "size").is_err());
    }

    #[test]
    fn test_conflicting_registration() {
        let mut types = registry();
        assert!(types
            .register(TypeDef::new("Header").property("customerName", ValueType::Text))
            .is_ok());
        assert!(types.register(TypeDef::new("Header")).is_err());
    }

    #[test]
    fn test_instantiate() {
        let types = registry();
        let bean = types.instantiate("Header").unwrap();
        assert_eq!(bean.type_name(), "Header");
        assert!(types.instantiate("Missing").is_err());
    }
}
