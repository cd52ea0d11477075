//! Declarative binding configuration.
//!
//! A binding configuration is a YAML document declaring namespace prefixes,
//! bean types, bean creation and population rules, and bean writers:
//!
//! ```yaml
//! namespaces:
//!   o: http://example.com/order
//! types:
//!   - name: Header
//!     properties:
//!       customerName: text
//! beans:
//!   - beanId: header
//!     class: Header
//!     createOnElement: /o:order/o:header
//!     values:
//!       - property: customerName
//!         data: /o:order/o:header/o:customer
//! writers:
//!   - class: Header
//!     writer: xml
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::bean::{ConverterConfig, TypeDef, ValueType};
use crate::config::DEFAULT_ALIAS;
use crate::error::{BindingError, Result};

/// A complete binding configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BindingConfig {
    /// Namespace prefixes usable in selectors (prefix to URI).
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
    #[serde(default)]
    pub types: Vec<TypeConfig>,
    #[serde(default)]
    pub beans: Vec<BeanConfig>,
    #[serde(default)]
    pub writers: Vec<WriterConfig>,
}

/// A bean type declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TypeConfig {
    pub name: String,
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, ValueType>,
    #[serde(default)]
    pub default_namespace: Option<DefaultNamespaceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultNamespaceConfig {
    pub uri: String,
    pub prefix: String,
}

/// Creation and population rules for one bean.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BeanConfig {
    pub bean_id: String,
    pub class: String,
    pub create_on_element: String,
    /// Keep the bean in the bind result.
    #[serde(default = "default_retain")]
    pub retain: bool,
    #[serde(default)]
    pub values: Vec<ValueConfig>,
    #[serde(default)]
    pub wirings: Vec<WiringConfig>,
    /// Factory definition, `[alias:]body`. Beans without one are created
    /// empty.
    #[serde(default)]
    pub factory: Option<String>,
    /// Namespace (id, URI) of the descriptor namespace that declared this
    /// bean, if any.
    #[serde(skip)]
    pub owning_namespace: Option<(String, String)>,
}

fn default_retain() -> bool {
    true
}

/// Binds element text or an attribute value to a property.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ValueConfig {
    /// Target property. Absent for values appended to a collection.
    #[serde(default)]
    pub property: Option<String>,
    pub data: String,
    /// Decoder parameters, e.g. `format` for dates.
    #[serde(default)]
    pub decoder: ConverterConfig,
    /// Used when the selected value is empty.
    #[serde(default)]
    pub default: Option<String>,
}

/// Wires another bean into a property, or into a collection when no
/// property is named.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WiringConfig {
    #[serde(default)]
    pub property: Option<String>,
    pub bean_id_ref: String,
}

/// Assigns a writer to a bean type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WriterConfig {
    pub class: String,
    #[serde(default = "default_writer")]
    pub writer: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Namespace URI of the descriptor namespace that declared this writer.
    #[serde(skip)]
    pub namespace: Option<String>,
}

fn default_writer() -> String {
    DEFAULT_ALIAS.to_string()
}

impl BindingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML binding configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Parse a YAML binding configuration from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_yaml_ng::from_slice(bytes)?)
    }

    #[must_use]
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, def: TypeConfig) -> Self {
        self.types.push(def);
        self
    }

    #[must_use]
    pub fn with_bean(mut self, bean: BeanConfig) -> Self {
        self.beans.push(bean);
        self
    }

    #[must_use]
    pub fn with_writer(mut self, writer: WriterConfig) -> Self {
        self.writers.push(writer);
        self
    }

    /// Mark every bean and writer as owned by a descriptor namespace and
    /// make the namespace id usable as a selector prefix.
    #[must_use]
    pub fn owned_by(mut self, namespace_id: &str, uri: &str) -> Self {
        self.namespaces
            .entry(namespace_id.to_string())
            .or_insert_with(|| uri.to_string());
        for bean in &mut self.beans {
            bean.owning_namespace = Some((namespace_id.to_string(), uri.to_string()));
        }
        for writer in &mut self.writers {
            writer.namespace = Some(uri.to_string());
        }
        self
    }

    /// Merge another configuration into this one.
    ///
    /// # Errors
    /// Returns `BindingError::Config` when both bind a prefix to different
    /// namespace URIs.
    pub fn merge(&mut self, other: BindingConfig) -> Result<()> {
        for (prefix, uri) in other.namespaces {
            match self.namespaces.get(&prefix) {
                Some(existing) if *existing != uri => {
                    return Err(BindingError::Config(format!(
                        "Namespace prefix '{prefix}' is bound to both '{existing}' and '{uri}'."
                    )));
                }
                Some(_) => {}
                None => {
                    self.namespaces.insert(prefix, uri);
                }
            }
        }
        self.types.extend(other.types);
        self.beans.extend(other.beans);
        self.writers.extend(other.writers);
        Ok(())
    }
}

impl TypeConfig {
    /// Convert to a registry declaration.
    #[must_use]
    pub fn to_type_def(&self) -> TypeDef {
        let mut def = if self.collection {
            TypeDef::collection(&self.name)
        } else {
            self.properties
                .iter()
                .fold(TypeDef::new(&self.name), |def, (name, value_type)| {
                    def.property(name, *value_type)
                })
        };
        if let Some(ns) = &self.default_namespace {
            def = def.with_default_namespace(&ns.uri, &ns.prefix);
        }
        def
    }
}

impl BeanConfig {
    #[must_use]
    pub fn new(
        bean_id: impl Into<String>,
        class: impl Into<String>,
        create_on_element: impl Into<String>,
    ) -> Self {
        Self {
            bean_id: bean_id.into(),
            class: class.into(),
            create_on_element: create_on_element.into(),
            retain: true,
            values: Vec::new(),
            wirings: Vec::new(),
            factory: None,
            owning_namespace: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: ValueConfig) -> Self {
        self.values.push(value);
        self
    }

    #[must_use]
    pub fn with_wiring(mut self, wiring: WiringConfig) -> Self {
        self.wirings.push(wiring);
        self
    }

    #[must_use]
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    #[must_use]
    pub fn with_factory(mut self, definition: impl Into<String>) -> Self {
        self.factory = Some(definition.into());
        self
    }
}

impl ValueConfig {
    #[must_use]
    pub fn new(property: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            property: Some(property.into()),
            data: data.into(),
            decoder: ConverterConfig::new(),
            default: None,
        }
    }

    /// A value appended to a collection bean.
    #[must_use]
    pub fn item(data: impl Into<String>) -> Self {
        Self {
            property: None,
            ..Self::new("", data)
        }
    }

    #[must_use]
    pub fn with_decoder_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.decoder.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl WiringConfig {
    #[must_use]
    pub fn new(property: impl Into<String>, bean_id_ref: impl Into<String>) -> Self {
        Self {
            property: Some(property.into()),
            bean_id_ref: bean_id_ref.into(),
        }
    }

    /// Wire the referenced bean into a collection.
    #[must_use]
    pub fn item(bean_id_ref: impl Into<String>) -> Self {
        Self {
            property: None,
            bean_id_ref: bean_id_ref.into(),
        }
    }
}

impl WriterConfig {
    #[must_use]
    pub fn new(class: impl Into<String>, writer: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            writer: writer.into(),
            params: BTreeMap::new(),
            namespace: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::TypeKind;

    const YAML: &str = r#"
namespaces:
  o: http://example.com/order
types:
  - name: Header
    properties:
      customerName: text
      date: date
  - name: Items
    collection: true
beans:
  - beanId: header
    class: Header
    createOnElement: /o:order/o:header
    factory: "Header(customerName=unknown)"
    values:
      - property: date
        data: /o:order/o:header/@date
        decoder:
          format: "%d-%m-%Y"
  - beanId: items
    class: Items
    createOnElement: /o:order/o:items
    retain: false
    wirings:
      - beanIdRef: item
writers:
  - class: Header
"#;

    #[test]
    fn test_from_yaml() {
        let config = BindingConfig::from_yaml(YAML).unwrap();
        assert_eq!(
            config.namespaces.get("o").map(String::as_str),
            Some("http://example.com/order")
        );
        assert_eq!(config.beans.len(), 2);

        let header = &config.beans[0];
        assert!(header.retain);
        assert_eq!(header.factory.as_deref(), Some("Header(customerName=unknown)"));
        assert_eq!(header.values[0].decoder.get("format").map(String::as_str), Some("%d-%m-%Y"));

        let items = &config.beans[1];
        assert!(!items.retain);
        assert_eq!(items.factory, None);
        assert_eq!(items.wirings[0].property, None);

        assert_eq!(config.writers[0].writer, DEFAULT_ALIAS);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = BindingConfig::from_yaml("beans: []\nbogus: 1\n").unwrap_err();
        assert!(matches!(err, BindingError::Yaml(_)));
    }

    #[test]
    fn test_to_type_def() {
        let config = BindingConfig::from_yaml(YAML).unwrap();
        let header = config.types[0].to_type_def();
        assert!(header.find_property("customerName").is_some());
        assert!(matches!(config.types[1].to_type_def().kind(), TypeKind::Collection));
    }

    #[test]
    fn test_owned_by() {
        let config = BindingConfig::from_yaml(YAML)
            .unwrap()
            .owned_by("order", "http://example.com/order");
        assert!(config.namespaces.contains_key("order"));
        assert_eq!(
            config.beans[0].owning_namespace,
            Some(("order".to_string(), "http://example.com/order".to_string()))
        );
        assert_eq!(
            config.writers[0].namespace.as_deref(),
            Some("http://example.com/order")
        );
    }

    #[test]
    fn test_merge_conflicting_prefix() {
        let mut a = BindingConfig::new().with_namespace("x", "urn:a");
        let b = BindingConfig::new().with_namespace("x", "urn:b");
        assert!(a.merge(b).is_err());

        let c = BindingConfig::new()
            .with_namespace("x", "urn:a")
            .with_bean(BeanConfig::new("a", "A", "/a"));
        a.merge(c).unwrap();
        assert_eq!(a.beans.len(), 1);
    }
}
