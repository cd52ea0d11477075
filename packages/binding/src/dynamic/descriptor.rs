//! Namespace descriptors and the composition of their resources.
//!
//! A descriptor is a flat property set declaring configuration namespaces:
//!
//! ```text
//! order.namespace=urn:example:order
//! order.schemaLocation=schemas/order.xsd
//! order.bindingConfigLocation=bindings/order.yaml
//! order.order=10
//! ```
//!
//! Any number of descriptors can be combined. Their namespaces are sorted by
//! order, and the schema and binding configuration of each are merged into
//! one composite schema and one binding engine.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::resolver::{DescriptorResolver, EntityResolver, ResourceKind};
use super::schema::CompositeSchema;
use super::writer::BeanWriterTable;
use crate::binding::XmlBinding;
use crate::config::{
    parse_order, DESCRIPTOR_BINDING_CONFIG_LOCATION_POSTFIX, DESCRIPTOR_NAMESPACE_POSTFIX,
    DESCRIPTOR_ORDER_POSTFIX, DESCRIPTOR_SCHEMA_LOCATION_POSTFIX,
};
use crate::engine::{ApplicationContext, BindingEngine, BindingEngineBuilder};
use crate::error::{BindingError, Result};
use crate::rules::BindingConfig;

/// Key-value pairs of one descriptor, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(String, String)>,
}

impl Properties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` lines. `key: value` is accepted too; lines starting
    /// with `#` or `!` are comments. A later duplicate key replaces the
    /// earlier value.
    ///
    /// # Examples
    /// ```
    /// use beanbinder::dynamic::Properties;
    ///
    /// let props = Properties::parse("# orders\na.namespace = urn:a\na.order: 5\n");
    /// assert_eq!(props.get("a.namespace"), Some("urn:a"));
    /// assert_eq!(props.get("a.order"), Some("5"));
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut properties = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = match line.find(['=', ':']) {
                Some(split) => (&line[..split], &line[split + 1..]),
                None => (line, ""),
            };
            properties = properties.with(key.trim(), value.trim());
        }
        properties
    }

    /// Read and parse a descriptor file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            BindingError::io(format!(
                "Failed to read descriptor '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Ok(Self::parse(&text))
    }

    /// Set a property.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One configuration namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub uri: String,
    pub id: String,
    pub order: i32,
}

/// Collect the namespaces of every descriptor, sorted by order.
///
/// Equal orders keep declaration order. A URI declared more than once keeps
/// its first position after sorting.
///
/// # Errors
/// Returns `BindingError::Config` for an order that is not an integer.
pub fn resolve_namespaces(descriptors: &[Properties]) -> Result<Vec<Namespace>> {
    let mut namespaces = Vec::new();
    for descriptor in descriptors {
        for (key, uri) in descriptor.iter() {
            if !key.ends_with(DESCRIPTOR_NAMESPACE_POSTFIX) {
                if !is_descriptor_key(key) {
                    tracing::warn!(key = %key, "Unknown descriptor key");
                }
                continue;
            }
            let id = descriptor_namespace_id(uri, descriptor).ok_or_else(|| {
                BindingError::Config(format!(
                    "Unable to resolve namespace ID for namespace URI '{uri}'."
                ))
            })?;
            let order = parse_order(
                &id,
                descriptor.get(&format!("{id}{DESCRIPTOR_ORDER_POSTFIX}")),
            )?;
            namespaces.push(Namespace {
                uri: uri.to_string(),
                id,
                order,
            });
        }
    }

    namespaces.sort_by_key(|ns| ns.order);
    let mut resolved: Vec<Namespace> = Vec::with_capacity(namespaces.len());
    for namespace in namespaces {
        if resolved.iter().any(|ns| ns.uri == namespace.uri) {
            tracing::debug!(namespace = %namespace.uri, id = %namespace.id, "Duplicate namespace declaration ignored");
            continue;
        }
        resolved.push(namespace);
    }
    Ok(resolved)
}

fn is_descriptor_key(key: &str) -> bool {
    [
        DESCRIPTOR_SCHEMA_LOCATION_POSTFIX,
        DESCRIPTOR_BINDING_CONFIG_LOCATION_POSTFIX,
        DESCRIPTOR_ORDER_POSTFIX,
    ]
    .iter()
    .any(|postfix| key.ends_with(postfix))
}

fn descriptor_namespace_id(uri: &str, descriptor: &Properties) -> Option<String> {
    descriptor.iter().find_map(|(key, value)| {
        key.strip_suffix(DESCRIPTOR_NAMESPACE_POSTFIX)
            .filter(|_| value == uri)
            .map(str::to_string)
    })
}

/// Id under which the first descriptor declaring `uri` declares it.
#[must_use]
pub fn namespace_id(uri: &str, descriptors: &[Properties]) -> Option<String> {
    descriptors
        .iter()
        .find_map(|descriptor| descriptor_namespace_id(uri, descriptor))
}

/// `<id>.schemaLocation` from the first descriptor that has it.
#[must_use]
pub fn schema_location<'a>(id: &str, descriptors: &'a [Properties]) -> Option<&'a str> {
    descriptor_value(&format!("{id}{DESCRIPTOR_SCHEMA_LOCATION_POSTFIX}"), descriptors)
}

/// `<id>.bindingConfigLocation` from the first descriptor that has it.
#[must_use]
pub fn binding_config_location<'a>(id: &str, descriptors: &'a [Properties]) -> Option<&'a str> {
    descriptor_value(
        &format!("{id}{DESCRIPTOR_BINDING_CONFIG_LOCATION_POSTFIX}"),
        descriptors,
    )
}

fn descriptor_value<'a>(key: &str, descriptors: &'a [Properties]) -> Option<&'a str> {
    descriptors.iter().find_map(|descriptor| descriptor.get(key))
}

/// Everything composed from a set of descriptors: the ordered namespaces,
/// the composite schema, the binding engine and its XML binding, and the
/// bean writer table.
#[derive(Debug)]
pub struct Descriptor {
    namespaces: Vec<Namespace>,
    schema: Option<CompositeSchema>,
    engine: Arc<BindingEngine>,
    binding: Arc<XmlBinding>,
    bean_writers: Arc<BeanWriterTable>,
}

impl Descriptor {
    /// Compose descriptors whose resource locations are relative to
    /// `base_dir`.
    pub fn new(descriptors: &[Properties], base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let schemas = DescriptorResolver::new(descriptors, base_dir, ResourceKind::Schema);
        let bindings = DescriptorResolver::new(descriptors, base_dir, ResourceKind::BindingConfig);
        Self::with_resolvers(
            descriptors,
            Some(&schemas as &dyn EntityResolver),
            &bindings,
            ApplicationContext::new(),
        )
    }

    /// Load descriptor files and compose them. Resource locations are
    /// relative to `base_dir`.
    pub fn load<P: AsRef<Path>>(paths: &[P], base_dir: impl AsRef<Path>) -> Result<Self> {
        if paths.is_empty() {
            return Err(BindingError::Config(
                "At least one descriptor file is required.".to_string(),
            ));
        }
        let descriptors = paths
            .iter()
            .map(Properties::load)
            .collect::<Result<Vec<_>>>()?;
        Self::new(&descriptors, base_dir)
    }

    /// Compose descriptors with explicit resolvers.
    ///
    /// Without a schema resolver no composite schema is built and documents
    /// are never validated.
    ///
    /// # Errors
    /// - `BindingError::SchemaResolution` when a resolver returns a source
    ///   without content or a resource cannot be read.
    /// - Any configuration error of the composed binding rules or writers.
    pub fn with_resolvers(
        descriptors: &[Properties],
        schema_resolver: Option<&dyn EntityResolver>,
        binding_resolver: &dyn EntityResolver,
        context: ApplicationContext,
    ) -> Result<Self> {
        if descriptors.is_empty() {
            return Err(BindingError::Config(
                "At least one descriptor is required.".to_string(),
            ));
        }
        let namespaces = resolve_namespaces(descriptors)?;

        let schema = match schema_resolver {
            Some(resolver) => Some(build_schema(&namespaces, resolver)?),
            None => None,
        };

        let mut builder = BindingEngineBuilder::new(context);
        for namespace in &namespaces {
            let Some(source) = binding_resolver.resolve(&namespace.uri)? else {
                tracing::debug!(namespace = %namespace.uri, "No binding configuration for namespace");
                continue;
            };
            let yaml = source.into_text(&namespace.uri)?;
            let config = BindingConfig::from_yaml(&yaml)?.owned_by(&namespace.id, &namespace.uri);
            builder = builder.add_config(config)?;
        }
        let engine = Arc::new(builder.build()?);
        let binding = Arc::new(XmlBinding::new(Arc::clone(&engine))?);
        let bean_writers = Arc::new(build_writer_table(&engine, &binding)?);

        tracing::debug!(
            namespaces = namespaces.len(),
            writer_types = bean_writers.len(),
            "Descriptor composed"
        );
        Ok(Self {
            namespaces,
            schema,
            engine,
            binding,
            bean_writers,
        })
    }

    /// Namespaces in resolution order.
    #[must_use]
    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    #[must_use]
    pub fn schema(&self) -> Option<&CompositeSchema> {
        self.schema.as_ref()
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<BindingEngine> {
        &self.engine
    }

    #[must_use]
    pub fn binding(&self) -> &Arc<XmlBinding> {
        &self.binding
    }

    /// Bean type name to namespace URI to writer.
    #[must_use]
    pub fn bean_writers(&self) -> &Arc<BeanWriterTable> {
        &self.bean_writers
    }
}

fn build_schema(namespaces: &[Namespace], resolver: &dyn EntityResolver) -> Result<CompositeSchema> {
    let mut schema = CompositeSchema::new();
    for namespace in namespaces {
        if let Some(source) = resolver.resolve(&namespace.uri)? {
            let xsd = source.into_text(&namespace.uri)?;
            schema.add_source(&namespace.uri, &xsd)?;
        }
    }
    Ok(schema)
}

fn build_writer_table(engine: &BindingEngine, binding: &Arc<XmlBinding>) -> Result<BeanWriterTable> {
    let factories = engine.context().writer_factories();
    let mut table: BeanWriterTable = HashMap::new();
    for config in &engine.config().writers {
        engine.context().types().require(&config.class)?;
        let constructor = factories.resolve(&config.writer)?;
        let writer = constructor(binding, &config.params)?;
        let namespace = config.namespace.clone().unwrap_or_default();

        let by_namespace = table.entry(config.class.clone()).or_default();
        if by_namespace.insert(namespace.clone(), writer).is_some() {
            return Err(BindingError::Config(format!(
                "Duplicate bean writer for type '{}' in namespace '{namespace}'.",
                config.class
            )));
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::{InputSource, MapResolver};

    #[test]
    fn test_namespaces_sorted_by_order() {
        let descriptors = [
            Properties::parse("a.namespace=urn:a\na.order=30"),
            Properties::parse("b.namespace=urn:b\nb.order=10\nc.namespace=urn:c\nc.order=20"),
        ];
        let ids: Vec<String> = resolve_namespaces(&descriptors)
            .unwrap()
            .into_iter()
            .map(|ns| ns.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_namespaces_default_order_and_dedup() {
        let descriptors = [
            Properties::parse("x.namespace=urn:x\ny.namespace=urn:y\ny.order=5"),
            Properties::parse("x2.namespace=urn:x\nx2.order=1"),
        ];
        let namespaces = resolve_namespaces(&descriptors).unwrap();
        let resolved: Vec<(&str, i32)> = namespaces
            .iter()
            .map(|ns| (ns.id.as_str(), ns.order))
            .collect();
        assert_eq!(resolved, vec![("x2", 1), ("y", 5)]);
    }

    #[test]
    fn test_invalid_order() {
        let err = resolve_namespaces(&[Properties::parse("a.namespace=urn:a\na.order=high")])
            .unwrap_err();
        assert!(err.to_string().contains("a.order"));
    }

    #[test]
    fn test_empty_binding_source_is_fatal() {
        let descriptors = [Properties::parse("a.namespace=urn:a")];
        let resolver = MapResolver::new().with_resource("urn:a", InputSource::empty());
        let err = Descriptor::with_resolvers(
            &descriptors,
            None,
            &resolver,
            ApplicationContext::new(),
        )
        .unwrap_err();
        assert!(matches!(err, BindingError::SchemaResolution { .. }));
    }

    #[test]
    fn test_writer_table_keyed_by_namespace() {
        let descriptors = [Properties::parse("o.namespace=urn:o")];
        let yaml = r#"
types:
  - name: Order
    properties:
      id: text
beans:
  - beanId: order
    class: Order
    createOnElement: /order
writers:
  - class: Order
"#;
        let resolver = MapResolver::new().with_resource("urn:o", InputSource::from_text(yaml));
        let descriptor =
            Descriptor::with_resolvers(&descriptors, None, &resolver, ApplicationContext::new())
                .unwrap();

        assert!(descriptor.schema().is_none());
        let writers = descriptor.bean_writers().get("Order").unwrap();
        assert!(writers.contains_key("urn:o"));
        assert_eq!(descriptor.engine().context().namespaces().get("o").map(String::as_str), Some("urn:o"));
    }
}
