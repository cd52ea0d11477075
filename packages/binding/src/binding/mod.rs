//! Object graph to XML serialization.
//!
//! [`XmlBinding`] turns the compiled rules of a [`BindingEngine`] into one
//! [`RootNodeSerializer`] per top-level bean type. Building happens in two
//! phases: a [`BindingTree`] is built from the selectors alone (document
//! shape), then each root model is merged into its own detached copy of the
//! tree (how values are read back off the beans).
//!
//! # Example
//!
//! ```
//! use beanbinder::{BindingEngine, XmlBinding};
//!
//! let engine = BindingEngine::from_config(beanbinder::rules::BindingConfig::from_yaml(
//!     r#"
//! types:
//!   - name: Header
//!     properties:
//!       customerName: text
//! beans:
//!   - beanId: header
//!     class: Header
//!     createOnElement: /order/header
//!     values:
//!       - property: customerName
//!         data: /order/header/customer
//! "#,
//! )?)?;
//! let binding = XmlBinding::new(engine.into())?.with_omit_xml_declaration(true);
//!
//! let header = binding.from_xml("<order><header><customer>Joe</customer></header></order>", "Header")?;
//! assert_eq!(
//!     binding.to_xml(&header)?,
//!     "<order><header><customer>Joe</customer></header></order>"
//! );
//! # Ok::<(), beanbinder::BindingError>(())
//! ```

mod getter;
mod merge;
mod serializer;
mod tree;

pub use getter::{CollectionGetter, Getter, SerializationContext};
pub use serializer::{RootNodeSerializer, SerializeOptions};
pub use tree::{BindingTree, NodeId, NodeKind, PathNode};

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use crate::bean::{BeanRef, Value};
use crate::config::{XMLNS_ATTRIBUTE, XMLNS_ATTRIBUTE_NS_URI, XML_DECLARATION};
use crate::engine::BindingEngine;
use crate::error::{BindingError, Result};
use crate::rules::BeanModel;
use crate::xml::QName;
use merge::GraphMerger;

/// Serializers for every top-level bean type of an engine, plus the engine
/// itself for the read direction.
///
/// Built once and read-only afterwards, so one instance can serve
/// concurrent `to_xml` calls.
#[derive(Debug, Clone)]
pub struct XmlBinding {
    engine: Arc<BindingEngine>,
    /// Bean type name to serializer, in model declaration order.
    serializers: Vec<(String, RootNodeSerializer)>,
    default_prefixes: BTreeMap<String, String>,
    omit_xml_declaration: bool,
}

impl XmlBinding {
    /// Build the root serializers.
    ///
    /// # Errors
    /// Returns `BindingError::NodeNotFound` or
    /// `BindingError::BindingResolution` when the rules and the selector
    /// tree disagree. No serializer is installed in that case.
    pub fn new(engine: Arc<BindingEngine>) -> Result<Self> {
        let models = engine.models();
        let context = engine.context();
        let tree = BindingTree::from_selectors(models.selectors());

        let mut serializers: Vec<(String, RootNodeSerializer)> = Vec::new();
        for model in models.iter().filter(|model| is_root_model(model, &tree)) {
            if serializers.iter().any(|(type_name, _)| *type_name == model.type_name) {
                tracing::debug!(
                    bean_id = %model.bean_id,
                    bean_type = %model.type_name,
                    "Type already has a root serializer, skipping"
                );
                continue;
            }

            let create_node = tree.find_node(&model.create_on)?;
            let mut detached = tree.detach(tree.root_of(create_node));
            add_namespace_declarations(&mut detached, context.namespaces());

            let mut serializer = RootNodeSerializer::new(&model.bean_id, detached);
            GraphMerger::new(models, context.types(), context.converters(), &model.bean_id)
                .merge(serializer.tree_mut(), model)?;

            tracing::debug!(
                bean_id = %model.bean_id,
                bean_type = %model.type_name,
                "Root serializer built"
            );
            serializers.push((model.type_name.clone(), serializer));
        }

        Ok(Self {
            default_prefixes: context.prefixes_by_uri(),
            engine,
            serializers,
            omit_xml_declaration: false,
        })
    }

    /// Leave out the `<?xml version="1.0"?>` declaration.
    #[must_use]
    pub fn with_omit_xml_declaration(mut self, omit: bool) -> Self {
        self.omit_xml_declaration = omit;
        self
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<BindingEngine> {
        &self.engine
    }

    #[must_use]
    pub fn serializer(&self, type_name: &str) -> Option<&RootNodeSerializer> {
        self.serializers
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, serializer)| serializer)
    }

    #[must_use]
    pub fn has_serializer(&self, type_name: &str) -> bool {
        self.serializer(type_name).is_some()
    }

    /// Bind `xml` and return the first bean of `type_name`.
    ///
    /// # Errors
    /// Returns parse and bind errors, and `BindingError::BeanNotFound` when
    /// the document produced no bean of that type.
    pub fn from_xml(&self, xml: &str, type_name: &str) -> Result<BeanRef> {
        let result = self.engine.filter(xml, &mut [])?;
        result
            .bean_by_type(type_name)
            .cloned()
            .ok_or_else(|| BindingError::BeanNotFound {
                type_name: type_name.to_string(),
            })
    }

    /// Serialize `bean` to a string.
    pub fn to_xml(&self, bean: &BeanRef) -> Result<String> {
        let mut out = Vec::new();
        self.to_xml_writer(bean, &mut out)?;
        String::from_utf8(out).map_err(|e| BindingError::io(e.to_string()))
    }

    /// Serialize `bean` to `out`, preceded by the XML declaration unless it
    /// is omitted.
    ///
    /// # Errors
    /// Returns `BindingError::NoSerializer` when the bean's type has no root
    /// serializer.
    pub fn to_xml_writer(&self, bean: &BeanRef, out: &mut dyn Write) -> Result<()> {
        let serializer = self.require_serializer(bean)?;
        if !self.omit_xml_declaration {
            out.write_all(XML_DECLARATION.as_bytes())?;
        }
        serializer.serialize(bean, out, &SerializeOptions::default(), &self.default_prefixes)
    }

    /// Write `bean` as a bare element tree, without declaration, using the
    /// given per-call options.
    pub fn write_bean(
        &self,
        bean: &BeanRef,
        out: &mut dyn Write,
        options: &SerializeOptions<'_>,
    ) -> Result<()> {
        self.require_serializer(bean)?
            .serialize(bean, out, options, &self.default_prefixes)
    }

    fn require_serializer(&self, bean: &BeanRef) -> Result<&RootNodeSerializer> {
        let type_name = bean.type_name();
        self.serializer(&type_name)
            .ok_or(BindingError::NoSerializer { type_name })
    }
}

/// A model gets a root serializer when it is not a collection and is either
/// created on an element named like a document root or not wired into
/// another bean.
fn is_root_model(model: &BeanModel, tree: &BindingTree) -> bool {
    !model.is_collection
        && (tree.is_known_root(model.create_on.target().name()) || model.wired_into.is_none())
}

/// Append one `xmlns` attribute per registered prefix to the tree root.
fn add_namespace_declarations(tree: &mut BindingTree, namespaces: &BTreeMap<String, String>) {
    let Some(root) = tree.root() else {
        return;
    };
    for (prefix, uri) in namespaces {
        let local = if prefix.is_empty() {
            XMLNS_ATTRIBUTE
        } else {
            prefix.as_str()
        };
        let name = QName::new(
            Some(XMLNS_ATTRIBUTE_NS_URI.to_string()),
            local,
            Some(XMLNS_ATTRIBUTE.to_string()),
        );
        let attribute = tree.add_attribute(root, name);
        tree.node_mut(attribute).getter = Some(Getter::Constant(Value::from(uri.as_str())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{BeanInstance, ValueType};
    use crate::rules::{BeanConfig, BindingConfig, TypeConfig, ValueConfig, WiringConfig};
    use pretty_assertions::assert_eq;

    fn type_config(name: &str, properties: &[(&str, ValueType)]) -> TypeConfig {
        TypeConfig {
            name: name.to_string(),
            collection: false,
            properties: properties
                .iter()
                .map(|(p, t)| ((*p).to_string(), *t))
                .collect(),
            default_namespace: None,
        }
    }

    fn order_binding() -> XmlBinding {
        let mut items = type_config("Items", &[]);
        items.collection = true;
        let config = BindingConfig::new()
            .with_type(type_config(
                "Order",
                &[("id", ValueType::Integer), ("items", ValueType::Bean)],
            ))
            .with_type(items)
            .with_type(type_config("Item", &[("sku", ValueType::Text)]))
            .with_bean(
                BeanConfig::new("order", "Order", "/order")
                    .with_value(ValueConfig::new("id", "/order/@id"))
                    .with_wiring(WiringConfig::new("items", "items")),
            )
            .with_bean(
                BeanConfig::new("items", "Items", "/order/items")
                    .with_wiring(WiringConfig::item("item")),
            )
            .with_bean(
                BeanConfig::new("item", "Item", "/order/items/item")
                    .with_value(ValueConfig::new("sku", "/order/items/item/sku")),
            );
        let engine = BindingEngine::from_config(config).unwrap();
        XmlBinding::new(Arc::new(engine))
            .unwrap()
            .with_omit_xml_declaration(true)
    }

    #[test]
    fn test_root_serializers_skip_collections_and_nested_beans() {
        let binding = order_binding();
        assert!(binding.has_serializer("Order"));
        assert!(!binding.has_serializer("Items"));
        assert!(!binding.has_serializer("Item"));
    }

    #[test]
    fn test_wired_bean_on_root_name_gets_serializer() {
        let config = BindingConfig::new()
            .with_type(type_config("Order", &[("note", ValueType::Bean)]))
            .with_type(type_config("Note", &[("text", ValueType::Text)]))
            .with_bean(
                BeanConfig::new("order", "Order", "/order")
                    .with_wiring(WiringConfig::new("note", "note")),
            )
            .with_bean(
                BeanConfig::new("note", "Note", "/order/note")
                    .with_value(ValueConfig::new("text", "/order/note/text")),
            )
            .with_bean(BeanConfig::new("standalone", "Note", "/note"));
        let binding = XmlBinding::new(Arc::new(BindingEngine::from_config(config).unwrap()))
            .unwrap()
            .with_omit_xml_declaration(true);

        assert!(binding.has_serializer("Order"));
        assert!(binding.has_serializer("Note"));
        assert_eq!(binding.serializer("Note").unwrap().bean_id(), "note");
    }

    #[test]
    fn test_collection_round_trip() {
        let binding = order_binding();
        let xml = r#"<order id="3"><items><item><sku>a</sku></item><item><sku>b</sku></item></items></order>"#;
        let order = binding.from_xml(xml, "Order").unwrap();
        assert_eq!(binding.to_xml(&order).unwrap(), xml);
    }

    #[test]
    fn test_declaration_written_by_default() {
        let binding = order_binding().with_omit_xml_declaration(false);
        let order = BeanRef::new(BeanInstance::new("Order"));
        order.set("id", 1_i64);
        assert_eq!(
            binding.to_xml(&order).unwrap(),
            "<?xml version=\"1.0\"?>\n<order id=\"1\"/>"
        );
    }

    #[test]
    fn test_unregistered_type() {
        let binding = order_binding();
        let err = binding
            .to_xml(&BeanRef::new(BeanInstance::new("Invoice")))
            .unwrap_err();
        assert!(matches!(err, BindingError::NoSerializer { type_name } if type_name == "Invoice"));
    }

    #[test]
    fn test_missing_bean_type_on_read() {
        let err = order_binding().from_xml("<invoice/>", "Order").unwrap_err();
        assert!(matches!(err, BindingError::BeanNotFound { .. }));
    }
}
