//! Merging bean models into a serializer tree.
//!
//! The tree only knows the document shape. Merging walks a root bean model
//! and its wired beans depth first and attaches to each node the getter and
//! converter needed to write it back out.

use super::getter::contextual_getter;
use super::{BindingTree, CollectionGetter};
use crate::bean::{ConverterRegistry, TypeRegistry, ValueType};
use crate::error::Result;
use crate::rules::{BeanModel, Binding, ModelSet};

/// Attaches getters and converters for one root serializer.
pub(crate) struct GraphMerger<'a> {
    models: &'a ModelSet,
    types: &'a TypeRegistry,
    converters: &'a ConverterRegistry,
    root_bean_id: &'a str,
}

impl<'a> GraphMerger<'a> {
    pub(crate) fn new(
        models: &'a ModelSet,
        types: &'a TypeRegistry,
        converters: &'a ConverterRegistry,
        root_bean_id: &'a str,
    ) -> Self {
        Self {
            models,
            types,
            converters,
            root_bean_id,
        }
    }

    /// Merge `model` and every bean wired into it.
    ///
    /// Attachments are assigned, never accumulated, so merging the same
    /// model twice leaves the tree unchanged.
    ///
    /// # Errors
    /// - `BindingError::NodeNotFound` when a bound path is absent from the
    ///   tree.
    /// - `BindingError::BindingResolution` when a bound property cannot be
    ///   resolved.
    pub(crate) fn merge(&self, tree: &mut BindingTree, model: &BeanModel) -> Result<()> {
        for binding in &model.bindings {
            match binding {
                Binding::Data(data) if !model.is_collection => {
                    let Some(property) = data.property.as_deref() else {
                        continue;
                    };
                    let node = tree.find_node(&data.selector)?;
                    let def = self.types.resolve_getter(&model.type_name, property)?;

                    let getter =
                        contextual_getter(self.models, self.root_bean_id, &model.bean_id, Some(property));
                    let decoder =
                        self.converters
                            .lookup(ValueType::Text, def.value_type, data.decoder.as_ref());
                    let encoder = self.converters.lookup(
                        def.value_type,
                        ValueType::Text,
                        decoder.as_ref().and_then(|d| d.configuration()),
                    );

                    let node = tree.node_mut(node);
                    node.getter = Some(getter);
                    if encoder.is_some() {
                        node.converter = encoder;
                    } else {
                        tracing::debug!(
                            bean_type = %model.type_name,
                            property = %property,
                            value_type = %def.value_type,
                            "No text encoder for property type"
                        );
                    }
                }
                Binding::Data(_) => {}
                Binding::Wired(wired) => {
                    let wired_model = self.models.require(&wired.bean_id)?;
                    let node = tree.find_node(&wired_model.create_on)?;

                    if model.is_collection {
                        let getter =
                            contextual_getter(self.models, self.root_bean_id, &model.bean_id, None);
                        tree.node_mut(node).collection = Some(CollectionGetter {
                            item_bean_id: wired_model.bean_id.clone(),
                            getter,
                        });
                    } else {
                        tree.node_mut(node).getter = Some(contextual_getter(
                            self.models,
                            self.root_bean_id,
                            &wired_model.bean_id,
                            None,
                        ));
                    }

                    self.merge(tree, wired_model)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::TypeDef;
    use crate::binding::Getter;
    use crate::error::BindingError;
    use crate::rules::{BeanConfig, BindingConfig, ValueConfig, WiringConfig};
    use crate::selector::SelectorPath;
    use std::collections::BTreeMap;

    struct Fixture {
        types: TypeRegistry,
        models: ModelSet,
        converters: ConverterRegistry,
    }

    fn fixture() -> Fixture {
        let mut types = TypeRegistry::new();
        for def in [
            TypeDef::new("Order")
                .property("header", ValueType::Bean)
                .property("items", ValueType::Bean),
            TypeDef::new("Header")
                .property("customerName", ValueType::Text)
                .property("date", ValueType::Date),
            TypeDef::collection("Items"),
            TypeDef::new("Item").property("quantity", ValueType::Integer),
        ] {
            types.register(def).unwrap();
        }
        let config = BindingConfig::new()
            .with_bean(
                BeanConfig::new("order", "Order", "/order")
                    .with_wiring(WiringConfig::new("header", "header"))
                    .with_wiring(WiringConfig::new("items", "items")),
            )
            .with_bean(
                BeanConfig::new("header", "Header", "/order/header")
                    .with_value(ValueConfig::new("customerName", "/order/header/customer"))
                    .with_value(
                        ValueConfig::new("date", "/order/header/@date")
                            .with_decoder_param("format", "%d.%m.%Y"),
                    ),
            )
            .with_bean(
                BeanConfig::new("items", "Items", "/order/items")
                    .with_wiring(WiringConfig::item("item")),
            )
            .with_bean(
                BeanConfig::new("item", "Item", "/order/items/item")
                    .with_value(ValueConfig::new("quantity", "/order/items/item/@quantity")),
            );
        let models = ModelSet::build(&config, &types).unwrap();
        Fixture {
            types,
            models,
            converters: ConverterRegistry::default(),
        }
    }

    fn path(selector: &str) -> SelectorPath {
        SelectorPath::parse(selector, &BTreeMap::new()).unwrap()
    }

    fn merged(fixture: &Fixture) -> BindingTree {
        let mut tree = BindingTree::from_selectors(fixture.models.selectors());
        let merger = GraphMerger::new(&fixture.models, &fixture.types, &fixture.converters, "order");
        merger
            .merge(&mut tree, fixture.models.get("order").unwrap())
            .unwrap();
        tree
    }

    #[test]
    fn test_collection_flag() {
        let fixture = fixture();
        let tree = merged(&fixture);

        let item = tree.node(tree.find_node(&path("/order/items/item")).unwrap());
        assert!(item.is_collection());
        let collection = item.collection_getter().unwrap();
        assert_eq!(collection.item_bean_id, "item");
        assert_eq!(
            collection.getter,
            Getter::Contextual {
                bean_id: "order".to_string(),
                property: "items".to_string(),
            }
        );

        let header = tree.node(tree.find_node(&path("/order/header")).unwrap());
        assert!(!header.is_collection());
        let items = tree.node(tree.find_node(&path("/order/items")).unwrap());
        assert!(!items.is_collection());
    }

    #[test]
    fn test_decoder_configuration_propagated() {
        let fixture = fixture();
        let tree = merged(&fixture);
        let date = tree.node(tree.find_node(&path("/order/header/@date")).unwrap());
        let converter = date.converter().unwrap();
        assert_eq!(
            converter.configuration().and_then(|c| c.get("format")).map(String::as_str),
            Some("%d.%m.%Y")
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fixture = fixture();
        let mut tree = merged(&fixture);
        let before = tree.to_string();

        let merger = GraphMerger::new(&fixture.models, &fixture.types, &fixture.converters, "order");
        merger
            .merge(&mut tree, fixture.models.get("order").unwrap())
            .unwrap();
        assert_eq!(tree.to_string(), before);
    }

    #[test]
    fn test_missing_node_is_fatal() {
        let fixture = fixture();
        let mut tree = BindingTree::from_selectors([&path("/order"), &path("/order/items")]);
        let merger = GraphMerger::new(&fixture.models, &fixture.types, &fixture.converters, "order");
        let err = merger
            .merge(&mut tree, fixture.models.get("order").unwrap())
            .unwrap_err();
        assert!(matches!(err, BindingError::NodeNotFound { .. }));
    }
}
