//! Compiled bean models.
//!
//! A [`ModelSet`] is built once from a merged [`BindingConfig`]: selectors
//! are parsed, properties resolved against the type registry and wiring
//! back-links computed. Everything downstream works from the compiled
//! models only.

use std::collections::HashMap;

use crate::bean::{ConverterConfig, TypeRegistry, ValueType};
use crate::config::validate_bean_id;
use crate::error::{BindingError, Result};
use crate::rules::{BeanConfig, BindingConfig};
use crate::selector::SelectorPath;

/// Binds a selected value to a scalar property.
#[derive(Debug, Clone)]
pub struct DataBinding {
    /// Target property; `None` appends to a collection.
    pub property: Option<String>,
    pub selector: SelectorPath,
    pub value_type: ValueType,
    pub decoder: Option<ConverterConfig>,
    pub default: Option<String>,
}

/// Wires another bean into this one.
#[derive(Debug, Clone)]
pub struct WiredBinding {
    /// Target property; `None` appends to a collection.
    pub property: Option<String>,
    pub bean_id: String,
}

#[derive(Debug, Clone)]
pub enum Binding {
    Data(DataBinding),
    Wired(WiredBinding),
}

/// Back-link from a wired bean to the bean it is wired into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiredInto {
    pub bean_id: String,
    pub property: Option<String>,
}

/// One bindable bean: how it is created and how it is populated.
#[derive(Debug, Clone)]
pub struct BeanModel {
    pub bean_id: String,
    pub type_name: String,
    pub create_on: SelectorPath,
    pub is_collection: bool,
    pub retain: bool,
    pub bindings: Vec<Binding>,
    pub wired_into: Option<WiredInto>,
}

impl BeanModel {
    pub fn data_bindings(&self) -> impl Iterator<Item = &DataBinding> {
        self.bindings.iter().filter_map(|binding| match binding {
            Binding::Data(data) => Some(data),
            Binding::Wired(_) => None,
        })
    }

    pub fn wired_bindings(&self) -> impl Iterator<Item = &WiredBinding> {
        self.bindings.iter().filter_map(|binding| match binding {
            Binding::Wired(wired) => Some(wired),
            Binding::Data(_) => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

/// All bean models of an engine, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    models: Vec<BeanModel>,
    index: HashMap<String, usize>,
}

impl ModelSet {
    /// Compile a binding configuration.
    ///
    /// # Errors
    /// - `BindingError::Config` for invalid selectors or bean ids, duplicate
    ///   bean ids, unknown types or bean references, data bindings to bean
    ///   properties, wirings to scalar properties and cyclic wiring.
    /// - `BindingError::BindingResolution` when a property does not exist on
    ///   the bean type.
    pub fn build(config: &BindingConfig, types: &TypeRegistry) -> Result<Self> {
        let mut set = ModelSet::default();

        for bean in &config.beans {
            let model = compile_bean(bean, config, types)?;
            if set.index.contains_key(&model.bean_id) {
                return Err(BindingError::Config(format!(
                    "Duplicate bean id '{}'.",
                    model.bean_id
                )));
            }
            set.index.insert(model.bean_id.clone(), set.models.len());
            set.models.push(model);
        }

        set.link_wirings()?;
        set.check_cycles()?;
        Ok(set)
    }

    fn link_wirings(&mut self) -> Result<()> {
        let mut links: Vec<(usize, WiredInto)> = Vec::new();

        for model in &self.models {
            for wired in model.wired_bindings() {
                let target = self.index.get(&wired.bean_id).copied().ok_or_else(|| {
                    BindingError::Config(format!(
                        "Bean '{}' wires unknown bean '{}'.",
                        model.bean_id, wired.bean_id
                    ))
                })?;
                links.push((
                    target,
                    WiredInto {
                        bean_id: model.bean_id.clone(),
                        property: wired.property.clone(),
                    },
                ));
            }
        }

        for (target, link) in links {
            let model = &mut self.models[target];
            match &model.wired_into {
                Some(existing) => tracing::debug!(
                    bean_id = %model.bean_id,
                    wired_into = %existing.bean_id,
                    ignored = %link.bean_id,
                    "Bean already wired, keeping first back-link"
                ),
                None => model.wired_into = Some(link),
            }
        }
        Ok(())
    }

    fn check_cycles(&self) -> Result<()> {
        let mut visits = vec![Visit::New; self.models.len()];
        for index in 0..self.models.len() {
            self.visit_wirings(index, &mut visits)?;
        }
        Ok(())
    }

    /// Depth-first walk over every wiring, not only the back-links. Reaching
    /// a bean that is still on the walk closes a cycle.
    fn visit_wirings(&self, index: usize, visits: &mut [Visit]) -> Result<()> {
        match visits[index] {
            Visit::Done => return Ok(()),
            Visit::Active => {
                return Err(BindingError::Config(format!(
                    "Cyclic wiring involving bean '{}'.",
                    self.models[index].bean_id
                )))
            }
            Visit::New => {}
        }

        visits[index] = Visit::Active;
        for wired in self.models[index].wired_bindings() {
            if let Some(&target) = self.index.get(&wired.bean_id) {
                self.visit_wirings(target, visits)?;
            }
        }
        visits[index] = Visit::Done;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, bean_id: &str) -> Option<&BeanModel> {
        self.index.get(bean_id).map(|&i| &self.models[i])
    }

    /// Look up a model that must exist.
    pub fn require(&self, bean_id: &str) -> Result<&BeanModel> {
        self.get(bean_id)
            .ok_or_else(|| BindingError::Config(format!("Unknown bean id '{bean_id}'.")))
    }

    /// First declared model creating beans of `type_name`.
    #[must_use]
    pub fn model_for_type(&self, type_name: &str) -> Option<&BeanModel> {
        self.models.iter().find(|m| m.type_name == type_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BeanModel> {
        self.models.iter()
    }

    /// Every selector of every model, creation selector first, in
    /// declaration order.
    pub fn selectors(&self) -> impl Iterator<Item = &SelectorPath> {
        self.models.iter().flat_map(|model| {
            std::iter::once(&model.create_on).chain(model.data_bindings().map(|d| &d.selector))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn parse_selector(raw: &str, bean: &BeanConfig, config: &BindingConfig) -> Result<SelectorPath> {
    let path = SelectorPath::parse(raw, &config.namespaces)?;
    Ok(match &bean.owning_namespace {
        Some((id, uri)) => path.with_default_namespace(uri, id),
        None => path,
    })
}

fn compile_bean(bean: &BeanConfig, config: &BindingConfig, types: &TypeRegistry) -> Result<BeanModel> {
    validate_bean_id(&bean.bean_id)?;
    let type_def = types.require(&bean.class)?;
    let is_collection = type_def.is_collection();
    let create_on = parse_selector(&bean.create_on_element, bean, config)?;
    if create_on.attribute().is_some() {
        return Err(BindingError::Config(format!(
            "Bean '{}' is created on attribute selector '{}'. Beans are created on elements.",
            bean.bean_id, bean.create_on_element
        )));
    }
    let mut bindings = Vec::with_capacity(bean.values.len() + bean.wirings.len());

    for value in &bean.values {
        let selector = parse_selector(&value.data, bean, config)?;
        let value_type = match (&value.property, is_collection) {
            (Some(property), false) => {
                let def = types.resolve_setter(&bean.class, property)?;
                if !def.value_type.is_scalar() {
                    return Err(BindingError::Config(format!(
                        "Bean '{}' binds data to bean property '{property}'. Use a wiring.",
                        bean.bean_id
                    )));
                }
                def.value_type
            }
            (None, true) => ValueType::Text,
            (Some(property), true) => {
                return Err(BindingError::BindingResolution {
                    type_name: bean.class.clone(),
                    property: property.clone(),
                })
            }
            (None, false) => {
                return Err(BindingError::Config(format!(
                    "Value binding '{}' on bean '{}' names no property.",
                    value.data, bean.bean_id
                )))
            }
        };

        bindings.push(Binding::Data(DataBinding {
            property: value.property.clone(),
            selector,
            value_type,
            decoder: (!value.decoder.is_empty()).then(|| value.decoder.clone()),
            default: value.default.clone(),
        }));
    }

    for wiring in &bean.wirings {
        match (&wiring.property, is_collection) {
            (Some(property), false) => {
                let def = types.resolve_setter(&bean.class, property)?;
                if def.value_type != ValueType::Bean {
                    return Err(BindingError::Config(format!(
                        "Bean '{}' wires bean '{}' into scalar property '{property}'.",
                        bean.bean_id, wiring.bean_id_ref
                    )));
                }
            }
            (None, true) => {}
            (Some(property), true) => {
                return Err(BindingError::BindingResolution {
                    type_name: bean.class.clone(),
                    property: property.clone(),
                })
            }
            (None, false) => {
                return Err(BindingError::Config(format!(
                    "Wiring of '{}' into bean '{}' names no property.",
                    wiring.bean_id_ref, bean.bean_id
                )))
            }
        }

        bindings.push(Binding::Wired(WiredBinding {
            property: wiring.property.clone(),
            bean_id: wiring.bean_id_ref.clone(),
        }));
    }

    Ok(BeanModel {
        bean_id: bean.bean_id.clone(),
        type_name: bean.class.clone(),
        create_on,
        is_collection,
        retain: bean.retain,
        bindings,
        wired_into: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::TypeDef;
    use crate::rules::{ValueConfig, WiringConfig};

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types
            .register(
                TypeDef::new("Order")
                    .property("header", ValueType::Bean)
                    .property("items", ValueType::Bean),
            )
            .unwrap();
        types
            .register(TypeDef::new("Header").property("customerName", ValueType::Text))
            .unwrap();
        types.register(TypeDef::collection("Items")).unwrap();
        types
            .register(TypeDef::new("Item").property("quantity", ValueType::Integer))
            .unwrap();
        types
    }

    fn order_config() -> BindingConfig {
        BindingConfig::new()
            .with_bean(
                BeanConfig::new("order", "Order", "/order")
                    .with_wiring(WiringConfig::new("header", "header"))
                    .with_wiring(WiringConfig::new("items", "items")),
            )
            .with_bean(
                BeanConfig::new("header", "Header", "/order/header").with_value(ValueConfig::new(
                    "customerName",
                    "/order/header/customer",
                )),
            )
            .with_bean(
                BeanConfig::new("items", "Items", "/order/items")
                    .with_wiring(WiringConfig::item("item")),
            )
            .with_bean(
                BeanConfig::new("item", "Item", "/order/items/item")
                    .with_value(ValueConfig::new("quantity", "/order/items/item/@quantity")),
            )
    }

    #[test]
    fn test_build_links_wirings() {
        let set = ModelSet::build(&order_config(), &types()).unwrap();
        assert_eq!(set.len(), 4);

        let header = set.get("header").unwrap();
        assert_eq!(
            header.wired_into,
            Some(WiredInto {
                bean_id: "order".to_string(),
                property: Some("header".to_string())
            })
        );
        assert!(set.get("items").unwrap().is_collection);
        assert_eq!(set.get("item").unwrap().wired_into.as_ref().unwrap().bean_id, "items");
        assert!(set.get("order").unwrap().wired_into.is_none());
        assert_eq!(set.model_for_type("Item").unwrap().bean_id, "item");
    }

    #[test]
    fn test_selectors_in_declaration_order() {
        let set = ModelSet::build(&order_config(), &types()).unwrap();
        let selectors: Vec<&str> = set.selectors().map(SelectorPath::source).collect();
        assert_eq!(
            selectors,
            vec![
                "/order",
                "/order/header",
                "/order/header/customer",
                "/order/items",
                "/order/items/item",
                "/order/items/item/@quantity",
            ]
        );
    }

    #[test]
    fn test_unknown_property() {
        let config = BindingConfig::new().with_bean(
            BeanConfig::new("header", "Header", "/order/header")
                .with_value(ValueConfig::new("name", "/order/header/customer")),
        );
        let err = ModelSet::build(&config, &types()).unwrap_err();
        assert!(matches!(err, BindingError::BindingResolution { .. }));
    }

    #[test]
    fn test_duplicate_bean_id() {
        let config = BindingConfig::new()
            .with_bean(BeanConfig::new("header", "Header", "/order/header"))
            .with_bean(BeanConfig::new("header", "Header", "/order/header"));
        let err = ModelSet::build(&config, &types()).unwrap_err();
        assert!(err.to_string().contains("Duplicate bean id"));
    }

    #[test]
    fn test_unknown_wiring_reference() {
        let config = BindingConfig::new().with_bean(
            BeanConfig::new("order", "Order", "/order")
                .with_wiring(WiringConfig::new("header", "missing")),
        );
        assert!(matches!(
            ModelSet::build(&config, &types()),
            Err(BindingError::Config(_))
        ));
    }

    #[test]
    fn test_data_binding_to_bean_property() {
        let config = BindingConfig::new().with_bean(
            BeanConfig::new("order", "Order", "/order")
                .with_value(ValueConfig::new("header", "/order/header")),
        );
        assert!(matches!(
            ModelSet::build(&config, &types()),
            Err(BindingError::Config(_))
        ));
    }

    #[test]
    fn test_cyclic_wiring() {
        let mut types = types();
        types
            .register(TypeDef::new("Node").property("next", ValueType::Bean))
            .unwrap();
        let config = BindingConfig::new()
            .with_bean(
                BeanConfig::new("a", "Node", "/a").with_wiring(WiringConfig::new("next", "b")),
            )
            .with_bean(
                BeanConfig::new("b", "Node", "/a/b").with_wiring(WiringConfig::new("next", "a")),
            );
        let err = ModelSet::build(&config, &types).unwrap_err();
        assert!(err.to_string().contains("Cyclic wiring"));
    }

    #[test]
    fn test_cycle_through_shared_bean() {
        let mut types = TypeRegistry::new();
        for (name, property) in [("A", "b"), ("B", "c"), ("C", "b")] {
            types
                .register(TypeDef::new(name).property(property, ValueType::Bean))
                .unwrap();
        }
        let config = BindingConfig::new()
            .with_bean(BeanConfig::new("a", "A", "/a").with_wiring(WiringConfig::new("b", "b")))
            .with_bean(BeanConfig::new("b", "B", "/a/b").with_wiring(WiringConfig::new("c", "c")))
            .with_bean(
                BeanConfig::new("c", "C", "/a/b/c").with_wiring(WiringConfig::new("b", "b")),
            );

        let err = ModelSet::build(&config, &types).unwrap_err();
        assert!(matches!(err, BindingError::Config(ref msg) if msg.contains("Cyclic wiring")));
    }

    #[test]
    fn test_shared_bean_without_cycle() {
        let mut types = types();
        types
            .register(TypeDef::new("Invoice").property("header", ValueType::Bean))
            .unwrap();
        let config = order_config()
            .with_bean(
                BeanConfig::new("invoice", "Invoice", "/order/invoice")
                    .with_wiring(WiringConfig::new("header", "header")),
            );

        let set = ModelSet::build(&config, &types).unwrap();
        assert_eq!(set.get("header").unwrap().wired_into.as_ref().unwrap().bean_id, "order");
    }

    #[test]
    fn test_document_selector_rejected() {
        let config =
            BindingConfig::new().with_bean(BeanConfig::new("header", "Header", "#document"));
        assert!(matches!(
            ModelSet::build(&config, &types()),
            Err(BindingError::Config(_))
        ));
    }

    #[test]
    fn test_attribute_create_selector_rejected() {
        let config =
            BindingConfig::new().with_bean(BeanConfig::new("header", "Header", "/order/@header"));
        let err = ModelSet::build(&config, &types()).unwrap_err();
        assert!(err.to_string().contains("attribute selector"));
    }

    #[test]
    fn test_owning_namespace_defaults_target_step() {
        let mut bean = BeanConfig::new("header", "Header", "/order/header");
        bean.owning_namespace = Some(("h".to_string(), "urn:h".to_string()));
        let config = BindingConfig::new().with_bean(bean);
        let set = ModelSet::build(&config, &types()).unwrap();
        let target = set.get("header").unwrap().create_on.target().name().clone();
        assert_eq!(target.namespace(), Some("urn:h"));
        assert_eq!(set.get("header").unwrap().create_on.root().namespace(), None);
    }
}
