//! Getters evaluated against live beans at serialization time.

use std::fmt;

use crate::bean::{BeanRef, Value};
use crate::rules::ModelSet;

/// Reads a value for a path node from the serialization context.
#[derive(Debug, Clone, PartialEq)]
pub enum Getter {
    /// A fixed value, e.g. a namespace declaration URI.
    Constant(Value),
    /// A property of the bean in scope under `bean_id`.
    Contextual { bean_id: String, property: String },
    /// A chain of properties starting at the bean in scope under `bean_id`.
    Graph {
        bean_id: String,
        properties: Vec<String>,
    },
}

impl Getter {
    /// Evaluate against the beans in scope. `None` means the value is absent
    /// and the node is not written.
    #[must_use]
    pub fn evaluate(&self, context: &SerializationContext) -> Option<Value> {
        match self {
            Getter::Constant(value) => Some(value.clone()),
            Getter::Contextual { bean_id, property } => context.lookup(bean_id)?.get(property),
            Getter::Graph {
                bean_id,
                properties,
            } => {
                let mut value = Value::Bean(context.lookup(bean_id)?.clone());
                for property in properties {
                    value = value.as_bean()?.get(property)?;
                }
                Some(value)
            }
        }
    }
}

impl fmt::Display for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Getter::Constant(Value::Text(text)) => write!(f, "'{text}'"),
            Getter::Constant(value) => write!(f, "{value:?}"),
            Getter::Contextual { bean_id, property } => write!(f, "{bean_id}.{property}"),
            Getter::Graph {
                bean_id,
                properties,
            } if properties.is_empty() => f.write_str(bean_id),
            Getter::Graph {
                bean_id,
                properties,
            } => write!(f, "{bean_id}.{}", properties.join(".")),
        }
    }
}

/// Marks a repeating element: `getter` yields the collection and every item
/// is put in scope under `item_bean_id` while the element is written.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionGetter {
    pub item_bean_id: String,
    pub getter: Getter,
}

/// Beans in scope during one serialization call.
///
/// The root bean is in scope for the whole call; collection items are
/// pushed and popped as the collection is iterated.
#[derive(Debug)]
pub struct SerializationContext {
    scopes: Vec<(String, BeanRef)>,
}

impl SerializationContext {
    #[must_use]
    pub fn new(root_bean_id: impl Into<String>, root: BeanRef) -> Self {
        Self {
            scopes: vec![(root_bean_id.into(), root)],
        }
    }

    pub fn push(&mut self, bean_id: impl Into<String>, bean: BeanRef) {
        self.scopes.push((bean_id.into(), bean));
    }

    pub fn pop(&mut self) {
        // The root scope stays for the whole call.
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Innermost bean in scope under `bean_id`.
    #[must_use]
    pub fn lookup(&self, bean_id: &str) -> Option<&BeanRef> {
        self.scopes
            .iter()
            .rev()
            .find(|(id, _)| id == bean_id)
            .map(|(_, bean)| bean)
    }
}

/// Build the getter that navigates to bean `bean_id` from a bean that is in
/// scope while serializing the root bean `root_bean_id`, then reads
/// `property` when one is given.
///
/// The walk follows wiring back-links upwards and stops at the root bean, at
/// a bean that is not wired into anything, or at a collection item (items
/// are put in scope individually).
pub(crate) fn contextual_getter(
    models: &ModelSet,
    root_bean_id: &str,
    bean_id: &str,
    property: Option<&str>,
) -> Getter {
    let mut properties: Vec<String> = property.map(str::to_string).into_iter().collect();
    let mut current = bean_id.to_string();

    while current != root_bean_id {
        let Some(link) = models.get(&current).and_then(|m| m.wired_into.as_ref()) else {
            break;
        };
        let parent_is_collection = models.get(&link.bean_id).is_some_and(|p| p.is_collection);
        let Some(link_property) = link.property.as_ref().filter(|_| !parent_is_collection) else {
            break;
        };
        properties.push(link_property.clone());
        current = link.bean_id.clone();
    }
    properties.reverse();

    if properties.len() == 1 {
        Getter::Contextual {
            bean_id: current,
            property: properties.remove(0),
        }
    } else {
        Getter::Graph {
            bean_id: current,
            properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{BeanInstance, TypeDef, TypeRegistry, ValueType};
    use crate::rules::{BeanConfig, BindingConfig, ValueConfig, WiringConfig};

    fn models() -> ModelSet {
        let mut types = TypeRegistry::new();
        for def in [
            TypeDef::new("Order")
                .property("header", ValueType::Bean)
                .property("items", ValueType::Bean),
            TypeDef::new("Header")
                .property("customer", ValueType::Bean)
                .property("date", ValueType::Date),
            TypeDef::new("Customer").property("name", ValueType::Text),
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
                    .with_wiring(WiringConfig::new("customer", "customer")),
            )
            .with_bean(
                BeanConfig::new("customer", "Customer", "/order/header/customer")
                    .with_value(ValueConfig::new("name", "/order/header/customer")),
            )
            .with_bean(
                BeanConfig::new("items", "Items", "/order/items")
                    .with_wiring(WiringConfig::item("item")),
            )
            .with_bean(
                BeanConfig::new("item", "Item", "/order/items/item")
                    .with_value(ValueConfig::new("quantity", "/order/items/item/@quantity")),
            );
        ModelSet::build(&config, &types).unwrap()
    }

    #[test]
    fn test_getter_chain_from_root() {
        let models = models();
        assert_eq!(
            contextual_getter(&models, "order", "customer", Some("name")),
            Getter::Graph {
                bean_id: "order".to_string(),
                properties: vec!["header".into(), "customer".into(), "name".into()],
            }
        );
        assert_eq!(
            contextual_getter(&models, "order", "header", None),
            Getter::Contextual {
                bean_id: "order".to_string(),
                property: "header".to_string(),
            }
        );
    }

    #[test]
    fn test_getter_stops_at_serializer_root() {
        let models = models();
        assert_eq!(
            contextual_getter(&models, "header", "customer", Some("name")),
            Getter::Graph {
                bean_id: "header".to_string(),
                properties: vec!["customer".into(), "name".into()],
            }
        );
    }

    #[test]
    fn test_getter_stops_at_collection_item() {
        let models = models();
        assert_eq!(
            contextual_getter(&models, "order", "item", Some("quantity")),
            Getter::Contextual {
                bean_id: "item".to_string(),
                property: "quantity".to_string(),
            }
        );
    }

    #[test]
    fn test_evaluate() {
        let order = BeanRef::new(BeanInstance::new("Order"));
        let header = BeanRef::new(BeanInstance::new("Header"));
        let customer = BeanRef::new(BeanInstance::new("Customer"));
        customer.set("name", "Joe");
        header.set("customer", customer);
        order.set("header", header);

        let context = SerializationContext::new("order", order);
        let getter = Getter::Graph {
            bean_id: "order".to_string(),
            properties: vec!["header".into(), "customer".into(), "name".into()],
        };
        assert_eq!(getter.evaluate(&context), Some(Value::from("Joe")));

        let missing = Getter::Contextual {
            bean_id: "order".to_string(),
            property: "items".to_string(),
        };
        assert_eq!(missing.evaluate(&context), None);
        assert_eq!(
            Getter::Constant(Value::from("urn:x")).evaluate(&context),
            Some(Value::from("urn:x"))
        );
    }

    #[test]
    fn test_context_scopes() {
        let root = BeanRef::new(BeanInstance::new("Order"));
        let item = BeanRef::new(BeanInstance::new("Item"));
        let mut context = SerializationContext::new("order", root.clone());

        context.push("item", item.clone());
        assert!(context.lookup("item").unwrap().ptr_eq(&item));
        context.pop();
        assert!(context.lookup("item").is_none());
        context.pop();
        assert!(context.lookup("order").unwrap().ptr_eq(&root));
    }
}
