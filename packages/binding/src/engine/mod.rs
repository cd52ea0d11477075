//! Streaming bind engine.
//!
//! The engine walks a parsed document once, in document order, creating and
//! populating beans as their selectors match. Every namespace declaration and
//! bean lifecycle change is reported synchronously to the attached
//! [`BindingObserver`]s.

mod context;
mod events;
mod result;

pub use context::ApplicationContext;
pub use events::{
    BeanEvent, BeanLifecycle, BindingObserver, NamespaceReaper, SourceFragment, SourcePosition,
};
pub use result::BindResult;

use std::collections::HashMap;
use std::sync::Arc;

use roxmltree::{Document, Node};

use crate::bean::{BeanFactory, BeanRef, Value, ValueType};
use crate::error::{BindingError, Result};
use crate::rules::{BeanModel, BindingConfig, DataBinding, ModelSet};
use crate::xml::{declared_namespaces, element_text, qualified_name, QName};

/// Collects binding configurations for a [`BindingEngine`].
#[derive(Debug, Default)]
pub struct BindingEngineBuilder {
    context: ApplicationContext,
    config: BindingConfig,
}

impl BindingEngineBuilder {
    #[must_use]
    pub fn new(context: ApplicationContext) -> Self {
        Self {
            context,
            config: BindingConfig::new(),
        }
    }

    /// Add a binding configuration.
    pub fn add_config(mut self, config: BindingConfig) -> Result<Self> {
        self.config.merge(config)?;
        Ok(self)
    }

    /// Add a YAML binding configuration.
    pub fn add_yaml(self, yaml: &str) -> Result<Self> {
        self.add_config(BindingConfig::from_yaml(yaml)?)
    }

    /// Register the declared types and namespaces and compile the models.
    ///
    /// # Errors
    /// Returns the configuration errors of [`ModelSet::build`],
    /// `BindingError::Config` for conflicting type or prefix declarations
    /// and the errors of the bean factory parsers.
    pub fn build(self) -> Result<BindingEngine> {
        let mut context = self.context;
        for type_config in &self.config.types {
            context.types_mut().register(type_config.to_type_def())?;
        }
        for (prefix, uri) in &self.config.namespaces {
            context.register_namespace(prefix, uri)?;
        }
        let models = ModelSet::build(&self.config, context.types())?;
        let factories = build_factories(&self.config, &context)?;
        tracing::debug!(
            models = models.len(),
            factories = factories.len(),
            "Binding engine built"
        );

        Ok(BindingEngine {
            context,
            config: self.config,
            models,
            factories,
        })
    }
}

fn build_factories(
    config: &BindingConfig,
    context: &ApplicationContext,
) -> Result<HashMap<String, Arc<dyn BeanFactory>>> {
    let mut factories = HashMap::new();
    for bean in &config.beans {
        let Some(definition) = &bean.factory else {
            continue;
        };
        let factory =
            context
                .factory_parsers()
                .parse(definition, context.types(), context.converters())?;
        if factory.type_name() != bean.class {
            return Err(BindingError::Config(format!(
                "Factory '{definition}' of bean '{}' creates '{}' beans, not '{}'.",
                bean.bean_id,
                factory.type_name(),
                bean.class
            )));
        }
        factories.insert(bean.bean_id.clone(), factory);
    }
    Ok(factories)
}

/// Compiled binding rules and the registries they resolve against.
#[derive(Debug)]
pub struct BindingEngine {
    context: ApplicationContext,
    config: BindingConfig,
    models: ModelSet,
    factories: HashMap<String, Arc<dyn BeanFactory>>,
}

impl BindingEngine {
    /// Build an engine from a single configuration with a default context.
    pub fn from_config(config: BindingConfig) -> Result<Self> {
        BindingEngineBuilder::new(ApplicationContext::new())
            .add_config(config)?
            .build()
    }

    #[must_use]
    pub fn context(&self) -> &ApplicationContext {
        &self.context
    }

    /// The merged configuration the engine was built from.
    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    #[must_use]
    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    /// Factory of a bean declared with one.
    #[must_use]
    pub fn factory(&self, bean_id: &str) -> Option<&dyn BeanFactory> {
        self.factories.get(bean_id).map(Arc::as_ref)
    }

    /// Parse `xml` and bind it.
    pub fn filter(&self, xml: &str, observers: &mut [&mut dyn BindingObserver]) -> Result<BindResult> {
        let document = Document::parse(xml)?;
        self.filter_document(&document, observers)
    }

    /// Bind an already parsed document.
    ///
    /// # Errors
    /// Returns `BindingError::Conversion` when a value cannot be decoded and
    /// any error raised by an observer.
    pub fn filter_document(
        &self,
        document: &Document<'_>,
        observers: &mut [&mut dyn BindingObserver],
    ) -> Result<BindResult> {
        let mut session = FilterSession {
            engine: self,
            observers,
            in_context: HashMap::new(),
            result: BindResult::new(),
        };
        let mut path = Vec::new();
        session.visit(document.root_element(), &mut path)?;

        let mut result = session.result;
        result.retain(|bean_id| self.models.get(bean_id).map_or(true, |m| m.retain));
        Ok(result)
    }
}

/// State of one bind.
struct FilterSession<'e, 'o, 'r> {
    engine: &'e BindingEngine,
    observers: &'o mut [&'r mut dyn BindingObserver],
    in_context: HashMap<String, BeanRef>,
    result: BindResult,
}

impl<'e> FilterSession<'e, '_, '_> {
    fn visit(&mut self, node: Node<'_, '_>, path: &mut Vec<QName>) -> Result<()> {
        path.push(qualified_name(node));

        for (prefix, uri) in declared_namespaces(node) {
            for observer in self.observers.iter_mut() {
                observer.on_namespace_declared(prefix.as_deref(), &uri)?;
            }
        }

        let created: Vec<&'e BeanModel> = self
            .engine
            .models
            .iter()
            .filter(|model| model.create_on.matches_element(path))
            .collect();
        if !created.is_empty() {
            let source = SourceFragment::element(node, path);
            for model in &created {
                self.create(model, &source)?;
            }
            for model in &created {
                self.wire(model, &source)?;
            }
        }

        for attribute in node.attributes() {
            let name = QName::new(attribute.namespace().map(str::to_string), attribute.name(), None);
            let bindings: Vec<(&'e BeanModel, &'e DataBinding)> = self
                .data_bindings()
                .filter(|(_, data)| data.selector.matches_attribute(path, &name))
                .collect();
            if bindings.is_empty() {
                continue;
            }
            let source = SourceFragment::attribute(node, path, name);
            for (model, data) in bindings {
                self.bind_value(model, data, attribute.value(), &source)?;
            }
        }

        for child in node.children().filter(Node::is_element) {
            self.visit(child, path)?;
        }

        let bindings: Vec<(&'e BeanModel, &'e DataBinding)> = self
            .data_bindings()
            .filter(|(_, data)| data.selector.matches_element(path))
            .collect();
        if !bindings.is_empty() {
            let text = element_text(node);
            let source = SourceFragment::element(node, path);
            for (model, data) in bindings {
                self.bind_value(model, data, &text, &source)?;
            }
        }

        path.pop();
        Ok(())
    }

    fn data_bindings(&self) -> impl Iterator<Item = (&'e BeanModel, &'e DataBinding)> {
        self.engine
            .models
            .iter()
            .flat_map(|model| model.data_bindings().map(move |data| (model, data)))
    }

    fn create(&mut self, model: &BeanModel, source: &SourceFragment) -> Result<()> {
        let bean = match self.engine.factories.get(&model.bean_id) {
            Some(factory) => factory.create()?,
            None => self.engine.context.types().instantiate(&model.type_name)?,
        };
        let lifecycle = if self.in_context.contains_key(&model.bean_id) {
            BeanLifecycle::Change
        } else {
            BeanLifecycle::Create
        };
        self.in_context.insert(model.bean_id.clone(), bean.clone());
        self.result.record(&model.bean_id, bean.clone());

        self.notify(&BeanEvent {
            lifecycle,
            bean_id: &model.bean_id,
            bean: &bean,
            source,
            property: None,
        })
    }

    /// Wire a freshly created bean into the bean it belongs to.
    fn wire(&mut self, model: &BeanModel, source: &SourceFragment) -> Result<()> {
        let Some(link) = &model.wired_into else {
            return Ok(());
        };
        let (Some(parent), Some(bean)) = (
            self.in_context.get(&link.bean_id).cloned(),
            self.in_context.get(&model.bean_id).cloned(),
        ) else {
            tracing::debug!(
                bean_id = %model.bean_id,
                parent = %link.bean_id,
                "Parent bean not in context, skipping wiring"
            );
            return Ok(());
        };

        match &link.property {
            Some(property) => parent.set(property.as_str(), bean),
            None => parent.push(bean),
        }
        self.notify(&BeanEvent {
            lifecycle: BeanLifecycle::Populate,
            bean_id: &link.bean_id,
            bean: &parent,
            source,
            property: link.property.as_deref(),
        })
    }

    fn bind_value(
        &mut self,
        model: &BeanModel,
        data: &DataBinding,
        raw: &str,
        source: &SourceFragment,
    ) -> Result<()> {
        let Some(bean) = self.in_context.get(&model.bean_id).cloned() else {
            tracing::debug!(
                bean_id = %model.bean_id,
                selector = %data.selector,
                "No bean in context for value binding"
            );
            return Ok(());
        };

        let trimmed = raw.trim();
        let raw_value = match (trimmed.is_empty(), &data.default) {
            (false, _) => trimmed,
            (true, Some(default)) => default.as_str(),
            (true, None) => return Ok(()),
        };
        let decoder = self
            .engine
            .context
            .converters()
            .lookup(ValueType::Text, data.value_type, data.decoder.as_ref())
            .ok_or_else(|| BindingError::Conversion {
                value: raw_value.to_string(),
                from: ValueType::Text.to_string(),
                to: data.value_type.to_string(),
                reason: format!("no converter registered for selector '{}'", data.selector),
            })?;
        let value: Value = decoder.convert(&Value::from(raw_value))?;

        match &data.property {
            Some(property) => bean.set(property.as_str(), value),
            None => bean.push(value),
        }
        self.notify(&BeanEvent {
            lifecycle: BeanLifecycle::Populate,
            bean_id: &model.bean_id,
            bean: &bean,
            source,
            property: data.property.as_deref(),
        })
    }

    fn notify(&mut self, event: &BeanEvent<'_>) -> Result<()> {
        for observer in self.observers.iter_mut() {
            observer.on_bean_event(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
types:
  - name: Order
    properties:
      id: integer
      header: bean
      items: bean
  - name: Header
    properties:
      customerName: text
      express: boolean
  - name: Items
    collection: true
  - name: Item
    properties:
      quantity: integer
beans:
  - beanId: order
    class: Order
    createOnElement: /order
    values:
      - property: id
        data: /order/@id
    wirings:
      - property: header
        beanIdRef: header
      - property: items
        beanIdRef: items
  - beanId: header
    class: Header
    createOnElement: /order/header
    values:
      - property: customerName
        data: /order/header/customer
      - property: express
        data: /order/header/express
        default: "false"
  - beanId: items
    class: Items
    createOnElement: /order/items
    retain: false
    wirings:
      - beanIdRef: item
  - beanId: item
    class: Item
    createOnElement: /order/items/item
    values:
      - property: quantity
        data: /order/items/item/@quantity
"#;

    const ORDER: &str = r#"<order id="7">
  <header><customer> Joe </customer><express/></header>
  <items><item quantity="1"/><item quantity="2"/></items>
</order>"#;

    #[derive(Default)]
    struct Recorder {
        events: Vec<(BeanLifecycle, String, Option<String>)>,
    }

    impl BindingObserver for Recorder {
        fn on_bean_event(&mut self, event: &BeanEvent<'_>) -> Result<()> {
            self.events.push((
                event.lifecycle,
                event.bean_id.to_string(),
                event.property.map(str::to_string),
            ));
            Ok(())
        }
    }

    fn engine() -> BindingEngine {
        BindingEngineBuilder::new(ApplicationContext::new())
            .add_yaml(CONFIG)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_filter_binds_graph() {
        let result = engine().filter(ORDER, &mut []).unwrap();
        let order = result.get("order").unwrap();
        assert_eq!(order.get("id"), Some(Value::Integer(7)));

        let header = order.get("header").unwrap();
        let header = header.as_bean().unwrap();
        assert_eq!(header.get("customerName"), Some(Value::from("Joe")));
        assert_eq!(header.get("express"), Some(Value::Boolean(false)));

        let items = order.get("items").unwrap();
        let quantities: Vec<Option<Value>> = items
            .as_bean()
            .unwrap()
            .items()
            .map(|item| item.as_bean().and_then(|b| b.get("quantity")))
            .collect();
        assert_eq!(quantities, vec![Some(Value::Integer(1)), Some(Value::Integer(2))]);
    }

    #[test]
    fn test_filter_drops_unretained_beans() {
        let result = engine().filter(ORDER, &mut []).unwrap();
        assert!(result.get("items").is_none());
        assert!(result.bean_by_type("Order").is_some());
    }

    #[test]
    fn test_lifecycle_order() {
        let mut recorder = Recorder::default();
        engine()
            .filter(ORDER, &mut [&mut recorder as &mut dyn BindingObserver])
            .unwrap();

        let item_events: Vec<BeanLifecycle> = recorder
            .events
            .iter()
            .filter(|(_, id, _)| id == "item")
            .map(|(lifecycle, _, _)| *lifecycle)
            .collect();
        assert_eq!(
            item_events,
            vec![
                BeanLifecycle::Create,
                BeanLifecycle::Populate,
                BeanLifecycle::Change,
                BeanLifecycle::Populate,
            ]
        );
        assert_eq!(
            recorder.events[0],
            (BeanLifecycle::Create, "order".to_string(), None)
        );
        assert!(recorder.events.contains(&(
            BeanLifecycle::Populate,
            "order".to_string(),
            Some("header".to_string())
        )));
    }

    #[test]
    fn test_conversion_failure_aborts() {
        let err = engine()
            .filter(r#"<order id="seven"/>"#, &mut [])
            .unwrap_err();
        assert!(matches!(err, BindingError::Conversion { .. }));
    }

    #[test]
    fn test_factory_presets_survive_binding() {
        let engine = BindingEngineBuilder::new(ApplicationContext::new())
            .add_yaml(&CONFIG.replace(
                "    createOnElement: /order/header\n",
                "    createOnElement: /order/header\n    factory: Header(customerName=anonymous, express=true)\n",
            ))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(engine.factory("header").map(|f| f.type_name()), Some("Header"));
        assert!(engine.factory("order").is_none());

        let result = engine
            .filter(r#"<order><header><express>no</express></header></order>"#, &mut [])
            .unwrap();
        let header = result.get("header").unwrap();
        assert_eq!(header.get("customerName"), Some(Value::from("anonymous")));
        assert_eq!(header.get("express"), Some(Value::Boolean(false)));
    }

    #[test]
    fn test_factory_type_mismatch_rejected() {
        let err = BindingEngineBuilder::new(ApplicationContext::new())
            .add_yaml(&CONFIG.replace(
                "    createOnElement: /order/header\n",
                "    createOnElement: /order/header\n    factory: Item\n",
            ))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, BindingError::Config(ref msg) if msg.contains("'Item' beans")));
    }

    #[test]
    fn test_namespace_events() {
        let mut reaper = NamespaceReaper::new();
        engine()
            .filter(
                r#"<order xmlns:x="urn:x"><header xmlns="urn:d"/></order>"#,
                &mut [&mut reaper as &mut dyn BindingObserver],
            )
            .unwrap();
        assert_eq!(reaper.mappings().get("urn:x").map(String::as_str), Some("x"));
        assert_eq!(reaper.mappings().get("urn:d").map(String::as_str), Some(""));
    }
}
