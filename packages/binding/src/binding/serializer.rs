//! Writing a bean graph through a root serializer tree.

use std::collections::BTreeMap;
use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{BindingTree, NodeId, SerializationContext};
use crate::bean::{BeanRef, Value};
use crate::config::{XMLNS_ATTRIBUTE, XMLNS_ATTRIBUTE_NS_URI};
use crate::error::{BindingError, Result};
use crate::xml::QName;

/// Detached serialization tree for one top-level bean type.
#[derive(Debug, Clone)]
pub struct RootNodeSerializer {
    bean_id: String,
    tree: BindingTree,
}

/// Per-call output options.
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions<'a> {
    /// Namespace URI to prefix overrides. When set, these replace the
    /// namespace declarations carried by the tree. An empty prefix declares
    /// the default namespace.
    pub prefix_overrides: Option<&'a BTreeMap<String, String>>,
    /// Raw markup written immediately before the root element.
    pub pre_text: Option<&'a str>,
}

/// Rendered element, built before writing so that empty optional elements
/// can be dropped.
struct Fragment {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Fragment>,
}

impl RootNodeSerializer {
    #[must_use]
    pub fn new(bean_id: impl Into<String>, tree: BindingTree) -> Self {
        Self {
            bean_id: bean_id.into(),
            tree,
        }
    }

    /// Id of the bean model this serializer writes.
    #[must_use]
    pub fn bean_id(&self) -> &str {
        &self.bean_id
    }

    #[must_use]
    pub fn tree(&self) -> &BindingTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut BindingTree {
        &mut self.tree
    }

    /// Write `bean` as one element tree.
    ///
    /// # Errors
    /// Returns `BindingError::Conversion` when a value cannot be written as
    /// text and `BindingError::Io` when writing fails.
    pub fn serialize(
        &self,
        bean: &BeanRef,
        out: &mut dyn Write,
        options: &SerializeOptions<'_>,
        default_prefixes: &BTreeMap<String, String>,
    ) -> Result<()> {
        let Some(root) = self.tree.root() else {
            return Ok(());
        };
        let mut context = SerializationContext::new(&self.bean_id, bean.clone());
        let prefixes = PrefixResolver {
            overrides: options.prefix_overrides,
            defaults: default_prefixes,
        };

        let mut fragments = Vec::new();
        self.render(root, &mut context, &prefixes, true, &mut fragments)?;

        if let Some(pre_text) = options.pre_text {
            out.write_all(pre_text.as_bytes())?;
        }
        let mut writer = Writer::new(out);
        for fragment in &fragments {
            emit(&mut writer, fragment)?;
        }
        Ok(())
    }

    fn render(
        &self,
        id: NodeId,
        context: &mut SerializationContext,
        prefixes: &PrefixResolver<'_>,
        is_root: bool,
        out: &mut Vec<Fragment>,
    ) -> Result<()> {
        let node = self.tree.node(id);

        if let Some(collection) = node.collection_getter() {
            let Some(Value::Bean(list)) = collection.getter.evaluate(context) else {
                return Ok(());
            };
            for item in list.items() {
                if let Value::Bean(item) = item {
                    context.push(&collection.item_bean_id, item);
                    let rendered = self.render_element(id, context, prefixes, false);
                    context.pop();
                    out.extend(rendered?);
                }
            }
            return Ok(());
        }

        out.extend(self.render_element(id, context, prefixes, is_root)?);
        Ok(())
    }

    fn render_element(
        &self,
        id: NodeId,
        context: &mut SerializationContext,
        prefixes: &PrefixResolver<'_>,
        is_root: bool,
    ) -> Result<Option<Fragment>> {
        let node = self.tree.node(id);

        let value = match node.getter() {
            Some(getter) => match getter.evaluate(context) {
                Some(value) => Some(value),
                None => return Ok(None),
            },
            None => None,
        };
        let text = match &value {
            Some(Value::Bean(_)) | None => None,
            Some(scalar) => Some(self.to_text(id, scalar)?),
        };

        let mut attributes = Vec::new();
        if is_root {
            if let Some(overrides) = prefixes.overrides {
                for (uri, prefix) in overrides {
                    let name = if prefix.is_empty() {
                        XMLNS_ATTRIBUTE.to_string()
                    } else {
                        format!("{XMLNS_ATTRIBUTE}:{prefix}")
                    };
                    attributes.push((name, uri.clone()));
                }
            }
        }
        // Namespace declarations go ahead of the value attributes.
        let mut values = Vec::new();
        for &attribute_id in node.attributes() {
            let attribute = self.tree.node(attribute_id);
            let is_declaration = attribute.name().namespace() == Some(XMLNS_ATTRIBUTE_NS_URI);
            if is_declaration && prefixes.overrides.is_some() {
                continue;
            }
            let Some(value) = attribute.getter().and_then(|g| g.evaluate(context)) else {
                continue;
            };
            if is_declaration {
                attributes.push((
                    declaration_name(attribute.name()),
                    self.to_text(attribute_id, &value)?,
                ));
            } else {
                values.push((prefixes.name(attribute.name()), self.to_text(attribute_id, &value)?));
            }
        }
        attributes.extend(values);

        let mut children = Vec::new();
        for &child in node.children() {
            self.render(child, context, prefixes, false, &mut children)?;
        }

        let has_content = text.is_some() || !attributes.is_empty() || !children.is_empty();
        if !is_root && node.getter().is_none() && !has_content {
            return Ok(None);
        }

        Ok(Some(Fragment {
            name: prefixes.name(node.name()),
            attributes,
            text,
            children,
        }))
    }

    fn to_text(&self, id: NodeId, value: &Value) -> Result<String> {
        let node = self.tree.node(id);
        match (node.converter(), value) {
            (Some(converter), _) => match converter.convert(value)? {
                Value::Text(text) => Ok(text),
                other => Err(BindingError::Conversion {
                    value: format!("{other:?}"),
                    from: other.value_type().to_string(),
                    to: "text".to_string(),
                    reason: format!("converter for '{}' did not produce text", self.tree.path_of(id)),
                }),
            },
            (None, Value::Text(text)) => Ok(text.clone()),
            (None, other) => Err(BindingError::Conversion {
                value: format!("{other:?}"),
                from: other.value_type().to_string(),
                to: "text".to_string(),
                reason: format!("no converter attached to '{}'", self.tree.path_of(id)),
            }),
        }
    }
}

/// Chooses the prefix an element or attribute is written with.
struct PrefixResolver<'a> {
    overrides: Option<&'a BTreeMap<String, String>>,
    /// Namespace URI to prefix, from the engine's namespace table.
    defaults: &'a BTreeMap<String, String>,
}

impl PrefixResolver<'_> {
    fn name(&self, name: &QName) -> String {
        let Some(uri) = name.namespace() else {
            return name.local_name().to_string();
        };
        let prefix = self
            .overrides
            .and_then(|o| o.get(uri))
            .map(String::as_str)
            .or(name.prefix())
            .or_else(|| self.defaults.get(uri).map(String::as_str));
        match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", name.local_name()),
            _ => name.local_name().to_string(),
        }
    }
}

fn declaration_name(name: &QName) -> String {
    if name.local_name() == XMLNS_ATTRIBUTE || name.local_name().is_empty() {
        XMLNS_ATTRIBUTE.to_string()
    } else {
        format!("{XMLNS_ATTRIBUTE}:{}", name.local_name())
    }
}

fn emit<W: Write>(writer: &mut Writer<W>, fragment: &Fragment) -> Result<()> {
    let mut start = BytesStart::new(fragment.name.as_str());
    for (name, value) in &fragment.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    if fragment.text.is_none() && fragment.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(BindingError::xml_write);
    }

    writer
        .write_event(Event::Start(start))
        .map_err(BindingError::xml_write)?;
    if let Some(text) = &fragment.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(BindingError::xml_write)?;
    }
    for child in &fragment.children {
        emit(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(fragment.name.as_str())))
        .map_err(BindingError::xml_write)
}
