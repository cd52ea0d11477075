//! A bound object model together with the namespace and writer metadata
//! needed to write it back out.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::builder::ModelBuilder;
use super::writer::{BeanWriter, ModelView};
use super::Descriptor;
use crate::bean::BeanRef;
use crate::engine::{BindResult, SourceFragment};
use crate::error::{BindingError, Result};

/// What is known about one bean of a model.
#[derive(Debug, Clone)]
pub struct BeanMetadata {
    bean: BeanRef,
    namespace: Option<String>,
    namespace_prefix: Option<String>,
    create_source: Option<SourceFragment>,
    populate_sources: Vec<SourceFragment>,
    pre_text: Option<String>,
    writer: Option<Arc<dyn BeanWriter>>,
}

impl BeanMetadata {
    #[must_use]
    pub fn new(bean: BeanRef) -> Self {
        Self {
            bean,
            namespace: None,
            namespace_prefix: None,
            create_source: None,
            populate_sources: Vec::new(),
            pre_text: None,
            writer: None,
        }
    }

    #[must_use]
    pub fn bean(&self) -> &BeanRef {
        &self.bean
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn set_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
    }

    #[must_use]
    pub fn namespace_prefix(&self) -> Option<&str> {
        self.namespace_prefix.as_deref()
    }

    pub fn set_namespace_prefix(&mut self, prefix: Option<String>) {
        self.namespace_prefix = prefix;
    }

    /// The element the bean was created on, for beans read from a document.
    #[must_use]
    pub fn create_source(&self) -> Option<&SourceFragment> {
        self.create_source.as_ref()
    }

    pub fn set_create_source(&mut self, source: SourceFragment) {
        self.create_source = Some(source);
    }

    /// Every node that populated the bean, in document order.
    #[must_use]
    pub fn populate_sources(&self) -> &[SourceFragment] {
        &self.populate_sources
    }

    pub(crate) fn add_populate_source(&mut self, source: SourceFragment) {
        self.populate_sources.push(source);
    }

    /// Comments and text that preceded the bean's element.
    #[must_use]
    pub fn pre_text(&self) -> Option<&str> {
        self.pre_text.as_deref()
    }

    pub fn set_pre_text(&mut self, pre_text: Option<String>) {
        self.pre_text = pre_text;
    }

    #[must_use]
    pub fn writer(&self) -> Option<&Arc<dyn BeanWriter>> {
        self.writer.as_ref()
    }

    pub fn set_writer(&mut self, writer: Arc<dyn BeanWriter>) {
        self.writer = Some(writer);
    }
}

/// Root of a [`Model`]: a single bean, or a whole bind result.
pub trait ModelRoot {
    /// The bean written by [`Model::write_model`].
    fn root_bean(&self) -> Result<BeanRef>;
}

impl ModelRoot for BeanRef {
    fn root_bean(&self) -> Result<BeanRef> {
        Ok(self.clone())
    }
}

impl ModelRoot for BindResult {
    fn root_bean(&self) -> Result<BeanRef> {
        let mut beans = self.iter();
        match (beans.next(), beans.next()) {
            (None, _) => Err(BindingError::io("Unable to serialize empty result set model.")),
            (Some((_, bean)), None) => Ok(bean.clone()),
            (Some(_), Some(_)) => Err(BindingError::io(
                "Unable to serialize result set model that contains more than 1 bean instance.",
            )),
        }
    }
}

#[derive(Debug, Default)]
struct ModelState {
    metadata: Vec<BeanMetadata>,
    namespace_prefix_mappings: BTreeMap<String, String>,
}

/// A bound object model.
///
/// Bean metadata and namespace prefix mappings sit behind one lock, so a
/// model can be shared between threads; `write_model` holds the lock for the
/// whole write.
#[derive(Debug)]
pub struct Model<T> {
    root: T,
    descriptor: Arc<Descriptor>,
    known_namespaces: HashSet<String>,
    state: Mutex<ModelState>,
}

impl Model<BeanRef> {
    /// Model for a programmatically built bean graph.
    ///
    /// The root bean is registered with its type's default namespace.
    ///
    /// # Errors
    /// Returns `BindingError::NoDefaultNamespace` when the root bean's type
    /// declares no default namespace.
    pub fn new(root: BeanRef, builder: &ModelBuilder) -> Result<Self> {
        let model = Self::from_parts(
            root.clone(),
            Arc::clone(builder.descriptor()),
            Vec::new(),
            BTreeMap::new(),
        );
        model.register_bean(&root)?;
        Ok(model)
    }
}

impl<T: ModelRoot> Model<T> {
    pub(crate) fn from_parts(
        root: T,
        descriptor: Arc<Descriptor>,
        metadata: Vec<BeanMetadata>,
        namespace_prefix_mappings: BTreeMap<String, String>,
    ) -> Self {
        let known_namespaces = descriptor
            .bean_writers()
            .values()
            .flat_map(|by_namespace| by_namespace.keys().cloned())
            .collect();
        Self {
            root,
            descriptor,
            known_namespaces,
            state: Mutex::new(ModelState {
                metadata,
                namespace_prefix_mappings,
            }),
        }
    }

    #[must_use]
    pub fn root(&self) -> &T {
        &self.root
    }

    fn state(&self) -> MutexGuard<'_, ModelState> {
        self.state.lock()
    }

    /// Register a bean that was added to the graph after binding.
    ///
    /// # Errors
    /// - `BindingError::BeanAlreadyRegistered` when the bean is already part
    ///   of the model.
    /// - `BindingError::NoDefaultNamespace` when its type declares no
    ///   default namespace.
    pub fn register_bean(&self, bean: &BeanRef) -> Result<BeanMetadata> {
        let mut state = self.state();
        if state.metadata.iter().any(|m| m.bean.ptr_eq(bean)) {
            return Err(BindingError::BeanAlreadyRegistered {
                type_name: bean.type_name(),
            });
        }
        let type_name = bean.type_name();
        let default_namespace = self
            .descriptor
            .engine()
            .context()
            .types()
            .get(&type_name)
            .and_then(|def| def.default_namespace())
            .ok_or_else(|| BindingError::NoDefaultNamespace {
                type_name: type_name.clone(),
            })?;

        let mut metadata = BeanMetadata::new(bean.clone());
        metadata.set_namespace(Some(default_namespace.uri.clone()));
        metadata.set_namespace_prefix(Some(default_namespace.prefix.clone()));
        state.metadata.push(metadata.clone());
        tracing::debug!(bean_type = %type_name, namespace = %default_namespace.uri, "Bean registered");
        Ok(metadata)
    }

    /// Metadata of every bean, in registration order.
    #[must_use]
    pub fn metadata(&self) -> Vec<BeanMetadata> {
        self.state().metadata.clone()
    }

    /// Metadata of `bean`, by identity.
    #[must_use]
    pub fn bean_metadata(&self, bean: &BeanRef) -> Option<BeanMetadata> {
        self.state()
            .metadata
            .iter()
            .find(|m| m.bean.ptr_eq(bean))
            .cloned()
    }

    /// Change the metadata of a registered bean. Returns `None` when the bean
    /// is not part of the model.
    pub fn update_bean_metadata<R>(
        &self,
        bean: &BeanRef,
        update: impl FnOnce(&mut BeanMetadata) -> R,
    ) -> Option<R> {
        self.state()
            .metadata
            .iter_mut()
            .find(|m| m.bean.ptr_eq(bean))
            .map(update)
    }

    /// Namespace URI to prefix mappings.
    #[must_use]
    pub fn namespace_prefix_mappings(&self) -> BTreeMap<String, String> {
        self.state().namespace_prefix_mappings.clone()
    }

    /// Declare the prefix a namespace is written with. Declared prefixes win
    /// over the prefixes recorded per bean.
    pub fn declare_namespace_prefix(&self, uri: impl Into<String>, prefix: impl Into<String>) {
        self.state()
            .namespace_prefix_mappings
            .insert(uri.into(), prefix.into());
    }

    /// Writer resolved for `bean`.
    ///
    /// # Errors
    /// Returns `BindingError::UnregisteredBean` when the bean is not part of
    /// the model and `BindingError::Io` when no writer is resolved for it.
    pub fn bean_writer(&self, bean: &BeanRef) -> Result<Arc<dyn BeanWriter>> {
        writer_of(&self.state().metadata, bean)
    }

    /// Write the model root.
    ///
    /// Prefix mappings of namespaces no bean uses any more are dropped, bean
    /// prefixes are aligned with the declared mappings, missing mappings are
    /// added from the beans, and writers are resolved for beans that have
    /// none yet.
    ///
    /// # Errors
    /// Returns `BindingError::Io` when the root is a bind result that does
    /// not hold exactly one bean, when a bean's type has writers but none for
    /// its namespace, or when writing fails.
    pub fn write_model(&self, out: &mut dyn Write) -> Result<()> {
        let root = self.root.root_bean()?;
        let mut state = self.state();

        self.resolve_model_namespaces(&mut state);
        self.resolve_unmapped_writers(&mut state)?;

        let writer = writer_of(&state.metadata, &root)?;
        let view = ModelView {
            namespace_prefix_mappings: &state.namespace_prefix_mappings,
            metadata: &state.metadata,
        };
        writer.write(&root, out, &view)
    }

    /// [`write_model`](Self::write_model) into a string.
    pub fn write_model_to_string(&self) -> Result<String> {
        let mut out = Vec::new();
        self.write_model(&mut out)?;
        String::from_utf8(out).map_err(|e| BindingError::io(e.to_string()))
    }

    fn resolve_model_namespaces(&self, state: &mut ModelState) {
        let ModelState {
            metadata,
            namespace_prefix_mappings: mappings,
        } = state;

        mappings.retain(|uri, _| {
            !self.known_namespaces.contains(uri)
                || metadata.iter().any(|m| m.namespace() == Some(uri.as_str()))
        });

        for meta in metadata.iter_mut() {
            if let Some(declared) = meta.namespace().and_then(|uri| mappings.get(uri)) {
                meta.namespace_prefix = Some(declared.clone());
            }
        }

        for meta in metadata.iter() {
            if let Some(uri) = meta.namespace() {
                mappings
                    .entry(uri.to_string())
                    .or_insert_with(|| meta.namespace_prefix().unwrap_or_default().to_string());
            }
        }
    }

    fn resolve_unmapped_writers(&self, state: &mut ModelState) -> Result<()> {
        let writers = self.descriptor.bean_writers();
        for meta in state.metadata.iter_mut().filter(|m| m.writer.is_none()) {
            let type_name = meta.bean.type_name();
            let Some(by_namespace) = writers.get(&type_name) else {
                continue;
            };
            let namespace = meta.namespace().unwrap_or_default();
            let writer = by_namespace.get(namespace).ok_or_else(|| {
                BindingError::io(format!(
                    "BeanWriters are configured for bean type '{type_name}', but not for namespace '{namespace}'."
                ))
            })?;
            meta.writer = Some(Arc::clone(writer));
        }
        Ok(())
    }
}

fn writer_of(metadata: &[BeanMetadata], bean: &BeanRef) -> Result<Arc<dyn BeanWriter>> {
    let meta = metadata
        .iter()
        .find(|m| m.bean.ptr_eq(bean))
        .ok_or_else(|| BindingError::UnregisteredBean {
            type_name: bean.type_name(),
        })?;
    meta.writer.clone().ok_or_else(|| {
        BindingError::io(format!(
            "No BeanWriter resolved for bean type '{}' in namespace '{}'.",
            bean.type_name(),
            meta.namespace().unwrap_or_default()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::BeanInstance;

    #[test]
    fn test_result_root_needs_exactly_one_bean() {
        let empty = BindResult::new();
        let err = empty.root_bean().unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_bean_root() {
        let bean = BeanRef::new(BeanInstance::new("Order"));
        assert!(bean.root_bean().unwrap().ptr_eq(&bean));
    }

    #[test]
    fn test_writer_of_unregistered_bean() {
        let bean = BeanRef::new(BeanInstance::new("Order"));
        let err = writer_of(&[], &bean).unwrap_err();
        assert!(matches!(err, BindingError::UnregisteredBean { .. }));

        let metadata = vec![BeanMetadata::new(bean.clone())];
        let err = writer_of(&metadata, &bean).unwrap_err();
        assert!(matches!(err, BindingError::Io(_)));
    }
}
