//! Reading documents into [`Model`]s.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use roxmltree::Document;

use super::model::{BeanMetadata, Model};
use super::writer::BeanWriterTable;
use super::Descriptor;
use crate::bean::BeanRef;
use crate::engine::{BeanEvent, BeanLifecycle, BindResult, BindingObserver, NamespaceReaper};
use crate::error::{BindingError, Result};

/// Reads documents governed by a [`Descriptor`].
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    descriptor: Arc<Descriptor>,
    validate: bool,
}

impl ModelBuilder {
    /// Create a builder. With `validate` set, documents are checked against
    /// the descriptor's composite schema before they are bound.
    #[must_use]
    pub fn new(descriptor: Arc<Descriptor>, validate: bool) -> Self {
        Self {
            descriptor,
            validate,
        }
    }

    #[must_use]
    pub fn is_validating(&self) -> bool {
        self.validate
    }

    #[must_use]
    pub fn descriptor(&self) -> &Arc<Descriptor> {
        &self.descriptor
    }

    /// Read a model rooted at the first bean of `type_name`.
    ///
    /// # Errors
    /// Returns parse, validation and bind errors, and
    /// `BindingError::BeanNotFound` when no bean of that type was bound.
    pub fn read_model(&self, xml: &str, type_name: &str) -> Result<Model<BeanRef>> {
        let (result, metadata, mappings) = self.bind(xml)?;
        let root = result
            .bean_by_type(type_name)
            .cloned()
            .ok_or_else(|| BindingError::BeanNotFound {
                type_name: type_name.to_string(),
            })?;
        Ok(Model::from_parts(
            root,
            Arc::clone(&self.descriptor),
            metadata,
            mappings,
        ))
    }

    /// Read a model rooted at the whole bind result.
    pub fn read_result_model(&self, xml: &str) -> Result<Model<BindResult>> {
        let (result, metadata, mappings) = self.bind(xml)?;
        Ok(Model::from_parts(
            result,
            Arc::clone(&self.descriptor),
            metadata,
            mappings,
        ))
    }

    /// Read a model from a reader.
    pub fn read_model_from(&self, mut reader: impl Read, type_name: &str) -> Result<Model<BeanRef>> {
        let mut xml = String::new();
        reader.read_to_string(&mut xml)?;
        self.read_model(&xml, type_name)
    }

    /// Read a document and return its first bean of `type_name`.
    pub fn read_object(&self, xml: &str, type_name: &str) -> Result<BeanRef> {
        let model = self.read_result_model(xml)?;
        model
            .root()
            .bean_by_type(type_name)
            .cloned()
            .ok_or_else(|| BindingError::BeanNotFound {
                type_name: type_name.to_string(),
            })
    }

    fn bind(&self, xml: &str) -> Result<(BindResult, Vec<BeanMetadata>, BTreeMap<String, String>)> {
        let document = Document::parse(xml)?;
        if self.validate {
            match self.descriptor.schema() {
                Some(schema) => schema.validate(&document)?,
                None => tracing::debug!("Validation requested but no schema is configured"),
            }
        }

        let mut tracker = BeanTracker::new(Arc::clone(self.descriptor.bean_writers()));
        let mut reaper = NamespaceReaper::new();
        tracker.start();
        let result = self
            .descriptor
            .engine()
            .filter_document(
                &document,
                &mut [&mut tracker as &mut dyn BindingObserver, &mut reaper],
            )?;

        Ok((result, tracker.finish(), reaper.into_mappings()))
    }
}

/// Tracking state of a [`BeanTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Tracking,
    Finalized,
}

/// Records metadata for every bean created during one bind.
#[derive(Debug)]
pub struct BeanTracker {
    state: TrackerState,
    beans: Vec<BeanMetadata>,
    writers: Arc<BeanWriterTable>,
}

impl BeanTracker {
    #[must_use]
    pub fn new(writers: Arc<BeanWriterTable>) -> Self {
        Self {
            state: TrackerState::Idle,
            beans: Vec::new(),
            writers,
        }
    }

    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn start(&mut self) {
        self.state = TrackerState::Tracking;
    }

    /// Stop tracking and hand over the metadata in creation order.
    pub fn finish(mut self) -> Vec<BeanMetadata> {
        self.state = TrackerState::Finalized;
        std::mem::take(&mut self.beans)
    }

    #[must_use]
    pub fn beans(&self) -> &[BeanMetadata] {
        &self.beans
    }

    fn track(&mut self, event: &BeanEvent<'_>) {
        let mut metadata = BeanMetadata::new(event.bean.clone());
        let namespace = event.source.name.namespace().map(str::to_string);
        metadata.set_namespace(namespace.clone());
        metadata.set_namespace_prefix(event.source.name.prefix().map(str::to_string));
        metadata.set_create_source(event.source.clone());
        metadata.set_pre_text(event.source.pre_text.clone());

        let type_name = event.bean.type_name();
        let namespace = namespace.unwrap_or_default();
        match self.writers.get(&type_name) {
            Some(by_namespace) => match by_namespace.get(&namespace) {
                Some(writer) => metadata.set_writer(Arc::clone(writer)),
                None => tracing::debug!(
                    bean_type = %type_name,
                    namespace = %namespace,
                    "BeanWriters are configured for bean type, but not for namespace"
                ),
            },
            None => tracing::debug!(bean_type = %type_name, "No BeanWriters configured for bean type"),
        }
        self.beans.push(metadata);
    }
}

impl BindingObserver for BeanTracker {
    fn on_bean_event(&mut self, event: &BeanEvent<'_>) -> Result<()> {
        if self.state != TrackerState::Tracking {
            return Err(BindingError::Config(format!(
                "Bean tracker received an event for '{}' while {:?}.",
                event.bean_id, self.state
            )));
        }

        match event.lifecycle {
            BeanLifecycle::Create | BeanLifecycle::Change => self.track(event),
            BeanLifecycle::Populate => {
                let metadata = self
                    .beans
                    .iter_mut()
                    .find(|m| m.bean().ptr_eq(event.bean))
                    .ok_or_else(|| BindingError::UnregisteredBean {
                        type_name: event.bean.type_name(),
                    })?;
                metadata.add_populate_source(event.source.clone());
            }
        }
        Ok(())
    }
}
