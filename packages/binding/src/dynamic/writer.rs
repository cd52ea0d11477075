//! Bean writer strategies and the alias registry that constructs them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use super::model::BeanMetadata;
use crate::bean::BeanRef;
use crate::binding::{SerializeOptions, XmlBinding};
use crate::alias::AliasRegistry;
use crate::config::{XML_DECLARATION, XML_WRITER_ALIAS};
use crate::error::{BindingError, Result};

/// Namespace state of the model a bean is written from.
#[derive(Debug, Clone, Copy)]
pub struct ModelView<'a> {
    /// Namespace URI to prefix, after reconciliation.
    pub namespace_prefix_mappings: &'a BTreeMap<String, String>,
    /// Metadata of every bean in the model.
    pub metadata: &'a [BeanMetadata],
}

impl<'a> ModelView<'a> {
    /// Metadata of `bean`, by identity.
    #[must_use]
    pub fn bean_metadata(&self, bean: &BeanRef) -> Option<&'a BeanMetadata> {
        self.metadata.iter().find(|m| m.bean().ptr_eq(bean))
    }
}

/// Writes one bean to an output stream.
pub trait BeanWriter: fmt::Debug + Send + Sync {
    fn write(&self, bean: &BeanRef, out: &mut dyn Write, model: &ModelView<'_>) -> Result<()>;
}

/// Builds a writer from the binding of its namespace and the writer params.
pub type WriterConstructor =
    fn(&Arc<XmlBinding>, &BTreeMap<String, String>) -> Result<Arc<dyn BeanWriter>>;

/// Per-type writer table: bean type name to namespace URI to writer. Beans
/// outside any namespace use the empty URI.
pub type BeanWriterTable = HashMap<String, HashMap<String, Arc<dyn BeanWriter>>>;

/// Writes a bean through the root serializer of an [`XmlBinding`].
///
/// The model's prefix mappings replace the binding's own namespace
/// declarations, and the text captured before the bean's element in the
/// source document is written back ahead of it.
#[derive(Debug)]
pub struct XmlBeanWriter {
    binding: Arc<XmlBinding>,
    xml_declaration: bool,
}

impl XmlBeanWriter {
    /// Writer param that turns on the XML declaration.
    pub const XML_DECLARATION_PARAM: &'static str = "xmlDeclaration";

    #[must_use]
    pub fn new(binding: Arc<XmlBinding>) -> Self {
        Self {
            binding,
            xml_declaration: false,
        }
    }

    #[must_use]
    pub fn with_xml_declaration(mut self, enabled: bool) -> Self {
        self.xml_declaration = enabled;
        self
    }

    /// [`WriterConstructor`] for the `xml` alias.
    pub fn construct(
        binding: &Arc<XmlBinding>,
        params: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn BeanWriter>> {
        let xml_declaration = match params.get(Self::XML_DECLARATION_PARAM).map(|v| v.trim()) {
            None => false,
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                return Err(BindingError::Config(format!(
                    "Invalid value '{other}' for writer param '{}'. Must be 'true' or 'false'.",
                    Self::XML_DECLARATION_PARAM
                )))
            }
        };
        Ok(Arc::new(
            Self::new(Arc::clone(binding)).with_xml_declaration(xml_declaration),
        ))
    }
}

impl BeanWriter for XmlBeanWriter {
    fn write(&self, bean: &BeanRef, out: &mut dyn Write, model: &ModelView<'_>) -> Result<()> {
        if self.xml_declaration {
            out.write_all(XML_DECLARATION.as_bytes())?;
        }
        let mappings = model.namespace_prefix_mappings;
        let options = SerializeOptions {
            prefix_overrides: (!mappings.is_empty()).then_some(mappings),
            pre_text: model.bean_metadata(bean).and_then(BeanMetadata::pre_text),
        };
        self.binding.write_bean(bean, out, &options)
    }
}

/// Writer constructors by alias.
///
/// The reserved `default` alias resolves to the `xml` writer.
#[derive(Debug, Clone)]
pub struct WriterFactoryRegistry {
    writers: AliasRegistry<WriterConstructor>,
}

impl WriterFactoryRegistry {
    /// Registry without any writers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            writers: AliasRegistry::new("bean writer", XML_WRITER_ALIAS),
        }
    }

    /// Declare a writer alias.
    #[must_use]
    pub fn with_writer(mut self, alias: impl Into<String>, constructor: WriterConstructor) -> Self {
        self.writers = self.writers.with(alias, constructor);
        self
    }

    /// Look up the constructor for `alias`.
    ///
    /// # Errors
    /// Returns `BindingError::Config` for an unknown alias, and for every
    /// lookup when the declarations contain a duplicate or reserved alias.
    pub fn resolve(&self, alias: &str) -> Result<WriterConstructor> {
        self.writers.resolve(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.writers.aliases()
    }
}

impl Default for WriterFactoryRegistry {
    fn default() -> Self {
        Self::empty().with_writer(XML_WRITER_ALIAS, XmlBeanWriter::construct)
    }
}
