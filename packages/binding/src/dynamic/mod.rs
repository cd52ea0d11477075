//! Multi-namespace models.
//!
//! A [`Descriptor`] composes independently declared configuration
//! namespaces (each with an optional XML schema and binding configuration)
//! into one binding engine. A [`ModelBuilder`] reads documents through it
//! into [`Model`]s that remember, per bean, the namespace, prefix and writer
//! it needs to be written back.

mod builder;
mod descriptor;
mod model;
mod resolver;
mod schema;
mod writer;

pub use builder::{BeanTracker, ModelBuilder, TrackerState};
pub use descriptor::{
    binding_config_location, namespace_id, resolve_namespaces, schema_location, Descriptor,
    Namespace, Properties,
};
pub use model::{BeanMetadata, Model, ModelRoot};
pub use resolver::{DescriptorResolver, EntityResolver, InputSource, MapResolver, ResourceKind};
pub use schema::CompositeSchema;
pub use writer::{
    BeanWriter, BeanWriterTable, ModelView, WriterConstructor, WriterFactoryRegistry,
    XmlBeanWriter,
};
