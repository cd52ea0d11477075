//! Binding rules: YAML configuration and the compiled bean models.

mod config;
mod model;

pub use config::{
    BeanConfig, BindingConfig, DefaultNamespaceConfig, TypeConfig, ValueConfig, WiringConfig,
    WriterConfig,
};
pub use model::{BeanModel, Binding, DataBinding, ModelSet, WiredBinding, WiredInto};
