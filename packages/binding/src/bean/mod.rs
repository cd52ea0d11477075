//! Bean instances, declared types and value conversion.
//!
//! Beans are dynamic objects described by a [`TypeRegistry`]. Property
//! access and conversion are resolved by name against the registry, so the
//! binding layer never needs runtime introspection.

mod convert;
mod factory;
mod instance;
mod types;
mod value;

pub use convert::{ConverterConfig, ConverterRegistry, DateConverter, TypeConverter};
pub use factory::{BasicBeanFactory, BeanFactory, FactoryParser, FactoryParserRegistry};
pub use instance::{BeanInstance, BeanRef, CollectionItems};
pub use types::{DefaultNamespace, PropertyDef, TypeDef, TypeKind, TypeRegistry};
pub use value::{Value, ValueType};
