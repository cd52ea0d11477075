//! Beanbinder - bidirectional binding between XML documents and bean graphs.
//!
//! Binding rules declared in YAML map selector paths onto dynamically typed
//! beans. The same rules drive both directions: a streaming bind turns a
//! document into a bean graph, and per-type root serializers write a bean
//! graph back as XML of the same shape.
//!
//! # Example
//!
//! ```
//! use beanbinder::config;
//!
//! // Validate bean ids and writer aliases
//! assert!(config::validate_bean_id("orderHeader").is_ok());
//! assert!(config::validate_alias("default").is_err());
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Constants and validation
//! - [`alias`]: Strategy registries keyed by alias
//! - [`error`]: Error types and Result alias
//! - [`xml`]: Qualified names and DOM helpers
//! - [`selector`]: Absolute selector paths
//! - [`bean`]: Bean instances, type registry and converters
//! - [`rules`]: YAML binding configuration and compiled bean models
//! - [`engine`]: Streaming bind and lifecycle events
//! - [`binding`]: Root serializers and object graph to XML
//! - [`dynamic`]: Multi-namespace descriptors, models and bean writers
//! - [`cli`]: Command-line interface

pub mod alias;
pub mod bean;
pub mod binding;
pub mod cli;
pub mod config;
pub mod dynamic;
pub mod engine;
pub mod error;
pub mod rules;
pub mod selector;
pub mod xml;

// Re-export commonly used items
pub use bean::{BeanInstance, BeanRef, TypeRegistry, Value, ValueType};
pub use binding::XmlBinding;
pub use dynamic::{Descriptor, Model, ModelBuilder};
pub use engine::{ApplicationContext, BindResult, BindingEngine, BindingEngineBuilder};
pub use error::{BindingError, Result};
