//! Error types for the binding engine.
//!
//! Every variant is fatal for the operation that raised it. Nothing in this
//! crate retries: configuration and consistency errors are structural, so
//! each variant carries the selector path, bean type or namespace needed to
//! diagnose the misconfiguration.

use thiserror::Error;

/// Main error type for the binding library.
#[derive(Debug, Error)]
pub enum BindingError {
    /// Malformed binding configuration (selector, alias, bean reference).
    #[error("Invalid binding configuration: {0}")]
    Config(String),

    /// A property could not be resolved against a declared type.
    #[error("Cannot resolve property '{property}' on type '{type_name}'")]
    BindingResolution { type_name: String, property: String },

    /// A selector path has no node in the binding tree.
    #[error("No binding tree node for selector path '{path}'")]
    NodeNotFound { path: String },

    /// A lifecycle event or lookup referenced a bean that was never registered.
    #[error("Bean instance of type '{type_name}' is not registered in this model")]
    UnregisteredBean { type_name: String },

    /// A bean instance was registered twice in the same model.
    #[error("Bean instance of type '{type_name}' is already registered in this model")]
    BeanAlreadyRegistered { type_name: String },

    /// A bean type declares no default namespace, so it cannot be registered
    /// programmatically.
    #[error("Bean type '{type_name}' declares no default namespace")]
    NoDefaultNamespace { type_name: String },

    /// No root serializer exists for the runtime type of a bean.
    #[error("No serializer for bean type '{type_name}'")]
    NoSerializer { type_name: String },

    /// The bind produced no bean of the requested type.
    #[error("Binding produced no bean of type '{type_name}'")]
    BeanNotFound { type_name: String },

    /// A schema resolver failed to produce a usable schema source.
    #[error("Failed to resolve schema for namespace '{namespace}': {reason}")]
    SchemaResolution { namespace: String, reason: String },

    /// A document did not satisfy the composite schema.
    #[error("Document failed schema validation: {0}")]
    Validation(String),

    /// A value could not be converted between two value types.
    #[error("Cannot convert '{value}' from {from} to {to}: {reason}")]
    Conversion {
        value: String,
        from: String,
        to: String,
        reason: String,
    },

    /// IO error, including XML write failures and unresolved bean writers.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing failed.
    #[error("XML parsing failed: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// YAML binding configuration could not be parsed.
    #[error("YAML parsing failed: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl BindingError {
    /// Build an `Io` error from a message.
    pub fn io(message: impl Into<String>) -> Self {
        BindingError::Io(std::io::Error::other(message.into()))
    }

    /// Wrap an XML writer failure as an `Io` error.
    pub(crate) fn xml_write<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BindingError::Io(std::io::Error::other(err))
    }
}

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, BindingError>;
