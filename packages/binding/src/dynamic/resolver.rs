//! Resolving per-namespace resources (schemas, binding configurations).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::descriptor::{binding_config_location, namespace_id, schema_location, Properties};
use crate::error::{BindingError, Result};

/// A resolved resource, as raw bytes or as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSource {
    byte_stream: Option<Vec<u8>>,
    character_stream: Option<String>,
}

impl InputSource {
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            byte_stream: Some(bytes.into()),
            character_stream: None,
        }
    }

    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            byte_stream: None,
            character_stream: Some(text.into()),
        }
    }

    /// A source carrying neither stream. Resolving to this is an error.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn byte_stream(&self) -> Option<&[u8]> {
        self.byte_stream.as_deref()
    }

    #[must_use]
    pub fn character_stream(&self) -> Option<&str> {
        self.character_stream.as_deref()
    }

    /// Resource content as text, preferring the byte stream.
    ///
    /// # Errors
    /// Returns `BindingError::SchemaResolution` when the source carries no
    /// stream or the bytes are not UTF-8.
    pub fn into_text(self, namespace: &str) -> Result<String> {
        match (self.byte_stream, self.character_stream) {
            (Some(bytes), _) => {
                String::from_utf8(bytes).map_err(|e| BindingError::SchemaResolution {
                    namespace: namespace.to_string(),
                    reason: format!("resource is not valid UTF-8: {e}"),
                })
            }
            (None, Some(text)) => Ok(text),
            (None, None) => Err(BindingError::SchemaResolution {
                namespace: namespace.to_string(),
                reason: "resolver returned neither a byte stream nor a character stream"
                    .to_string(),
            }),
        }
    }
}

/// Resolves the resource for a namespace URI.
pub trait EntityResolver: Send + Sync {
    /// `Ok(None)` means the namespace has no resource of this kind.
    fn resolve(&self, namespace: &str) -> Result<Option<InputSource>>;
}

/// Which descriptor location a [`DescriptorResolver`] follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Schema,
    BindingConfig,
}

/// Resolves `<id>.schemaLocation` or `<id>.bindingConfigLocation` entries
/// against a base directory.
#[derive(Debug, Clone)]
pub struct DescriptorResolver {
    descriptors: Vec<Properties>,
    base_dir: PathBuf,
    kind: ResourceKind,
}

impl DescriptorResolver {
    #[must_use]
    pub fn new(descriptors: &[Properties], base_dir: impl AsRef<Path>, kind: ResourceKind) -> Self {
        Self {
            descriptors: descriptors.to_vec(),
            base_dir: base_dir.as_ref().to_path_buf(),
            kind,
        }
    }
}

impl EntityResolver for DescriptorResolver {
    fn resolve(&self, namespace: &str) -> Result<Option<InputSource>> {
        let Some(id) = namespace_id(namespace, &self.descriptors) else {
            return Ok(None);
        };
        let location = match self.kind {
            ResourceKind::Schema => schema_location(&id, &self.descriptors),
            ResourceKind::BindingConfig => binding_config_location(&id, &self.descriptors),
        };
        let Some(location) = location else {
            tracing::debug!(namespace = %namespace, kind = ?self.kind, "No resource location declared");
            return Ok(None);
        };

        let path = self.base_dir.join(location.trim_start_matches('/'));
        let bytes = fs::read(&path).map_err(|e| BindingError::SchemaResolution {
            namespace: namespace.to_string(),
            reason: format!("cannot read '{}': {e}", path.display()),
        })?;
        Ok(Some(InputSource::from_bytes(bytes)))
    }
}

/// In-memory resources keyed by namespace URI.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    resources: HashMap<String, InputSource>,
}

impl MapResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resource(mut self, namespace: impl Into<String>, source: InputSource) -> Self {
        self.resources.insert(namespace.into(), source);
        self
    }
}

impl EntityResolver for MapResolver {
    fn resolve(&self, namespace: &str) -> Result<Option<InputSource>> {
        Ok(self.resources.get(namespace).cloned())
    }
}
