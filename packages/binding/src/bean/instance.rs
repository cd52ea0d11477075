//! Bean instances and shared bean references.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Value;

/// A bound object: a type name, ordered properties and, for collection
/// types, ordered items.
#[derive(Debug, Clone, Default)]
pub struct BeanInstance {
    type_name: String,
    properties: Vec<(String, Value)>,
    items: Vec<Value>,
}

impl BeanInstance {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Set a property, replacing any previous value in place.
    pub fn set(&mut self, property: impl Into<String>, value: Value) {
        let property = property.into();
        match self.properties.iter_mut().find(|(name, _)| *name == property) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((property, value)),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Property names in the order they were first set.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(name, _)| name.as_str())
    }
}

/// Shared handle to a bean instance.
///
/// Cloning the handle shares the instance. Identity, not structure, is what
/// the binding model tracks: use [`BeanRef::ptr_eq`] to compare.
#[derive(Clone)]
pub struct BeanRef(Arc<RwLock<BeanInstance>>);

impl BeanRef {
    #[must_use]
    pub fn new(instance: BeanInstance) -> Self {
        Self(Arc::new(RwLock::new(instance)))
    }

    /// Check whether two handles point at the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &BeanRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn type_name(&self) -> String {
        self.read().type_name().to_string()
    }

    #[must_use]
    pub fn get(&self, property: &str) -> Option<Value> {
        self.read().get(property).cloned()
    }

    pub fn set(&self, property: impl Into<String>, value: impl Into<Value>) {
        self.write().set(property, value.into());
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.write().push(value.into());
    }

    #[must_use]
    pub fn item(&self, index: usize) -> Option<Value> {
        self.read().items().get(index).cloned()
    }

    /// Number of collection items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().items().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazily iterate the collection items.
    ///
    /// Each step takes a short read lock, so the iterator can be held while
    /// items are serialized.
    #[must_use]
    pub fn items(&self) -> CollectionItems {
        CollectionItems {
            bean: self.clone(),
            index: 0,
        }
    }

    /// Snapshot of the instance.
    #[must_use]
    pub fn snapshot(&self) -> BeanInstance {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, BeanInstance> {
        self.0.read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, BeanInstance> {
        self.0.write()
    }
}

impl From<BeanInstance> for BeanRef {
    fn from(instance: BeanInstance) -> Self {
        BeanRef::new(instance)
    }
}

impl fmt::Debug for BeanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BeanRef({}@{:p})", self.type_name(), Arc::as_ptr(&self.0))
    }
}

/// Iterator over the items of a collection bean.
#[derive(Debug)]
pub struct CollectionItems {
    bean: BeanRef,
    index: usize,
}

impl Iterator for CollectionItems {
    type Item = Value;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.bean.item(self.index)?;
        self.index += 1;
        Some(item)
    }
}
