//! The result-set container produced by a bind.

use crate::bean::BeanRef;

/// Beans bound by one bind, keyed by bean id in first-binding order.
///
/// Rebinding an id replaces the bean but keeps its position.
#[derive(Debug, Clone, Default)]
pub struct BindResult {
    beans: Vec<(String, BeanRef)>,
}

impl BindResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, bean_id: &str, bean: BeanRef) {
        match self.beans.iter_mut().find(|(id, _)| id == bean_id) {
            Some(slot) => slot.1 = bean,
            None => self.beans.push((bean_id.to_string(), bean)),
        }
    }

    /// Drop every bean whose id fails `keep`.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.beans.retain(|(id, _)| keep(id));
    }

    #[must_use]
    pub fn get(&self, bean_id: &str) -> Option<&BeanRef> {
        self.beans
            .iter()
            .find(|(id, _)| id == bean_id)
            .map(|(_, bean)| bean)
    }

    /// First bean of the given type.
    #[must_use]
    pub fn bean_by_type(&self, type_name: &str) -> Option<&BeanRef> {
        self.beans
            .iter()
            .map(|(_, bean)| bean)
            .find(|bean| bean.type_name() == type_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BeanRef)> {
        self.beans.iter().map(|(id, bean)| (id.as_str(), bean))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.beans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }
}
