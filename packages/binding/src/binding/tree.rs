//! Binding path tree.
//!
//! The tree mirrors the element and attribute structure addressed by the
//! selectors of a model set. Nodes live in an arena and refer to their
//! parent by index, so a subtree can be copied out and detached without
//! reference cycles.

use std::fmt;
use std::sync::Arc;

use super::{CollectionGetter, Getter};
use crate::bean::TypeConverter;
use crate::error::{BindingError, Result};
use crate::selector::{SelectorPath, SelectorStep};
use crate::xml::QName;

/// Index of a node in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Attribute,
}

/// An element or attribute in the binding tree.
#[derive(Debug, Clone)]
pub struct PathNode {
    kind: NodeKind,
    name: QName,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: Vec<NodeId>,
    pub(crate) getter: Option<Getter>,
    pub(crate) converter: Option<Arc<dyn TypeConverter>>,
    pub(crate) collection: Option<CollectionGetter>,
}

impl PathNode {
    fn new(kind: NodeKind, name: QName, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            name,
            parent,
            children: Vec::new(),
            attributes: Vec::new(),
            getter: None,
            converter: None,
            collection: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &QName {
        &self.name
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child elements in insertion order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn attributes(&self) -> &[NodeId] {
        &self.attributes
    }

    #[must_use]
    pub fn getter(&self) -> Option<&Getter> {
        self.getter.as_ref()
    }

    #[must_use]
    pub fn converter(&self) -> Option<&Arc<dyn TypeConverter>> {
        self.converter.as_ref()
    }

    /// Whether this element repeats once per item of a collection.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.collection.is_some()
    }

    #[must_use]
    pub fn collection_getter(&self) -> Option<&CollectionGetter> {
        self.collection.as_ref()
    }
}

/// Arena of path nodes with one or more root elements.
#[derive(Debug, Clone, Default)]
pub struct BindingTree {
    nodes: Vec<PathNode>,
    roots: Vec<NodeId>,
    known_root_names: Vec<QName>,
}

impl BindingTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree holding every path in `selectors`.
    pub fn from_selectors<'a>(selectors: impl IntoIterator<Item = &'a SelectorPath>) -> Self {
        let mut tree = Self::new();
        for selector in selectors {
            tree.insert_path(selector);
        }
        tree
    }

    /// Insert a path, creating missing nodes, and return its terminal node.
    ///
    /// The root step is recorded as a known root name.
    pub fn insert_path(&mut self, path: &SelectorPath) -> NodeId {
        let root_name = path.root().clone();
        if !self.known_root_names.iter().any(|n| n.is_compatible(&root_name)) {
            self.known_root_names.push(root_name);
        }

        let mut current: Option<NodeId> = None;
        for step in path.steps() {
            current = Some(match step {
                SelectorStep::Element(name) => self.element_child(current, name),
                // Parsing guarantees an attribute step follows an element.
                SelectorStep::Attribute(name) => match current {
                    Some(element) => self.add_attribute(element, name.clone()),
                    None => self.element_child(None, name),
                },
            });
        }
        // Parsing guarantees at least one step.
        current.unwrap_or(NodeId(0))
    }

    /// Look up or create the node at `path`.
    ///
    /// # Errors
    /// Returns `BindingError::NodeNotFound` when `create_if_missing` is
    /// false and any step is absent.
    pub fn path_node(&mut self, path: &SelectorPath, create_if_missing: bool) -> Result<NodeId> {
        if create_if_missing {
            Ok(self.insert_path(path))
        } else {
            self.find_node(path)
        }
    }

    /// Find the node at `path` without modifying the tree.
    ///
    /// # Errors
    /// Returns `BindingError::NodeNotFound` when any step is absent.
    pub fn find_node(&self, path: &SelectorPath) -> Result<NodeId> {
        let not_found = || BindingError::NodeNotFound {
            path: path.source().to_string(),
        };

        let mut current: Option<NodeId> = None;
        for step in path.steps() {
            let candidates: &[NodeId] = match (step, current) {
                (SelectorStep::Element(_), None) => &self.roots,
                (SelectorStep::Element(_), Some(id)) => &self.nodes[id.0].children,
                (SelectorStep::Attribute(_), Some(id)) => &self.nodes[id.0].attributes,
                (SelectorStep::Attribute(_), None) => return Err(not_found()),
            };
            current = Some(
                candidates
                    .iter()
                    .copied()
                    .find(|&c| self.nodes[c.0].name.is_compatible(step.name()))
                    .ok_or_else(not_found)?,
            );
        }
        current.ok_or_else(not_found)
    }

    /// Find or create an attribute on an element.
    pub fn add_attribute(&mut self, element: NodeId, name: QName) -> NodeId {
        if let Some(existing) = self.nodes[element.0]
            .attributes
            .iter()
            .copied()
            .find(|&a| self.nodes[a.0].name == name)
        {
            return existing;
        }
        let id = self.push(PathNode::new(NodeKind::Attribute, name, Some(element)));
        self.nodes[element.0].attributes.push(id);
        id
    }

    fn element_child(&mut self, parent: Option<NodeId>, name: &QName) -> NodeId {
        let siblings = match parent {
            Some(id) => &self.nodes[id.0].children,
            None => &self.roots,
        };
        let existing = siblings
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].name.is_compatible(name));
        if let Some(existing) = existing {
            // A namespaced step settles the namespace of a node first seen
            // without one.
            if self.nodes[existing.0].name.namespace().is_none() && name.namespace().is_some() {
                self.nodes[existing.0].name = name.clone();
            }
            return existing;
        }

        let id = self.push(PathNode::new(NodeKind::Element, name.clone(), parent));
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn push(&mut self, node: PathNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &PathNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut PathNode {
        &mut self.nodes[id.0]
    }

    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Root id of the tree. Detached trees have exactly one root.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.roots.first().copied()
    }

    /// Whether `name` is the root step of any inserted path.
    #[must_use]
    pub fn is_known_root(&self, name: &QName) -> bool {
        self.known_root_names.iter().any(|n| n.is_compatible(name))
    }

    #[must_use]
    pub fn known_root_names(&self) -> &[QName] {
        &self.known_root_names
    }

    /// Walk up from a node to its root.
    #[must_use]
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            current = parent;
        }
        current
    }

    /// Copy the subtree at `id` into a new tree whose root has no parent.
    #[must_use]
    pub fn detach(&self, id: NodeId) -> BindingTree {
        let mut detached = BindingTree {
            nodes: Vec::new(),
            roots: Vec::new(),
            known_root_names: self.known_root_names.clone(),
        };
        let root = detached.copy_from(self, id, None);
        detached.roots.push(root);
        detached
    }

    fn copy_from(&mut self, source: &BindingTree, id: NodeId, parent: Option<NodeId>) -> NodeId {
        let original = source.node(id);
        let mut node = original.clone();
        node.parent = parent;
        node.children.clear();
        node.attributes.clear();
        let new_id = self.push(node);

        for &attribute in &original.attributes {
            let copied = self.copy_from(source, attribute, Some(new_id));
            self.nodes[new_id.0].attributes.push(copied);
        }
        for &child in &original.children {
            let copied = self.copy_from(source, child, Some(new_id));
            self.nodes[new_id.0].children.push(copied);
        }
        new_id
    }

    /// Slash-separated path of a node, for diagnostics.
    #[must_use]
    pub fn path_of(&self, id: NodeId) -> String {
        let mut steps = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            steps.push(match node.kind {
                NodeKind::Element => node.name.prefixed_name(),
                NodeKind::Attribute => format!("@{}", node.name.prefixed_name()),
            });
            current = node.parent;
        }
        steps.reverse();
        format!("/{}", steps.join("/"))
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let node = self.node(id);
        let marker = match node.kind {
            NodeKind::Element => "",
            NodeKind::Attribute => "@",
        };
        write!(f, "{:indent$}{marker}{}", "", node.name, indent = depth * 2)?;
        if let Some(getter) = &node.getter {
            write!(f, " getter={getter}")?;
        }
        if let Some(converter) = &node.converter {
            write!(f, " converter={converter:?}")?;
        }
        if let Some(collection) = &node.collection {
            write!(f, " collection[{}]={}", collection.item_bean_id, collection.getter)?;
        }
        writeln!(f)?;

        for &attribute in &node.attributes {
            self.fmt_node(f, attribute, depth + 1)?;
        }
        for &child in &node.children {
            self.fmt_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

/// Indented outline of the tree with its getters and converters.
impl fmt::Display for BindingTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &root in &self.roots {
            self.fmt_node(f, root, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn path(selector: &str) -> SelectorPath {
        let namespaces = BTreeMap::from([("c".to_string(), "urn:c".to_string())]);
        SelectorPath::parse(selector, &namespaces).unwrap()
    }

    #[test]
    fn test_insert_shares_prefixes() {
        let mut tree = BindingTree::new();
        let header = tree.insert_path(&path("/order/header"));
        let customer = tree.insert_path(&path("/order/header/customer"));

        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.node(customer).parent(), Some(header));
        assert_eq!(tree.node(header).children(), &[customer]);
        assert_eq!(tree.path_of(customer), "/order/header/customer");
    }

    #[test]
    fn test_attribute_terminal() {
        let mut tree = BindingTree::new();
        let id = tree.insert_path(&path("/order/@id"));
        assert_eq!(tree.node(id).kind(), NodeKind::Attribute);
        assert_eq!(tree.path_of(id), "/order/@id");
        assert_eq!(tree.find_node(&path("/order/@id")).unwrap(), id);
    }

    #[test]
    fn test_find_missing_node() {
        let tree = BindingTree::from_selectors([&path("/order/header")]);
        let err = tree.find_node(&path("/order/footer")).unwrap_err();
        assert!(matches!(err, BindingError::NodeNotFound { path } if path == "/order/footer"));
    }

    #[test]
    fn test_path_node_create_flag() {
        let mut tree = BindingTree::new();
        assert!(tree.path_node(&path("/order"), false).is_err());
        let created = tree.path_node(&path("/order"), true).unwrap();
        assert_eq!(tree.path_node(&path("/order"), false).unwrap(), created);
    }

    #[test]
    fn test_known_root_names() {
        let tree = BindingTree::from_selectors([&path("/order/header"), &path("/invoice")]);
        assert!(tree.is_known_root(&QName::local("order")));
        assert!(tree.is_known_root(&QName::local("invoice")));
        assert!(!tree.is_known_root(&QName::local("header")));
    }

    #[test]
    fn test_namespace_settled_by_later_step() {
        let mut tree = BindingTree::new();
        let plain = tree.insert_path(&path("/order/customer/name"));
        let qualified = tree.insert_path(&path("/order/c:customer"));

        assert_eq!(tree.node(plain).parent(), Some(qualified));
        assert_eq!(tree.node(qualified).name().namespace(), Some("urn:c"));
    }

    #[test]
    fn test_detach_resets_parent() {
        let mut tree = BindingTree::new();
        tree.insert_path(&path("/order/header/customer"));
        let header = tree.find_node(&path("/order/header")).unwrap();

        let detached = tree.detach(header);
        let root = detached.root().unwrap();
        assert_eq!(detached.node(root).parent(), None);
        assert_eq!(detached.node(root).name().local_name(), "header");
        assert_eq!(detached.path_of(detached.node(root).children()[0]), "/header/customer");
        // The source tree is untouched.
        assert_eq!(tree.node(header).parent(), tree.root());
    }

    #[test]
    fn test_add_attribute_is_idempotent() {
        let mut tree = BindingTree::new();
        let order = tree.insert_path(&path("/order"));
        let a = tree.add_attribute(order, QName::local("id"));
        let b = tree.add_attribute(order, QName::local("id"));
        assert_eq!(a, b);
        assert_eq!(tree.node(order).attributes().len(), 1);
    }
}
