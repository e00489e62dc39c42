//! Virtual-node trees produced by JSX-style authoring.

use std::{fmt, sync::Arc};

use super::{
    component::{ComponentFactory, FunctionComponent},
    props::PropValue,
    value::Renderable,
};

pub const CHILDREN: &str = "children";

/// What a virtual node stands for.
#[derive(Clone)]
pub enum VNodeKind {
    Fragment,
    Element(String),
    Component(Arc<dyn ComponentFactory>),
    Function(Arc<dyn FunctionComponent>),
    /// Rendered on the server as a whole string rather than through the queue.
    ClientOnly(String),
    /// A node whose type failed to resolve; rendering it is an error.
    Undefined,
}

impl fmt::Debug for VNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeKind::Fragment => f.write_str("Fragment"),
            VNodeKind::Element(tag) => f.debug_tuple("Element").field(tag).finish(),
            VNodeKind::Component(factory) => {
                f.debug_tuple("Component").field(&factory.name()).finish()
            }
            VNodeKind::Function(_) => f.write_str("Function"),
            VNodeKind::ClientOnly(tag) => f.debug_tuple("ClientOnly").field(tag).finish(),
            VNodeKind::Undefined => f.write_str("Undefined"),
        }
    }
}

/// A single virtual-node property.
#[derive(Debug)]
pub enum VNodeProp {
    Value(PropValue),
    /// A sub-tree passed as a prop; becomes a named slot on components.
    Node(Renderable),
    /// A sub-tree explicitly targeted at a named slot.
    Slot(Renderable),
}

impl VNodeProp {
    pub fn into_renderable(self) -> Renderable {
        match self {
            VNodeProp::Value(value) => value.into(),
            VNodeProp::Node(node) | VNodeProp::Slot(node) => node,
        }
    }
}

/// Insertion-ordered virtual-node props.
#[derive(Debug, Default)]
pub struct VNodeProps {
    entries: Vec<(String, VNodeProp)>,
}

impl VNodeProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, prop: VNodeProp) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = prop,
            None => self.entries.push((key, prop)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&VNodeProp> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, prop)| prop)
    }

    pub fn remove(&mut self, key: &str) -> Option<VNodeProp> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VNodeProp)> {
        self.entries.iter().map(|(key, prop)| (key.as_str(), prop))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for VNodeProps {
    type Item = (String, VNodeProp);
    type IntoIter = std::vec::IntoIter<(String, VNodeProp)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A node in a virtual-node tree.
#[derive(Debug)]
pub struct VNode {
    pub kind: VNodeKind,
    pub props: VNodeProps,
}

impl VNode {
    pub fn new(kind: VNodeKind) -> Self {
        Self {
            kind,
            props: VNodeProps::new(),
        }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        Self::new(VNodeKind::Element(tag.into()))
    }

    pub fn fragment() -> Self {
        Self::new(VNodeKind::Fragment)
    }

    pub fn component(factory: Arc<dyn ComponentFactory>) -> Self {
        Self::new(VNodeKind::Component(factory))
    }

    pub fn function(function: Arc<dyn FunctionComponent>) -> Self {
        Self::new(VNodeKind::Function(function))
    }

    pub fn client_only(tag: impl Into<String>) -> Self {
        Self::new(VNodeKind::ClientOnly(tag.into()))
    }

    pub fn undefined() -> Self {
        Self::new(VNodeKind::Undefined)
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(key, VNodeProp::Value(value.into()));
        self
    }

    /// Pass a sub-tree under a prop name other than `children`.
    pub fn node_prop(mut self, key: impl Into<String>, node: impl Into<Renderable>) -> Self {
        self.props.insert(key, VNodeProp::Node(node.into()));
        self
    }

    pub fn slot(mut self, name: impl Into<String>, node: impl Into<Renderable>) -> Self {
        self.props.insert(name, VNodeProp::Slot(node.into()));
        self
    }

    /// Append a child. A single child is stored as-is; further children turn
    /// `children` into a list.
    pub fn child(mut self, node: impl Into<Renderable>) -> Self {
        let node = node.into();
        let children = match self.props.remove(CHILDREN) {
            None => node,
            Some(existing) => match existing.into_renderable() {
                Renderable::List(mut items) => {
                    items.push(node);
                    Renderable::List(items)
                }
                single => Renderable::List(vec![single, node]),
            },
        };
        self.props.insert(CHILDREN, VNodeProp::Node(children));
        self
    }

    pub fn children(self, nodes: impl IntoIterator<Item = Renderable>) -> Self {
        nodes.into_iter().fold(self, |node, child| node.child(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_accumulate_into_a_list() {
        let node = VNode::element("ul")
            .child(VNode::element("li"))
            .child(VNode::element("li"))
            .child("tail");
        match node.props.get(CHILDREN) {
            Some(VNodeProp::Node(Renderable::List(items))) => assert_eq!(items.len(), 3),
            other => panic!("unexpected children: {other:?}"),
        }
    }

    #[test]
    fn single_child_is_not_wrapped() {
        let node = VNode::element("p").child("only");
        assert!(matches!(
            node.props.get(CHILDREN),
            Some(VNodeProp::Node(Renderable::Text(text))) if text == "only"
        ));
    }

    #[test]
    fn remove_preserves_remaining_order() {
        let mut node = VNode::element("a").attr("href", "/").attr("class", "x").attr("id", "y");
        node.props.remove("class");
        let keys: Vec<_> = node.props.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["href", "id"]);
    }
}
