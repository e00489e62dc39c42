//! Flat render queues and the flatteners that build them.

mod builder;
mod pool;
mod vnode_builder;

use std::sync::Arc;

pub use builder::{flatten, flatten_with_pool};
pub use pool::{
    COMMON_HTML_PATTERNS, DEFAULT_POOL_SIZE, LiteralKind, NodePool, PoolConfig, PoolStats,
};
pub use vnode_builder::flatten_vnode;

use super::{
    component::ComponentInstance,
    context::RenderContext,
    props::Props,
    slot::Slots,
    value::Renderable,
};

/// Directive interpreted by the renderer rather than written verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderInstruction {
    /// Emit head elements here.
    Head,
    /// Emit head elements here unless they were already emitted or the
    /// render is a partial.
    MaybeHead,
    /// Emit `html` the first time `key` is seen in the render.
    Script { key: String, html: String },
}

/// Discriminant of a [`QueueNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Text,
    HtmlString,
    Instruction,
    Component,
}

/// One entry of a flattened render queue.
#[derive(Debug)]
pub enum QueueNode {
    /// Text that is escaped on output.
    Text { content: Arc<str> },
    /// Markup emitted verbatim.
    HtmlString { html: Arc<str> },
    Instruction { payload: RenderInstruction },
    Component { instance: Box<ComponentInstance> },
}

impl QueueNode {
    pub fn component(instance: ComponentInstance) -> Self {
        QueueNode::Component {
            instance: Box::new(instance),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            QueueNode::Text { .. } => NodeKind::Text,
            QueueNode::HtmlString { .. } => NodeKind::HtmlString,
            QueueNode::Instruction { .. } => NodeKind::Instruction,
            QueueNode::Component { .. } => NodeKind::Component,
        }
    }

    /// Raw content of a literal node.
    pub fn literal(&self) -> Option<&str> {
        match self {
            QueueNode::Text { content } => Some(content),
            QueueNode::HtmlString { html } => Some(html),
            _ => None,
        }
    }
}

/// Props, slots and display name attached to a sub-tree.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub display_name: Option<String>,
    pub props: Arc<Props>,
    pub slots: Arc<Slots>,
}

impl Metadata {
    pub fn new(display_name: Option<String>, props: Props, slots: Slots) -> Self {
        Self {
            display_name,
            props: Arc::new(props),
            slots: Arc::new(slots),
        }
    }
}

/// Pending work on the flattening stack.
#[derive(Debug)]
pub struct StackItem {
    pub node: Renderable,
    /// Index of the queue node this item descends from, if any.
    pub parent: Option<usize>,
    pub metadata: Option<Arc<Metadata>>,
}

impl StackItem {
    pub fn new(node: Renderable, parent: Option<usize>, metadata: Option<Arc<Metadata>>) -> Self {
        Self {
            node,
            parent,
            metadata,
        }
    }

    pub fn root(node: Renderable) -> Self {
        Self::new(node, None, None)
    }
}

/// A flattened tree in document order, together with the pool that interned
/// its literals and the context it was built for.
#[derive(Debug)]
pub struct RenderQueue {
    nodes: Vec<QueueNode>,
    pool: NodePool,
    context: RenderContext,
}

impl RenderQueue {
    pub(crate) fn new(context: RenderContext, pool: NodePool) -> Self {
        Self {
            nodes: Vec::new(),
            pool,
            context,
        }
    }

    pub fn nodes(&self) -> &[QueueNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn pool(&self) -> &NodePool {
        &self.pool
    }

    pub fn into_parts(self) -> (Vec<QueueNode>, NodePool, RenderContext) {
        (self.nodes, self.pool, self.context)
    }

    pub(crate) fn push(&mut self, node: QueueNode) {
        self.nodes.push(node);
    }

    pub(crate) fn push_text(&mut self, content: &str) {
        let node = self.pool.acquire(LiteralKind::Text, content);
        self.nodes.push(node);
    }

    pub(crate) fn push_html(&mut self, html: &str) {
        let node = self.pool.acquire(LiteralKind::HtmlString, html);
        self.nodes.push(node);
    }

    /// Nodes are collected in reverse document order; flip them once
    /// traversal is complete.
    pub(crate) fn finish(&mut self) {
        self.nodes.reverse();
    }
}

/// Push `items` so that they pop in reverse and end up in document order once
/// the queue is reversed.
pub(crate) fn push_children(
    stack: &mut Vec<StackItem>,
    items: impl IntoIterator<Item = Renderable>,
    parent: Option<usize>,
    metadata: Option<&Arc<Metadata>>,
) {
    stack.extend(
        items
            .into_iter()
            .map(|node| StackItem::new(node, parent, metadata.cloned())),
    );
}
