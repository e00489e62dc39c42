use std::sync::Arc;

use tracing::trace;

use super::{Metadata, QueueNode, RenderQueue, StackItem, push_children};
use crate::render::{
    component::ComponentInstance,
    error::RenderError,
    html::{is_void_element, spread_attributes},
    page::render_to_string,
    props::{PropValue, Props},
    slot::{DEFAULT_SLOT, Slot, Slots},
    value::{Renderable, format_number},
    vnode::{CHILDREN, VNode, VNodeKind, VNodeProp, VNodeProps},
};

/// Flatten one virtual-node value onto `queue`.
///
/// Work that needs awaiting, and any value that is not part of the
/// virtual-node vocabulary, is pushed onto `stack` for the tree flattener.
pub fn flatten_vnode(
    node: Renderable,
    queue: &mut RenderQueue,
    stack: &mut Vec<StackItem>,
    parent: Option<usize>,
    metadata: Option<&Arc<Metadata>>,
) -> Result<(), RenderError> {
    queue.context().stats().record_vnode();
    match node {
        Renderable::Html(html) => {
            if !html.is_empty() {
                queue.push_html(html.as_str());
            }
        }
        Renderable::Text(text) => queue.push_text(&text),
        Renderable::Int(value) => queue.push_text(&value.to_string()),
        Renderable::Float(value) => queue.push_text(&format_number(value)),
        Renderable::Bool(true) => queue.push_text("true"),
        Renderable::Empty | Renderable::Bool(false) => {}
        Renderable::List(items) => push_children(stack, items, parent, metadata),
        Renderable::VNode(vnode) => flatten_node(*vnode, queue, stack, parent, metadata)?,
        other => stack.push(StackItem::new(other, parent, metadata.cloned())),
    }
    Ok(())
}

fn flatten_node(
    vnode: VNode,
    queue: &mut RenderQueue,
    stack: &mut Vec<StackItem>,
    parent: Option<usize>,
    metadata: Option<&Arc<Metadata>>,
) -> Result<(), RenderError> {
    let VNode { kind, mut props } = vnode;
    match kind {
        VNodeKind::Undefined => {
            return Err(RenderError::traversal(format!(
                "Unable to render {} because it contains an undefined component",
                queue.context().pathname()
            )));
        }
        VNodeKind::Fragment => {
            if let Some(children) = props.remove(CHILDREN) {
                stack.push(StackItem::new(
                    children.into_renderable(),
                    parent,
                    metadata.cloned(),
                ));
            }
        }
        VNodeKind::Component(factory) => {
            queue.context().stats().record_component();
            let (props, slots) = partition_props(props, queue);
            if factory.propagation().is_propagating() {
                // Resolved by the tree flattener so its head is collected
                // before any head instruction is written.
                let scoped = Renderable::scoped(
                    Renderable::Factory(factory),
                    Metadata::new(None, props, slots),
                );
                stack.push(StackItem::new(scoped, parent, metadata.cloned()));
            } else {
                let display_name = metadata
                    .and_then(|metadata| metadata.display_name.clone())
                    .unwrap_or_else(|| factory.name().to_string());
                let instance = ComponentInstance::new(
                    display_name,
                    factory,
                    Arc::new(props),
                    Arc::new(slots),
                );
                queue.push(QueueNode::component(instance));
            }
        }
        VNodeKind::Function(function) => {
            trace!("calling function component");
            let output = function.call(props);
            stack.push(StackItem::new(output, parent, metadata.cloned()));
        }
        VNodeKind::Element(tag) => flatten_element(tag, props, queue, stack, parent, metadata),
        VNodeKind::ClientOnly(tag) => {
            trace!(tag = %tag, "rendering client-only subtree as a string");
            let subtree = VNode {
                kind: VNodeKind::Element(tag),
                props,
            };
            let rendered = render_to_string(subtree.into(), queue.context().clone());
            let node = Renderable::pending(async move { rendered.await.map(Renderable::html) });
            stack.push(StackItem::new(node, parent, metadata.cloned()));
        }
    }
    Ok(())
}

/// Split virtual-node props into plain props and slots. `children` becomes
/// the default slot and sub-trees under any other key become named slots.
fn partition_props(props: VNodeProps, queue: &RenderQueue) -> (Props, Slots) {
    let cx = queue.context();
    let mut plain = Props::new();
    let mut slots = Slots::new();
    for (key, prop) in props {
        match prop {
            VNodeProp::Value(value) if key != CHILDREN => plain.insert(key, value),
            other => {
                let name = if key == CHILDREN {
                    DEFAULT_SLOT.to_string()
                } else {
                    key
                };
                slots.insert(name, Slot::deferred(other.into_renderable(), cx));
            }
        }
    }
    (plain, slots)
}

fn flatten_element(
    tag: String,
    mut props: VNodeProps,
    queue: &mut RenderQueue,
    stack: &mut Vec<StackItem>,
    parent: Option<usize>,
    metadata: Option<&Arc<Metadata>>,
) {
    queue.context().stats().record_element();
    let children = props
        .remove(CHILDREN)
        .map(VNodeProp::into_renderable)
        .filter(|children| !children.is_blank());

    let values: Vec<(String, PropValue)> = props
        .into_iter()
        .filter_map(|(key, prop)| match prop {
            VNodeProp::Value(value) => Some((key, value)),
            VNodeProp::Node(_) | VNodeProp::Slot(_) => {
                trace!(tag = %tag, attribute = %key, "dropping sub-tree attribute on element");
                None
            }
        })
        .collect();
    let attributes = spread_attributes(values.iter().map(|(key, value)| (key.as_str(), value)));

    let Some(children) = children else {
        if is_void_element(&tag) {
            queue.push_html(&format!("<{tag}{attributes}/>"));
        } else {
            queue.push_html(&format!("<{tag}{attributes}></{tag}>"));
        }
        return;
    };

    let children = match children {
        Renderable::Text(text) if is_raw_text_element(&tag) => Renderable::html(text),
        other => other,
    };
    push_children(
        stack,
        [
            Renderable::html(format!("<{tag}{attributes}>")),
            children,
            Renderable::html(format!("</{tag}>")),
        ],
        parent,
        metadata,
    );
}

fn is_raw_text_element(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("style") || tag.eq_ignore_ascii_case("script")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{
        component::{FnComponent, Propagation},
        context::RenderContext,
        queue::{NodeKind, NodePool, PoolConfig, flatten},
    };

    async fn html_of(root: Renderable) -> String {
        let cx = RenderContext::new("/vnode");
        render_to_string(root, cx).await.expect("render")
    }

    #[tokio::test]
    async fn void_elements_self_close() {
        let node = VNode::element("img").attr("src", "/a.png").attr("alt", "");
        assert_eq!(html_of(node.into()).await, "<img src=\"/a.png\" alt=\"\"/>");
    }

    #[tokio::test]
    async fn non_void_elements_without_children_close_explicitly() {
        let node = VNode::element("div").attr("class", "x");
        assert_eq!(html_of(node.into()).await, "<div class=\"x\"></div>");
    }

    #[tokio::test]
    async fn empty_string_child_still_counts_as_no_children() {
        let node = VNode::element("br").child("");
        assert_eq!(html_of(node.into()).await, "<br/>");
    }

    #[tokio::test]
    async fn elements_wrap_children() {
        let node = VNode::element("div")
            .attr("class", "x")
            .child(VNode::element("span").child("hi"))
            .child("!");
        assert_eq!(
            html_of(node.into()).await,
            "<div class=\"x\"><span>hi</span>!</div>"
        );
    }

    #[tokio::test]
    async fn script_children_are_not_escaped() {
        let node = VNode::element("script").child("if (a < b) {}");
        assert_eq!(html_of(node.into()).await, "<script>if (a < b) {}</script>");

        let node = VNode::element("p").child("a < b");
        assert_eq!(html_of(node.into()).await, "<p>a &lt; b</p>");
    }

    #[tokio::test]
    async fn fragments_render_only_children() {
        let node = VNode::fragment().children(["a".into(), Renderable::html("<hr/>")]);
        assert_eq!(html_of(node.into()).await, "a<hr/>");
    }

    #[tokio::test]
    async fn undefined_type_names_the_pathname() {
        let cx = RenderContext::new("/broken");
        let err = flatten(VNode::undefined().into(), &cx)
            .await
            .expect_err("undefined");
        assert_eq!(
            err,
            RenderError::traversal(
                "Unable to render /broken because it contains an undefined component"
            )
        );
    }

    #[tokio::test]
    async fn component_props_partition_into_slots() {
        let card = FnComponent::new("Card", |_, props, slots| {
            let title = props.get("title").cloned().unwrap_or_default();
            let mut parts = vec![Renderable::html(format!("<h2>{title}</h2>"))];
            for name in ["footer", DEFAULT_SLOT] {
                if let Some(slot) = slots.get(name) {
                    parts.push(slot.to_renderable());
                }
            }
            Renderable::List(parts)
        })
        .into_factory();

        let node = VNode::component(card)
            .attr("title", "T")
            .node_prop("footer", VNode::element("small").child("f"))
            .child("body");
        assert_eq!(html_of(node.into()).await, "<h2>T</h2><small>f</small>body");
    }

    #[tokio::test]
    async fn function_components_receive_props() {
        let greet = Arc::new(|props: VNodeProps| match props.get("name") {
            Some(VNodeProp::Value(name)) => Renderable::text(format!("hello {name}")),
            _ => Renderable::Empty,
        });
        let node = VNode::function(greet).attr("name", "ada");
        assert_eq!(html_of(node.into()).await, "hello ada");
    }

    #[tokio::test]
    async fn client_only_subtree_is_one_html_node() {
        let node = VNode::client_only("counter-island").child("0");
        assert_eq!(
            html_of(node.into()).await,
            "<counter-island>0</counter-island>"
        );
    }

    #[tokio::test]
    async fn empty_safe_html_is_skipped() {
        let cx = RenderContext::new("/");
        let mut queue = RenderQueue::new(cx, NodePool::new(PoolConfig::default()));
        let mut stack = Vec::new();
        flatten_vnode(Renderable::html(""), &mut queue, &mut stack, None, None).expect("flatten");
        assert!(queue.is_empty());
        assert!(stack.is_empty());
    }

    #[tokio::test]
    async fn propagating_components_collect_head_while_flattening() {
        let seo = FnComponent::new("Seo", |_, _, _| {
            Renderable::head_and_content("<title>x</title>", Renderable::html("<h1></h1>"))
        })
        .propagating(Propagation::SelfContained)
        .into_factory();
        let cx = RenderContext::new("/");
        let root = VNode::element("body").child(VNode::component(seo)).into();

        let queue = flatten(root, &cx).await.expect("flatten");
        assert_eq!(cx.extra_head(), vec!["<title>x</title>".to_string()]);
        assert!(
            queue
                .nodes()
                .iter()
                .any(|node| node.kind() == NodeKind::Component)
        );
    }

    #[tokio::test]
    async fn vnode_statistics_are_counted_per_render() {
        let card = FnComponent::new("Card", |_, _, _| Renderable::Empty).into_factory();
        let cx = RenderContext::new("/stats");
        let root = VNode::element("div")
            .child(VNode::element("span").child("a"))
            .child(VNode::component(card))
            .into();

        flatten(root, &cx).await.expect("flatten");
        assert_eq!(
            cx.stats().snapshot(),
            crate::render::stats::VNodeStats {
                vnode_count: 3,
                element_count: 2,
                component_count: 1,
            }
        );

        let other = RenderContext::new("/other");
        assert_eq!(other.stats().snapshot().vnode_count, 0);
    }
}
