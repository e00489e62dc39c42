use std::sync::Arc;

use futures::TryStreamExt;
use tracing::{instrument, trace};

use super::{
    NodePool, QueueNode, RenderQueue, StackItem, push_children, vnode_builder::flatten_vnode,
};
use crate::render::{
    component::{ComponentInstance, propagate_head},
    context::RenderContext,
    error::RenderError,
    value::{Renderable, format_number},
};

/// Flatten `root` into a queue in document order.
///
/// Traversal uses an explicit stack, so arbitrarily deep trees never grow the
/// call stack. Pending values are awaited in place; any failure aborts the
/// whole call and no partial queue is returned.
#[instrument(skip_all, fields(pathname = %cx.pathname()))]
pub async fn flatten(root: Renderable, cx: &RenderContext) -> Result<RenderQueue, RenderError> {
    let pool = NodePool::new(cx.pool_config());
    flatten_with_pool(root, cx, pool).await
}

/// [`flatten`] reusing an existing pool, for component bodies flattened
/// while an outer queue is being rendered.
pub async fn flatten_with_pool(
    root: Renderable,
    cx: &RenderContext,
    pool: NodePool,
) -> Result<RenderQueue, RenderError> {
    let mut queue = RenderQueue::new(cx.clone(), pool);
    let mut stack = vec![StackItem::root(root)];

    while let Some(StackItem {
        node,
        parent,
        metadata,
    }) = stack.pop()
    {
        match node {
            Renderable::Pending(future) => {
                trace!(depth = stack.len(), "awaiting pending value");
                let resolved = future.await?;
                stack.push(StackItem::new(resolved, parent, metadata));
            }
            Renderable::Empty | Renderable::Bool(false) => {}
            Renderable::Bool(true) => queue.push_text("true"),
            Renderable::Int(value) => queue.push_text(&value.to_string()),
            Renderable::Float(value) => queue.push_text(&format_number(value)),
            Renderable::Text(text) => queue.push_text(&text),
            Renderable::Html(html) => queue.push_html(html.as_str()),
            Renderable::Display(value) => queue.push_text(&value.to_string()),
            Renderable::List(items) => {
                push_children(&mut stack, items, parent, metadata.as_ref());
            }
            Renderable::Iter(items) => {
                let items: Vec<_> = items.collect();
                push_children(&mut stack, items, parent, metadata.as_ref());
            }
            Renderable::Stream(stream) => {
                trace!(depth = stack.len(), "draining async iterable");
                let items: Vec<_> = stream.try_collect().await?;
                push_children(&mut stack, items, parent, metadata.as_ref());
            }
            Renderable::Template(template) => {
                let (segments, expressions) = template.into_parts();
                let mut segments = segments.into_iter();
                let mut items = Vec::with_capacity(expressions.len() * 2 + 1);
                items.extend(
                    segments
                        .next()
                        .filter(|segment| !segment.is_empty())
                        .map(Renderable::html),
                );
                for (expression, segment) in expressions.into_iter().zip(segments) {
                    items.push(expression);
                    if !segment.is_empty() {
                        items.push(Renderable::html(segment));
                    }
                }
                push_children(&mut stack, items, parent, metadata.as_ref());
            }
            Renderable::Instruction(payload) => queue.push(QueueNode::Instruction { payload }),
            Renderable::Instance(instance) => queue.push(QueueNode::Component { instance }),
            Renderable::Factory(factory) => {
                let mut instance = ComponentInstance::from_metadata(factory, metadata.as_deref());
                propagate_head(&mut instance, cx).await?;
                queue.push(QueueNode::component(instance));
            }
            Renderable::Scoped(scoped) => {
                let scoped = *scoped;
                stack.push(StackItem::new(
                    scoped.node,
                    parent,
                    Some(Arc::new(scoped.metadata)),
                ));
            }
            Renderable::VNode(vnode) => {
                flatten_vnode(
                    Renderable::VNode(vnode),
                    &mut queue,
                    &mut stack,
                    parent,
                    metadata.as_ref(),
                )?;
            }
            Renderable::HeadAndContent(parts) => {
                trace!("head contribution outside propagation ignored");
                stack.push(StackItem::new(parts.content, parent, metadata));
            }
            Renderable::Response(signal) => {
                cx.capture_response(signal);
                queue.push_html("");
            }
        }
    }

    queue.finish();
    Ok(queue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::queue::{NodeKind, PoolConfig, RenderInstruction};

    fn literals(queue: &RenderQueue) -> Vec<(NodeKind, String)> {
        queue
            .nodes()
            .iter()
            .map(|node| (node.kind(), node.literal().unwrap_or_default().to_string()))
            .collect()
    }

    #[tokio::test]
    async fn primitives_follow_document_order() {
        let cx = RenderContext::new("/");
        let root = Renderable::list([
            "a".into(),
            Renderable::Int(1),
            Renderable::Float(2.0),
            Renderable::Bool(true),
            Renderable::Bool(false),
            Renderable::Empty,
            Renderable::html("<b>"),
        ]);

        let queue = flatten(root, &cx).await.expect("flatten");
        assert_eq!(
            literals(&queue),
            vec![
                (NodeKind::Text, "a".into()),
                (NodeKind::Text, "1".into()),
                (NodeKind::Text, "2".into()),
                (NodeKind::Text, "true".into()),
                (NodeKind::HtmlString, "<b>".into()),
            ]
        );
    }

    #[tokio::test]
    async fn templates_interleave_and_skip_empty_segments() {
        let cx = RenderContext::new("/");
        let root = Renderable::template(["", "-", ""], ["x".into(), Renderable::Int(7)])
            .expect("template");

        let queue = flatten(root, &cx).await.expect("flatten");
        assert_eq!(
            literals(&queue),
            vec![
                (NodeKind::Text, "x".into()),
                (NodeKind::HtmlString, "-".into()),
                (NodeKind::Text, "7".into()),
            ]
        );
    }

    #[tokio::test]
    async fn nested_lists_and_pending_siblings_keep_order() {
        let cx = RenderContext::new("/");
        let root = Renderable::list([
            "a".into(),
            Renderable::list(["b".into(), Renderable::resolved("c".into())]),
            Renderable::pending(async {
                tokio::task::yield_now().await;
                Ok(Renderable::text("d"))
            }),
            Renderable::Int(0),
        ]);

        let queue = flatten(root, &cx).await.expect("flatten");
        let texts: Vec<_> = literals(&queue).into_iter().map(|(_, text)| text).collect();
        assert_eq!(texts, ["a", "b", "c", "d", "0"]);
    }

    #[tokio::test]
    async fn empty_list_yields_empty_queue() {
        let cx = RenderContext::new("/");
        let queue = flatten(Renderable::List(Vec::new()), &cx).await.expect("flatten");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn deep_nesting_does_not_overflow() {
        let cx = RenderContext::builder("/").pool(PoolConfig::disabled()).build();
        let mut root = Renderable::text("leaf");
        for _ in 0..100_000 {
            root = Renderable::List(vec![root]);
        }

        let queue = flatten(root, &cx).await.expect("flatten");
        assert_eq!(literals(&queue), vec![(NodeKind::Text, "leaf".into())]);
    }

    #[tokio::test]
    async fn rejected_pending_aborts() {
        let cx = RenderContext::new("/");
        let root = Renderable::list([
            "before".into(),
            Renderable::rejected(RenderError::rejected("E")),
        ]);
        let err = flatten(root, &cx).await.expect_err("rejects");
        assert_eq!(err, RenderError::rejected("E"));
    }

    #[tokio::test]
    async fn response_is_captured_as_empty_html() {
        let cx = RenderContext::new("/");
        let redirect = crate::render::value::ResponseSignal::redirect("/elsewhere").expect("redirect");
        let queue = flatten(Renderable::Response(redirect), &cx).await.expect("flatten");
        assert_eq!(literals(&queue), vec![(NodeKind::HtmlString, String::new())]);
        assert!(cx.bubbled_response().is_some());
    }

    #[tokio::test]
    async fn instructions_pass_through() {
        let cx = RenderContext::new("/");
        let queue = flatten(RenderInstruction::MaybeHead.into(), &cx).await.expect("flatten");
        assert!(matches!(
            queue.nodes(),
            [QueueNode::Instruction { payload: RenderInstruction::MaybeHead }]
        ));
    }
}
