//! Rendering queues to strings, buffered responses and streamed responses.

use std::{io, mem, sync::Arc};

use axum::{
    body::Body,
    http::{
        HeaderValue,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::Response,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{FutureExt, SinkExt, channel::mpsc, future::BoxFuture};
use tracing::{Instrument, Span, debug, instrument, warn};

use super::{
    component::{ComponentFactory, ComponentInstance, PageFunction, propagate_head},
    context::RenderContext,
    error::RenderError,
    html::escape_html,
    props::Props,
    queue::{
        Metadata, NodePool, QueueNode, RenderInstruction, RenderQueue, flatten, flatten_with_pool,
    },
    slot::Slots,
    value::Renderable,
};

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const DOCTYPE: &str = "<!DOCTYPE html>\n";
const DOCTYPE_COMPRESSED: &str = "<!DOCTYPE html>";
const DOCTYPE_PREFIX: &str = "<!doctype html";

/// Chunks a streamed body may hold before rendering waits for the client.
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// Prop set on page entry points rendered through the component path.
pub const SERVER_ROOT_PROP: &str = "server:root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Buffered,
    Streaming,
}

/// What a page render starts from.
pub enum PageSource {
    Component(Arc<dyn ComponentFactory>),
    Page(Arc<dyn PageFunction>),
    /// A queue that was already flattened.
    Queue(RenderQueue),
}

/// Sink for rendered chunks.
#[async_trait]
pub trait RenderDestination: Send {
    async fn write(&mut self, chunk: &str) -> Result<(), RenderError>;

    /// Whether the response head has already been handed to the client, so
    /// the page can no longer be replaced by a bubbled response.
    fn is_committed(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct StringDestination {
    buffer: String,
}

impl StringDestination {
    pub fn into_string(self) -> String {
        self.buffer
    }
}

#[async_trait]
impl RenderDestination for StringDestination {
    async fn write(&mut self, chunk: &str) -> Result<(), RenderError> {
        self.buffer.push_str(chunk);
        Ok(())
    }
}

/// Forwards every chunk to a response body as soon as it is produced. A
/// full channel suspends rendering until the client catches up.
pub struct ChannelDestination {
    sender: mpsc::Sender<Result<Bytes, io::Error>>,
    bytes_written: usize,
}

impl ChannelDestination {
    pub fn new(sender: mpsc::Sender<Result<Bytes, io::Error>>) -> Self {
        Self {
            sender,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Terminate the body with an error.
    async fn fail(&mut self, error: &RenderError) {
        let _ = self
            .sender
            .send(Err(io::Error::other(error.to_string())))
            .await;
    }
}

#[async_trait]
impl RenderDestination for ChannelDestination {
    async fn write(&mut self, chunk: &str) -> Result<(), RenderError> {
        self.sender
            .send(Ok(Bytes::copy_from_slice(chunk.as_bytes())))
            .await
            .map_err(|_| RenderError::stream("response body receiver dropped"))?;
        self.bytes_written += chunk.len();
        Ok(())
    }

    fn is_committed(&self) -> bool {
        true
    }
}

/// Wraps a destination with page-level behaviour: a doctype ahead of the
/// first non-empty chunk unless it already carries one, and optionally the
/// head elements right after it.
pub struct PageDestination<D> {
    inner: D,
    cx: RenderContext,
    inject_head: bool,
    started: bool,
}

impl<D: RenderDestination> PageDestination<D> {
    pub fn new(inner: D, cx: RenderContext, inject_head: bool) -> Self {
        Self {
            inner,
            cx,
            inject_head,
            started: false,
        }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn doctype(&self) -> Option<&'static str> {
        if self.cx.is_partial() {
            None
        } else if self.cx.compress_html() {
            Some(DOCTYPE_COMPRESSED)
        } else {
            Some(DOCTYPE)
        }
    }
}

#[async_trait]
impl<D: RenderDestination> RenderDestination for PageDestination<D> {
    async fn write(&mut self, chunk: &str) -> Result<(), RenderError> {
        if chunk.is_empty() {
            return Ok(());
        }
        if !self.started {
            self.started = true;
            if let Some(doctype) = self.doctype().filter(|_| !starts_with_doctype(chunk)) {
                self.inner.write(doctype).await?;
                if self.inject_head {
                    if let Some(head) = self.cx.take_head() {
                        self.inner.write(&head).await?;
                    }
                }
            }
        }
        self.inner.write(chunk).await
    }

    fn is_committed(&self) -> bool {
        self.inner.is_committed()
    }
}

fn starts_with_doctype(chunk: &str) -> bool {
    chunk
        .get(..DOCTYPE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(DOCTYPE_PREFIX))
}

fn render_instruction(payload: &RenderInstruction, cx: &RenderContext) -> String {
    match payload {
        RenderInstruction::Head => cx.take_head().unwrap_or_default(),
        RenderInstruction::MaybeHead if cx.is_partial() => String::new(),
        RenderInstruction::MaybeHead => cx.take_head().unwrap_or_default(),
        RenderInstruction::Script { key, html } => {
            if cx.mark_script(key) {
                html.clone()
            } else {
                String::new()
            }
        }
    }
}

/// Write `nodes` to `destination` in order. Component bodies are flattened
/// and rendered in place with the same pool.
///
/// A response bubbling out of a component body stops the render. Before the
/// destination is committed the caller is expected to serve that response;
/// afterwards it is a traversal error.
pub fn render_nodes<'a, D>(
    nodes: Vec<QueueNode>,
    pool: &'a mut NodePool,
    cx: &'a RenderContext,
    destination: &'a mut D,
) -> BoxFuture<'a, Result<(), RenderError>>
where
    D: RenderDestination + ?Sized,
{
    async move {
        for node in nodes {
            match node {
                QueueNode::Text { content } => destination.write(&escape_html(&content)).await?,
                QueueNode::HtmlString { html } => destination.write(&html).await?,
                QueueNode::Instruction { payload } => {
                    let html = render_instruction(&payload, cx);
                    destination.write(&html).await?;
                }
                QueueNode::Component { mut instance } => {
                    propagate_head(&mut instance, cx).await?;
                    debug!(component = %instance.display_name(), "rendering component");
                    let body = instance.render(cx);
                    let queue = flatten_with_pool(body, cx, mem::take(pool)).await?;
                    let (nodes, nested_pool, _) = queue.into_parts();
                    *pool = nested_pool;
                    if cx.bubbled_response().is_some() {
                        if destination.is_committed() {
                            return Err(RenderError::traversal(format!(
                                "component `{}` returned a response after the page was sent",
                                instance.display_name()
                            )));
                        }
                        debug!(
                            component = %instance.display_name(),
                            "response bubbled out of a component body"
                        );
                        return Ok(());
                    }
                    render_nodes(nodes, pool, cx, destination).await?;
                    if cx.bubbled_response().is_some() {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }
    .boxed()
}

/// Render any tree to a string, without page-level doctype handling.
pub fn render_to_string(
    root: Renderable,
    cx: RenderContext,
) -> BoxFuture<'static, Result<String, RenderError>> {
    async move {
        let queue = flatten(root, &cx).await?;
        let (nodes, mut pool, cx) = queue.into_parts();
        let mut destination = StringDestination::default();
        render_nodes(nodes, &mut pool, &cx, &mut destination).await?;
        Ok(destination.into_string())
    }
    .boxed()
}

/// Adapter running a page entry point through the component path.
struct PageComponent(Arc<dyn PageFunction>);

impl ComponentFactory for PageComponent {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn render(&self, cx: &RenderContext, props: &Props, _slots: &Slots) -> Renderable {
        self.0.call(cx, props.clone())
    }
}

/// Render a page into an HTTP response.
///
/// A response that bubbles out of the tree during flattening replaces the
/// page. Buffered output carries a `Content-Length`; streamed output is sent
/// chunk by chunk as it is produced.
#[instrument(skip_all, fields(pathname = %cx.pathname(), mode = ?mode))]
pub async fn render_page(
    source: PageSource,
    props: Props,
    children: Slots,
    mode: RenderMode,
    cx: &RenderContext,
) -> Result<Response, RenderError> {
    let (queue, inject_head) = match source {
        PageSource::Queue(queue) => (queue, false),
        PageSource::Component(factory) => (resolve_root(factory, props, children, cx).await?, false),
        PageSource::Page(page) => {
            let inject_head = page.needs_head_rendering();
            let mut props = props;
            props.insert(SERVER_ROOT_PROP, true);
            let factory: Arc<dyn ComponentFactory> = Arc::new(PageComponent(page));
            (resolve_root(factory, props, children, cx).await?, inject_head)
        }
    };

    if let Some(signal) = queue.context().bubbled_response() {
        debug!(status = %signal.status, "response bubbled out of the page");
        return Ok(signal.into_response());
    }

    match mode {
        RenderMode::Buffered => render_buffered(queue, inject_head).await,
        RenderMode::Streaming => Ok(render_streaming(queue, inject_head)),
    }
}

/// Run the page's root component before anything is flattened, so a
/// response it returns is captured ahead of the bubbling check.
async fn resolve_root(
    factory: Arc<dyn ComponentFactory>,
    props: Props,
    children: Slots,
    cx: &RenderContext,
) -> Result<RenderQueue, RenderError> {
    let metadata = Metadata::new(None, props, children);
    let mut instance = ComponentInstance::from_metadata(factory, Some(&metadata));
    if let Some(head) = instance.init(cx).await? {
        cx.push_extra_head(head);
    }
    flatten(instance.render(cx), cx).await
}

async fn render_buffered(queue: RenderQueue, inject_head: bool) -> Result<Response, RenderError> {
    let (nodes, mut pool, cx) = queue.into_parts();
    let mut destination =
        PageDestination::new(StringDestination::default(), cx.clone(), inject_head);
    render_nodes(nodes, &mut pool, &cx, &mut destination).await?;
    pool.report(cx.pathname());
    cx.stats().report(cx.pathname());

    if let Some(signal) = cx.bubbled_response() {
        debug!(status = %signal.status, "response bubbled out of a component body");
        return Ok(signal.into_response());
    }

    let body = destination.into_inner().into_string();
    debug!(bytes = body.len(), "buffered page rendered");
    let length = body.len();
    let mut response = page_response(&cx, Body::from(body));
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}

fn render_streaming(queue: RenderQueue, inject_head: bool) -> Response {
    let (sender, receiver) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let cx = queue.context().clone();

    tokio::spawn(
        async move {
            let (nodes, mut pool, cx) = queue.into_parts();
            let mut destination =
                PageDestination::new(ChannelDestination::new(sender), cx.clone(), inject_head);
            match render_nodes(nodes, &mut pool, &cx, &mut destination).await {
                Ok(()) => {
                    let bytes = destination.into_inner().bytes_written();
                    debug!(bytes, "streamed page rendered");
                }
                Err(RenderError::Stream { message }) => {
                    debug!(reason = %message, "stopped streaming to closed body");
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        error_kind = err.kind(),
                        "streaming render failed"
                    );
                    destination.into_inner().fail(&err).await;
                }
            }
            pool.report(cx.pathname());
            cx.stats().report(cx.pathname());
        }
        .instrument(Span::current()),
    );

    page_response(&cx, Body::from_stream(receiver))
}

fn page_response(cx: &RenderContext, body: Body) -> Response {
    let init = cx.response_init();
    let mut response = Response::new(body);
    *response.status_mut() = init.status;
    response.headers_mut().extend(init.headers.clone());
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    response
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{body::to_bytes, http::StatusCode};
    use futures::StreamExt;

    use super::*;
    use crate::render::{component::FnComponent, context::HeadElements, value::ResponseSignal};

    async fn render(source: PageSource, props: Props, mode: RenderMode, cx: &RenderContext) -> Response {
        render_page(source, props, Slots::new(), mode, cx)
            .await
            .expect("render page")
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn hello() -> Arc<dyn ComponentFactory> {
        FnComponent::new("Hello", |_, props, _| {
            let name = props.get("name").cloned().unwrap_or_default();
            Renderable::list([
                Renderable::html("<h1>"),
                Renderable::text(name.to_string()),
                Renderable::html("</h1>"),
            ])
        })
        .into_factory()
    }

    #[test]
    fn doctype_detection_is_case_insensitive() {
        assert!(starts_with_doctype("<!DOCTYPE html>"));
        assert!(starts_with_doctype("<!doctype HTML lang>"));
        assert!(!starts_with_doctype("<html>"));
        assert!(!starts_with_doctype("<!doc"));
    }

    #[tokio::test]
    async fn buffered_page_gets_doctype_and_length() {
        let cx = RenderContext::new("/");
        let response = render(
            PageSource::Component(hello()),
            Props::new().with("name", "<you>"),
            RenderMode::Buffered,
            &cx,
        )
        .await;

        assert_eq!(response.headers()[CONTENT_TYPE], HTML_CONTENT_TYPE);
        let expected = "<!DOCTYPE html>\n<h1>&lt;you&gt;</h1>";
        assert_eq!(
            response.headers()[CONTENT_LENGTH],
            expected.len().to_string().as_str()
        );
        assert_eq!(body_text(response).await, expected);
    }

    #[tokio::test]
    async fn existing_doctype_is_not_duplicated() {
        let cx = RenderContext::builder("/").compress_html(true).build();
        let page = FnComponent::new("Doc", |_, _, _| {
            Renderable::list([Renderable::html(""), Renderable::html("<!doctype html><p>x</p>")])
        })
        .into_factory();
        let response = render(PageSource::Component(page), Props::new(), RenderMode::Buffered, &cx).await;
        assert_eq!(body_text(response).await, "<!doctype html><p>x</p>");
    }

    #[tokio::test]
    async fn partials_skip_doctype() {
        let cx = RenderContext::builder("/").partial(true).build();
        let response = render(PageSource::Component(hello()), Props::new(), RenderMode::Buffered, &cx).await;
        assert_eq!(body_text(response).await, "<h1></h1>");
    }

    #[tokio::test]
    async fn streaming_matches_buffered_output() {
        let buffered = {
            let cx = RenderContext::new("/");
            let props = Props::new().with("name", "x");
            let response = render(PageSource::Component(hello()), props, RenderMode::Buffered, &cx).await;
            body_text(response).await
        };
        let cx = RenderContext::new("/");
        let props = Props::new().with("name", "x");
        let response = render(PageSource::Component(hello()), props, RenderMode::Streaming, &cx).await;
        assert!(response.headers().get(CONTENT_LENGTH).is_none());
        assert_eq!(body_text(response).await, buffered);
    }

    struct HeadPage;

    impl PageFunction for HeadPage {
        fn needs_head_rendering(&self) -> bool {
            true
        }

        fn call(&self, _cx: &RenderContext, props: Props) -> Renderable {
            let root = props.get(SERVER_ROOT_PROP).cloned().unwrap_or_default();
            Renderable::html(format!("<body data-root=\"{root}\"></body>"))
        }
    }

    #[tokio::test]
    async fn page_functions_get_root_flag_and_head() {
        let cx = RenderContext::builder("/")
            .head(HeadElements {
                styles: vec!["<style>b{}</style>".into()],
                ..HeadElements::default()
            })
            .build();
        let source = PageSource::Page(Arc::new(HeadPage));
        let response = render(source, Props::new(), RenderMode::Buffered, &cx).await;
        assert_eq!(
            body_text(response).await,
            "<!DOCTYPE html>\n<style>b{}</style><body data-root=\"true\"></body>"
        );
    }

    #[tokio::test]
    async fn bubbled_response_replaces_page() {
        let cx = RenderContext::new("/");
        let page = FnComponent::new("Guard", |_, _, _| {
            match ResponseSignal::redirect("/login") {
                Ok(signal) => Renderable::Response(signal),
                Err(err) => Renderable::rejected(err),
            }
        })
        .into_factory();
        let response = render(PageSource::Component(page), Props::new(), RenderMode::Streaming, &cx).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(body_text(response).await, "");
    }

    fn script(key: &str) -> Renderable {
        RenderInstruction::Script {
            key: key.into(),
            html: "<script>1</script>".into(),
        }
        .into()
    }

    #[tokio::test]
    async fn scripts_render_once_and_head_instruction_once() {
        let cx = RenderContext::new("/");
        cx.push_extra_head("<meta name=\"x\">".into());
        let root = Renderable::list([
            RenderInstruction::Head.into(),
            RenderInstruction::MaybeHead.into(),
            script("k"),
            script("k"),
        ]);
        let html = render_to_string(root, cx).await.expect("render");
        assert_eq!(html, "<meta name=\"x\"><script>1</script>");
    }

    fn guard() -> Arc<dyn ComponentFactory> {
        FnComponent::new("Guard", |_, _, _| match ResponseSignal::redirect("/x") {
            Ok(signal) => Renderable::Response(signal),
            Err(err) => Renderable::rejected(err),
        })
        .into_factory()
    }

    fn shell(nested: Arc<dyn ComponentFactory>) -> Arc<dyn ComponentFactory> {
        FnComponent::new("Shell", move |_, _, _| {
            Renderable::list([
                Renderable::html("<p>a</p>"),
                Renderable::Factory(Arc::clone(&nested)),
            ])
        })
        .into_factory()
    }

    async fn body_parts(response: Response) -> (String, Option<String>) {
        let mut text = String::new();
        let mut failure = None;
        let mut stream = response.into_body().into_data_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => text.push_str(std::str::from_utf8(&bytes).expect("utf8")),
                Err(err) => failure = Some(err.to_string()),
            }
        }
        (text, failure)
    }

    #[tokio::test]
    async fn nested_component_response_replaces_buffered_page() {
        let cx = RenderContext::new("/");
        let response = render(
            PageSource::Component(shell(guard())),
            Props::new(),
            RenderMode::Buffered,
            &cx,
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/x");
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn nested_component_response_fails_a_started_stream() {
        let cx = RenderContext::new("/");
        let response = render(
            PageSource::Component(shell(guard())),
            Props::new(),
            RenderMode::Streaming,
            &cx,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let (text, failure) = body_parts(response).await;
        assert_eq!(text, "<!DOCTYPE html>\n<p>a</p>");
        let failure = failure.expect("body ends in an error");
        assert!(failure.contains("`Guard` returned a response"), "{failure}");
    }

    #[tokio::test]
    async fn rejection_mid_stream_puts_body_in_error_state() {
        let failing = FnComponent::new("Feed", |_, _, _| {
            Renderable::rejected(RenderError::rejected("E"))
        })
        .into_factory();
        let cx = RenderContext::new("/");
        let response = render(
            PageSource::Component(shell(failing)),
            Props::new(),
            RenderMode::Streaming,
            &cx,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let (text, failure) = body_parts(response).await;
        assert_eq!(text, "<!DOCTYPE html>\n<p>a</p>");
        assert_eq!(failure.as_deref(), Some("pending value rejected: E"));
    }

    #[tokio::test]
    async fn dropped_receiver_stops_emission() {
        let renders = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&renders);
        let later = FnComponent::new("Later", move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Renderable::html("<p>late</p>")
        })
        .into_factory();

        let cx = RenderContext::new("/");
        let root = Renderable::list([Renderable::html("<p>first</p>"), Renderable::Factory(later)]);
        let (nodes, mut pool, cx) = flatten(root, &cx).await.expect("flatten").into_parts();

        let (sender, receiver) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        drop(receiver);
        let mut destination = ChannelDestination::new(sender);
        let err = render_nodes(nodes, &mut pool, &cx, &mut destination)
            .await
            .expect_err("closed body");

        assert_eq!(err, RenderError::stream("response body receiver dropped"));
        assert_eq!(destination.bytes_written(), 0);
        assert_eq!(renders.load(Ordering::SeqCst), 0);
    }
}
