//! The renderable tree: every shape a component body may produce.

use std::{fmt, future::Future, sync::Arc};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION},
    response::Response,
};
use futures::{FutureExt, Stream, StreamExt, future::BoxFuture, stream::BoxStream};

use super::{
    component::{ComponentFactory, ComponentInstance},
    error::RenderError,
    queue::{Metadata, RenderInstruction},
    vnode::VNode,
};

/// Markup that is already safe and must be emitted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct HtmlString(Arc<str>);

impl HtmlString {
    pub fn new(html: impl Into<Arc<str>>) -> Self {
        Self(html.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Arc<str> {
        self.0
    }
}

impl fmt::Display for HtmlString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HtmlString {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for HtmlString {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// Interleaved literal/expression output of a compiled template.
///
/// Literal segments are trusted markup; expressions are arbitrary renderables.
/// There is always exactly one more segment than there are expressions.
pub struct TemplateResult {
    segments: Vec<String>,
    expressions: Vec<Renderable>,
}

impl TemplateResult {
    pub fn new(segments: Vec<String>, expressions: Vec<Renderable>) -> Result<Self, RenderError> {
        if segments.len() != expressions.len() + 1 {
            return Err(RenderError::traversal(format!(
                "template has {} literal segments for {} expressions",
                segments.len(),
                expressions.len()
            )));
        }
        Ok(Self {
            segments,
            expressions,
        })
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Renderable>) {
        (self.segments, self.expressions)
    }
}

impl fmt::Debug for TemplateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateResult")
            .field("segments", &self.segments)
            .field("expressions", &self.expressions.len())
            .finish()
    }
}

/// Body of a component that also contributes to the document head.
#[derive(Debug)]
pub struct HeadAndContent {
    pub head: String,
    pub content: Renderable,
}

/// A response that bubbled out of the tree (for example a redirect) and must
/// replace the page instead of being rendered into it.
#[derive(Debug, Clone)]
pub struct ResponseSignal {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseSignal {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }

    pub fn redirect(location: &str) -> Result<Self, RenderError> {
        let value = HeaderValue::from_str(location).map_err(|err| {
            RenderError::traversal(format!("invalid redirect location `{location}`: {err}"))
        })?;
        let mut signal = Self::new(StatusCode::FOUND);
        signal.headers.insert(LOCATION, value);
        Ok(signal)
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// A sub-tree carrying the props, slots and display name that a component
/// factory inside it should be instantiated with.
#[derive(Debug)]
pub struct Scoped {
    pub node: Renderable,
    pub metadata: Metadata,
}

/// Any value a component body may produce.
pub enum Renderable {
    /// `null` / `undefined`; dropped silently.
    Empty,
    /// `false` is dropped, `true` renders as text.
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Html(HtmlString),
    List(Vec<Renderable>),
    /// A value that is not available yet.
    Pending(BoxFuture<'static, Result<Renderable, RenderError>>),
    Iter(Box<dyn Iterator<Item = Renderable> + Send>),
    Stream(BoxStream<'static, Result<Renderable, RenderError>>),
    Template(TemplateResult),
    Instruction(RenderInstruction),
    Instance(Box<ComponentInstance>),
    Factory(Arc<dyn ComponentFactory>),
    Scoped(Box<Scoped>),
    VNode(Box<VNode>),
    HeadAndContent(Box<HeadAndContent>),
    Response(ResponseSignal),
    Display(Box<dyn fmt::Display + Send>),
}

impl Renderable {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn html(value: impl Into<HtmlString>) -> Self {
        Self::Html(value.into())
    }

    pub fn list(items: impl IntoIterator<Item = Renderable>) -> Self {
        Self::List(items.into_iter().collect())
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Renderable, RenderError>> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    pub fn resolved(value: Renderable) -> Self {
        Self::pending(futures::future::ready(Ok(value)))
    }

    pub fn rejected(error: RenderError) -> Self {
        Self::pending(futures::future::ready(Err(error)))
    }

    pub fn iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Renderable>,
        I::IntoIter: Send + 'static,
    {
        Self::Iter(Box::new(items.into_iter()))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Renderable, RenderError>> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }

    pub fn template(
        segments: impl IntoIterator<Item = impl Into<String>>,
        expressions: impl IntoIterator<Item = Renderable>,
    ) -> Result<Self, RenderError> {
        TemplateResult::new(
            segments.into_iter().map(Into::into).collect(),
            expressions.into_iter().collect(),
        )
        .map(Self::Template)
    }

    pub fn factory(factory: Arc<dyn ComponentFactory>) -> Self {
        Self::Factory(factory)
    }

    pub fn scoped(node: Renderable, metadata: Metadata) -> Self {
        Self::Scoped(Box::new(Scoped { node, metadata }))
    }

    pub fn head_and_content(head: impl Into<String>, content: Renderable) -> Self {
        Self::HeadAndContent(Box::new(HeadAndContent {
            head: head.into(),
            content,
        }))
    }

    pub fn display<T>(value: T) -> Self
    where
        T: fmt::Display + Send + 'static,
    {
        Self::Display(Box::new(value))
    }

    /// Variant label used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Renderable::Empty => "empty",
            Renderable::Bool(_) => "bool",
            Renderable::Int(_) => "int",
            Renderable::Float(_) => "float",
            Renderable::Text(_) => "text",
            Renderable::Html(_) => "html",
            Renderable::List(_) => "list",
            Renderable::Pending(_) => "pending",
            Renderable::Iter(_) => "iter",
            Renderable::Stream(_) => "stream",
            Renderable::Template(_) => "template",
            Renderable::Instruction(_) => "instruction",
            Renderable::Instance(_) => "instance",
            Renderable::Factory(_) => "factory",
            Renderable::Scoped(_) => "scoped",
            Renderable::VNode(_) => "vnode",
            Renderable::HeadAndContent(_) => "head-and-content",
            Renderable::Response(_) => "response",
            Renderable::Display(_) => "display",
        }
    }

    /// True for values that produce no output and no children.
    pub(crate) fn is_blank(&self) -> bool {
        match self {
            Renderable::Empty | Renderable::Bool(false) => true,
            Renderable::Text(text) => text.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Debug for Renderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Renderable::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Renderable::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Renderable::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Renderable::Text(value) => f.debug_tuple("Text").field(value).finish(),
            Renderable::Html(value) => f.debug_tuple("Html").field(value).finish(),
            Renderable::List(items) => f.debug_tuple("List").field(items).finish(),
            Renderable::Template(template) => template.fmt(f),
            Renderable::Instruction(payload) => {
                f.debug_tuple("Instruction").field(payload).finish()
            }
            Renderable::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
            Renderable::VNode(vnode) => f.debug_tuple("VNode").field(vnode).finish(),
            Renderable::Scoped(scoped) => f.debug_tuple("Scoped").field(scoped).finish(),
            Renderable::HeadAndContent(value) => {
                f.debug_tuple("HeadAndContent").field(value).finish()
            }
            Renderable::Response(signal) => f.debug_tuple("Response").field(signal).finish(),
            Renderable::Display(value) => f.debug_tuple("Display").field(&value.to_string()).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

impl From<&str> for Renderable {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Renderable {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for Renderable {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Renderable {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Renderable {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Renderable {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<HtmlString> for Renderable {
    fn from(value: HtmlString) -> Self {
        Self::Html(value)
    }
}

impl From<Vec<Renderable>> for Renderable {
    fn from(value: Vec<Renderable>) -> Self {
        Self::List(value)
    }
}

impl From<VNode> for Renderable {
    fn from(value: VNode) -> Self {
        Self::VNode(Box::new(value))
    }
}

impl From<RenderInstruction> for Renderable {
    fn from(value: RenderInstruction) -> Self {
        Self::Instruction(value)
    }
}

impl From<ResponseSignal> for Renderable {
    fn from(value: ResponseSignal) -> Self {
        Self::Response(value)
    }
}

impl<T: Into<Renderable>> From<Option<T>> for Renderable {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// Format a float the way template expressions print numbers: integral values
/// drop the fraction, non-finite values use their spelled-out names, and
/// magnitudes from `1e21` up or below `1e-6` use exponent notation (`1e+21`).
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if value == 0.0 {
        "0".to_string()
    } else if value.abs() >= 1e21 || value.abs() < 1e-6 {
        let formatted = format!("{value:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        }
    } else {
        value.to_string()
    }
}
