//! Page documents: JSON descriptions of renderable trees.
//!
//! Scalars and arrays map directly onto renderables. Objects are recognised
//! by their key:
//!
//! | shape | renders as |
//! |---|---|
//! | `{"$html": s}` | trusted markup |
//! | `{"tag": t, "props": {..}, "children": [..]}` | an element |
//! | `{"fragment": [..]}` | children only |
//! | `{"template": {"segments": [..], "expressions": [..]}}` | a template result |
//! | `{"instruction": "head" \| "maybe-head"}` | a head instruction |
//! | `{"script": {"key": k, "html": h}}` | a deduplicated script |
//! | `{"delay_ms": n, "value": v}` | `v`, after a delay |
//! | `{"each": [..], "interval_ms": n}` | an async sequence |
//! | `{"reject": message}` | a failing pending value |
//! | `{"redirect": url}` | a 302 replacing the page |
//! | `{"component": {..}}` | a component with props, children and head |
//! | `{"prop": name}` / `{"slot": name}` | a value from the enclosing component |

use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::render::{
    ComponentFactory, PropValue, Propagation, Props, RenderContext, RenderError,
    RenderInstruction, Renderable, ResponseSignal, Slots, VNode,
};

use super::error::AppError;

/// Parse a page document.
pub fn parse(text: &str) -> Result<Renderable, AppError> {
    let value: Value = serde_json::from_str(text)?;
    Ok(to_renderable(value)?)
}

/// Convert a JSON value into a renderable tree.
pub fn to_renderable(value: Value) -> Result<Renderable, RenderError> {
    convert(value, None)
}

/// Props and slots of the component whose body is being converted.
#[derive(Clone, Copy)]
struct Scope<'a> {
    props: &'a Props,
    slots: &'a Slots,
}

fn convert(value: Value, scope: Option<Scope<'_>>) -> Result<Renderable, RenderError> {
    match value {
        Value::Null => Ok(Renderable::Empty),
        Value::Bool(value) => Ok(Renderable::Bool(value)),
        Value::Number(number) => Ok(match number.as_i64() {
            Some(value) => Renderable::Int(value),
            None => Renderable::Float(number.as_f64().unwrap_or(f64::NAN)),
        }),
        Value::String(text) => Ok(Renderable::Text(text)),
        Value::Array(items) => convert_all(items, scope).map(Renderable::List),
        Value::Object(object) => convert_object(object, scope),
    }
}

fn convert_all(items: Vec<Value>, scope: Option<Scope<'_>>) -> Result<Vec<Renderable>, RenderError> {
    items.into_iter().map(|item| convert(item, scope)).collect()
}

fn convert_object(
    mut object: Map<String, Value>,
    scope: Option<Scope<'_>>,
) -> Result<Renderable, RenderError> {
    if let Some(html) = object.remove("$html") {
        return Ok(Renderable::html(expect_string("$html", html)?));
    }
    if let Some(tag) = object.remove("tag") {
        let tag = expect_string("tag", tag)?;
        let node = with_props(VNode::element(tag), object.remove("props"))?;
        let node = with_children(node, object.remove("children"), scope)?;
        return Ok(node.into());
    }
    if let Some(children) = object.remove("fragment") {
        return Ok(with_children(VNode::fragment(), Some(children), scope)?.into());
    }
    if let Some(template) = object.remove("template") {
        let TemplateDocument {
            segments,
            expressions,
        } = serde_json::from_value(template).map_err(shape_error("template"))?;
        return Renderable::template(segments, convert_all(expressions, scope)?);
    }
    if let Some(instruction) = object.remove("instruction") {
        return match expect_string("instruction", instruction)?.as_str() {
            "head" => Ok(RenderInstruction::Head.into()),
            "maybe-head" => Ok(RenderInstruction::MaybeHead.into()),
            other => Err(RenderError::traversal(format!(
                "unknown instruction `{other}`"
            ))),
        };
    }
    if let Some(script) = object.remove("script") {
        let ScriptDocument { key, html } =
            serde_json::from_value(script).map_err(shape_error("script"))?;
        return Ok(RenderInstruction::Script { key, html }.into());
    }
    if let Some(delay) = object.remove("delay_ms") {
        let delay = Duration::from_millis(expect_u64("delay_ms", delay)?);
        let value = convert(object.remove("value").unwrap_or(Value::Null), scope)?;
        return Ok(Renderable::pending(async move {
            tokio::time::sleep(delay).await;
            Ok(value)
        }));
    }
    if let Some(items) = object.remove("each") {
        let Value::Array(items) = items else {
            return Err(RenderError::traversal("`each` must be an array"));
        };
        let interval = match object.remove("interval_ms") {
            Some(value) => Duration::from_millis(expect_u64("interval_ms", value)?),
            None => Duration::ZERO,
        };
        let items = convert_all(items, scope)?;
        return Ok(Renderable::stream(async_stream::stream! {
            for item in items {
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                yield Ok::<_, RenderError>(item);
            }
        }));
    }
    if let Some(message) = object.remove("reject") {
        let message = expect_string("reject", message)?;
        return Ok(Renderable::rejected(RenderError::rejected(message)));
    }
    if let Some(location) = object.remove("redirect") {
        let location = expect_string("redirect", location)?;
        return Ok(ResponseSignal::redirect(&location)?.into());
    }
    if let Some(component) = object.remove("component") {
        return convert_component(component, scope);
    }
    if let Some(name) = object.remove("prop") {
        let name = expect_string("prop", name)?;
        let scope = require_scope("prop", scope)?;
        return Ok(scope.props.get(&name).cloned().map(Renderable::from).into());
    }
    if let Some(name) = object.remove("slot") {
        let name = expect_string("slot", name)?;
        let scope = require_scope("slot", scope)?;
        return Ok(scope.slots.get(&name).map(|slot| slot.to_renderable()).into());
    }

    let keys = object.keys().cloned().collect::<Vec<_>>().join(", ");
    Err(RenderError::traversal(format!(
        "unrecognised document object with keys [{keys}]"
    )))
}

#[derive(Deserialize)]
struct TemplateDocument {
    segments: Vec<String>,
    #[serde(default)]
    expressions: Vec<Value>,
}

#[derive(Deserialize)]
struct ScriptDocument {
    key: String,
    html: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
enum PropagationDocument {
    None,
    #[serde(alias = "self")]
    SelfContained,
    #[serde(alias = "tree")]
    InTree,
}

#[derive(Deserialize)]
struct ComponentDocument {
    name: String,
    #[serde(default)]
    propagation: Option<PropagationDocument>,
    #[serde(default)]
    head: Option<String>,
    #[serde(default)]
    props: Option<Value>,
    #[serde(default)]
    children: Option<Value>,
    #[serde(default)]
    body: Value,
}

/// Component defined inline in a document. Its body is converted on every
/// render with the instance's props and slots in scope.
struct DocumentComponent {
    name: String,
    propagation: Propagation,
    head: Option<String>,
    body: Value,
}

impl ComponentFactory for DocumentComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn propagation(&self) -> Propagation {
        self.propagation
    }

    fn render(&self, _cx: &RenderContext, props: &Props, slots: &Slots) -> Renderable {
        let scope = Scope { props, slots };
        let body = match convert(self.body.clone(), Some(scope)) {
            Ok(body) => body,
            Err(err) => return Renderable::rejected(err),
        };
        match &self.head {
            Some(head) => Renderable::head_and_content(head.clone(), body),
            None => body,
        }
    }
}

fn convert_component(value: Value, scope: Option<Scope<'_>>) -> Result<Renderable, RenderError> {
    let ComponentDocument {
        name,
        propagation,
        head,
        props,
        children,
        body,
    } = serde_json::from_value(value).map_err(shape_error("component"))?;

    let propagation = match propagation {
        None | Some(PropagationDocument::None) => Propagation::None,
        Some(PropagationDocument::SelfContained) => Propagation::SelfContained,
        Some(PropagationDocument::InTree) => Propagation::InTree,
    };
    let factory: Arc<dyn ComponentFactory> = Arc::new(DocumentComponent {
        name,
        propagation,
        head,
        body,
    });

    let node = with_props(VNode::component(factory), props)?;
    Ok(with_children(node, children, scope)?.into())
}

fn with_props(mut node: VNode, props: Option<Value>) -> Result<VNode, RenderError> {
    match props {
        None | Some(Value::Null) => Ok(node),
        Some(Value::Object(props)) => {
            for (key, value) in props {
                node = node.attr(key, prop_value(value));
            }
            Ok(node)
        }
        Some(_) => Err(RenderError::traversal("`props` must be an object")),
    }
}

fn with_children(
    node: VNode,
    children: Option<Value>,
    scope: Option<Scope<'_>>,
) -> Result<VNode, RenderError> {
    match children {
        None | Some(Value::Null) => Ok(node),
        Some(Value::Array(items)) => Ok(node.children(convert_all(items, scope)?)),
        Some(single) => Ok(node.child(convert(single, scope)?)),
    }
}

fn prop_value(value: Value) -> PropValue {
    match value {
        Value::Null => PropValue::Null,
        Value::Bool(value) => PropValue::Bool(value),
        Value::Number(number) => match number.as_i64() {
            Some(value) => PropValue::Int(value),
            None => PropValue::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(value) => PropValue::Str(value),
        Value::Array(items) => PropValue::List(items.into_iter().map(prop_value).collect()),
        Value::Object(entries) => PropValue::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key, prop_value(value)))
                .collect(),
        ),
    }
}

fn expect_string(key: &str, value: Value) -> Result<String, RenderError> {
    match value {
        Value::String(value) => Ok(value),
        other => Err(RenderError::traversal(format!(
            "`{key}` must be a string, found {other}"
        ))),
    }
}

fn expect_u64(key: &str, value: Value) -> Result<u64, RenderError> {
    value
        .as_u64()
        .ok_or_else(|| RenderError::traversal(format!("`{key}` must be a non-negative integer")))
}

fn require_scope<'a>(key: &str, scope: Option<Scope<'a>>) -> Result<Scope<'a>, RenderError> {
    scope.ok_or_else(|| {
        RenderError::traversal(format!("`{key}` is only valid inside a component body"))
    })
}

fn shape_error(key: &'static str) -> impl Fn(serde_json::Error) -> RenderError {
    move |err| RenderError::traversal(format!("invalid `{key}` object: {err}"))
}
