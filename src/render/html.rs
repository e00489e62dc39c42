//! Escaping and attribute serialisation for element output.

use std::borrow::Cow;

use tracing::warn;

use super::props::PropValue;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "allowfullscreen",
    "async",
    "autofocus",
    "autoplay",
    "checked",
    "controls",
    "default",
    "defer",
    "disabled",
    "disablepictureinpicture",
    "disableremoteplayback",
    "formnovalidate",
    "hidden",
    "inert",
    "loop",
    "muted",
    "nomodule",
    "novalidate",
    "open",
    "playsinline",
    "readonly",
    "required",
    "reversed",
    "scoped",
    "seamless",
    "selected",
    "itemscope",
];

/// Attributes whose `false` value is meaningful and must be written out.
const ENUMERATED_ATTRIBUTES: &[&str] = &["contenteditable", "draggable", "spellcheck", "value"];

/// Directives that only make sense on components; on elements they are dropped.
const COMPONENT_DIRECTIVES: &[&str] = &["set:html", "set:text"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(tag))
}

fn is_boolean_attribute(key: &str) -> bool {
    BOOLEAN_ATTRIBUTES
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(key))
}

fn is_enumerated_attribute(key: &str) -> bool {
    ENUMERATED_ATTRIBUTES
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(key))
}

/// Escape text content for inclusion in markup.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Escape a value for a double-quoted attribute.
pub fn escape_attribute(value: &str) -> String {
    value.replace('&', "&#38;").replace('"', "&#34;")
}

fn kebab(key: &str) -> Cow<'_, str> {
    if !key.chars().any(|ch| ch.is_ascii_uppercase()) {
        return Cow::Borrowed(key);
    }
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    Cow::Owned(out)
}

fn style_from_map(entries: &[(String, PropValue)]) -> String {
    entries
        .iter()
        .filter(|(_, value)| !value.to_string().is_empty())
        .map(|(key, value)| {
            if key.starts_with("--") {
                format!("{key}:{value}")
            } else {
                format!("{}:{value}", kebab(key))
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn class_list(value: &PropValue, out: &mut Vec<String>) {
    match value {
        PropValue::List(items) => items.iter().for_each(|item| class_list(item, out)),
        PropValue::Map(entries) => out.extend(
            entries
                .iter()
                .filter(|(_, enabled)| enabled.is_truthy())
                .map(|(class, _)| class.clone()),
        ),
        other if other.is_truthy() => out.extend(
            other
                .to_string()
                .split_whitespace()
                .map(str::to_string),
        ),
        _ => {}
    }
}

/// Serialise a single attribute, including its leading space. Returns an
/// empty string when the attribute should be omitted.
pub fn render_attribute(key: &str, value: &PropValue) -> String {
    if matches!(value, PropValue::Null) {
        return String::new();
    }

    if COMPONENT_DIRECTIVES.contains(&key) {
        warn!(
            attribute = key,
            "component directive used on a plain element; ignoring"
        );
        return String::new();
    }

    if key == "class:list" {
        let mut classes = Vec::new();
        class_list(value, &mut classes);
        if classes.is_empty() {
            return String::new();
        }
        return format!(" class=\"{}\"", escape_attribute(&classes.join(" ")));
    }

    if key == "style" {
        match value {
            PropValue::Map(entries) => {
                return format!(" style=\"{}\"", escape_attribute(&style_from_map(entries)));
            }
            PropValue::List(items) if items.len() == 2 => {
                if let (PropValue::Map(entries), extra) = (&items[0], &items[1]) {
                    let style = format!("{};{extra}", style_from_map(entries));
                    return format!(" style=\"{}\"", escape_attribute(&style));
                }
            }
            _ => {}
        }
    }

    let key = if key == "className" { "class" } else { key };

    match value {
        PropValue::Bool(false) if is_enumerated_attribute(key) => format!(" {key}=\"false\""),
        PropValue::Bool(false) => String::new(),
        PropValue::Bool(true) if key.starts_with("data-") || is_boolean_attribute(key) => {
            format!(" {key}")
        }
        other => format!(" {key}=\"{}\"", escape_attribute(&other.to_string())),
    }
}

/// Serialise every attribute in order.
pub fn spread_attributes<'a>(attributes: impl IntoIterator<Item = (&'a str, &'a PropValue)>) -> String {
    attributes
        .into_iter()
        .map(|(key, value)| render_attribute(key, value))
        .collect()
}
