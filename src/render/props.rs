//! Ordered component properties.

use std::fmt;

use super::value::{HtmlString, Renderable, format_number};

/// A plain property value. Sub-trees passed as props travel as slots instead.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Html(HtmlString),
    List(Vec<PropValue>),
    Map(Vec<(String, PropValue)>),
}

impl PropValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            PropValue::Null => false,
            PropValue::Bool(value) => *value,
            PropValue::Int(value) => *value != 0,
            PropValue::Float(value) => *value != 0.0 && !value.is_nan(),
            PropValue::Str(value) => !value.is_empty(),
            PropValue::Html(value) => !value.is_empty(),
            PropValue::List(_) | PropValue::Map(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            PropValue::Html(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// Stringification used for attribute values: lists join with commas and maps
/// collapse to an opaque object marker.
impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => Ok(()),
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => f.write_str(&format_number(*value)),
            PropValue::Str(value) => f.write_str(value),
            PropValue::Html(value) => f.write_str(value.as_str()),
            PropValue::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    item.fmt(f)?;
                }
                Ok(())
            }
            PropValue::Map(_) => f.write_str("[object Object]"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<HtmlString> for PropValue {
    fn from(value: HtmlString) -> Self {
        Self::Html(value)
    }
}

impl<T: Into<PropValue>> From<Vec<T>> for PropValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<PropValue> for Renderable {
    fn from(value: PropValue) -> Self {
        match value {
            PropValue::Null => Renderable::Empty,
            PropValue::Bool(value) => Renderable::Bool(value),
            PropValue::Int(value) => Renderable::Int(value),
            PropValue::Float(value) => Renderable::Float(value),
            PropValue::Str(value) => Renderable::Text(value),
            PropValue::Html(value) => Renderable::Html(value),
            PropValue::List(items) => Renderable::List(items.into_iter().map(Into::into).collect()),
            map @ PropValue::Map(_) => Renderable::Text(map.to_string()),
        }
    }
}

/// Insertion-ordered property bag; attribute output follows insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    entries: Vec<(String, PropValue)>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Props
where
    K: Into<String>,
    V: Into<PropValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut props = Props::new();
        for (key, value) in iter {
            props.insert(key, value);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let props = Props::new()
            .with("a", 1)
            .with("b", "two")
            .with("a", 3);

        let keys: Vec<_> = props.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(props.get("a"), Some(&PropValue::Int(3)));
    }

    #[test]
    fn display_matches_attribute_stringification() {
        let list = PropValue::List(vec![1.into(), "x".into(), 2.5.into()]);
        assert_eq!(list.to_string(), "1,x,2.5");
        assert_eq!(PropValue::Map(Vec::new()).to_string(), "[object Object]");
        assert_eq!(PropValue::Float(3.0).to_string(), "3");
    }

    #[test]
    fn truthiness() {
        assert!(!PropValue::Null.is_truthy());
        assert!(!PropValue::Str(String::new()).is_truthy());
        assert!(PropValue::List(Vec::new()).is_truthy());
        assert!(!PropValue::Float(f64::NAN).is_truthy());
    }
}
