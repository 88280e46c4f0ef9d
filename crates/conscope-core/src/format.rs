//! Rendering of remote value descriptors
//!
//! The browser describes page values with remote object descriptors, some of
//! which carry a one-level object preview. Descriptors are decoded into the
//! closed [`RemoteValue`] variant and rendered by [`format_value`], which
//! never fails and never returns an empty string. Preview properties hold a
//! [`ValueFragment`], which has no preview of its own, so rendering recurses
//! at most one level.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

const OBJECT_PLACEHOLDER: &str = "[object]";
const FUNCTION_PLACEHOLDER: &str = "[function]";
const SYMBOL_PLACEHOLDER: &str = "[symbol]";
const OVERFLOW_SUFFIX: &str = ", ...";

/// A primitive page value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    String(String),
    /// Textual form of the number, including `NaN`, `-0`, `Infinity` and bigints
    Number(String),
    Boolean(bool),
}

/// A page value as described on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Primitive(Primitive),
    Undefined,
    Null,
    Object {
        description: Option<String>,
        preview: Option<ObjectPreview>,
    },
    Function {
        description: Option<String>,
    },
    Symbol {
        description: Option<String>,
    },
}

/// The protocol's partial rendering of an object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectPreview {
    pub subtype: Option<String>,
    pub properties: Vec<PropertyPreview>,
    /// More properties exist than the preview lists
    pub overflow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPreview {
    pub name: String,
    pub value: ValueFragment,
}

/// A value nested inside a preview. Same shape as [`RemoteValue`] minus the preview.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueFragment {
    Primitive(Primitive),
    Undefined,
    Null,
    Object { description: Option<String> },
    Function { description: Option<String> },
    Symbol { description: Option<String> },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRemoteObject {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    kind: String,
    #[serde(default, deserialize_with = "lenient")]
    subtype: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    value: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    unserializable_value: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    preview: Option<WireObjectPreview>,
}

#[derive(Debug, Default, Deserialize)]
struct WireObjectPreview {
    #[serde(default, deserialize_with = "lenient")]
    subtype: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    overflow: bool,
    #[serde(default, deserialize_with = "lenient")]
    properties: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct WirePropertyPreview {
    #[serde(default, deserialize_with = "lenient")]
    name: String,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    kind: String,
    #[serde(default, deserialize_with = "lenient")]
    subtype: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    value: Option<Value>,
}

/// Decode a field, falling back to its default when the wire value has the
/// wrong shape
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Text of a JSON scalar without the quotes serde_json puts around strings
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RemoteValue {
    /// Decode a remote object descriptor. Anything unrecognisable decodes to
    /// an object without description.
    pub fn from_wire(json: &Value) -> Self {
        let wire: WireRemoteObject = match serde_json::from_value(json.clone()) {
            Ok(wire) => wire,
            Err(e) => {
                tracing::debug!(error = %e, "undecodable remote object");
                WireRemoteObject::default()
            }
        };

        match wire.kind.as_str() {
            "undefined" => RemoteValue::Undefined,
            "object" if wire.subtype.as_deref() == Some("null") => RemoteValue::Null,
            "object" => RemoteValue::Object {
                description: wire.description,
                preview: wire.preview.map(ObjectPreview::from_wire),
            },
            "string" => RemoteValue::Primitive(Primitive::String(
                wire.value
                    .as_ref()
                    .map(value_text)
                    .or(wire.description)
                    .unwrap_or_default(),
            )),
            "number" | "bigint" => RemoteValue::Primitive(Primitive::Number(
                wire.value
                    .as_ref()
                    .map(value_text)
                    .or(wire.unserializable_value)
                    .or(wire.description)
                    .unwrap_or_else(|| "NaN".to_string()),
            )),
            "boolean" => RemoteValue::Primitive(Primitive::Boolean(
                wire.value.as_ref().and_then(Value::as_bool).unwrap_or(false),
            )),
            "function" => RemoteValue::Function {
                description: wire.description,
            },
            "symbol" => RemoteValue::Symbol {
                description: wire.description,
            },
            _ => RemoteValue::Object {
                description: wire.description.or(wire.value.as_ref().map(value_text)),
                preview: None,
            },
        }
    }
}

impl ObjectPreview {
    fn from_wire(wire: WireObjectPreview) -> Self {
        Self {
            subtype: wire.subtype,
            overflow: wire.overflow,
            properties: wire
                .properties
                .into_iter()
                .filter_map(|prop| serde_json::from_value::<WirePropertyPreview>(prop).ok())
                .map(|prop| PropertyPreview {
                    value: ValueFragment::from_wire(&prop),
                    name: prop.name,
                })
                .collect(),
        }
    }

    fn is_array(&self) -> bool {
        self.subtype.as_deref() == Some("array")
    }
}

impl ValueFragment {
    fn from_wire(prop: &WirePropertyPreview) -> Self {
        let text = prop.value.as_ref().map(value_text);
        match prop.kind.as_str() {
            "undefined" => ValueFragment::Undefined,
            "object" if prop.subtype.as_deref() == Some("null") => ValueFragment::Null,
            "string" => ValueFragment::Primitive(Primitive::String(text.unwrap_or_default())),
            "number" | "bigint" => ValueFragment::Primitive(Primitive::Number(
                text.unwrap_or_else(|| "NaN".to_string()),
            )),
            "boolean" => ValueFragment::Primitive(Primitive::Boolean(text.as_deref() == Some("true"))),
            "function" => ValueFragment::Function { description: text },
            "symbol" => ValueFragment::Symbol { description: text },
            _ => ValueFragment::Object { description: text },
        }
    }
}

/// `description` when present and non-empty, else the placeholder
fn described(description: &Option<String>, placeholder: &str) -> String {
    match description.as_deref() {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => placeholder.to_string(),
    }
}

fn format_number(text: &str) -> String {
    if text.is_empty() {
        "NaN".to_string()
    } else {
        text.to_string()
    }
}

/// Render a top-level value
pub fn format_value(value: &RemoteValue) -> String {
    match value {
        RemoteValue::Primitive(Primitive::String(s)) if s.is_empty() => "\"\"".to_string(),
        RemoteValue::Primitive(Primitive::String(s)) => s.clone(),
        RemoteValue::Primitive(Primitive::Number(n)) => format_number(n),
        RemoteValue::Primitive(Primitive::Boolean(b)) => b.to_string(),
        RemoteValue::Undefined => "undefined".to_string(),
        RemoteValue::Null => "null".to_string(),
        RemoteValue::Object {
            preview: Some(preview),
            ..
        } => format_preview(preview),
        RemoteValue::Object { description, .. } => described(description, OBJECT_PLACEHOLDER),
        RemoteValue::Function { description } => described(description, FUNCTION_PLACEHOLDER),
        RemoteValue::Symbol { description } => described(description, SYMBOL_PLACEHOLDER),
    }
}

/// Render an object preview as `[a, b]` or `{k: v}`
pub fn format_preview(preview: &ObjectPreview) -> String {
    let (open, close) = if preview.is_array() { ("[", "]") } else { ("{", "}") };

    let items: Vec<String> = if preview.is_array() {
        preview
            .properties
            .iter()
            .filter(|prop| is_index(&prop.name))
            .map(|prop| format_fragment(&prop.value))
            .collect()
    } else {
        preview
            .properties
            .iter()
            .map(|prop| format!("{}: {}", prop.name, format_fragment(&prop.value)))
            .collect()
    };

    let mut out = String::from(open);
    out.push_str(&items.join(", "));
    if preview.overflow {
        out.push_str(OVERFLOW_SUFFIX);
    }
    out.push_str(close);
    out
}

/// Render a value nested one level inside a preview
pub fn format_fragment(fragment: &ValueFragment) -> String {
    match fragment {
        ValueFragment::Primitive(Primitive::String(s)) => format!("\"{s}\""),
        ValueFragment::Primitive(Primitive::Number(n)) => format_number(n),
        ValueFragment::Primitive(Primitive::Boolean(b)) => b.to_string(),
        ValueFragment::Undefined => "undefined".to_string(),
        ValueFragment::Null => "null".to_string(),
        ValueFragment::Object { description } => described(description, OBJECT_PLACEHOLDER),
        ValueFragment::Function { description } => described(description, FUNCTION_PLACEHOLDER),
        ValueFragment::Symbol { description } => described(description, SYMBOL_PLACEHOLDER),
    }
}

/// Array element test: any non-empty all-digit name, sparse or not
fn is_index(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

impl RemoteValue {
    /// JSON form for raw records: primitives keep their JSON type, everything
    /// else is its rendered text
    pub fn to_json(&self) -> Value {
        match self {
            RemoteValue::Primitive(Primitive::String(s)) => Value::String(s.clone()),
            RemoteValue::Primitive(Primitive::Number(n)) => n
                .parse::<serde_json::Number>()
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(format_number(n))),
            RemoteValue::Primitive(Primitive::Boolean(b)) => Value::Bool(*b),
            other => Value::String(format_value(other)),
        }
    }
}

impl fmt::Display for RemoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}
