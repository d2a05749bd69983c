//! Runtime values flowing between plan steps, and the normalize / cast /
//! zero-detection rules applied before anything leaves the engine.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Number, Value as Json};

use crate::document::{Document, NodeId};

/// Reference to one attribute of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrRef {
    pub node: NodeId,
    pub name: String,
}

/// A datum produced by one step and consumed by the next.
///
/// `Node` and `Attr` are handles into the [`Document`] of the current pass
/// and must not outlive it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(Map<String, Json>),
    Node(NodeId),
    Attr(AttrRef),
}

impl Value {
    /// Runtime type name, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Node(_) => "node",
            Value::Attr(_) => "attr",
        }
    }

    /// Wire form of a value that carries no document handles.
    pub fn to_json(&self) -> Option<Json> {
        let json = match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Object(map) => Json::Object(map.clone()),
            Value::Node(_) | Value::Attr(_) => return None,
        };
        Some(json)
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Object(map),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<NodeId>> for Value {
    fn from(nodes: Vec<NodeId>) -> Self {
        Value::Array(nodes.into_iter().map(Value::Node).collect())
    }
}

/// Declared wire type of an exchanged value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScalarKind {
    #[default]
    String,
    Bytes,
    Bool,
    Int,
    Uint,
    Float,
    Unknown(String),
}

impl ScalarKind {
    /// Resolve a declared scalar name. Empty means string.
    pub fn from_name(name: &str) -> Self {
        match name {
            "" | "string" => ScalarKind::String,
            "bytes" => ScalarKind::Bytes,
            "bool" => ScalarKind::Bool,
            "int" | "int64" => ScalarKind::Int,
            "uint64" => ScalarKind::Uint,
            "float" | "float64" => ScalarKind::Float,
            other => ScalarKind::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::String => write!(f, "string"),
            ScalarKind::Bytes => write!(f, "bytes"),
            ScalarKind::Bool => write!(f, "bool"),
            ScalarKind::Int => write!(f, "int64"),
            ScalarKind::Uint => write!(f, "uint64"),
            ScalarKind::Float => write!(f, "float64"),
            ScalarKind::Unknown(name) => write!(f, "{name}"),
        }
    }
}

// ── Normalization ───────────────────────────────────────────────────────────

/// Convert a document-shaped value into a portable one.
///
/// Nodes become their markup (text nodes their text), attributes become
/// `name="value"`. Scalars pass through, sequences are mapped element-wise.
pub fn normalize(doc: &Document, value: &Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(items) => Value::Array(items.iter().map(|v| normalize(doc, v)).collect()),
        Value::Node(id) => match doc.markup(*id) {
            Some(markup) => Value::String(markup),
            None => {
                tracing::debug!("node {id:?} left the document before normalization");
                Value::Null
            }
        },
        Value::Attr(attr) => match doc.attribute(attr.node, &attr.name) {
            Some(v) => Value::String(format!("{}=\"{}\"", attr.name, v.replace('"', "\\\""))),
            None => Value::Null,
        },
        Value::Object(_) => {
            tracing::warn!(
                value_type = value.type_name(),
                "unexpected value shape during normalization"
            );
            value.clone()
        }
    }
}

// ── Casting ─────────────────────────────────────────────────────────────────

/// Cast a normalized value to its declared scalar kind.
///
/// Unparsable numbers become null; NaN never reaches the wire.
pub fn cast(value: &Value, scalar: &ScalarKind) -> Json {
    match value {
        Value::Null => return Json::Null,
        Value::Array(items) => return Json::Array(items.iter().map(|v| cast(v, scalar)).collect()),
        Value::Node(_) | Value::Attr(_) => {
            tracing::warn!(
                value_type = value.type_name(),
                "cast of a value that was never normalized"
            );
            return Json::Null;
        }
        _ => {}
    }
    match scalar {
        ScalarKind::String | ScalarKind::Bytes => Json::String(encode_string(value)),
        ScalarKind::Bool => match value {
            Value::Bool(b) => Json::Bool(*b),
            other => Json::Bool(truthy(other)),
        },
        ScalarKind::Int => match value {
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => parse_int_prefix(s)
                .map(|i| Json::Number(i.into()))
                .unwrap_or(Json::Null),
            _ => Json::Null,
        },
        ScalarKind::Uint => match value {
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => parse_int_prefix(s)
                .and_then(|i| u64::try_from(i).ok())
                .map(|u| Json::Number(u.into()))
                .unwrap_or(Json::Null),
            _ => Json::Null,
        },
        ScalarKind::Float => match value {
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => parse_float_prefix(s)
                .and_then(Number::from_f64)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            _ => Json::Null,
        },
        ScalarKind::Unknown(name) => {
            tracing::warn!(scalar = %name, "unknown scalar kind, encoding as string");
            Json::String(encode_string(value))
        }
    }
}

fn encode_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other
            .to_json()
            .and_then(|j| serde_json::to_string(&j).ok())
            .unwrap_or_default(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) | Value::Node(_) | Value::Attr(_) => true,
    }
}

/// Leading-integer parse: optional whitespace and sign, then digits.
/// Trailing garbage is ignored (`"12px"` is 12).
fn parse_int_prefix(s: &str) -> Option<i64> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*([+-]?\d+)").ok()).as_ref()?;
    re.captures(s)?.get(1)?.as_str().parse().ok()
}

/// Leading-float parse, same prefix rule as [`parse_int_prefix`].
fn parse_float_prefix(s: &str) -> Option<f64> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").ok())
        .as_ref()?;
    re.captures(s)?.get(1)?.as_str().parse().ok()
}

// ── Zero detection ──────────────────────────────────────────────────────────

/// Whether a cast value is empty for reporting purposes.
///
/// Null is always zero; a sequence is zero only if every element is.
pub fn is_zero(value: &Json, scalar: &ScalarKind) -> bool {
    match value {
        Json::Null => true,
        Json::Array(items) => items.iter().all(|v| is_zero(v, scalar)),
        _ => match scalar {
            ScalarKind::String | ScalarKind::Bytes | ScalarKind::Unknown(_) => {
                value.as_str() == Some("")
            }
            ScalarKind::Bool => value.as_bool() == Some(false),
            ScalarKind::Int | ScalarKind::Uint | ScalarKind::Float => {
                value.as_f64() == Some(0.0)
            }
        },
    }
}
