//! Extraction actions.
//!
//! An [`ActionSpec`] is the wire shape sent by the backend; [`Action`] is the
//! validated, compiled form. Every action maps one input [`Value`] to one
//! output value and never fails at runtime: inputs it cannot handle are
//! logged and turn into null.

use regex::{Regex, RegexBuilder};
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::document::{parse_selector, Document, NodeId};
use crate::error::{NuggitError, NuggitResult};
use crate::value::{AttrRef, Value};

/// Action as received from the backend: a tag plus optional fields whose
/// meaning depends on the tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionSpec {
    /// Variant tag, e.g. `querySelector` or `regexp`.
    pub action: String,
    pub selector: Option<String>,
    pub all: bool,
    #[serde(rename = "self")]
    pub include_self: bool,
    pub id: Option<String>,
    /// Read per tag: pipe name for `exchange`, attribute name for
    /// `attributes`, field name for `get`. On `querySelector` and
    /// `filterSelector` it is a `[name=...]` predicate, so a selector spec
    /// must not carry a display name here.
    pub name: Option<String>,
    pub node_type: Option<u8>,
    pub class: Option<String>,
    pub attribute: Option<String>,
    pub attribute_value: Option<String>,
    pub attribute_empty: bool,
    pub property: Option<String>,
    pub pattern: Option<String>,
    pub flags: Option<String>,
    pub separator: Option<String>,
    pub limit: Option<usize>,
    pub scalar: Option<String>,
    pub digest: Option<String>,
}

impl ActionSpec {
    /// Shorthand for a spec with only a tag.
    pub fn tagged(tag: &str) -> Self {
        Self {
            action: tag.to_string(),
            ..Self::default()
        }
    }
}

/// Node properties readable by the property actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    InnerHtml,
    OuterHtml,
    InnerText,
    TextContent,
}

impl Property {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "innerHTML" | "innerHtml" => Some(Property::InnerHtml),
            "outerHTML" | "outerHtml" => Some(Property::OuterHtml),
            "innerText" => Some(Property::InnerText),
            "textContent" => Some(Property::TextContent),
            _ => None,
        }
    }

    fn read(self, doc: &Document, id: NodeId) -> Option<String> {
        match self {
            Property::InnerHtml => doc.inner_html(id),
            Property::OuterHtml => doc.outer_html(id),
            Property::InnerText => doc.inner_text(id),
            Property::TextContent => doc.text_content(id),
        }
    }
}

/// Attribute predicate of a [`NodeFilter`].
#[derive(Debug, Clone)]
pub struct AttributeFilter {
    pub name: String,
    pub value: Option<String>,
    pub empty: bool,
}

/// Node predicates. A node passes when every present predicate holds.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub selector: Option<Selector>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub node_type: Option<u8>,
    pub class: Option<String>,
    pub attribute: Option<AttributeFilter>,
}

impl NodeFilter {
    fn from_spec(spec: &ActionSpec) -> NuggitResult<Self> {
        let selector = spec.selector.as_deref().map(parse_selector).transpose()?;
        Ok(Self {
            selector,
            id: spec.id.clone(),
            name: spec.name.clone(),
            node_type: spec.node_type,
            class: spec.class.clone(),
            attribute: spec.attribute.clone().map(|name| AttributeFilter {
                name,
                value: spec.attribute_value.clone(),
                empty: spec.attribute_empty,
            }),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.selector.is_none()
            && self.id.is_none()
            && self.name.is_none()
            && self.node_type.is_none()
            && self.class.is_none()
            && self.attribute.is_none()
    }

    /// Test a node against all predicates.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        if let Some(t) = self.node_type {
            if doc.node_type(id) != Some(t) {
                return false;
            }
        }
        let needs_element = self.selector.is_some()
            || self.id.is_some()
            || self.name.is_some()
            || self.class.is_some()
            || self.attribute.is_some();
        if !needs_element {
            return true;
        }
        let Some(element) = doc.element(id) else {
            return false;
        };
        let el = element.value();
        if let Some(want) = &self.id {
            if el.id() != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(want) = &self.name {
            if el.attr("name") != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(want) = &self.class {
            if !el.classes().any(|c| c == want) {
                return false;
            }
        }
        if let Some(attr) = &self.attribute {
            let Some(actual) = el.attr(&attr.name) else {
                return false;
            };
            if attr.empty && !actual.is_empty() {
                return false;
            }
            if let Some(want) = &attr.value {
                if actual != want {
                    return false;
                }
            }
        }
        if let Some(selector) = &self.selector {
            if !selector.matches(&element) {
                return false;
            }
        }
        true
    }
}

/// Separator for the split action.
#[derive(Debug, Clone)]
pub enum Separator {
    Literal(String),
    Pattern(Regex),
}

/// A compiled extraction action.
#[derive(Debug, Clone)]
pub enum Action {
    DocumentRoot,
    QuerySelector {
        filter: NodeFilter,
        all: bool,
        include_self: bool,
    },
    FilterSelector {
        filter: NodeFilter,
    },
    Property(Property),
    Attributes {
        name: Option<String>,
    },
    Regexp {
        pattern: Regex,
    },
    Split {
        separator: Separator,
        limit: Option<usize>,
    },
    Get {
        field: String,
    },
}

impl Action {
    /// Validate a spec and compile its selectors and patterns.
    pub fn from_spec(spec: &ActionSpec) -> NuggitResult<Self> {
        let action = match spec.action.as_str() {
            "" => return Err(NuggitError::MissingTag),
            "documentRoot" | "document" => Action::DocumentRoot,
            "querySelector" | "querySelectorAll" => {
                let filter = NodeFilter::from_spec(spec)?;
                if filter.is_empty() {
                    return Err(NuggitError::MissingField {
                        action: "querySelector",
                        field: "selector",
                    });
                }
                Action::QuerySelector {
                    filter,
                    all: spec.all || spec.action == "querySelectorAll",
                    include_self: spec.include_self,
                }
            }
            "filterSelector" => {
                let filter = NodeFilter::from_spec(spec)?;
                if filter.is_empty() {
                    return Err(NuggitError::MissingField {
                        action: "filterSelector",
                        field: "selector",
                    });
                }
                Action::FilterSelector { filter }
            }
            "property" => {
                let name = spec.property.as_deref().ok_or(NuggitError::MissingField {
                    action: "property",
                    field: "property",
                })?;
                let prop = Property::from_name(name)
                    .ok_or_else(|| NuggitError::UnknownAction(format!("property:{name}")))?;
                Action::Property(prop)
            }
            "attributes" => Action::Attributes {
                name: spec.name.clone(),
            },
            "regexp" => {
                let pattern = spec.pattern.as_deref().ok_or(NuggitError::MissingField {
                    action: "regexp",
                    field: "pattern",
                })?;
                Action::Regexp {
                    pattern: build_regex(pattern, spec.flags.as_deref().unwrap_or(""))?,
                }
            }
            "split" => {
                let separator = match (&spec.separator, &spec.pattern) {
                    (Some(lit), _) => Separator::Literal(lit.clone()),
                    (None, Some(pattern)) => Separator::Pattern(build_regex(
                        pattern,
                        spec.flags.as_deref().unwrap_or(""),
                    )?),
                    (None, None) => {
                        return Err(NuggitError::MissingField {
                            action: "split",
                            field: "separator",
                        })
                    }
                };
                Action::Split {
                    separator,
                    limit: spec.limit,
                }
            }
            "get" => Action::Get {
                field: spec.name.clone().ok_or(NuggitError::MissingField {
                    action: "get",
                    field: "name",
                })?,
            },
            other => match Property::from_name(other) {
                Some(prop) => Action::Property(prop),
                None => return Err(NuggitError::UnknownAction(other.to_string())),
            },
        };
        Ok(action)
    }

    /// Tag used in diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Action::DocumentRoot => "documentRoot",
            Action::QuerySelector { all: false, .. } => "querySelector",
            Action::QuerySelector { all: true, .. } => "querySelectorAll",
            Action::FilterSelector { .. } => "filterSelector",
            Action::Property(Property::InnerHtml) => "innerHTML",
            Action::Property(Property::OuterHtml) => "outerHTML",
            Action::Property(Property::InnerText) => "innerText",
            Action::Property(Property::TextContent) => "textContent",
            Action::Attributes { .. } => "attributes",
            Action::Regexp { .. } => "regexp",
            Action::Split { .. } => "split",
            Action::Get { .. } => "get",
        }
    }

    /// Run the action against one input value.
    pub fn execute(&self, doc: &Document, input: &Value) -> Value {
        match self {
            Action::DocumentRoot => Value::Node(doc.root()),
            Action::QuerySelector {
                filter,
                all: true,
                include_self,
            } => {
                let mut out = Vec::new();
                self.query_all(doc, input, filter, *include_self, &mut out);
                Value::from(out)
            }
            Action::QuerySelector {
                filter,
                all: false,
                include_self,
            } => self.map_nodes(input, &|id| {
                candidates(doc, id, filter, *include_self)
                    .next()
                    .map(Value::Node)
                    .unwrap_or(Value::Null)
            }),
            Action::FilterSelector { filter } => self.filter_nodes(doc, input, filter),
            Action::Property(prop) => self.map_nodes(input, &|id| {
                prop.read(doc, id).map(Value::String).unwrap_or(Value::Null)
            }),
            Action::Attributes { name: Some(name) } => self.map_nodes(input, &|id| {
                doc.attribute(id, name)
                    .map(Value::String)
                    .unwrap_or(Value::Null)
            }),
            Action::Attributes { name: None } => self.map_nodes(input, &|id| {
                match doc.attributes(id) {
                    Some(attrs) => Value::Array(
                        attrs
                            .into_iter()
                            .map(|(name, _)| Value::Attr(AttrRef { node: id, name }))
                            .collect(),
                    ),
                    None => Value::Null,
                }
            }),
            Action::Regexp { pattern } => self.regexp(doc, input, pattern),
            Action::Split { separator, limit } => self.split(input, separator, *limit),
            Action::Get { field } => self.get(doc, input, field),
        }
    }

    fn invalid(&self, input: &Value) -> Value {
        tracing::warn!(
            action = self.tag(),
            received = input.type_name(),
            "invalid input for action"
        );
        Value::Null
    }

    /// Apply `f` to a node, or element-wise over a sequence.
    fn map_nodes(&self, input: &Value, f: &dyn Fn(NodeId) -> Value) -> Value {
        match input {
            Value::Node(id) => f(*id),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.map_nodes(v, f)).collect())
            }
            Value::Null => Value::Null,
            other => self.invalid(other),
        }
    }

    fn query_all(
        &self,
        doc: &Document,
        input: &Value,
        filter: &NodeFilter,
        include_self: bool,
        out: &mut Vec<NodeId>,
    ) {
        match input {
            Value::Node(id) => out.extend(candidates(doc, *id, filter, include_self)),
            Value::Array(items) => {
                for item in items {
                    self.query_all(doc, item, filter, include_self, out);
                }
            }
            Value::Null => {}
            other => {
                self.invalid(other);
            }
        }
    }

    fn filter_nodes(&self, doc: &Document, input: &Value, filter: &NodeFilter) -> Value {
        match input {
            Value::Node(id) if filter.matches(doc, *id) => Value::Node(*id),
            Value::Node(_) | Value::Null => Value::Null,
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Node(id) => filter.matches(doc, *id).then_some(Value::Node(*id)),
                        Value::Array(_) => Some(self.filter_nodes(doc, item, filter)),
                        Value::Null => None,
                        other => {
                            self.invalid(other);
                            None
                        }
                    })
                    .collect(),
            ),
            other => self.invalid(other),
        }
    }

    fn regexp(&self, doc: &Document, input: &Value, pattern: &Regex) -> Value {
        let text = match input {
            Value::String(s) => s.clone(),
            Value::Node(id) => match doc.markup(*id) {
                Some(markup) => markup,
                None => return Value::Null,
            },
            Value::Array(items) => {
                return Value::Array(items.iter().map(|v| self.regexp(doc, v, pattern)).collect())
            }
            Value::Null => return Value::Null,
            other => return self.invalid(other),
        };
        Value::Array(
            pattern
                .captures_iter(&text)
                .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| Value::String(m.as_str().to_string()))
                .collect(),
        )
    }

    fn split(&self, input: &Value, separator: &Separator, limit: Option<usize>) -> Value {
        match input {
            Value::String(s) => {
                let pieces: Vec<String> = match separator {
                    Separator::Literal(sep) if sep.is_empty() => {
                        s.chars().map(|c| c.to_string()).collect()
                    }
                    Separator::Literal(sep) => s.split(sep.as_str()).map(str::to_string).collect(),
                    Separator::Pattern(re) => re.split(s).map(str::to_string).collect(),
                };
                Value::Array(
                    pieces
                        .into_iter()
                        .take(limit.unwrap_or(usize::MAX))
                        .map(Value::String)
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.split(v, separator, limit))
                    .collect(),
            ),
            Value::Null => Value::Null,
            other => self.invalid(other),
        }
    }

    fn get(&self, doc: &Document, input: &Value, field: &str) -> Value {
        match input {
            Value::Object(map) => map.get(field).cloned().map(Value::from).unwrap_or(Value::Null),
            Value::Attr(attr) => match field {
                "name" => Value::String(attr.name.clone()),
                "value" => doc
                    .attribute(attr.node, &attr.name)
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
            Value::Node(id) => node_field(doc, *id, field),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.get(doc, v, field)).collect())
            }
            Value::Null => Value::Null,
            other => self.invalid(other),
        }
    }
}

/// Nodes selected from `id`: the node itself when `include_self` and it
/// passes, then matching descendant elements in document order.
fn candidates<'a>(
    doc: &'a Document,
    id: NodeId,
    filter: &'a NodeFilter,
    include_self: bool,
) -> impl Iterator<Item = NodeId> + 'a {
    let own = (include_self && filter.matches(doc, id)).then_some(id);
    own.into_iter().chain(
        doc.descendant_elements(id)
            .into_iter()
            .filter(move |d| filter.matches(doc, *d)),
    )
}

fn node_field(doc: &Document, id: NodeId, field: &str) -> Value {
    let text = |s: Option<String>| s.map(Value::String).unwrap_or(Value::Null);
    match field {
        "nodeType" => doc
            .node_type(id)
            .map(|t| Value::Number(t.into()))
            .unwrap_or(Value::Null),
        "tagName" | "nodeName" => text(
            doc.element(id)
                .map(|e| e.value().name().to_ascii_uppercase()),
        ),
        "className" => text(doc.attribute(id, "class")),
        other => match Property::from_name(other) {
            Some(prop) => text(prop.read(doc, id)),
            None => text(doc.attribute(id, other)),
        },
    }
}

fn build_regex(pattern: &str, flags: &str) -> NuggitResult<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'g' | 'u' => &mut builder,
            other => {
                return Err(NuggitError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: format!("unsupported flag {other:?}"),
                })
            }
        };
    }
    builder.build().map_err(|e| NuggitError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
