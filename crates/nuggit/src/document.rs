//! The page document the engine reads from.
//!
//! The tree is owned here and only ever handed out as [`NodeId`] handles.
//! Values flowing between steps hold those handles, never copies of the
//! markup; serialization happens once, at normalization.

use ego_tree::{NodeRef, Tree};
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{NuggitError, NuggitResult};

pub use ego_tree::NodeId;

/// DOM `nodeType` numbering, as exposed to filter predicates.
pub mod node_type {
    pub const ELEMENT: u8 = 1;
    pub const TEXT: u8 = 3;
    pub const PROCESSING_INSTRUCTION: u8 = 7;
    pub const COMMENT: u8 = 8;
    pub const DOCUMENT: u8 = 9;
    pub const DOCTYPE: u8 = 10;
    pub const FRAGMENT: u8 = 11;
}

/// A parsed HTML page.
pub struct Document {
    html: Html,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.html.tree.values().count())
            .finish()
    }
}

impl Document {
    /// Parse a full HTML document.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Handle of the document node.
    pub fn root(&self) -> NodeId {
        self.html.tree.root().id()
    }

    /// Handle of the `<body>` element, if the page has one.
    pub fn body(&self) -> Option<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .find(|n| matches!(n.value(), Node::Element(e) if e.name() == "body"))
            .map(|n| n.id())
    }

    /// First element matching `selector`, in document order.
    pub fn select_first(&self, selector: &str) -> NuggitResult<Option<NodeId>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).next().map(|e| e.id()))
    }

    /// Whether `id` refers to a node of this document.
    pub fn contains(&self, id: NodeId) -> bool {
        self.html.tree.get(id).is_some()
    }

    fn node(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.html.tree.get(id)
    }

    /// The element behind `id`, if it is one.
    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.node(id).and_then(ElementRef::wrap)
    }

    /// Element used for property reads: the node itself, or the document
    /// element when `id` is the document.
    fn property_element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        match self.node(id)?.value() {
            Node::Document | Node::Fragment => Some(self.html.root_element()),
            _ => self.element(id),
        }
    }

    /// DOM `nodeType` of the node.
    pub fn node_type(&self, id: NodeId) -> Option<u8> {
        let t = match self.node(id)?.value() {
            Node::Element(_) => node_type::ELEMENT,
            Node::Text(_) => node_type::TEXT,
            Node::ProcessingInstruction(_) => node_type::PROCESSING_INSTRUCTION,
            Node::Comment(_) => node_type::COMMENT,
            Node::Document => node_type::DOCUMENT,
            Node::Doctype(_) => node_type::DOCTYPE,
            Node::Fragment => node_type::FRAGMENT,
        };
        Some(t)
    }

    /// Serialized markup of a node. Text nodes yield their text.
    pub fn markup(&self, id: NodeId) -> Option<String> {
        let node = self.node(id)?;
        let out = match node.value() {
            Node::Document => self.html.html(),
            Node::Fragment => node
                .children()
                .filter_map(|c| self.markup(c.id()))
                .collect(),
            Node::Element(_) => ElementRef::wrap(node)?.html(),
            Node::Text(t) => t.text.to_string(),
            Node::Comment(c) => format!("<!--{}-->", c.comment),
            Node::Doctype(d) => format!("<!DOCTYPE {}>", d.name()),
            Node::ProcessingInstruction(p) => format!("<?{} {}?>", p.target, p.data),
        };
        Some(out)
    }

    /// `outerHTML`. Only elements (and the document) have one.
    pub fn outer_html(&self, id: NodeId) -> Option<String> {
        match self.node(id)?.value() {
            Node::Document => Some(self.html.root_element().html()),
            Node::Element(_) => self.element(id).map(|e| e.html()),
            _ => None,
        }
    }

    /// `innerHTML`.
    pub fn inner_html(&self, id: NodeId) -> Option<String> {
        self.property_element(id).map(|e| e.inner_html())
    }

    /// `textContent`: every descendant text node, concatenated.
    pub fn text_content(&self, id: NodeId) -> Option<String> {
        match self.node(id)?.value() {
            Node::Text(t) => Some(t.text.to_string()),
            Node::Comment(c) => Some(c.comment.to_string()),
            _ => self.property_element(id).map(|e| e.text().collect()),
        }
    }

    /// `innerText` approximation: rendered text without script and style
    /// content, whitespace collapsed.
    pub fn inner_text(&self, id: NodeId) -> Option<String> {
        if let Node::Text(t) = self.node(id)?.value() {
            return Some(collapse_whitespace(t));
        }
        let element = self.property_element(id)?;
        let mut raw = String::new();
        collect_rendered_text(*element, &mut raw);
        Some(collapse_whitespace(&raw))
    }

    /// All attributes of an element, as `(name, value)` pairs.
    pub fn attributes(&self, id: NodeId) -> Option<Vec<(String, String)>> {
        let element = self.element(id)?;
        Some(
            element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Value of a single attribute.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id)?.value().attr(name).map(str::to_string)
    }

    /// Descendant elements of `id` in document order, excluding `id` itself.
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id) {
            Some(node) => node
                .descendants()
                .skip(1)
                .filter(|n| n.value().is_element())
                .map(|n| n.id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether the node is an element matching `selector`.
    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.element(id).is_some_and(|e| selector.matches(&e))
    }

    /// Parse `html` as a fragment and append its top-level nodes under
    /// `parent`. Returns the handles of the appended top-level nodes.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> NuggitResult<Vec<NodeId>> {
        if !self.contains(parent) {
            return Err(NuggitError::DetachedNode(format!("{parent:?}")));
        }
        let fragment = Html::parse_fragment(html);
        let mut added = Vec::new();
        for top in fragment_children(&fragment) {
            if let Some(id) = graft(&mut self.html.tree, parent, top) {
                added.push(id);
            }
        }
        Ok(added)
    }
}

/// Top-level nodes of a parsed fragment, skipping the synthetic `<html>`
/// wrapper the fragment parser inserts.
fn fragment_children(fragment: &Html) -> Vec<NodeRef<'_, Node>> {
    let mut out = Vec::new();
    for child in fragment.tree.root().children() {
        match child.value() {
            Node::Element(e) if e.name() == "html" => out.extend(child.children()),
            _ => out.push(child),
        }
    }
    out
}

fn graft(tree: &mut Tree<Node>, parent: NodeId, src: NodeRef<'_, Node>) -> Option<NodeId> {
    let id = tree.get_mut(parent)?.append(src.value().clone()).id();
    for child in src.children() {
        graft(tree, id, child);
    }
    Some(id)
}

fn collect_rendered_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => {
                if matches!(e.name(), "script" | "style" | "noscript" | "template") {
                    continue;
                }
                if e.name() == "br" {
                    out.push('\n');
                }
                collect_rendered_text(child, out);
                out.push(' ');
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a CSS selector, mapping the borrowed parser error into an owned one.
pub fn parse_selector(selector: &str) -> NuggitResult<Selector> {
    Selector::parse(selector).map_err(|e| NuggitError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}
