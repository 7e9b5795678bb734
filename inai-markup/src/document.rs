//! Addressable markup tree.
//!
//! Every node keeps the exact source text it was parsed from. Serializing an
//! unmodified node writes that text back, so edits only change the bytes of
//! the element they touch.

use crate::escape::{decode_entities, escape_attr, escape_text};
use crate::style::StyleDeclarations;

/// Elements that never have children or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose content is raw text up to the matching end tag.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Class tokens the preview surface adds to mark hovered/selected elements.
/// They never belong in authored markup.
pub const BOOKKEEPING_CLASSES: &[&str] = &["inai-hovered", "inai-selected"];

/// Removes bookkeeping tokens from a class list and normalizes whitespace.
pub fn scrub_class_names(class_names: &str) -> String {
    class_names
        .split_whitespace()
        .filter(|token| !BOOKKEEPING_CLASSES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Raw text exactly as written (entities not decoded).
    Text(String),
    /// Full comment including `<!--` and `-->`.
    Comment(String),
    /// Doctype, processing instruction or stray end tag, kept verbatim.
    Other(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// How an element's end was written in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Closing {
    /// An explicit end tag, as written.
    Explicit(String),
    /// Closed by the parser (EOF, parent end tag, or an implied close).
    Implicit,
    /// Void element such as `<br>`.
    Void,
    /// `<x ... />`
    SelfClosing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Name as written.
    pub name: String,
    /// Decoded value; `None` for boolean attributes.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attrs: Vec<Attribute>,
    pub children: Vec<Node>,
    /// Source text of the start tag. Cleared when attributes change.
    open_raw: Option<String>,
    closing: Closing,
}

impl Element {
    pub(crate) fn parsed(
        name: String,
        attrs: Vec<Attribute>,
        open_raw: String,
        closing: Closing,
    ) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
            open_raw: Some(open_raw),
            closing,
        }
    }

    pub(crate) fn set_closing(&mut self, closing: Closing) {
        self.closing = closing;
    }

    /// Lowercase tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn is_raw_text(&self) -> bool {
        RAW_TEXT_ELEMENTS.contains(&self.name.as_str())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Sets an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self
            .attrs
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(a) => {
                if a.value.as_deref() == Some(value) {
                    return;
                }
                a.value = Some(value.to_string());
            }
            None => self.attrs.push(Attribute {
                name: name.to_ascii_lowercase(),
                value: Some(value.to_string()),
            }),
        }
        self.open_raw = None;
    }

    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| !a.name.eq_ignore_ascii_case(name));
        let removed = self.attrs.len() != before;
        if removed {
            self.open_raw = None;
        }
        removed
    }

    pub fn class_list(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Replaces the class attribute. An empty list removes it.
    pub fn set_class_list<S: AsRef<str>>(&mut self, classes: &[S]) {
        let joined = classes
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            self.remove_attr("class");
        } else {
            self.set_attr("class", &joined);
        }
    }

    pub fn style(&self) -> StyleDeclarations {
        self.attr("style")
            .map(StyleDeclarations::parse)
            .unwrap_or_default()
    }

    /// Writes the style attribute back. Empty declarations remove it.
    pub fn set_style(&mut self, style: &StyleDeclarations) {
        if style.is_empty() {
            self.remove_attr("style");
        } else {
            self.set_attr("style", &style.to_string());
        }
    }

    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Text content of the subtree with entities decoded.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, self.is_raw_text(), &mut out);
        out
    }

    /// Replaces all children with a single text node.
    /// Void elements are left untouched.
    pub fn set_text(&mut self, text: &str) {
        if self.is_void() {
            return;
        }
        let raw = if self.is_raw_text() {
            text.to_string()
        } else {
            escape_text(text)
        };
        self.children = vec![Node::Text(raw)];
        if self.closing == Closing::SelfClosing {
            self.closing = Closing::Explicit(format!("</{}>", self.name));
            self.open_raw = None;
        }
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }

    fn write_open(&self, out: &mut String) {
        if let Some(raw) = &self.open_raw {
            out.push_str(raw);
            return;
        }
        out.push('<');
        out.push_str(&self.name);
        for a in &self.attrs {
            out.push(' ');
            out.push_str(&a.name);
            if let Some(v) = &a.value {
                out.push_str("=\"");
                out.push_str(&escape_attr(v));
                out.push('"');
            }
        }
        if self.closing == Closing::SelfClosing {
            out.push_str(" />");
        } else {
            out.push('>');
        }
    }

    pub(crate) fn write_html(&self, out: &mut String) {
        self.write_open(out);
        write_nodes(&self.children, out);
        if let Closing::Explicit(raw) = &self.closing {
            out.push_str(raw);
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }
}

fn collect_text(nodes: &[Node], raw: bool, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) if raw => out.push_str(t),
            Node::Text(t) => out.push_str(&decode_entities(t)),
            Node::Element(e) => collect_text(&e.children, e.is_raw_text(), out),
            Node::Comment(_) | Node::Other(_) => {}
        }
    }
}

pub(crate) fn write_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Element(e) => e.write_html(out),
            Node::Text(s) | Node::Comment(s) | Node::Other(s) => out.push_str(s),
        }
    }
}

/// A parsed markup string: either a body fragment or a full document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub nodes: Vec<Node>,
}

impl Fragment {
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_nodes(&self.nodes, &mut out);
        out
    }

    /// True when the markup contains an `<html>` or `<body>` element at top level.
    pub fn is_document(&self) -> bool {
        self.nodes
            .iter()
            .filter_map(Node::as_element)
            .any(|e| e.name == "html" || e.name == "body")
    }
}
