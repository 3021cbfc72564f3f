//! Markup tree for exported documents.
//!
//! Parsing goes through `scraper`'s HTML5 tree builder, so malformed exports
//! are repaired the way a browser would repair them; each parse error is kept
//! as a warning. Only the `<body>` content is kept.
//!
//! Element names are lowercased on parse and kept verbatim afterwards, so
//! component names such as `SheetableImage` survive serialization. The
//! serializer emits JSX-compatible markup (self-closing void elements,
//! braces and angle brackets escaped in text, expression attributes).

use scraper::{ElementRef, Html};

/// Elements that never have children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// True if this is an element with the given name.
    pub fn is_element(&self, name: &str) -> bool {
        self.as_element().is_some_and(|el| el.name == name)
    }

    /// True if this is a text node containing only whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attr>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: AttrValue,
}

/// An attribute value. Text values are stored decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// `name="text"`
    Text(String),
    /// `name={expr}`
    Expr(String),
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_children(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find_map(|attr| match &attr.value {
            AttrValue::Text(value) if attr.name == name => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|attr| attr.name == name)
    }

    /// Set an attribute, replacing any existing value in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        match self.attrs.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = value,
            None => self.attrs.push(Attr { name, value }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<AttrValue> {
        let pos = self.attrs.iter().position(|attr| attr.name == name)?;
        Some(self.attrs.remove(pos).value)
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }

    /// Component names (`Table`, `SheetableImage`) start with an uppercase letter.
    pub fn is_component(&self) -> bool {
        self.name.starts_with(|c: char| c.is_ascii_uppercase())
    }

    /// True if any descendant element has the given name.
    pub fn contains(&self, name: &str) -> bool {
        contains_element(&self.children, name)
    }
}

/// Result of parsing: the top-level nodes plus the repairs that were made.
#[derive(Debug, Default)]
pub struct Parsed {
    pub nodes: Vec<Node>,
    pub warnings: Vec<String>,
}

/// True if any element in the forest (at any depth) has the given name.
pub fn contains_element(nodes: &[Node], name: &str) -> bool {
    nodes.iter().any(|node| match node {
        Node::Element(el) => el.name == name || el.contains(name),
        _ => false,
    })
}

/// Collect every element with the given name, in document order.
pub fn find_all<'a>(nodes: &'a [Node], name: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect(nodes, name, &mut found);
    found
}

fn collect<'a>(nodes: &'a [Node], name: &str, found: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.name == name {
                found.push(el);
            }
            collect(&el.children, name, found);
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse an HTML document (or a body fragment) into the nodes of its body.
/// Never fails.
pub fn parse(input: &str) -> Parsed {
    let has_doctype = input
        .trim_start()
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"));
    // Without a doctype the tree builder falls back to quirks mode
    let html = if has_doctype {
        Html::parse_document(input)
    } else {
        Html::parse_document(&format!("<!DOCTYPE html>{input}"))
    };

    let mut warnings: Vec<String> = html
        .errors
        .iter()
        .map(|error| format!("repaired markup: {error}"))
        .collect();

    let body = html
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body");
    let nodes = match body {
        Some(body) => convert_children(body, &mut warnings),
        None => Vec::new(),
    };

    Parsed { nodes, warnings }
}

fn convert_children(parent: ElementRef<'_>, warnings: &mut Vec<String>) -> Vec<Node> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        if let Some(el) = ElementRef::wrap(child) {
            nodes.extend(convert_element(el, warnings));
            continue;
        }
        match child.value() {
            scraper::Node::Text(text) => nodes.push(Node::Text((*text.text).to_string())),
            scraper::Node::Comment(comment) => {
                nodes.push(Node::Comment((*comment.comment).to_string()))
            }
            _ => {}
        }
    }
    nodes
}

fn convert_element(el: ElementRef<'_>, warnings: &mut Vec<String>) -> Vec<Node> {
    let children = convert_children(el, warnings);
    let name = el.value().name();
    if !is_valid_name(name) {
        warnings.push(format!("dropped malformed tag <{name}>"));
        return children;
    }

    let mut attrs = Vec::new();
    for (attr, value) in el.value().attrs() {
        if is_valid_name(attr) {
            attrs.push(Attr {
                name: attr.to_string(),
                value: AttrValue::Text(value.to_string()),
            });
        } else {
            warnings.push(format!("dropped malformed attribute '{attr}' on <{name}>"));
        }
    }

    vec![Node::Element(Element {
        name: name.to_string(),
        attrs,
        children,
    })]
}

/// Names that can be written back out as JSX tags and attributes.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
}

/// Serialize nodes as JSX-compatible markup.
///
/// Comments are dropped.
pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node);
    }
    out
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(text) => escape_text(out, text),
        Node::Comment(_) => {}
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for attr in &el.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                match &attr.value {
                    AttrValue::Text(value) => {
                        out.push_str("=\"");
                        escape_attr(out, value);
                        out.push('"');
                    }
                    AttrValue::Expr(expr) => {
                        out.push_str("={");
                        out.push_str(expr);
                        out.push('}');
                    }
                }
            }

            if el.children.is_empty() && (el.is_void() || el.is_component()) {
                out.push_str(" />");
                return;
            }

            out.push('>');
            for child in &el.children {
                write_node(out, child);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '{' => out.push_str("{'{'}"),
            '}' => out.push_str("{'}'}"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
