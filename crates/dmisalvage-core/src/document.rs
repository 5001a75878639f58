//! Hierarchical document view of a structure table.
//!
//! Structure sources that cannot decode a type into named fields can still
//! serialize what they hold into a document: a closed tree of elements and
//! text, addressable by type attribute. The tree is a closed tagged variant
//! ([`Node`]) walked by an explicit [`Visitor`]; extraction code never
//! inspects arbitrary nested shapes.
//!
//! [`Document::serialize`] renders the tree as XML-style text. That text is
//! the input of the last-resort pattern-scanning tier, so the rendering of
//! attributes (`handle="0x0004"`) and elements is part of the contract, not
//! a display nicety.

use std::fmt::Write as FmtWrite;

/// One node in the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A named element with attributes and children
    Element(Element),
    /// A text run
    Text(String),
}

impl Node {
    /// Walks this node and everything below it
    pub fn walk<'a, V: Visitor<'a>>(&'a self, visitor: &mut V) {
        match self {
            Node::Element(element) => element.walk(visitor),
            Node::Text(text) => visitor.visit_text(text),
        }
    }
}

/// A named element with attributes and ordered children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Tag name
    pub name: String,
    /// Attributes in insertion order
    pub attrs: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an element with the given tag name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds an attribute (builder style)
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Adds a child element (builder style)
    pub fn element(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Adds a text child (builder style)
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Returns the value of an attribute, if present
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates over the direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Concatenates all text content below this element
    pub fn text_content(&self) -> String {
        struct Collect(String);
        impl<'a> Visitor<'a> for Collect {
            fn visit_text(&mut self, text: &'a str) {
                self.0.push_str(text);
            }
        }
        let mut collector = Collect(String::new());
        self.walk(&mut collector);
        collector.0
    }

    /// Walks this element and everything below it
    pub fn walk<'a, V: Visitor<'a>>(&'a self, visitor: &mut V) {
        visitor.visit_element(self);
        for child in &self.children {
            child.walk(visitor);
        }
    }
}

/// Callbacks for walking a document tree.
///
/// The lifetime parameter lets a visitor collect references into the tree it
/// walks.
pub trait Visitor<'a> {
    /// Called for every element, before its children
    fn visit_element(&mut self, element: &'a Element) {
        let _ = element;
    }

    /// Called for every text run
    fn visit_text(&mut self, text: &'a str) {
        let _ = text;
    }
}

/// A complete document with a single root element
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Root element of the tree
    pub root: Element,
}

impl Document {
    /// Creates a document from its root element
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Collects the elements whose `type` attribute equals the given id,
    /// anywhere in the tree
    pub fn structures(&self, type_id: u8) -> Vec<&Element> {
        struct Matches<'a> {
            type_id: u8,
            found: Vec<&'a Element>,
        }
        impl<'a> Visitor<'a> for Matches<'a> {
            fn visit_element(&mut self, element: &'a Element) {
                let matches = element
                    .get_attr("type")
                    .and_then(|value| value.parse::<u8>().ok())
                    .map_or(false, |id| id == self.type_id);
                if matches {
                    self.found.push(element);
                }
            }
        }
        let mut visitor = Matches {
            type_id,
            found: Vec::new(),
        };
        self.root.walk(&mut visitor);
        visitor.found
    }

    /// Renders the tree as XML-style text
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        write_element(&mut out, &self.root, 0).expect("String write cannot fail");
        out
    }
}

fn write_element(out: &mut String, element: &Element, depth: usize) -> std::fmt::Result {
    for _ in 0..depth {
        out.push_str("  ");
    }
    write!(out, "<{}", element.name)?;
    for (name, value) in &element.attrs {
        write!(out, " {}=\"{}\"", name, escape_text(value))?;
    }

    if element.children.is_empty() {
        writeln!(out, "/>")?;
        return Ok(());
    }

    // Elements holding only text render on one line so that attribute and
    // content tokens stay adjacent in the serialized form.
    let text_only = element
        .children
        .iter()
        .all(|child| matches!(child, Node::Text(_)));
    if text_only {
        write!(out, ">")?;
        for child in &element.children {
            if let Node::Text(text) = child {
                write!(out, "{}", escape_text(text))?;
            }
        }
        writeln!(out, "</{}>", element.name)?;
        return Ok(());
    }

    writeln!(out, ">")?;
    for child in &element.children {
        match child {
            Node::Element(nested) => write_element(out, nested, depth + 1)?,
            Node::Text(text) => {
                for _ in 0..=depth {
                    out.push_str("  ");
                }
                writeln!(out, "{}", escape_text(text))?;
            }
        }
    }
    for _ in 0..depth {
        out.push_str("  ");
    }
    writeln!(out, "</{}>", element.name)?;
    Ok(())
}

/// Escapes text for the XML-style rendering
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
