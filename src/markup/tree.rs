use crate::errors::{LinkError, Result};

/// Tag given to bookmarks and resolved links.
pub const ANCHOR_TAG: &str = "a";

/// Root attribute carrying the record identifier used in diagnostics.
pub const RECORD_ID_ATTR: &str = "recordId";

/// Fallback root attribute for documents converted without a record id.
pub const FOLIO_ID_ATTR: &str = "folioId";

/// A node of a document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// What a traversal callback wants done with the element it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    /// Remove the element, splicing its children into its parent.
    Pull,
}

/// A markup element with ordered attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn set_tag(&mut self, tag: &str) {
        self.tag = tag.to_string();
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, keeping its position if it already exists.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Concatenated text content of the element and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// Visits every descendant element in document order.
    ///
    /// The callback runs before an element's children are visited. A pulled
    /// element is replaced by its children, which are then visited in turn.
    /// The root itself is never passed to the callback. On error the tree is
    /// left structurally intact and traversal stops.
    pub fn visit_mut<E, F>(&mut self, f: &mut F) -> std::result::Result<(), E>
    where
        F: FnMut(&mut Element) -> std::result::Result<Visit, E>,
    {
        let children = std::mem::take(&mut self.children);
        let mut kept = Vec::with_capacity(children.len());
        let mut rest = children.into_iter();

        while let Some(child) = rest.next() {
            let mut element = match child {
                Node::Element(element) => element,
                text => {
                    kept.push(text);
                    continue;
                }
            };

            let visit = match f(&mut element) {
                Ok(visit) => visit,
                Err(e) => {
                    kept.push(Node::Element(element));
                    kept.extend(rest);
                    self.children = kept;
                    return Err(e);
                }
            };

            let result = element.visit_mut(f);
            match visit {
                Visit::Keep => kept.push(Node::Element(element)),
                Visit::Pull => kept.extend(element.children),
            }
            if let Err(e) = result {
                kept.extend(rest);
                self.children = kept;
                return Err(e);
            }
        }

        self.children = kept;
        Ok(())
    }

    /// Serializes the element and its subtree as XML.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => collect_text(el, out),
        }
    }
}

fn collect_descendants<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
    for child in &element.children {
        if let Node::Element(el) = child {
            out.push(el);
            collect_descendants(el, out);
        }
    }
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(value));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(&html_escape::encode_text(text)),
            Node::Element(el) => write_element(el, out),
        }
    }
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

fn convert(node: roxmltree::Node<'_, '_>) -> Element {
    let mut element = Element::new(node.tag_name().name());
    for attr in node.attributes() {
        element
            .attributes
            .push((attr.name().to_string(), attr.value().to_string()));
    }
    for child in node.children() {
        if child.is_element() {
            element.children.push(Node::Element(convert(child)));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                element.children.push(Node::Text(text.to_string()));
            }
        }
    }
    element
}

/// Parses an XML document into an element tree.
///
/// Comments and processing instructions are dropped; namespace prefixes are
/// not preserved.
pub fn parse_document(xml: &str, document: &str) -> Result<Element> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| LinkError::Markup {
        message: e.to_string(),
        document: document.to_string(),
    })?;
    Ok(convert(doc.root_element()))
}
