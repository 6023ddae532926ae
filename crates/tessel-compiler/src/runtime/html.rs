//! HTML element buffers and owned output trees.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::RcCell;

/// A child of an element buffer.
#[derive(Debug, Clone)]
pub enum HtmlChild {
    /// Nested element (never a fragment)
    Element(RcCell<HtmlBuffer>),
    /// Text content
    Text(String),
}

/// A mutable element under construction. `tag == None` is a fragment.
#[derive(Debug, Clone, Default)]
pub struct HtmlBuffer {
    /// Element name
    pub tag: Option<String>,
    /// Attributes in insertion order
    pub attributes: Vec<(String, String)>,
    /// Children in order
    pub children: Vec<HtmlChild>,
}

impl HtmlBuffer {
    /// Creates an element.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// Creates a fragment.
    pub fn fragment() -> Self {
        Self::default()
    }

    /// Whether this buffer is a fragment.
    pub fn is_fragment(&self) -> bool {
        self.tag.is_none()
    }

    /// Sets an attribute, replacing an earlier value of the same name.
    pub fn set_attribute(&mut self, name: &str, value: String) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Appends `child`. A fragment contributes its children instead of itself.
    pub fn append_child(&mut self, child: &RcCell<HtmlBuffer>) {
        let spliced = child.borrow();
        if spliced.is_fragment() {
            self.children.extend(spliced.children.iter().cloned());
        } else {
            self.children.push(HtmlChild::Element(child.clone()));
        }
    }

    /// Appends a text node.
    pub fn append_text(&mut self, text: String) {
        self.children.push(HtmlChild::Text(text));
    }

    /// Owned snapshot; a fragment yields its children.
    pub fn to_nodes(&self) -> Vec<Node> {
        match &self.tag {
            Some(tag) => vec![Node::Element {
                tag: tag.clone(),
                attributes: self.attributes.clone(),
                children: self.child_nodes(),
            }],
            None => self.child_nodes(),
        }
    }

    fn child_nodes(&self) -> Vec<Node> {
        self.children
            .iter()
            .flat_map(|child| match child {
                HtmlChild::Element(element) => element.borrow().to_nodes(),
                HtmlChild::Text(text) => vec![Node::Text { text: text.clone() }],
            })
            .collect()
    }
}

/// An owned, serializable HTML tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// `<tag attr="..">children</tag>`
    Element {
        /// Element name
        tag: String,
        /// Attributes in order
        attributes: Vec<(String, String)>,
        /// Children in order
        children: Vec<Node>,
    },
    /// Text content
    Text {
        /// Unescaped text
        text: String,
    },
}

impl Node {
    /// Builds a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    /// The element name, `None` for text.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Element { tag, .. } => Some(tag),
            Node::Text { .. } => None,
        }
    }

    /// The value of an attribute on an element.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            Node::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            Node::Text { .. } => None,
        }
    }

    /// Element children; empty for text.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element { children, .. } => children,
            Node::Text { .. } => &[],
        }
    }
}

fn escape(text: &str, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    for c in text.chars() {
        match c {
            '&' => out.write_str("&amp;")?,
            '<' => out.write_str("&lt;")?,
            '>' => out.write_str("&gt;")?,
            '"' => out.write_str("&quot;")?,
            c => write!(out, "{}", c)?,
        }
    }
    Ok(())
}

/// Compact markup without indentation.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text { text } => escape(text, f),
            Node::Element {
                tag,
                attributes,
                children,
            } => {
                write!(f, "<{}", tag)?;
                for (name, value) in attributes {
                    write!(f, " {}=\"", name)?;
                    escape(value, f)?;
                    f.write_str("\"")?;
                }
                f.write_str(">")?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                write!(f, "</{}>", tag)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_fragment_splices() {
        let fragment = RcCell::new(HtmlBuffer::fragment());
        fragment.borrow_mut().append_text("a".into());
        fragment
            .borrow_mut()
            .append_child(&RcCell::new(HtmlBuffer::element("br")));

        let mut div = HtmlBuffer::element("div");
        div.append_child(&fragment);
        let nodes = div.to_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children().len(), 2);
        assert_eq!(nodes[0].children()[0], Node::text("a"));
        assert_eq!(nodes[0].children()[1].tag(), Some("br"));
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut div = HtmlBuffer::element("div");
        div.set_attribute("id", "a".into());
        div.set_attribute("id", "b".into());
        assert_eq!(div.attributes, vec![("id".to_string(), "b".to_string())]);
    }

    #[test]
    fn test_display_escapes() {
        let node = Node::Element {
            tag: "p".into(),
            attributes: vec![("title".into(), "\"x\"".into())],
            children: vec![Node::text("1 < 2")],
        };
        assert_eq!(node.to_string(), "<p title=\"&quot;x&quot;\">1 &lt; 2</p>");
    }
}
