//! Abstract syntax tree produced by [`crate::markup::parse`].
//!
//! A tree is built once per parse call and only read afterwards. Every node
//! carries its own validation errors; [`crate::diagnostics`] flattens them.
//!
//! ```text
//! document                      lines 1-9
//! ├── text "# Colors"           lines 5-5
//! ├── tag partial file=…        lines 7-7
//! └── tag alert .warning        lines 8-9
//!     └── text "Careful"
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Tag name of a partial include: `{% partial file="header.mdoc" /%}`.
pub const PARTIAL_TAG: &str = "partial";

/// Name of the document attribute holding the raw front matter block.
pub const FRONTMATTER_ATTRIBUTE: &str = "frontmatter";

/// Kind of node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Root of a parsed file.
    Document,
    /// A `{% name %}` tag, block or self-closing.
    Tag,
    /// A run of Markdown text.
    Text,
    /// Placeholder for markup the parser could not place, e.g. a stray closing tag.
    Error,
}

/// Kind of a tag annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// `name="value"`
    Attribute,
    /// `.name`
    Class,
    /// `#name`
    Id,
}

/// A single annotation on a tag, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub name: String,
    pub kind: AnnotationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Annotation {
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AnnotationKind::Attribute,
            value: Some(value.into()),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AnnotationKind::Class,
            value: None,
        }
    }

    pub fn id(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AnnotationKind::Id,
            value: None,
        }
    }
}

/// Source line range, 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(line: usize) -> Self {
        Self::new(line, line)
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "line {}", self.start)
        } else {
            write!(f, "lines {}-{}", self.start, self.end)
        }
    }
}

/// A validation problem the parser attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub node_type: NodeType,
    /// Tag name for [`NodeType::Tag`] nodes.
    pub tag: Option<String>,
    pub annotations: Vec<Annotation>,
    /// Document-level attributes (the front matter block lives here).
    pub attributes: BTreeMap<String, String>,
    /// Raw Markdown for [`NodeType::Text`] nodes.
    pub content: Option<String>,
    pub children: Vec<Node>,
    pub errors: Vec<ValidationError>,
    pub lines: LineRange,
}

impl Node {
    fn empty(node_type: NodeType, lines: LineRange) -> Self {
        Self {
            node_type,
            tag: None,
            annotations: Vec::new(),
            attributes: BTreeMap::new(),
            content: None,
            children: Vec::new(),
            errors: Vec::new(),
            lines,
        }
    }

    pub fn document(lines: LineRange) -> Self {
        Self::empty(NodeType::Document, lines)
    }

    pub fn tag(name: impl Into<String>, lines: LineRange) -> Self {
        Self {
            tag: Some(name.into()),
            ..Self::empty(NodeType::Tag, lines)
        }
    }

    pub fn text(content: impl Into<String>, lines: LineRange) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::empty(NodeType::Text, lines)
        }
    }

    pub fn error(message: impl Into<String>, lines: LineRange) -> Self {
        Self {
            errors: vec![ValidationError::new(message)],
            ..Self::empty(NodeType::Error, lines)
        }
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(ValidationError::new(message));
        self
    }

    pub fn is_partial(&self) -> bool {
        self.node_type == NodeType::Tag && self.tag.as_deref() == Some(PARTIAL_TAG)
    }

    /// Annotations of kind [`AnnotationKind::Attribute`] with the given name.
    pub fn attribute_annotations<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations
            .iter()
            .filter(move |a| a.name == name && a.kind == AnnotationKind::Attribute)
    }

    /// Value of the first attribute annotation with the given name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.annotations
            .iter()
            .find(|a| a.name == name && a.kind == AnnotationKind::Attribute)
            .and_then(|a| a.value.as_deref())
    }

    /// The raw front matter block, if the document had one.
    pub fn frontmatter(&self) -> Option<&str> {
        self.attributes
            .get(FRONTMATTER_ATTRIBUTE)
            .map(String::as_str)
    }
}
