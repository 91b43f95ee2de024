//! Markup to AST parsing.
//!
//! A deliberately small reader for the Markdoc tag dialect: it understands
//! the front matter block, block-level `{% tag %}` markup and tag
//! annotations, and keeps everything else as raw Markdown text nodes that
//! the page builder hands to `pulldown-cmark`.
//!
//! ```text
//! ---
//! title: Primary colors            → document.attributes["frontmatter"]
//! ---
//! # Colors                         → text
//! {% partial file="intro.mdoc" /%} → tag partial (self-closing)
//! {% alert .warning level=high %}  → tag alert, annotations [class, attribute]
//! Mind the paint.                  →     text
//! {% /alert %}
//! ```
//!
//! Parsing never fails. Problems are attached to the offending node as
//! [`ValidationError`]s so one pass can report every issue in a file:
//!
//! - malformed annotation syntax or tag names
//! - a closing tag with no matching open tag (an `error` node is inserted)
//! - an open tag that is never closed
//! - a front matter block without its closing `---`
//! - a tag written inside a line of text (an `error` node is inserted and the
//!   tag is dropped from the text)
//!
//! Tags inside fenced code blocks and inline code spans are left as text.

use crate::ast::{Annotation, FRONTMATTER_ATTRIBUTE, LineRange, Node, ValidationError};
use regex::Regex;
use std::borrow::Cow;
use std::ops::Range;
use std::sync::LazyLock;

static TAG_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{%\s*(/)?\s*([^\s/%]*)(.*?)(/)?\s*%\}$").unwrap());

/// A tag anywhere inside a line: `See {% partial file="x.mdoc" /%} here.`
static INLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%\s*/?\s*([^\s/%]*)[^%]*%\}").unwrap());

static CODE_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`]*`").unwrap());

static TAG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap());

static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:([A-Za-z_][\w-]*)=(?:"((?:[^"\\]|\\.)*)"|([^\s"]+))|\.([\w-]+)|#([\w-]+))"#)
        .unwrap()
});

/// Parse markup source into a document tree.
pub fn parse(source: &str) -> Node {
    let lines: Vec<&str> = source.lines().collect();
    let last_line = lines.len().max(1);
    let mut document = Node::document(LineRange::new(1, last_line));

    let body_start = match split_frontmatter(&lines) {
        FrontmatterBlock::Absent => 0,
        FrontmatterBlock::Closed { content, closing } => {
            document
                .attributes
                .insert(FRONTMATTER_ATTRIBUTE.to_string(), content);
            closing + 1
        }
        FrontmatterBlock::Unterminated => {
            document.errors.push(ValidationError::new(
                "Front matter block is missing its closing `---`",
            ));
            1
        }
    };

    let mut builder = TreeBuilder::new(document);
    for (idx, line) in lines.iter().copied().enumerate().skip(body_start) {
        builder.line(idx + 1, line);
    }
    builder.finish(last_line)
}

enum FrontmatterBlock {
    Absent,
    /// `closing` is the 0-based index of the closing `---` line.
    Closed { content: String, closing: usize },
    Unterminated,
}

fn split_frontmatter(lines: &[&str]) -> FrontmatterBlock {
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return FrontmatterBlock::Absent;
    }
    match lines.iter().skip(1).position(|l| l.trim_end() == "---") {
        Some(offset) => {
            let closing = offset + 1;
            FrontmatterBlock::Closed {
                content: lines[1..closing].join("\n"),
                closing,
            }
        }
        None => FrontmatterBlock::Unterminated,
    }
}

/// Incremental tree construction over the body lines.
struct TreeBuilder<'a> {
    document: Node,
    /// Tags opened but not yet closed, innermost last.
    open: Vec<Node>,
    text: Vec<Cow<'a, str>>,
    text_start: usize,
    /// Error nodes for inline tags in the pending text run.
    inline_tags: Vec<Node>,
    in_fence: bool,
}

impl<'a> TreeBuilder<'a> {
    fn new(document: Node) -> Self {
        Self {
            document,
            open: Vec::new(),
            text: Vec::new(),
            text_start: 0,
            inline_tags: Vec::new(),
            in_fence: false,
        }
    }

    fn line(&mut self, number: usize, line: &'a str) {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            self.in_fence = !self.in_fence;
            self.push_text(number, Cow::Borrowed(line));
            return;
        }
        if self.in_fence {
            self.push_text(number, Cow::Borrowed(line));
            return;
        }
        if let Some(caps) = TAG_LINE.captures(trimmed) {
            self.flush_text();
            let name = caps.get(2).map_or("", |m| m.as_str());
            if caps.get(1).is_some() {
                self.close(name, number);
            } else {
                let annotations = caps.get(3).map_or("", |m| m.as_str().trim());
                self.open(name, annotations, caps.get(4).is_some(), number);
            }
            return;
        }
        let text = self.strip_inline_tags(number, line);
        self.push_text(number, text);
    }

    /// Drops tags written inside a line, recording an error node for each.
    fn strip_inline_tags(&mut self, number: usize, line: &'a str) -> Cow<'a, str> {
        let code_spans: Vec<Range<usize>> = CODE_SPAN.find_iter(line).map(|m| m.range()).collect();
        let mut kept = String::new();
        let mut last = 0;
        for caps in INLINE_TAG.captures_iter(line) {
            let Some(tag) = caps.get(0) else { continue };
            if code_spans.iter().any(|span| span.contains(&tag.start())) {
                continue;
            }
            let name = caps.get(1).map_or("", |m| m.as_str());
            self.inline_tags.push(Node::error(
                format!("Inline tag `{name}` is not supported; place it on its own line"),
                LineRange::single(number),
            ));
            kept.push_str(&line[last..tag.start()]);
            last = tag.end();
        }
        if last == 0 {
            return Cow::Borrowed(line);
        }
        kept.push_str(&line[last..]);
        Cow::Owned(kept)
    }

    fn push_text(&mut self, number: usize, line: Cow<'a, str>) {
        if self.text.is_empty() {
            self.text_start = number;
        }
        self.text.push(line);
    }

    fn flush_text(&mut self) {
        let lines = std::mem::take(&mut self.text);
        let first = lines.iter().position(|l| !l.trim().is_empty());
        let last = lines.iter().rposition(|l| !l.trim().is_empty());
        if let (Some(first), Some(last)) = (first, last) {
            let range = LineRange::new(self.text_start + first, self.text_start + last);
            self.append(Node::text(lines[first..=last].join("\n"), range));
        }
        for error in std::mem::take(&mut self.inline_tags) {
            self.append(error);
        }
    }

    fn append(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.document.children.push(node),
        }
    }

    fn open(&mut self, name: &str, annotations: &str, self_closing: bool, number: usize) {
        let mut node = Node::tag(name, LineRange::single(number));
        if !TAG_NAME.is_match(name) {
            node.errors
                .push(ValidationError::new(format!("Invalid tag name `{name}`")));
        }
        match parse_annotations(annotations) {
            Ok(parsed) => node.annotations = parsed,
            Err(message) => node.errors.push(ValidationError::new(message)),
        }
        if self_closing {
            self.append(node);
        } else {
            self.open.push(node);
        }
    }

    fn close(&mut self, name: &str, number: usize) {
        let Some(depth) = self
            .open
            .iter()
            .rposition(|n| n.tag.as_deref() == Some(name))
        else {
            self.append(Node::error(
                format!("Unexpected closing tag `{name}`"),
                LineRange::single(number),
            ));
            return;
        };
        while self.open.len() > depth + 1 {
            self.close_unterminated(number.saturating_sub(1));
        }
        if let Some(mut node) = self.open.pop() {
            node.lines.end = number;
            self.append(node);
        }
    }

    fn close_unterminated(&mut self, end: usize) {
        if let Some(mut node) = self.open.pop() {
            let name = node.tag.clone().unwrap_or_default();
            node.errors.push(ValidationError::new(format!(
                "Node `{name}` is missing closing tag"
            )));
            node.lines.end = end.max(node.lines.start);
            self.append(node);
        }
    }

    fn finish(mut self, last_line: usize) -> Node {
        self.flush_text();
        while !self.open.is_empty() {
            self.close_unterminated(last_line);
        }
        self.document
    }
}

/// Parse the annotation list of a tag: `file="a.mdoc" .wide #intro level=2`.
fn parse_annotations(source: &str) -> Result<Vec<Annotation>, String> {
    let mut annotations = Vec::new();
    let mut rest = source.trim_start();
    while !rest.is_empty() {
        let caps = ANNOTATION
            .captures(rest)
            .ok_or_else(|| format!("Invalid attribute syntax near `{rest}`"))?;
        let annotation = if let Some(name) = caps.get(1) {
            let value = match (caps.get(2), caps.get(3)) {
                (Some(quoted), _) => unescape(quoted.as_str()),
                (None, Some(bare)) => bare.as_str().to_string(),
                (None, None) => String::new(),
            };
            Annotation::attribute(name.as_str(), value)
        } else if let Some(class) = caps.get(4) {
            Annotation::class(class.as_str())
        } else if let Some(id) = caps.get(5) {
            Annotation::id(id.as_str())
        } else {
            return Err(format!("Invalid attribute syntax near `{rest}`"));
        };

        rest = &rest[caps[0].len()..];
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return Err(format!("Invalid attribute syntax near `{rest}`"));
        }
        rest = rest.trim_start();
        annotations.push(annotation);
    }
    Ok(annotations)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(escaped) = chars.next()
        {
            out.push(escaped);
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AnnotationKind, NodeType};

    const SAMPLE: &str = r#"---
title: Colors
---

# Colors

{% partial file="header.mdoc" /%}
{% alert .warning #note level=high %}
Careful
{% /alert %}"#;

    fn messages(node: &Node) -> Vec<&str> {
        node.errors.iter().map(|e| e.message.as_str()).collect()
    }

    // =========================================================================
    // Front matter
    // =========================================================================

    #[test]
    fn frontmatter_extracted_into_attribute() {
        let doc = parse(SAMPLE);
        assert_eq!(doc.node_type, NodeType::Document);
        assert_eq!(doc.frontmatter(), Some("title: Colors"));
        assert!(doc.errors.is_empty());
    }

    #[test]
    fn no_frontmatter_when_first_line_is_not_a_fence() {
        let doc = parse("# Title\n---\n");
        assert_eq!(doc.frontmatter(), None);
    }

    #[test]
    fn unterminated_frontmatter_is_reported() {
        let doc = parse("---\ntitle: x\n");
        assert_eq!(doc.frontmatter(), None);
        assert_eq!(
            messages(&doc),
            vec!["Front matter block is missing its closing `---`"]
        );
    }

    #[test]
    fn multiline_frontmatter_preserved_verbatim() {
        let doc = parse("---\ntitle: x\npage_filters:\n  - id: a\n---\nbody");
        assert_eq!(
            doc.frontmatter(),
            Some("title: x\npage_filters:\n  - id: a")
        );
    }

    // =========================================================================
    // Tree shape
    // =========================================================================

    #[test]
    fn sample_tree_shape() {
        let doc = parse(SAMPLE);
        assert_eq!(doc.children.len(), 3);

        let heading = &doc.children[0];
        assert_eq!(heading.node_type, NodeType::Text);
        assert_eq!(heading.content.as_deref(), Some("# Colors"));
        assert_eq!(heading.lines, LineRange::single(5));

        let partial = &doc.children[1];
        assert!(partial.is_partial());
        assert_eq!(partial.attribute("file"), Some("header.mdoc"));
        assert_eq!(partial.lines, LineRange::single(7));
        assert!(partial.children.is_empty());

        let alert = &doc.children[2];
        assert_eq!(alert.tag.as_deref(), Some("alert"));
        assert_eq!(alert.lines, LineRange::new(8, 10));
        assert_eq!(alert.children.len(), 1);
        assert_eq!(alert.children[0].content.as_deref(), Some("Careful"));
        assert_eq!(alert.children[0].lines, LineRange::single(9));
    }

    #[test]
    fn annotation_kinds_in_source_order() {
        let doc = parse(SAMPLE);
        let kinds: Vec<(AnnotationKind, &str)> = doc.children[2]
            .annotations
            .iter()
            .map(|a| (a.kind, a.name.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (AnnotationKind::Class, "warning"),
                (AnnotationKind::Id, "note"),
                (AnnotationKind::Attribute, "level"),
            ]
        );
        assert_eq!(doc.children[2].attribute("level"), Some("high"));
    }

    #[test]
    fn nested_tags() {
        let doc = parse("{% a %}\n{% b %}\ninner\n{% /b %}\n{% /a %}");
        let a = &doc.children[0];
        assert_eq!(a.lines, LineRange::new(1, 5));
        let b = &a.children[0];
        assert_eq!(b.tag.as_deref(), Some("b"));
        assert_eq!(b.lines, LineRange::new(2, 4));
        assert_eq!(b.children[0].content.as_deref(), Some("inner"));
    }

    #[test]
    fn text_runs_split_by_tags_and_trimmed_of_blank_lines() {
        let doc = parse("\n\nfirst\nsecond\n\n{% hr /%}\n\nthird\n\n");
        assert_eq!(doc.children.len(), 3);
        assert_eq!(doc.children[0].content.as_deref(), Some("first\nsecond"));
        assert_eq!(doc.children[0].lines, LineRange::new(3, 4));
        assert_eq!(doc.children[2].content.as_deref(), Some("third"));
        assert_eq!(doc.children[2].lines, LineRange::single(8));
    }

    #[test]
    fn blank_document_has_no_children() {
        let doc = parse("  \n\n");
        assert!(doc.children.is_empty());
        assert!(doc.errors.is_empty());
    }

    #[test]
    fn tags_inside_code_fences_stay_text() {
        let doc = parse("```\n{% partial file=\"x.mdoc\" /%}\n```");
        assert_eq!(doc.children.len(), 1);
        assert_eq!(doc.children[0].node_type, NodeType::Text);
    }

    #[test]
    fn duplicate_attributes_are_kept() {
        let doc = parse(r#"{% partial file="a.mdoc" file="b.mdoc" /%}"#);
        let files: Vec<_> = doc.children[0].attribute_annotations("file").collect();
        assert_eq!(files.len(), 2);
        assert!(doc.children[0].errors.is_empty());
    }

    // =========================================================================
    // Annotations
    // =========================================================================

    #[test]
    fn quoted_values_unescape() {
        let anns = parse_annotations(r#"title="say \"hi\"" path="a\\b""#).unwrap();
        assert_eq!(anns[0].value.as_deref(), Some(r#"say "hi""#));
        assert_eq!(anns[1].value.as_deref(), Some(r"a\b"));
    }

    #[test]
    fn quoted_value_may_contain_spaces_and_slashes() {
        let anns = parse_annotations(r#"file="nested dir/part.mdoc""#).unwrap();
        assert_eq!(anns[0].value.as_deref(), Some("nested dir/part.mdoc"));
    }

    #[test]
    fn empty_quoted_value_is_allowed() {
        let anns = parse_annotations(r#"file="""#).unwrap();
        assert_eq!(anns[0].value.as_deref(), Some(""));
    }

    #[test]
    fn garbage_annotation_is_error() {
        assert!(parse_annotations("=oops").is_err());
        assert!(parse_annotations(r#"file="a"b"#).is_err());
        assert!(parse_annotations("file=").is_err());
    }

    #[test]
    fn invalid_annotations_attach_error_to_tag() {
        let doc = parse("{% note ??? /%}");
        let note = &doc.children[0];
        assert_eq!(note.tag.as_deref(), Some("note"));
        assert_eq!(note.errors.len(), 1);
        assert!(note.errors[0].message.contains("Invalid attribute syntax"));
    }

    // =========================================================================
    // Structural errors
    // =========================================================================

    #[test]
    fn unclosed_tag_reported_on_node() {
        let doc = parse("{% alert %}\ntext");
        let alert = &doc.children[0];
        assert_eq!(messages(alert), vec!["Node `alert` is missing closing tag"]);
        assert_eq!(alert.lines, LineRange::new(1, 2));
        assert_eq!(alert.children.len(), 1);
    }

    #[test]
    fn stray_closing_tag_becomes_error_node() {
        let doc = parse("text\n{% /alert %}");
        assert_eq!(doc.children.len(), 2);
        let stray = &doc.children[1];
        assert_eq!(stray.node_type, NodeType::Error);
        assert_eq!(messages(stray), vec!["Unexpected closing tag `alert`"]);
        assert_eq!(stray.lines, LineRange::single(2));
    }

    #[test]
    fn closing_outer_tag_closes_unterminated_inner_tag() {
        let doc = parse("{% a %}\n{% b %}\nx\n{% /a %}");
        let a = &doc.children[0];
        assert!(a.errors.is_empty());
        assert_eq!(a.lines, LineRange::new(1, 4));
        let b = &a.children[0];
        assert_eq!(messages(b), vec!["Node `b` is missing closing tag"]);
        assert_eq!(b.lines, LineRange::new(2, 3));
    }

    #[test]
    fn invalid_tag_name_reported() {
        let doc = parse("{% 9lives /%}");
        assert_eq!(messages(&doc.children[0]), vec!["Invalid tag name `9lives`"]);
    }

    #[test]
    fn inline_tag_reported_and_dropped_from_text() {
        let doc = parse("Intro\nSee {% partial file=\"missing.mdoc\" /%} here.\n");
        assert_eq!(doc.children.len(), 2);

        let text = &doc.children[0];
        assert_eq!(text.node_type, NodeType::Text);
        assert_eq!(text.content.as_deref(), Some("Intro\nSee  here."));

        let error = &doc.children[1];
        assert_eq!(error.node_type, NodeType::Error);
        assert_eq!(error.lines, LineRange::single(2));
        assert_eq!(
            messages(error),
            vec!["Inline tag `partial` is not supported; place it on its own line"]
        );
        assert!(!doc.children.iter().any(Node::is_partial));
    }

    #[test]
    fn each_inline_tag_reported() {
        let doc = parse("a {% b %} c {% /b %} d");
        let errors: Vec<_> = doc
            .children
            .iter()
            .filter(|n| n.node_type == NodeType::Error)
            .collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(doc.children[0].content.as_deref(), Some("a  c  d"));
    }

    #[test]
    fn inline_tag_errors_stay_inside_open_tag() {
        let doc = parse("{% note %}\nUse {% icon /%} here\n{% /note %}");
        let note = &doc.children[0];
        assert_eq!(note.children.len(), 2);
        assert_eq!(note.children[1].node_type, NodeType::Error);
    }

    #[test]
    fn tags_in_code_spans_stay_text() {
        let line = "Write `{% partial file=\"x.mdoc\" /%}` on its own line.";
        let doc = parse(line);
        assert_eq!(doc.children.len(), 1);
        assert_eq!(doc.children[0].content.as_deref(), Some(line));
    }
}
