//! Parse Result
//!
//! A `Tree` owns the source text, the root `program` node, and the errors
//! recovered while parsing. It provides the lossless round trip, the
//! s-expression rendering used by tests, and JSON output for tools.

use serde::Serialize;

use crate::cst::types::{Node, NodeKind, Span};
use crate::parser::types::{ErrorKind, ParseError};

/// The complete result of one parse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tree {
    #[serde(skip)]
    source: String,
    root: Node,
    errors: Vec<ParseError>,
}

impl Tree {
    pub(crate) fn new(source: &str, root: Node, errors: Vec<ParseError>) -> Self {
        Self {
            source: source.to_string(),
            root,
            errors,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// True when the parse stopped early because of a cancellation request
    pub fn was_cancelled(&self) -> bool {
        self.errors.iter().any(|e| e.kind == ErrorKind::Cancelled)
    }

    pub fn text(&self, node: &Node) -> &str {
        node.text(&self.source)
    }

    /// All leaf nodes in source order
    pub fn leaves(&self) -> Vec<&Node> {
        self.root.descendants().filter(|n| n.is_leaf()).collect()
    }

    /// Spans of source text not covered by any leaf. These are trivia:
    /// whitespace and line continuations.
    pub fn gaps(&self) -> Vec<Span> {
        let mut gaps = Vec::new();
        let mut cursor = 0;
        for leaf in self.leaves() {
            if leaf.span.start > cursor {
                gaps.push(Span::new(cursor, leaf.span.start));
            }
            cursor = cursor.max(leaf.span.end);
        }
        if cursor < self.source.len() {
            gaps.push(Span::new(cursor, self.source.len()));
        }
        gaps
    }

    /// Concatenate leaf text and the trivia between leaves, in tree order.
    ///
    /// For every tree produced by the parser this equals the input.
    pub fn reconstruct(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for leaf in self.leaves() {
            if leaf.span.start > cursor {
                out.push_str(&self.source[cursor..leaf.span.start]);
            }
            out.push_str(leaf.text(&self.source));
            cursor = leaf.span.end;
        }
        if cursor < self.source.len() {
            out.push_str(&self.source[cursor..]);
        }
        out
    }

    /// Render named nodes as an s-expression, e.g.
    /// `(program (command (command_name (word))))`
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        write_sexp(&self.root, &mut out);
        out
    }

    /// Serialize the tree and its errors as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn write_sexp(node: &Node, out: &mut String) {
    out.push('(');
    out.push_str(node.kind.as_str());
    for child in node.named_children() {
        out.push(' ');
        write_sexp(child, out);
    }
    out.push(')');
}

// =============================================================================
// COMMENT ATTACHMENT
// =============================================================================

/// Insert `comment` leaves into the innermost node whose span contains each
/// comment, keeping children in source order. Comments that overlap an
/// existing leaf are dropped.
pub(crate) fn attach_comments(root: &mut Node, comments: &[Span]) {
    for &comment in comments {
        insert_comment(root, comment);
    }
}

fn insert_comment(node: &mut Node, comment: Span) -> bool {
    if !node.span.contains(comment) {
        return false;
    }
    if node.is_leaf() && node.kind != NodeKind::Program {
        return false;
    }
    let mut index = node.children.len();
    for (i, child) in node.children.iter_mut().enumerate() {
        if child.span.overlaps(comment) || (child.span.contains(comment) && !child.is_leaf()) {
            if child.is_leaf() {
                return false;
            }
            return insert_comment(child, comment);
        }
        if child.span.start >= comment.end {
            index = i;
            break;
        }
    }
    node.children
        .insert(index, Node::leaf(NodeKind::Comment, comment));
    true
}
