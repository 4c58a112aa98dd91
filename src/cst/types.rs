//! Concrete Syntax Tree Types for Bash
//!
//! Every node records the exact byte range it covers in the parsed source.
//! Named nodes carry the stable kind names that editors and linters match
//! on; anonymous nodes are keywords, operators, delimiters, and the raw text
//! runs inside strings and heredoc bodies.

use serde::ser::{Serialize, Serializer};
use std::fmt;

// =============================================================================
// SPANS
// =============================================================================

/// Half-open byte range `[start, end)` into the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {} after end {}", start, end);
        Self { start, end }
    }

    /// Zero-width span at `offset`
    pub fn empty(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `other` lies entirely inside this span
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// =============================================================================
// NODE KINDS
// =============================================================================

/// The kind of a CST node.
///
/// `as_str` returns the schema name. Those names are a stable contract and
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // Statements
    Program,
    Pipeline,
    List,
    RedirectedStatement,
    Subshell,
    CompoundStatement,
    ForStatement,
    CStyleForStatement,
    WhileStatement,
    DoGroup,
    IfStatement,
    ElifClause,
    ElseClause,
    CaseStatement,
    CaseItem,
    FunctionDefinition,
    VariableAssignment,
    VariableAssignments,
    DeclarationCommand,
    UnsetCommand,
    NegatedCommand,
    TestCommand,
    Command,
    CommandName,

    // Redirects
    FileRedirect,
    FileDescriptor,
    HeredocRedirect,
    HeredocStart,
    HeredocBody,
    HeredocEnd,
    HerestringRedirect,

    // Test expressions
    BinaryExpression,
    UnaryExpression,
    ParenthesizedExpression,
    TestOperator,

    // Arithmetic expressions
    BinaryArithmeticExpression,
    UnaryArithmeticExpression,
    PostfixArithmeticExpression,
    TernaryArithmeticExpression,
    ParenthesizedArithmeticExpression,

    // Literals
    Concatenation,
    Word,
    String,
    RawString,
    AnsiiCString,
    Number,
    Expansion,
    SimpleExpansion,
    StringExpansion,
    CommandSubstitution,
    ProcessSubstitution,
    ArithmeticExpansion,
    Array,
    Regex,
    VariableName,
    SpecialVariableName,
    Subscript,

    // Extras
    Comment,
    Error,

    /// Anonymous keyword, operator, or delimiter; the kind name is its text
    Token(&'static str),
    /// Anonymous uninterpreted text inside a string or heredoc body
    Content,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Pipeline => "pipeline",
            Self::List => "list",
            Self::RedirectedStatement => "redirected_statement",
            Self::Subshell => "subshell",
            Self::CompoundStatement => "compound_statement",
            Self::ForStatement => "for_statement",
            Self::CStyleForStatement => "c_style_for_statement",
            Self::WhileStatement => "while_statement",
            Self::DoGroup => "do_group",
            Self::IfStatement => "if_statement",
            Self::ElifClause => "elif_clause",
            Self::ElseClause => "else_clause",
            Self::CaseStatement => "case_statement",
            Self::CaseItem => "case_item",
            Self::FunctionDefinition => "function_definition",
            Self::VariableAssignment => "variable_assignment",
            Self::VariableAssignments => "variable_assignments",
            Self::DeclarationCommand => "declaration_command",
            Self::UnsetCommand => "unset_command",
            Self::NegatedCommand => "negated_command",
            Self::TestCommand => "test_command",
            Self::Command => "command",
            Self::CommandName => "command_name",
            Self::FileRedirect => "file_redirect",
            Self::FileDescriptor => "file_descriptor",
            Self::HeredocRedirect => "heredoc_redirect",
            Self::HeredocStart => "heredoc_start",
            Self::HeredocBody => "heredoc_body",
            Self::HeredocEnd => "heredoc_end",
            Self::HerestringRedirect => "herestring_redirect",
            Self::BinaryExpression => "binary_expression",
            Self::UnaryExpression => "unary_expression",
            Self::ParenthesizedExpression => "parenthesized_expression",
            Self::TestOperator => "test_operator",
            Self::BinaryArithmeticExpression => "binary_arithmetic_expression",
            Self::UnaryArithmeticExpression => "unary_arithmetic_expression",
            Self::PostfixArithmeticExpression => "postfix_arithmetic_expression",
            Self::TernaryArithmeticExpression => "ternary_arithmetic_expression",
            Self::ParenthesizedArithmeticExpression => "parenthesized_arithmetic_expression",
            Self::Concatenation => "concatenation",
            Self::Word => "word",
            Self::String => "string",
            Self::RawString => "raw_string",
            Self::AnsiiCString => "ansii_c_string",
            Self::Number => "number",
            Self::Expansion => "expansion",
            Self::SimpleExpansion => "simple_expansion",
            Self::StringExpansion => "string_expansion",
            Self::CommandSubstitution => "command_substitution",
            Self::ProcessSubstitution => "process_substitution",
            Self::ArithmeticExpansion => "arithmetic_expansion",
            Self::Array => "array",
            Self::Regex => "regex",
            Self::VariableName => "variable_name",
            Self::SpecialVariableName => "special_variable_name",
            Self::Subscript => "subscript",
            Self::Comment => "comment",
            Self::Error => "ERROR",
            Self::Token(text) => text,
            Self::Content => "content",
        }
    }

    /// Named nodes appear in s-expressions; anonymous ones do not
    pub fn is_named(&self) -> bool {
        !matches!(self, Self::Token(_) | Self::Content)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// =============================================================================
// NODES
// =============================================================================

/// A CST node: kind, covered span, and ordered children (empty for leaves)
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span, children: Vec<Node>) -> Self {
        Self { kind, span, children }
    }

    pub fn leaf(kind: NodeKind, span: Span) -> Self {
        Self::new(kind, span, Vec::new())
    }

    pub fn is_named(&self) -> bool {
        self.kind.is_named()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_error(&self) -> bool {
        self.kind == NodeKind::Error
    }

    /// Source text covered by this node
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }

    pub fn named_children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(|c| c.is_named())
    }

    /// First direct child with the given kind
    pub fn child_of_kind(&self, kind: NodeKind) -> Option<&Node> {
        self.children.iter().find(|c| c.kind == kind)
    }

    /// Pre-order traversal of this node and everything below it
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// True when any node in this subtree is an `ERROR` node
    pub fn has_error(&self) -> bool {
        self.descendants().any(|n| n.is_error())
    }
}

/// Pre-order iterator returned by [`Node::descendants`]
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_schema_names() {
        assert_eq!(NodeKind::AnsiiCString.as_str(), "ansii_c_string");
        assert_eq!(NodeKind::CStyleForStatement.as_str(), "c_style_for_statement");
        assert_eq!(NodeKind::Error.as_str(), "ERROR");
        assert_eq!(NodeKind::Token("&&").as_str(), "&&");
    }

    #[test]
    fn test_anonymous_kinds() {
        assert!(!NodeKind::Token("if").is_named());
        assert!(!NodeKind::Content.is_named());
        assert!(NodeKind::Word.is_named());
    }

    #[test]
    fn test_descendants_preorder() {
        let tree = Node::new(
            NodeKind::Command,
            Span::new(0, 5),
            vec![
                Node::new(
                    NodeKind::CommandName,
                    Span::new(0, 2),
                    vec![Node::leaf(NodeKind::Word, Span::new(0, 2))],
                ),
                Node::leaf(NodeKind::Word, Span::new(3, 5)),
            ],
        );
        let kinds: Vec<_> = tree.descendants().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Command, NodeKind::CommandName, NodeKind::Word, NodeKind::Word]
        );
    }

    #[test]
    fn test_span_relations() {
        let outer = Span::new(2, 10);
        assert!(outer.contains(Span::new(3, 4)));
        assert!(!outer.contains(Span::new(1, 4)));
        assert!(outer.overlaps(Span::new(9, 12)));
        assert!(!outer.overlaps(Span::new(10, 12)));
        assert_eq!(outer.len(), 8);
    }
}
