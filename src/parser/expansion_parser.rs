//! Expansion Parsing
//!
//! Handles the bracketed expansion forms:
//! - Parameter expansion: `${VAR}`, `${VAR:-default}`, `${#VAR}`, `${!ref}`,
//!   `${VAR/pattern/replacement}`, `${arr[i]}`
//! - Command substitution: `$(...)`, `` `...` ``, `$(< file)`
//! - Process substitution: `<(...)`, `>(...)`
//! - Arithmetic expansion: `$((...))`

use crate::cst::types::{Node, NodeKind, Span};
use crate::parser::arithmetic_parser;
use crate::parser::command_parser;
use crate::parser::lexer::{LexFlags, LexerMode, TokenKind};
use crate::parser::parser::{parse_statements, ListContext, Parser};
use crate::parser::types::ErrorKind;
use crate::parser::word_parser::{self, is_literal_start, parse_literal};

/// Parameter expansion operators, longest first
const EXPANSION_OPERATORS: &[&str] = &[
    ":-", ":=", ":?", ":+", "//", "/#", "/%", "##", "%%", "^^", ",,", "/", "#", "%", "^", ",",
    ":", "-", "=", "?", "+", "@",
];

/// Operators whose first operand is a pattern
const SUBSTITUTION_OPERATORS: &[&str] = &["/", "//", "/#", "/%"];

const SPECIAL_PARAMETERS: &[u8] = b"*@?-$!#";

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

// =============================================================================
// PARAMETER EXPANSION
// =============================================================================

/// `${ ... }`
pub(crate) fn parse_expansion(p: &mut Parser<'_>) -> Node {
    let open = p.peek();
    let start = open.span.start;
    let mut children = vec![p.token_leaf(open)];
    let flags = LexFlags {
        in_expansion: true,
        stop_at_brace: true,
        newline_trivia: true,
        ..LexFlags::default()
    };
    p.push_mode(LexerMode::Command);
    p.with_word_flags(flags, |p| parse_expansion_body(p, &mut children, start));
    p.pop_mode();
    p.node(NodeKind::Expansion, children)
}

fn parse_expansion_body(p: &mut Parser<'_>, children: &mut Vec<Node>, start: usize) {
    let bytes = p.src().as_bytes();

    // Length `#` or indirection `!` prefix
    let pos = p.pos();
    if let Some(&prefix) = bytes.get(pos) {
        let next = bytes.get(pos + 1).copied();
        if matches!(prefix, b'#' | b'!')
            && next.is_some_and(|b| is_name_char(b) || b == b'@' || b == b'*')
        {
            let text = if prefix == b'#' { "#" } else { "!" };
            children.push(p.leaf_at(NodeKind::Token(text), Span::new(pos, pos + 1)));
        }
    }

    let named = parse_parameter(p, children);

    if named {
        if let Some(op) = parse_operator(p, children) {
            if SUBSTITUTION_OPERATORS.contains(&op) {
                if let Some(pattern) = p.peek_regex(true) {
                    children.push(p.token_leaf(pattern));
                }
                let pos = p.pos();
                if bytes.get(pos) == Some(&b'/') {
                    children.push(p.leaf_at(NodeKind::Token("/"), Span::new(pos, pos + 1)));
                }
            }
        }
    }

    loop {
        let tok = p.peek();
        if tok.is_op("}") {
            children.push(p.token_leaf(tok));
            return;
        }
        if tok.is_eof() {
            p.unterminated(start, "parameter expansion: expected `}`");
            return;
        }
        if is_literal_start(&tok) {
            if let Some(literal) = parse_literal(p) {
                children.push(literal);
                continue;
            }
        }
        children.push(p.token_leaf(tok));
    }
}

/// The parameter name, special parameter, or subscript. False when no
/// name is present.
fn parse_parameter(p: &mut Parser<'_>, children: &mut Vec<Node>) -> bool {
    let bytes = p.src().as_bytes();
    let pos = p.pos();
    let name = match bytes.get(pos) {
        Some(&b) if is_name_char(b) => {
            let end = word_parser::scan_name(bytes, pos);
            word_parser::name_leaf(p, Span::new(pos, end))
        }
        Some(b) if SPECIAL_PARAMETERS.contains(b) => {
            p.leaf_at(NodeKind::SpecialVariableName, Span::new(pos, pos + 1))
        }
        _ => return false,
    };
    if bytes.get(p.pos()) == Some(&b'[') {
        children.push(parse_subscript(p, name));
    } else {
        children.push(name);
    }
    true
}

fn parse_operator(p: &mut Parser<'_>, children: &mut Vec<Node>) -> Option<&'static str> {
    let pos = p.pos();
    let rest = &p.src()[pos..];
    let op = EXPANSION_OPERATORS
        .iter()
        .copied()
        .find(|op| rest.starts_with(op))?;
    children.push(p.leaf_at(NodeKind::Token(op), Span::new(pos, pos + op.len())));
    Some(op)
}

/// `name[index]`; the cursor sits on `[`
pub(crate) fn parse_subscript(p: &mut Parser<'_>, name: Node) -> Node {
    let pos = p.pos();
    let start = name.span.start;
    let mut children = vec![name, p.leaf_at(NodeKind::Token("["), Span::new(pos, pos + 1))];
    let flags = LexFlags {
        stop_at_bracket: true,
        in_expansion: true,
        stop_at_brace: p.word_flags().stop_at_brace,
        ..LexFlags::default()
    };
    p.with_word_flags(flags, |p| loop {
        let tok = p.peek();
        if tok.is_op("]") {
            children.push(p.token_leaf(tok));
            break;
        }
        if tok.is_eof() {
            p.unterminated(start, "subscript: expected `]`");
            break;
        }
        if tok.kind == TokenKind::Newline || tok.is_op("}") {
            p.error(
                ErrorKind::SyntaxError,
                tok.span,
                "expected `]` to close subscript",
            );
            break;
        }
        match parse_literal(p) {
            Some(literal) => children.push(literal),
            None => children.push(p.token_leaf(tok)),
        }
    });
    p.node(NodeKind::Subscript, children)
}

// =============================================================================
// COMMAND AND PROCESS SUBSTITUTION
// =============================================================================

/// `$( ... )`, including the `$(< file)` shorthand
pub(crate) fn parse_command_substitution(p: &mut Parser<'_>) -> Node {
    parse_substitution(p, NodeKind::CommandSubstitution, "command substitution")
}

/// `<( ... )` and `>( ... )`
pub(crate) fn parse_process_substitution(p: &mut Parser<'_>) -> Node {
    parse_substitution(p, NodeKind::ProcessSubstitution, "process substitution")
}

fn parse_substitution(p: &mut Parser<'_>, kind: NodeKind, construct: &str) -> Node {
    let open = p.peek();
    let start = open.span.start;
    let file_shorthand = open.is_op("$(");
    let mut children = vec![p.token_leaf(open)];

    p.push_mode(LexerMode::Command);
    p.with_word_flags(LexFlags::default(), |p| {
        let tok = p.peek();
        if file_shorthand && tok.is_op("<") {
            if let Some(redirect) = command_parser::parse_redirect(p) {
                children.push(redirect);
            }
        } else {
            parse_statements(p, &mut children, ListContext::default());
        }
        p.expect_op(&mut children, ")", construct, start);
    });
    p.pop_mode();
    p.node(kind, children)
}

/// `` `...` ``
pub(crate) fn parse_backtick_substitution(p: &mut Parser<'_>) -> Node {
    let open = p.peek();
    let start = open.span.start;
    let mut children = vec![p.token_leaf(open)];

    p.push_mode(LexerMode::Command);
    p.with_word_flags(LexFlags::default(), |p| {
        p.within_backticks(|p| {
            parse_statements(p, &mut children, ListContext::default());
            let close = p.peek();
            if close.kind == TokenKind::BacktickClose {
                children.push(p.token_leaf(close));
            } else {
                p.missing(close, "`", "command substitution", start);
            }
        })
    });
    p.pop_mode();
    p.node(NodeKind::CommandSubstitution, children)
}

// =============================================================================
// ARITHMETIC EXPANSION
// =============================================================================

/// `$(( ... ))`; the expression may be empty
pub(crate) fn parse_arithmetic_expansion(p: &mut Parser<'_>) -> Node {
    let open = p.peek();
    let start = open.span.start;
    let mut children = vec![p.token_leaf(open)];

    p.push_mode(LexerMode::Arithmetic);
    p.with_word_flags(LexFlags::default(), |p| {
        if !arithmetic_parser::at_arith_close(p) {
            arithmetic_parser::parse_required(p, &mut children);
        }
        arithmetic_parser::expect_arith_close(p, &mut children, "arithmetic expansion", start);
    });
    p.pop_mode();
    p.node(NodeKind::ArithmeticExpansion, children)
}
