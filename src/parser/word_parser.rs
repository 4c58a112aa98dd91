//! Literal Parsing
//!
//! Words, numbers, quoted strings, simple expansions, concatenation, and
//! heredoc bodies. A literal is a run of fragments glued together with no
//! trivia between them; more than one fragment makes a `concatenation`.

use regex_lite::Regex;

use crate::cst::types::{Node, NodeKind, Span};
use crate::parser::expansion_parser;
use crate::parser::lexer::{char_len_at, LexerMode, Token, TokenKind};
use crate::parser::parser::Parser;

lazy_static::lazy_static! {
    /// Decimal, hex, and `base#digits` numerals
    static ref NUMBER_RE: Option<Regex> = Regex::new(r"^(0x)?[0-9]+(#[0-9A-Za-z@_]+)?$").ok();
}

/// Operators that open a literal fragment
const FRAGMENT_OPENERS: &[&str] = &["\"", "`", "$", "${", "$(", "$((", "<(", ">("];

/// Special parameters usable after `$`
const SPECIAL_PARAMETERS: &[u8] = b"*@?-$!#";

/// True when `tok` can begin a literal
pub fn is_literal_start(tok: &Token) -> bool {
    match tok.kind {
        TokenKind::Word | TokenKind::RawString | TokenKind::AnsiCString => true,
        TokenKind::Operator(op) => FRAGMENT_OPENERS.contains(&op),
        _ => false,
    }
}

pub fn is_number(text: &str) -> bool {
    NUMBER_RE.as_ref().is_some_and(|re| re.is_match(text))
}

/// Parse one literal: a fragment plus every fragment glued to it
pub(crate) fn parse_literal(p: &mut Parser<'_>) -> Option<Node> {
    let first = parse_fragment(p)?;
    let mut parts = vec![first];
    loop {
        let tok = p.peek();
        if !tok.adjacent || !is_literal_start(&tok) {
            break;
        }
        match parse_fragment(p) {
            Some(part) => parts.push(part),
            None => break,
        }
    }
    if parts.len() == 1 {
        parts.pop()
    } else {
        Some(p.node(NodeKind::Concatenation, parts))
    }
}

/// Parse a single literal fragment at the cursor
pub(crate) fn parse_fragment(p: &mut Parser<'_>) -> Option<Node> {
    let tok = p.peek();
    if !is_literal_start(&tok) {
        return None;
    }
    if !p.enter() {
        return Some(p.halted_node());
    }
    let node = match tok.kind {
        TokenKind::Word => word_leaf(p, tok),
        TokenKind::RawString => {
            let text = tok.text(p.src());
            if text.len() < 2 || !text.ends_with('\'') {
                p.unterminated(tok.span.start, "single-quoted string");
            }
            p.token_leaf(tok)
        }
        TokenKind::AnsiCString => {
            if !ansi_c_string_closed(tok.text(p.src())) {
                p.unterminated(tok.span.start, "ANSI-C string");
            }
            p.token_leaf(tok)
        }
        TokenKind::Operator("\"") => parse_string(p),
        TokenKind::Operator("$") => parse_dollar(p, tok),
        TokenKind::Operator("${") => expansion_parser::parse_expansion(p),
        TokenKind::Operator("$(") => expansion_parser::parse_command_substitution(p),
        TokenKind::Operator("$((") => expansion_parser::parse_arithmetic_expansion(p),
        TokenKind::Operator("`") => expansion_parser::parse_backtick_substitution(p),
        _ => expansion_parser::parse_process_substitution(p),
    };
    p.leave();
    Some(node)
}

/// A word token as `word` or `number`
fn word_leaf(p: &mut Parser<'_>, tok: Token) -> Node {
    let kind = if is_number(tok.text(p.src())) {
        NodeKind::Number
    } else {
        NodeKind::Word
    };
    p.leaf_at(kind, tok.span)
}

fn ansi_c_string_closed(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 2;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\'' => return i == bytes.len() - 1,
            _ => i += 1,
        }
    }
    false
}

/// `$` opens an expansion inside double quotes and heredoc bodies only when
/// a name, special parameter, `{`, or `(` follows
fn dollar_expands(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i + 1) {
        Some(&b) => {
            b.is_ascii_alphanumeric() || b == b'_' || b == b'{' || b == b'(' || SPECIAL_PARAMETERS.contains(&b)
        }
        None => false,
    }
}

fn push_content(children: &mut Vec<Node>, start: usize, end: usize) {
    if end > start {
        children.push(Node::leaf(NodeKind::Content, Span::new(start, end)));
    }
}

// =============================================================================
// DOUBLE-QUOTED STRINGS
// =============================================================================

/// `"..."`: content runs interleaved with expansions and substitutions
pub(crate) fn parse_string(p: &mut Parser<'_>) -> Node {
    let open = p.peek();
    let start = open.span.start;
    let mut children = vec![p.token_leaf(open)];
    let src = p.src();
    let bytes = src.as_bytes();

    let mut run_start = p.pos();
    let mut i = run_start;
    loop {
        if i >= bytes.len() {
            push_content(&mut children, run_start, i);
            p.set_pos(i);
            p.unterminated(start, "double-quoted string");
            break;
        }
        match bytes[i] {
            b'"' => {
                push_content(&mut children, run_start, i);
                children.push(p.leaf_at(NodeKind::Token("\""), Span::new(i, i + 1)));
                break;
            }
            b'\\' => {
                i += 1;
                if i < bytes.len() {
                    i += char_len_at(src, i);
                }
            }
            b'$' | b'`' if bytes[i] == b'`' || dollar_expands(bytes, i) => {
                push_content(&mut children, run_start, i);
                p.set_pos(i);
                match parse_fragment(p) {
                    Some(part) if p.pos() > i => {
                        children.push(part);
                        i = p.pos();
                        run_start = i;
                    }
                    _ => {
                        run_start = i;
                        i += 1;
                    }
                }
                if p.is_halted() {
                    break;
                }
            }
            _ => i += 1,
        }
    }
    p.node(NodeKind::String, children)
}

// =============================================================================
// SIMPLE EXPANSIONS
// =============================================================================

/// `$name`, `$1`, `$@`, ... or `$"..."`
fn parse_dollar(p: &mut Parser<'_>, dollar: Token) -> Node {
    let mut children = vec![p.token_leaf(dollar)];
    let src = p.src();
    let bytes = src.as_bytes();
    let pos = p.pos();

    if bytes.get(pos) == Some(&b'"') {
        children.push(parse_string(p));
        return p.node(NodeKind::StringExpansion, children);
    }

    match bytes.get(pos) {
        Some(b) if SPECIAL_PARAMETERS.contains(b) => {
            children.push(p.leaf_at(NodeKind::SpecialVariableName, Span::new(pos, pos + 1)));
        }
        // Positional parameters take a single digit: `$10` is `$1` then `0`
        Some(b) if b.is_ascii_digit() => {
            children.push(name_leaf(p, Span::new(pos, pos + 1)));
        }
        Some(_) => {
            let end = scan_name(bytes, pos);
            children.push(name_leaf(p, Span::new(pos, end)));
        }
        None => {}
    }
    p.node(NodeKind::SimpleExpansion, children)
}

/// End of a `\w+` run starting at `pos`
pub(crate) fn scan_name(bytes: &[u8], pos: usize) -> usize {
    let mut end = pos;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    end
}

/// `0` and `_` are special parameters; other names are variables
pub(crate) fn name_leaf(p: &mut Parser<'_>, span: Span) -> Node {
    let kind = match &p.src()[span.start..span.end] {
        "0" | "_" => NodeKind::SpecialVariableName,
        _ => NodeKind::VariableName,
    };
    p.leaf_at(kind, span)
}

// =============================================================================
// HEREDOC BODIES
// =============================================================================

/// Build the `heredoc_body` node for `body`. A quoted delimiter makes the
/// whole body one content run; otherwise expansions and substitutions
/// become child nodes.
pub(crate) fn parse_heredoc_body(p: &mut Parser<'_>, body: Span, quoted: bool) -> Node {
    let mut children = Vec::new();
    if quoted || body.is_empty() {
        push_content(&mut children, body.start, body.end);
        return Node::new(NodeKind::HeredocBody, body, children);
    }

    let src = p.src();
    let bytes = src.as_bytes();
    p.push_mode(LexerMode::Command);
    let mut run_start = body.start;
    let mut i = body.start;
    while i < body.end {
        match bytes[i] {
            b'\\' => {
                i += 1;
                if i < body.end {
                    i += char_len_at(src, i);
                }
            }
            b'$' | b'`' if bytes[i] == b'`' || dollar_expands(bytes, i) => {
                let checkpoint = p.checkpoint();
                p.set_pos(i);
                match parse_fragment(p) {
                    Some(part) if p.pos() > i && part.span.end <= body.end => {
                        push_content(&mut children, run_start, i);
                        children.push(part);
                        i = p.pos();
                        run_start = i;
                    }
                    _ => {
                        p.restore(checkpoint);
                        i += 1;
                    }
                }
            }
            _ => i += 1,
        }
    }
    push_content(&mut children, run_start, body.end.max(run_start));
    p.pop_mode();
    Node::new(NodeKind::HeredocBody, body, children)
}
