//! Arithmetic Expression Parser
//!
//! Parses bash arithmetic expressions used in:
//! - $((expr))
//! - ((expr))
//! - for ((init; cond; step))
//! - Array subscripts inside arithmetic
//!
//! Binary operators are climbed in one loop over `grammar::ARITH_LEVELS`,
//! loosest to tightest: comma, assignment, ternary, `||`, `&&`, `|`, `^`,
//! `&`, equality, relational, shifts, additive, multiplicative, `**`. Unary
//! prefix operators bind tighter than any binary level, postfix `++`/`--`
//! tightest.

use crate::cst::types::{Node, NodeKind, Span};
use crate::parser::grammar::{
    Assoc, ARITH_LEVELS, ARITH_POSTFIX_OPERATORS, ARITH_PREFIX_OPERATORS, ARITH_TERNARY_LEVEL,
};
use crate::parser::lexer::{Token, TokenKind};
use crate::parser::parser::Parser;
use crate::parser::types::ErrorKind;
use crate::parser::word_parser::{self, is_literal_start};

/// True when the next token is the `))` closing an arithmetic construct
pub(crate) fn at_arith_close(p: &mut Parser<'_>) -> bool {
    let tok = p.peek();
    tok.is_op(")") && p.src()[tok.span.end..].starts_with(')')
}

/// Parse a full expression into `out`, recording an error when none is
/// present
pub(crate) fn parse_required(p: &mut Parser<'_>, out: &mut Vec<Node>) {
    match parse_arithmetic(p) {
        Some(expr) => out.push(expr),
        None => {
            let tok = p.peek();
            if tok.kind != TokenKind::Error {
                missing_operand(p, tok, "arithmetic expression");
            }
        }
    }
}

/// Consume the closing `))`. Tokens before it are wrapped in an `ERROR`
/// node; end of input records an unterminated construct.
pub(crate) fn expect_arith_close(
    p: &mut Parser<'_>,
    out: &mut Vec<Node>,
    construct: &str,
    start: usize,
) -> bool {
    let mut junk = Vec::new();
    let closed = loop {
        if at_arith_close(p) {
            break true;
        }
        let tok = p.peek();
        if tok.is_eof() {
            p.unterminated(start, &format!("{}: expected `))`", construct));
            break false;
        }
        if junk.is_empty() && tok.kind != TokenKind::Error {
            let found = tok.text(p.src()).to_string();
            p.error(
                ErrorKind::SyntaxError,
                tok.span,
                format!("unexpected `{}` in {}", found, construct),
            );
        }
        junk.push(p.token_leaf(tok));
    };
    if !junk.is_empty() {
        out.push(p.node(NodeKind::Error, junk));
    }
    if closed {
        let tok = p.peek();
        let span = Span::new(tok.span.start, tok.span.start + 2);
        out.push(p.leaf_at(NodeKind::Token("))"), span));
    }
    closed
}

fn missing_operand(p: &mut Parser<'_>, tok: Token, after: &str) {
    p.error(
        ErrorKind::SyntaxError,
        tok.span,
        format!("expected an operand after {}", after),
    );
}

fn operator_in(tok: &Token, operators: &[&'static str]) -> Option<&'static str> {
    match tok.kind {
        TokenKind::Operator(op) if operators.contains(&op) => Some(op),
        _ => None,
    }
}

/// Parse a complete arithmetic expression (comma level)
pub(crate) fn parse_arithmetic(p: &mut Parser<'_>) -> Option<Node> {
    parse_arith_level(p, 0)
}

/// Parse an expression whose operators all sit at `min_level` of
/// `ARITH_LEVELS` or tighter. Each call is one nesting level.
pub(crate) fn parse_arith_level(p: &mut Parser<'_>, min_level: usize) -> Option<Node> {
    if !p.enter() {
        return Some(p.halted_node());
    }
    let node = climb(p, min_level);
    p.leave();
    node
}

/// Level of the operator `tok`, if it binds at `min_level` or tighter.
/// `?` stands for the ternary row.
fn infix_level(tok: &Token, min_level: usize) -> Option<(usize, &'static str)> {
    let TokenKind::Operator(op) = tok.kind else {
        return None;
    };
    if op == "?" {
        return (ARITH_TERNARY_LEVEL >= min_level).then_some((ARITH_TERNARY_LEVEL, op));
    }
    ARITH_LEVELS
        .iter()
        .enumerate()
        .skip(min_level)
        .find(|(_, row)| row.operators.contains(&op))
        .map(|(level, _)| (level, op))
}

/// Precedence climbing over `ARITH_LEVELS`
fn climb(p: &mut Parser<'_>, min_level: usize) -> Option<Node> {
    let mut lhs = parse_unary(p)?;
    loop {
        let tok = p.peek();
        let Some((level, op)) = infix_level(&tok, min_level) else {
            break;
        };
        if level == ARITH_TERNARY_LEVEL {
            lhs = parse_ternary(p, lhs, tok);
            continue;
        }
        let mut children = vec![lhs, p.token_leaf(tok)];
        let next = match ARITH_LEVELS[level].assoc {
            Assoc::Right => level,
            Assoc::Left => level + 1,
        };
        match parse_arith_level(p, next) {
            Some(rhs) => children.push(rhs),
            None => {
                let next = p.peek();
                missing_operand(p, next, &format!("`{}`", op));
            }
        }
        lhs = p.node(NodeKind::BinaryArithmeticExpression, children);
    }
    Some(lhs)
}

/// `cond ? a : b` with the cursor on `?`. The else branch is parsed at the
/// ternary level, which makes chains group to the right.
fn parse_ternary(p: &mut Parser<'_>, condition: Node, question: Token) -> Node {
    let mut children = vec![condition, p.token_leaf(question)];
    match parse_arithmetic(p) {
        Some(branch) => children.push(branch),
        None => {
            let next = p.peek();
            missing_operand(p, next, "`?`");
        }
    }

    let colon = p.peek();
    if !colon.is_op(":") {
        let found = colon.text(p.src()).to_string();
        p.error(
            ErrorKind::SyntaxError,
            colon.span,
            format!("expected `:` in conditional expression, found `{}`", found),
        );
        return p.node(NodeKind::TernaryArithmeticExpression, children);
    }
    children.push(p.token_leaf(colon));
    match parse_arith_level(p, ARITH_TERNARY_LEVEL) {
        Some(branch) => children.push(branch),
        None => {
            let next = p.peek();
            missing_operand(p, next, "`:`");
        }
    }
    p.node(NodeKind::TernaryArithmeticExpression, children)
}

fn parse_unary(p: &mut Parser<'_>) -> Option<Node> {
    let tok = p.peek();
    let Some(op) = operator_in(&tok, ARITH_PREFIX_OPERATORS) else {
        return parse_postfix(p);
    };
    let mut children = vec![p.token_leaf(tok)];
    if !p.enter() {
        children.push(p.halted_node());
        return Some(p.node(NodeKind::UnaryArithmeticExpression, children));
    }
    let operand = parse_unary(p);
    p.leave();
    match operand {
        Some(operand) => children.push(operand),
        None => {
            let next = p.peek();
            missing_operand(p, next, &format!("`{}`", op));
        }
    }
    Some(p.node(NodeKind::UnaryArithmeticExpression, children))
}

fn parse_postfix(p: &mut Parser<'_>) -> Option<Node> {
    let operand = parse_primary(p)?;
    let tok = p.peek();
    if tok.adjacent && operator_in(&tok, ARITH_POSTFIX_OPERATORS).is_some() {
        let op = p.token_leaf(tok);
        return Some(p.node(NodeKind::PostfixArithmeticExpression, vec![operand, op]));
    }
    Some(operand)
}

fn parse_primary(p: &mut Parser<'_>) -> Option<Node> {
    let tok = p.peek();
    match tok.kind {
        TokenKind::Word => {
            let text = tok.text(p.src());
            if text.starts_with(|c: char| c.is_ascii_digit()) {
                return Some(p.leaf_at(NodeKind::Number, tok.span));
            }
            if p.src()[tok.span.end..].starts_with('[') {
                let name = p.leaf_at(NodeKind::VariableName, tok.span);
                return Some(parse_arith_subscript(p, name));
            }
            Some(p.leaf_at(NodeKind::Word, tok.span))
        }
        TokenKind::Operator("(") => {
            let start = tok.span.start;
            let mut children = vec![p.token_leaf(tok)];
            match parse_arithmetic(p) {
                Some(inner) => children.push(inner),
                None => {
                    let next = p.peek();
                    missing_operand(p, next, "`(`");
                }
            }
            p.expect_op(&mut children, ")", "parenthesized expression", start);
            Some(p.node(NodeKind::ParenthesizedArithmeticExpression, children))
        }
        TokenKind::Error => Some(p.token_leaf(tok)),
        _ if is_literal_start(&tok) => word_parser::parse_fragment(p),
        _ => None,
    }
}

/// `name[expr]`; the cursor sits on `[`
fn parse_arith_subscript(p: &mut Parser<'_>, name: Node) -> Node {
    let start = name.span.start;
    let mut children = vec![name];
    let open = p.peek();
    children.push(p.token_leaf(open));
    match parse_arithmetic(p) {
        Some(index) => children.push(index),
        None => {
            let next = p.peek();
            missing_operand(p, next, "`[`");
        }
    }
    p.expect_op(&mut children, "]", "subscript", start);
    p.node(NodeKind::Subscript, children)
}
