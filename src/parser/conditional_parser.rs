//! Conditional Expression Parser
//!
//! Parses test commands: `[ ... ]`, `[[ ... ]]`, and the arithmetic command
//! `(( ... ))`. Both bracket forms share one expression grammar; binary
//! operators are climbed over `grammar::TEST_LEVELS`.
//!
//! Precedence (lowest to highest):
//! 1. `||` `-o`
//! 2. `&&` `-a`
//! 3. `=` `==` `!=` `=~` `-eq` `-ne`
//! 4. `<` `>` `-lt` `-le` `-gt` `-ge` `-nt` `-ot` `-ef`
//! 5. `!` (right associative)
//! 6. Unary test operators (`-f`, `-z`, ...)

use crate::cst::types::{Node, NodeKind};
use crate::parser::arithmetic_parser;
use crate::parser::grammar::{self, TEST_LEVELS};
use crate::parser::lexer::{LexFlags, LexerMode, Token, TokenKind};
use crate::parser::parser::Parser;
use crate::parser::types::ErrorKind;
use crate::parser::word_parser::{is_literal_start, parse_literal};

/// `[ expr ]` or `[[ expr ]]`
pub(crate) fn parse_test_command(p: &mut Parser<'_>) -> Node {
    let open = p.peek_statement();
    let start = open.span.start;
    let double = open.text(p.src()) == "[[";
    let (mode, closer, construct) = if double {
        (LexerMode::DoubleTestBracket, "]]", "`[[` test")
    } else {
        (LexerMode::TestBracket, "]", "`[` test")
    };
    let mut children = vec![p.keyword_leaf(open)];

    p.push_mode(mode);
    p.with_word_flags(LexFlags::default(), |p| {
        if !p.peek().is_op(closer) {
            match parse_test_expression(p) {
                Some(expr) => children.push(expr),
                None => {
                    let tok = p.peek();
                    if tok.kind != TokenKind::Error && !tok.is_eof() {
                        missing_operand(p, tok, construct);
                    }
                }
            }
        }
        expect_closer(p, &mut children, closer, construct, start);
    });
    p.pop_mode();
    p.node(NodeKind::TestCommand, children)
}

/// `(( expr ))`
pub(crate) fn parse_arithmetic_command(p: &mut Parser<'_>) -> Node {
    let open = p.peek_statement();
    let start = open.span.start;
    let mut children = vec![p.token_leaf(open)];

    p.push_mode(LexerMode::Arithmetic);
    p.with_word_flags(LexFlags::default(), |p| {
        if !arithmetic_parser::at_arith_close(p) {
            arithmetic_parser::parse_required(p, &mut children);
        }
        arithmetic_parser::expect_arith_close(p, &mut children, "arithmetic command", start);
    });
    p.pop_mode();
    p.node(NodeKind::TestCommand, children)
}

/// Consume the closing bracket. Stray tokens before it become an `ERROR`
/// node; a line break inside `[ ... ]` ends the command unclosed.
fn expect_closer(
    p: &mut Parser<'_>,
    out: &mut Vec<Node>,
    closer: &'static str,
    construct: &str,
    start: usize,
) {
    let mut junk = Vec::new();
    loop {
        let tok = p.peek();
        if tok.is_op(closer) {
            if !junk.is_empty() {
                out.push(p.node(NodeKind::Error, std::mem::take(&mut junk)));
            }
            out.push(p.token_leaf(tok));
            return;
        }
        if tok.is_eof() {
            p.unterminated(start, &format!("{}: expected `{}`", construct, closer));
            break;
        }
        if tok.kind == TokenKind::Newline {
            p.error(
                ErrorKind::SyntaxError,
                tok.span,
                format!("expected `{}` before end of line", closer),
            );
            break;
        }
        if junk.is_empty() && tok.kind != TokenKind::Error {
            let found = tok.text(p.src()).to_string();
            p.error(
                ErrorKind::SyntaxError,
                tok.span,
                format!("unexpected `{}` in {}", found, construct),
            );
        }
        if is_literal_start(&tok) {
            if let Some(literal) = parse_literal(p) {
                junk.push(literal);
                continue;
            }
        }
        junk.push(p.token_leaf(tok));
    }
    if !junk.is_empty() {
        out.push(p.node(NodeKind::Error, junk));
    }
}

fn missing_operand(p: &mut Parser<'_>, tok: Token, after: &str) {
    let found = tok.text(p.src()).to_string();
    p.error(
        ErrorKind::SyntaxError,
        tok.span,
        format!("expected an operand after {}, found `{}`", after, found),
    );
}

// =============================================================================
// TEST EXPRESSIONS
// =============================================================================

pub(crate) fn parse_test_expression(p: &mut Parser<'_>) -> Option<Node> {
    parse_test_level(p, 0)
}

/// Binary operator text when `tok` can act as one
fn binary_operator(p: &Parser<'_>, tok: &Token, level: usize) -> Option<&'static str> {
    let text = match tok.kind {
        TokenKind::Operator(op) => op,
        TokenKind::TestOperator => tok.text(p.src()),
        _ => return None,
    };
    TEST_LEVELS[level].lookup(text)
}

fn parse_test_level(p: &mut Parser<'_>, level: usize) -> Option<Node> {
    if level >= TEST_LEVELS.len() {
        return parse_test_unary(p);
    }
    let mut lhs = parse_test_level(p, level + 1)?;
    loop {
        let tok = p.peek();
        let Some(op) = binary_operator(p, &tok, level) else {
            break;
        };
        // `-eq`, `-a`, ... in binary position are anonymous, like `==`
        let operator = p.leaf_at(NodeKind::Token(op), tok.span);
        let mut children = vec![lhs, operator];
        let rhs = if op == "=~" {
            parse_regex_operand(p)
        } else {
            parse_test_level(p, level + 1)
        };
        match rhs {
            Some(rhs) => children.push(rhs),
            None => {
                let next = p.peek();
                missing_operand(p, next, &format!("`{}`", op));
            }
        }
        lhs = p.node(NodeKind::BinaryExpression, children);
    }
    Some(lhs)
}

/// Right side of `=~`: an unquoted regex, or an ordinary operand when it
/// starts with a quote or expansion
fn parse_regex_operand(p: &mut Parser<'_>) -> Option<Node> {
    match p.peek_regex(false) {
        Some(regex) => Some(p.token_leaf(regex)),
        None => parse_test_primary(p),
    }
}

fn parse_test_unary(p: &mut Parser<'_>) -> Option<Node> {
    if !p.enter() {
        return Some(p.halted_node());
    }
    let tok = p.peek();
    let node = if tok.is_op("!") {
        let mut children = vec![p.token_leaf(tok)];
        match parse_test_unary(p) {
            Some(operand) => children.push(operand),
            None => {
                let next = p.peek();
                missing_operand(p, next, "`!`");
            }
        }
        Some(p.node(NodeKind::UnaryExpression, children))
    } else if tok.kind == TokenKind::TestOperator && !is_operand_position(p, &tok) {
        let mut children = vec![p.token_leaf(tok)];
        match parse_test_primary(p) {
            Some(operand) => children.push(operand),
            None => {
                let next = p.peek();
                let op = tok.text(p.src()).to_string();
                missing_operand(p, next, &format!("`{}`", op));
            }
        }
        Some(p.node(NodeKind::UnaryExpression, children))
    } else {
        parse_test_primary(p)
    };
    p.leave();
    node
}

/// A test operator followed by a closer or a binary operator is an
/// ordinary word (`[ -n ]`, `[[ -f == x ]]`)
fn is_operand_position(p: &mut Parser<'_>, tok: &Token) -> bool {
    let checkpoint = p.checkpoint();
    p.set_pos(tok.span.end);
    let next = p.peek();
    p.restore(checkpoint);
    match next.kind {
        TokenKind::Eof | TokenKind::Newline => true,
        TokenKind::Operator(op) => {
            matches!(op, "]" | "]]" | ")") || grammar::is_binary_test_operator(op)
        }
        TokenKind::TestOperator => grammar::is_binary_test_operator(next.text(p.src())),
        _ => false,
    }
}

fn parse_test_primary(p: &mut Parser<'_>) -> Option<Node> {
    let tok = p.peek();
    match tok.kind {
        TokenKind::Operator("(") => {
            let start = tok.span.start;
            let mut children = vec![p.token_leaf(tok)];
            match parse_test_expression(p) {
                Some(inner) => children.push(inner),
                None => {
                    let next = p.peek();
                    missing_operand(p, next, "`(`");
                }
            }
            p.expect_op(&mut children, ")", "parenthesized test", start);
            Some(p.node(NodeKind::ParenthesizedExpression, children))
        }
        TokenKind::TestOperator => Some(p.leaf_at(NodeKind::Word, tok.span)),
        _ if is_literal_start(&tok) => parse_literal(p),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sexp(src: &str) -> String {
        Parser::new(src).parse().to_sexp()
    }

    #[test]
    fn test_single_bracket() {
        assert_eq!(
            sexp("[ -f file ]"),
            "(program (test_command (unary_expression (test_operator) (word))))"
        );
    }

    #[test]
    fn test_double_bracket_binary() {
        assert_eq!(
            sexp("[[ $a == b* ]]"),
            "(program (test_command (binary_expression (simple_expansion (variable_name)) (word))))"
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(
            sexp("[[ a || b && c ]]"),
            "(program (test_command (binary_expression (word) (binary_expression (word) (word)))))"
        );
    }

    #[test]
    fn test_alphabetic_binary_operator() {
        assert_eq!(
            sexp("[ \"$n\" -gt 3 ]"),
            "(program (test_command (binary_expression (string (simple_expansion (variable_name))) \
             (number))))"
        );
    }

    #[test]
    fn test_binary_operators_are_anonymous() {
        let tree = Parser::new("[ a = b -a c != d ]").parse();
        assert_eq!(
            tree.to_sexp(),
            "(program (test_command (binary_expression \
             (binary_expression (word) (word)) (binary_expression (word) (word)))))"
        );
        let outer = tree
            .root()
            .descendants()
            .find(|n| n.kind == NodeKind::BinaryExpression)
            .unwrap();
        assert_eq!(outer.children[1].kind, NodeKind::Token("-a"));
        assert_eq!(outer.children[0].children[1].kind, NodeKind::Token("="));
    }

    #[test]
    fn test_negation_and_grouping() {
        assert_eq!(
            sexp("[[ ! ( -z $x ) ]]"),
            "(program (test_command (unary_expression (parenthesized_expression \
             (unary_expression (test_operator) (simple_expansion (variable_name)))))))"
        );
    }

    #[test]
    fn test_regex_operand() {
        let tree = Parser::new("[[ $line =~ ^[0-9]+(\\.[0-9]+)?$ ]]").parse();
        assert!(!tree.has_errors());
        let regex = tree
            .root()
            .descendants()
            .find(|n| n.kind == NodeKind::Regex)
            .unwrap();
        assert_eq!(tree.text(regex), "^[0-9]+(\\.[0-9]+)?$");
    }

    #[test]
    fn test_quoted_regex_operand_is_string() {
        assert_eq!(
            sexp("[[ $x =~ \"a b\" ]]"),
            "(program (test_command (binary_expression (simple_expansion (variable_name)) (string))))"
        );
    }

    #[test]
    fn test_operator_as_operand() {
        assert_eq!(sexp("[ -n ]"), "(program (test_command (word)))");
    }

    #[test]
    fn test_test_command_in_list() {
        assert_eq!(
            sexp("[ -d dir ] && cd dir"),
            "(program (list (test_command (unary_expression (test_operator) (word))) \
             (command (command_name (word)) (word))))"
        );
    }

    #[test]
    fn test_unclosed_double_bracket() {
        let tree = Parser::new("[[ -n x").parse();
        assert!(tree
            .errors()
            .iter()
            .any(|e| e.kind == ErrorKind::UnterminatedConstruct && e.span.start == 0));
        assert_eq!(tree.reconstruct(), "[[ -n x");
    }

    #[test]
    fn test_arithmetic_command_empty() {
        let tree = Parser::new("(( ))").parse();
        assert!(!tree.has_errors());
        assert_eq!(tree.to_sexp(), "(program (test_command))");
    }
}
