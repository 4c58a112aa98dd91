//! Compound Command Parser
//!
//! Handles parsing of compound commands:
//! - if/elif/else/fi
//! - for/select/do/done
//! - C-style for ((;;))
//! - while/until
//! - case/esac
//! - subshells `( ... )` and groups `{ ... }`
//! - function definitions

use crate::cst::types::{Node, NodeKind};
use crate::parser::arithmetic_parser;
use crate::parser::command_parser;
use crate::parser::conditional_parser;
use crate::parser::grammar::{ARITH_TERNARY_LEVEL, CASE_TERMINATORS};
use crate::parser::lexer::{is_valid_name, LexFlags, LexerMode, TokenKind};
use crate::parser::parser::{parse_statements, ListContext, Parser};
use crate::parser::types::ErrorKind;
use crate::parser::word_parser::{is_literal_start, parse_literal};

fn statements(p: &mut Parser<'_>, out: &mut Vec<Node>) {
    parse_statements(p, out, ListContext::default());
}

// =============================================================================
// IF
// =============================================================================

pub(crate) fn parse_if(p: &mut Parser<'_>) -> Node {
    let tok = p.peek_statement();
    let start = tok.span.start;
    let mut children = vec![p.keyword_leaf(tok)];

    statements(p, &mut children);
    p.expect_keyword(&mut children, "then", "if statement", start);
    statements(p, &mut children);

    loop {
        let tok = p.peek_statement();
        if p.is_keyword(&tok, "elif") {
            let clause_start = tok.span.start;
            let mut clause = vec![p.keyword_leaf(tok)];
            statements(p, &mut clause);
            p.expect_keyword(&mut clause, "then", "elif clause", clause_start);
            statements(p, &mut clause);
            children.push(p.node(NodeKind::ElifClause, clause));
        } else if p.is_keyword(&tok, "else") {
            let mut clause = vec![p.keyword_leaf(tok)];
            statements(p, &mut clause);
            children.push(p.node(NodeKind::ElseClause, clause));
        } else {
            break;
        }
    }

    p.expect_keyword(&mut children, "fi", "if statement", start);
    p.node(NodeKind::IfStatement, children)
}

// =============================================================================
// LOOPS
// =============================================================================

/// `do ... done`; `None` when `do` is missing
fn parse_do_group(p: &mut Parser<'_>, construct: &str, start: usize) -> Option<Node> {
    let tok = p.peek_statement();
    if !p.is_keyword(&tok, "do") {
        if tok.is_eof() {
            p.unterminated(start, &format!("{}: expected `do`", construct));
        } else {
            let found = tok.text(p.src()).to_string();
            p.error(
                ErrorKind::SyntaxError,
                tok.span,
                format!("expected `do` in {}, found `{}`", construct, found),
            );
        }
        return None;
    }
    let mut children = vec![p.keyword_leaf(tok)];
    statements(p, &mut children);
    p.expect_keyword(&mut children, "done", construct, start);
    Some(p.node(NodeKind::DoGroup, children))
}

/// `for`/`select` loops, including the C-style `for (( ; ; ))`
pub(crate) fn parse_for(p: &mut Parser<'_>) -> Node {
    let tok = p.peek_statement();
    let start = tok.span.start;
    let is_select = tok.text(p.src()) == "select";
    let mut children = vec![p.keyword_leaf(tok)];

    if !is_select && p.peek_statement().is_op("((") {
        return parse_c_style_for(p, children, start);
    }

    let var = p.peek();
    if var.kind == TokenKind::Word && is_valid_name(var.text(p.src())) {
        children.push(p.leaf_at(NodeKind::VariableName, var.span));
    } else {
        let found = var.text(p.src()).to_string();
        p.error(
            ErrorKind::SyntaxError,
            var.span,
            format!("expected a loop variable, found `{}`", found),
        );
        if is_literal_start(&var) {
            if let Some(literal) = parse_literal(p) {
                children.push(literal);
            }
        }
    }

    let tok = p.peek();
    if p.is_keyword(&tok, "in") {
        children.push(p.keyword_leaf(tok));
        while is_literal_start(&p.peek()) {
            match parse_literal(p) {
                Some(value) => children.push(value),
                None => break,
            }
        }
    }

    let tok = p.peek();
    if tok.is_op(";") {
        children.push(p.token_leaf(tok));
    }
    p.skip_newlines(&mut children);

    let construct = if is_select { "select loop" } else { "for loop" };
    if let Some(body) = parse_do_group(p, construct, start) {
        children.push(body);
    }
    p.node(NodeKind::ForStatement, children)
}

fn parse_c_style_for(p: &mut Parser<'_>, mut children: Vec<Node>, start: usize) -> Node {
    let open = p.peek_statement();
    children.push(p.token_leaf(open));

    p.push_mode(LexerMode::Arithmetic);
    p.with_word_flags(LexFlags::default(), |p| {
        parse_for_clause(p, &mut children, true);
        if p.expect_op(&mut children, ";", "for loop header", start) {
            parse_for_clause(p, &mut children, false);
            if p.expect_op(&mut children, ";", "for loop header", start) {
                parse_for_clause(p, &mut children, false);
            }
        }
        arithmetic_parser::expect_arith_close(p, &mut children, "for loop header", start);
    });
    p.pop_mode();

    let tok = p.peek();
    if tok.is_op(";") {
        children.push(p.token_leaf(tok));
    }
    p.skip_newlines(&mut children);

    let tok = p.peek_statement();
    if p.is_keyword(&tok, "{") {
        children.push(parse_compound_statement(p));
    } else if let Some(body) = parse_do_group(p, "for loop", start) {
        children.push(body);
    }
    p.node(NodeKind::CStyleForStatement, children)
}

/// One `;`-separated clause of a C-style header. The first clause may be
/// a bare `name = value` assignment.
fn parse_for_clause(p: &mut Parser<'_>, out: &mut Vec<Node>, allow_assignment: bool) {
    let tok = p.peek();
    if tok.is_op(";") || arithmetic_parser::at_arith_close(p) {
        return;
    }
    if allow_assignment && tok.kind == TokenKind::Word && is_valid_name(tok.text(p.src())) {
        let checkpoint = p.checkpoint();
        let name = p.leaf_at(NodeKind::VariableName, tok.span);
        let eq = p.peek();
        if eq.is_op("=") {
            let mut assignment = vec![name, p.token_leaf(eq)];
            if let Some(value) = arithmetic_parser::parse_arith_level(p, ARITH_TERNARY_LEVEL) {
                assignment.push(value);
                if p.peek().is_op(";") {
                    out.push(p.node(NodeKind::VariableAssignment, assignment));
                    return;
                }
            }
        }
        p.restore(checkpoint);
    }
    arithmetic_parser::parse_required(p, out);
}

/// `while`/`until` loops
pub(crate) fn parse_while(p: &mut Parser<'_>) -> Node {
    let tok = p.peek_statement();
    let start = tok.span.start;
    let construct = if tok.text(p.src()) == "until" {
        "until loop"
    } else {
        "while loop"
    };
    let mut children = vec![p.keyword_leaf(tok)];
    statements(p, &mut children);
    if let Some(body) = parse_do_group(p, construct, start) {
        children.push(body);
    }
    p.node(NodeKind::WhileStatement, children)
}

// =============================================================================
// CASE
// =============================================================================

pub(crate) fn parse_case(p: &mut Parser<'_>) -> Node {
    let tok = p.peek_statement();
    let start = tok.span.start;
    let mut children = vec![p.keyword_leaf(tok)];

    let subject = p.peek();
    match parse_literal(p) {
        Some(word) => children.push(word),
        None => {
            let found = subject.text(p.src()).to_string();
            p.error(
                ErrorKind::SyntaxError,
                subject.span,
                format!("expected a word after `case`, found `{}`", found),
            );
        }
    }
    let tok = p.peek();
    if tok.is_op(";") {
        children.push(p.token_leaf(tok));
    }
    p.skip_newlines(&mut children);
    p.expect_keyword(&mut children, "in", "case statement", start);
    p.skip_newlines(&mut children);

    loop {
        let tok = p.peek_statement();
        if tok.is_eof() || p.is_keyword(&tok, "esac") || p.is_halted() {
            break;
        }
        let before = p.pos();
        if let Some(item) = parse_case_item(p) {
            children.push(item);
        }
        p.skip_newlines(&mut children);
        if p.pos() == before {
            break;
        }
    }

    p.expect_keyword(&mut children, "esac", "case statement", start);
    p.node(NodeKind::CaseStatement, children)
}

/// `[(] pattern [| pattern]... ) statements [;; | ;& | ;;&]`
fn parse_case_item(p: &mut Parser<'_>) -> Option<Node> {
    let mut children = Vec::new();
    let tok = p.peek();
    let start = tok.span.start;
    if tok.is_op("(") {
        children.push(p.token_leaf(tok));
    }

    loop {
        let tok = p.peek();
        match parse_literal(p) {
            Some(pattern) => children.push(pattern),
            None => {
                let found = tok.text(p.src()).to_string();
                p.error(
                    ErrorKind::SyntaxError,
                    tok.span,
                    format!("expected a case pattern, found `{}`", found),
                );
                break;
            }
        }
        let sep = p.peek();
        if !sep.is_op("|") {
            break;
        }
        children.push(p.token_leaf(sep));
    }
    if children.is_empty() {
        return None;
    }
    if !p.expect_op(&mut children, ")", "case item", start) {
        return Some(p.node(NodeKind::CaseItem, children));
    }

    let ctx = ListContext {
        in_case_item: true,
        ..ListContext::default()
    };
    parse_statements(p, &mut children, ctx);

    let tok = p.peek();
    if matches!(tok.kind, TokenKind::Operator(op) if CASE_TERMINATORS.contains(&op)) {
        children.push(p.token_leaf(tok));
    }
    Some(p.node(NodeKind::CaseItem, children))
}

// =============================================================================
// GROUPS
// =============================================================================

/// `{ ... }`
pub(crate) fn parse_compound_statement(p: &mut Parser<'_>) -> Node {
    let tok = p.peek_statement();
    let start = tok.span.start;
    let mut children = vec![p.keyword_leaf(tok)];
    statements(p, &mut children);
    p.expect_keyword(&mut children, "}", "command group", start);
    p.node(NodeKind::CompoundStatement, children)
}

/// `( ... )`
pub(crate) fn parse_subshell(p: &mut Parser<'_>) -> Node {
    let tok = p.peek_statement();
    let start = tok.span.start;
    let mut children = vec![p.token_leaf(tok)];
    statements(p, &mut children);
    p.expect_op(&mut children, ")", "subshell", start);
    p.node(NodeKind::Subshell, children)
}

// =============================================================================
// FUNCTIONS
// =============================================================================

/// `function name [()] body`
pub(crate) fn parse_function(p: &mut Parser<'_>) -> Node {
    let tok = p.peek_statement();
    let mut children = vec![p.keyword_leaf(tok)];

    let name = p.peek();
    if name.kind == TokenKind::Word {
        children.push(p.leaf_at(NodeKind::Word, name.span));
    } else {
        let found = name.text(p.src()).to_string();
        p.error(
            ErrorKind::SyntaxError,
            name.span,
            format!("expected a function name, found `{}`", found),
        );
    }

    let open = p.peek();
    if open.is_op("(") {
        let paren_start = open.span.start;
        children.push(p.token_leaf(open));
        p.expect_op(&mut children, ")", "function definition", paren_start);
    }
    finish_function(p, children)
}

/// `name () body`, or `None` when the statement is not a definition
pub(crate) fn try_function_definition(p: &mut Parser<'_>) -> Option<Node> {
    let checkpoint = p.checkpoint();
    let name = p.peek_statement();
    let name_leaf = p.leaf_at(NodeKind::Word, name.span);

    let open = p.peek_with(LexFlags::default());
    if !open.is_op("(") {
        p.restore(checkpoint);
        return None;
    }
    let open_leaf = p.token_leaf(open);
    let close = p.peek_with(LexFlags::default());
    if !close.is_op(")") {
        p.restore(checkpoint);
        return None;
    }
    let close_leaf = p.token_leaf(close);
    Some(finish_function(p, vec![name_leaf, open_leaf, close_leaf]))
}

fn finish_function(p: &mut Parser<'_>, mut children: Vec<Node>) -> Node {
    p.skip_newlines(&mut children);
    match parse_function_body(p) {
        Some(body) => {
            children.push(body);
            while let Some(redirect) = command_parser::parse_redirect(p) {
                children.push(redirect);
            }
        }
        None => {
            let tok = p.peek_statement();
            let found = tok.text(p.src()).to_string();
            p.error(
                ErrorKind::SyntaxError,
                tok.span,
                format!("expected a function body, found `{}`", found),
            );
        }
    }
    p.node(NodeKind::FunctionDefinition, children)
}

fn parse_function_body(p: &mut Parser<'_>) -> Option<Node> {
    let tok = p.peek_statement();
    match tok.kind {
        TokenKind::Operator("(") => Some(parse_subshell(p)),
        TokenKind::Operator("((") => Some(conditional_parser::parse_arithmetic_command(p)),
        TokenKind::Word if p.is_bare_word(&tok) => match tok.text(p.src()) {
            "{" => Some(parse_compound_statement(p)),
            "[" | "[[" => Some(conditional_parser::parse_test_command(p)),
            "if" => Some(parse_if(p)),
            "while" | "until" => Some(parse_while(p)),
            "for" | "select" => Some(parse_for(p)),
            "case" => Some(parse_case(p)),
            _ => None,
        },
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
    fn test_if_elif_else() {
        assert_eq!(
            sexp("if a; then b; elif c; then d; else e; fi"),
            "(program (if_statement (command (command_name (word))) (command (command_name (word))) \
             (elif_clause (command (command_name (word))) (command (command_name (word)))) \
             (else_clause (command (command_name (word))))))"
        );
    }

    #[test]
    fn test_multiline_if() {
        let tree = Parser::new("if true\nthen\n  echo yes\nfi\n").parse();
        assert!(!tree.has_errors());
        assert_eq!(tree.root().children[0].kind, NodeKind::IfStatement);
    }

    #[test]
    fn test_missing_fi() {
        let tree = Parser::new("if a; then b").parse();
        assert!(tree
            .errors()
            .iter()
            .any(|e| e.kind == ErrorKind::UnterminatedConstruct && e.span.start == 0));
        assert_eq!(tree.reconstruct(), "if a; then b");
    }

    #[test]
    fn test_for_in() {
        assert_eq!(
            sexp("for f in a \"b c\"; do echo $f; done"),
            "(program (for_statement (variable_name) (word) (string) \
             (do_group (command (command_name (word)) (simple_expansion (variable_name))))))"
        );
    }

    #[test]
    fn test_for_without_in() {
        assert_eq!(
            sexp("for arg\ndo\n  shift\ndone"),
            "(program (for_statement (variable_name) (do_group (command (command_name (word))))))"
        );
    }

    #[test]
    fn test_select() {
        let tree = Parser::new("select x in a b; do break; done").parse();
        assert!(!tree.has_errors());
        assert_eq!(tree.root().children[0].kind, NodeKind::ForStatement);
    }

    #[test]
    fn test_c_style_for() {
        assert_eq!(
            sexp("for ((i = 0; i < 3; i++)); do echo; done"),
            "(program (c_style_for_statement (variable_assignment (variable_name) (number)) \
             (binary_arithmetic_expression (word) (number)) (postfix_arithmetic_expression (word)) \
             (do_group (command (command_name (word))))))"
        );
    }

    #[test]
    fn test_c_style_for_with_brace_body() {
        let tree = Parser::new("for ((;;)) { echo; }").parse();
        assert!(!tree.has_errors());
        assert_eq!(
            tree.to_sexp(),
            "(program (c_style_for_statement (compound_statement (command (command_name (word))))))"
        );
    }

    #[test]
    fn test_while_and_until() {
        assert_eq!(
            sexp("while read l; do :; done"),
            "(program (while_statement (command (command_name (word)) (word)) \
             (do_group (command (command_name (word))))))"
        );
        let tree = Parser::new("until false; do :; done").parse();
        assert_eq!(tree.root().children[0].kind, NodeKind::WhileStatement);
    }

    #[test]
    fn test_case() {
        assert_eq!(
            sexp("case $x in\n  a|b) echo ab;;\n  (*) echo other;;\nesac"),
            "(program (case_statement (simple_expansion (variable_name)) \
             (case_item (word) (word) (command (command_name (word)) (word))) \
             (case_item (word) (command (command_name (word)) (word)))))"
        );
    }

    #[test]
    fn test_case_fallthrough_and_last_item() {
        let tree = Parser::new("case x in a) one;& b) two;;& c) three\nesac").parse();
        assert!(!tree.has_errors());
        let items: Vec<_> = tree.root().children[0]
            .named_children()
            .filter(|n| n.kind == NodeKind::CaseItem)
            .collect();
        assert_eq!(items.len(), 3);
        assert_eq!(tree.text(items[0].children.last().unwrap()), ";&");
        assert_eq!(tree.text(items[1].children.last().unwrap()), ";;&");
    }

    #[test]
    fn test_empty_case_item() {
        let tree = Parser::new("case x in a) ;; esac").parse();
        assert!(!tree.has_errors());
    }

    #[test]
    fn test_subshell_and_group() {
        assert_eq!(
            sexp("(a; b) && { c; }"),
            "(program (list (subshell (command (command_name (word))) (command (command_name (word)))) \
             (compound_statement (command (command_name (word))))))"
        );
    }

    #[test]
    fn test_function_forms() {
        assert_eq!(
            sexp("f() { echo; }"),
            "(program (function_definition (word) (compound_statement (command (command_name (word))))))"
        );
        assert_eq!(
            sexp("function g { :; }"),
            "(program (function_definition (word) (compound_statement (command (command_name (word))))))"
        );
        assert_eq!(
            sexp("function h() (exit 1)"),
            "(program (function_definition (word) (subshell (command (command_name (word)) (number)))))"
        );
    }

    #[test]
    fn test_function_body_on_next_line() {
        let tree = Parser::new("f()\n{\n  echo\n}\n").parse();
        assert!(!tree.has_errors());
        assert_eq!(tree.root().children[0].kind, NodeKind::FunctionDefinition);
    }

    #[test]
    fn test_function_with_redirect() {
        assert_eq!(
            sexp("f() { echo; } > log"),
            "(program (function_definition (word) (compound_statement (command (command_name (word)))) \
             (file_redirect (word))))"
        );
    }

    #[test]
    fn test_keyword_as_argument() {
        assert_eq!(
            sexp("echo if then fi"),
            "(program (command (command_name (word)) (word) (word) (word)))"
        );
    }
}
