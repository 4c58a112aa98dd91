//! Command Parser
//!
//! Handles parsing of simple commands, redirections, and assignments, plus
//! the `declare`/`unset` builtin forms.

use crate::cst::types::{Node, NodeKind, Span};
use crate::parser::expansion_parser;
use crate::parser::grammar::{HEREDOC_OPERATORS, REDIRECT_OPERATORS};
use crate::parser::heredoc::HeredocRequest;
use crate::parser::lexer::{is_valid_name, LexFlags, Token, TokenKind};
use crate::parser::parser::Parser;
use crate::parser::types::ErrorKind;
use crate::parser::word_parser::{is_literal_start, parse_literal};

/// Check if `tok` begins a redirection
pub fn is_redirect_start(tok: &Token) -> bool {
    match tok.kind {
        TokenKind::FileDescriptor => true,
        TokenKind::Operator(op) => REDIRECT_OPERATORS.contains(&op),
        _ => false,
    }
}

/// Heredoc redirects end the command they follow; their bodies are
/// attached at the next line break
fn is_heredoc_start(p: &Parser<'_>, tok: &Token) -> bool {
    match tok.kind {
        TokenKind::Operator(op) => HEREDOC_OPERATORS.contains(&op),
        TokenKind::FileDescriptor => {
            let rest = &p.src()[tok.span.end..];
            rest.starts_with("<<") && !rest.starts_with("<<<")
        }
        _ => false,
    }
}

fn assignment_flags() -> LexFlags {
    LexFlags {
        assignment: true,
        ..LexFlags::default()
    }
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

/// Parse one redirection, or `None` when the cursor is not at one
pub(crate) fn parse_redirect(p: &mut Parser<'_>) -> Option<Node> {
    let mut tok = p.peek();
    if !is_redirect_start(&tok) {
        return None;
    }
    let mut children = Vec::new();
    if tok.kind == TokenKind::FileDescriptor {
        children.push(p.token_leaf(tok));
        tok = p.peek();
    }
    let op = match tok.kind {
        TokenKind::Operator(op) if REDIRECT_OPERATORS.contains(&op) => op,
        _ => {
            let found = tok.text(p.src()).to_string();
            p.error(
                ErrorKind::SyntaxError,
                tok.span,
                format!("expected a redirect operator, found `{}`", found),
            );
            return Some(p.node(NodeKind::FileRedirect, children));
        }
    };
    let op_start = tok.span.start;
    children.push(p.token_leaf(tok));

    match op {
        "<<" | "<<-" => {
            match p.peek_heredoc_start() {
                Some(marker) => {
                    let raw = marker.text(p.src());
                    let request = HeredocRequest::from_marker(raw, op == "<<-", op_start);
                    children.push(p.leaf_at(NodeKind::HeredocStart, marker.span));
                    p.queue_heredoc(request);
                }
                None => {
                    let next = p.peek();
                    p.error(
                        ErrorKind::SyntaxError,
                        next.span,
                        format!("expected a heredoc delimiter after `{}`", op),
                    );
                }
            }
            Some(p.node(NodeKind::HeredocRedirect, children))
        }
        "<<<" => {
            parse_redirect_target(p, &mut children, op);
            Some(p.node(NodeKind::HerestringRedirect, children))
        }
        _ => {
            parse_redirect_target(p, &mut children, op);
            Some(p.node(NodeKind::FileRedirect, children))
        }
    }
}

fn parse_redirect_target(p: &mut Parser<'_>, out: &mut Vec<Node>, op: &str) {
    let tok = p.peek();
    match parse_literal(p) {
        Some(target) => out.push(target),
        None => {
            if tok.is_eof() {
                p.error(
                    ErrorKind::SyntaxError,
                    tok.span,
                    format!("expected a redirect target after `{}`", op),
                );
            } else {
                let found = tok.text(p.src()).to_string();
                p.error(
                    ErrorKind::SyntaxError,
                    tok.span,
                    format!("expected a redirect target after `{}`, found `{}`", op, found),
                );
            }
        }
    }
}

// =============================================================================
// SIMPLE COMMANDS
// =============================================================================

/// Parse a simple command: prefix assignments and redirects, the command
/// name, then arguments. Assignments with no command become
/// `variable_assignment(s)`.
pub(crate) fn parse_command(p: &mut Parser<'_>) -> Node {
    let mut children = Vec::new();

    loop {
        let tok = p.peek_with(assignment_flags());
        if tok.kind == TokenKind::VariableName {
            children.push(parse_variable_assignment(p));
            continue;
        }
        if is_redirect_start(&tok) && !is_heredoc_start(p, &tok) {
            if let Some(redirect) = parse_redirect(p) {
                children.push(redirect);
                continue;
            }
        }
        break;
    }

    let tok = p.peek();
    match parse_literal(p) {
        Some(name) => children.push(p.node(NodeKind::CommandName, vec![name])),
        None if !children.is_empty()
            && children.iter().all(|c| c.kind == NodeKind::VariableAssignment) =>
        {
            if children.len() == 1 {
                if let Some(only) = children.pop() {
                    return only;
                }
            }
            return p.node(NodeKind::VariableAssignments, children);
        }
        None => {
            if children.is_empty() {
                let found = tok.text(p.src()).to_string();
                p.error(
                    ErrorKind::SyntaxError,
                    tok.span,
                    format!("expected a command, found `{}`", found),
                );
            }
            return p.node(NodeKind::Command, children);
        }
    }

    parse_arguments(p, &mut children);
    p.node(NodeKind::Command, children)
}

/// Arguments after the command name. A redirect stays inside the command
/// only when more arguments follow it; trailing redirects are left for the
/// enclosing `redirected_statement`.
fn parse_arguments(p: &mut Parser<'_>, children: &mut Vec<Node>) {
    loop {
        let tok = p.peek();
        if is_literal_start(&tok) {
            match parse_literal(p) {
                Some(arg) => {
                    children.push(arg);
                    continue;
                }
                None => break,
            }
        }
        if is_redirect_start(&tok) && !is_heredoc_start(p, &tok) {
            let checkpoint = p.checkpoint();
            if let Some(redirect) = parse_redirect(p) {
                if is_literal_start(&p.peek()) {
                    children.push(redirect);
                    continue;
                }
            }
            p.restore(checkpoint);
        }
        break;
    }
}

// =============================================================================
// ASSIGNMENTS
// =============================================================================

/// `name=value`, `name+=value`, `name[i]=value`, `name=(a b c)`
pub(crate) fn parse_variable_assignment(p: &mut Parser<'_>) -> Node {
    let tok = p.peek_with(assignment_flags());
    let src = p.src();
    let bytes = src.as_bytes();
    let name = p.leaf_at(NodeKind::VariableName, tok.span);
    let target = if bytes.get(p.pos()) == Some(&b'[') {
        expansion_parser::parse_subscript(p, name)
    } else {
        name
    };
    let mut children = vec![target];

    let pos = p.pos();
    let rest = &src[pos..];
    let op = if rest.starts_with("+=") {
        "+="
    } else if rest.starts_with('=') {
        "="
    } else {
        let next = p.peek();
        p.error(
            ErrorKind::SyntaxError,
            next.span,
            "expected `=` in assignment",
        );
        return p.node(NodeKind::VariableAssignment, children);
    };
    children.push(p.leaf_at(NodeKind::Token(op), Span::new(pos, pos + op.len())));

    if bytes.get(p.pos()) == Some(&b'(') {
        children.push(parse_array(p));
    } else {
        let value = p.peek();
        if value.adjacent && is_literal_start(&value) {
            if let Some(literal) = parse_literal(p) {
                children.push(literal);
            }
        }
    }
    p.node(NodeKind::VariableAssignment, children)
}

/// `( element... )`; line breaks and comments between elements are trivia
fn parse_array(p: &mut Parser<'_>) -> Node {
    let pos = p.pos();
    let start = pos;
    let mut children = vec![p.leaf_at(NodeKind::Token("("), Span::new(pos, pos + 1))];
    let flags = LexFlags {
        newline_trivia: true,
        ..LexFlags::default()
    };
    p.with_word_flags(flags, |p| loop {
        let tok = p.peek();
        if tok.is_op(")") {
            children.push(p.token_leaf(tok));
            break;
        }
        if tok.is_eof() {
            p.unterminated(start, "array: expected `)`");
            break;
        }
        match parse_literal(p) {
            Some(element) => children.push(element),
            None => {
                let found = tok.text(p.src()).to_string();
                p.error(
                    ErrorKind::SyntaxError,
                    tok.span,
                    format!("unexpected `{}` in array", found),
                );
                children.push(p.token_leaf(tok));
            }
        }
    });
    p.node(NodeKind::Array, children)
}

// =============================================================================
// DECLARATION BUILTINS
// =============================================================================

/// `declare`, `typeset`, `export`, `readonly`, `local`
pub(crate) fn parse_declaration(p: &mut Parser<'_>) -> Node {
    let tok = p.peek_statement();
    let mut children = vec![p.keyword_leaf(tok)];
    loop {
        let tok = p.peek_with(assignment_flags());
        match tok.kind {
            TokenKind::VariableName => children.push(parse_variable_assignment(p)),
            TokenKind::Word if is_name_argument(p, &tok) => {
                children.push(p.leaf_at(NodeKind::VariableName, tok.span));
            }
            _ => match parse_literal(p) {
                Some(arg) => children.push(arg),
                None => break,
            },
        }
    }
    p.node(NodeKind::DeclarationCommand, children)
}

/// `unset`, `unsetenv`
pub(crate) fn parse_unset(p: &mut Parser<'_>) -> Node {
    let tok = p.peek_statement();
    let mut children = vec![p.keyword_leaf(tok)];
    loop {
        let tok = p.peek();
        if tok.kind == TokenKind::Word && is_name_argument(p, &tok) {
            children.push(p.leaf_at(NodeKind::VariableName, tok.span));
            continue;
        }
        match parse_literal(p) {
            Some(arg) => children.push(arg),
            None => break,
        }
    }
    p.node(NodeKind::UnsetCommand, children)
}

/// A bare identifier argument with nothing glued to it
fn is_name_argument(p: &Parser<'_>, tok: &Token) -> bool {
    p.is_bare_word(tok) && is_valid_name(tok.text(p.src()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sexp(src: &str) -> String {
        Parser::new(src).parse().to_sexp()
    }

    #[test]
    fn test_assignment_only() {
        assert_eq!(
            sexp("x=1"),
            "(program (variable_assignment (variable_name) (number)))"
        );
        assert_eq!(
            sexp("a=1 b=two"),
            "(program (variable_assignments (variable_assignment (variable_name) (number)) \
             (variable_assignment (variable_name) (word))))"
        );
    }

    #[test]
    fn test_empty_and_append_assignment() {
        let tree = Parser::new("x= y+=z").parse();
        assert!(!tree.has_errors());
        assert_eq!(
            tree.to_sexp(),
            "(program (variable_assignments (variable_assignment (variable_name)) \
             (variable_assignment (variable_name) (word))))"
        );
    }

    #[test]
    fn test_assignment_prefix_on_command() {
        assert_eq!(
            sexp("LANG=C sort file"),
            "(program (command (variable_assignment (variable_name) (word)) \
             (command_name (word)) (word)))"
        );
    }

    #[test]
    fn test_array_assignment() {
        assert_eq!(
            sexp("arr=(one \"two\"\n  three) # trailing"),
            "(program (variable_assignment (variable_name) (array (word) (string) (word))) (comment))"
        );
    }

    #[test]
    fn test_subscript_assignment() {
        assert_eq!(
            sexp("map[key]=value"),
            "(program (variable_assignment (subscript (variable_name) (word)) (word)))"
        );
    }

    #[test]
    fn test_trailing_redirect_wraps_command() {
        assert_eq!(
            sexp("echo hi > out 2>&1"),
            "(program (redirected_statement (command (command_name (word)) (word)) \
             (file_redirect (word)) (file_redirect (file_descriptor) (number))))"
        );
    }

    #[test]
    fn test_redirect_between_arguments_stays_inside() {
        assert_eq!(
            sexp("cmd > out arg"),
            "(program (command (command_name (word)) (file_redirect (word)) (word)))"
        );
    }

    #[test]
    fn test_prefix_redirect() {
        assert_eq!(
            sexp("< in cat"),
            "(program (command (file_redirect (word)) (command_name (word))))"
        );
    }

    #[test]
    fn test_herestring() {
        assert_eq!(
            sexp("grep x <<< \"$data\""),
            "(program (redirected_statement (command (command_name (word)) (word)) \
             (herestring_redirect (string (simple_expansion (variable_name))))))"
        );
    }

    #[test]
    fn test_heredoc() {
        let src = "cat <<EOF\nhello $name\nEOF\necho done\n";
        let tree = Parser::new(src).parse();
        assert!(!tree.has_errors());
        assert_eq!(
            tree.to_sexp(),
            "(program (redirected_statement (command (command_name (word))) \
             (heredoc_redirect (heredoc_start))) \
             (heredoc_body (simple_expansion (variable_name))) (heredoc_end) \
             (command (command_name (word)) (word)))"
        );
        assert_eq!(tree.reconstruct(), src);
    }

    #[test]
    fn test_two_heredocs_on_one_line() {
        let src = "cat <<A <<-'B'\none\nA\n\ttwo $x\n\tB\n";
        let tree = Parser::new(src).parse();
        assert!(!tree.has_errors());
        let bodies: Vec<_> = tree
            .root()
            .descendants()
            .filter(|n| n.kind == NodeKind::HeredocBody)
            .map(|n| tree.text(n))
            .collect();
        assert_eq!(bodies, vec!["one\n", "\ttwo $x\n"]);
    }

    #[test]
    fn test_unterminated_heredoc() {
        let tree = Parser::new("cat <<EOF\nno end").parse();
        assert_eq!(tree.errors().len(), 1);
        assert_eq!(tree.errors()[0].kind, ErrorKind::UnterminatedConstruct);
        assert_eq!(tree.errors()[0].span.start, 4);
    }

    #[test]
    fn test_missing_redirect_target() {
        let tree = Parser::new("echo >").parse();
        assert_eq!(tree.errors().len(), 1);
        assert_eq!(tree.errors()[0].kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn test_declaration() {
        assert_eq!(
            sexp("local -r x=1 y"),
            "(program (declaration_command (word) \
             (variable_assignment (variable_name) (number)) (variable_name)))"
        );
    }

    #[test]
    fn test_unset() {
        assert_eq!(
            sexp("unset -v a b"),
            "(program (unset_command (word) (variable_name) (variable_name)))"
        );
    }
}
