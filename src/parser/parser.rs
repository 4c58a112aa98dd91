//! Recursive Descent Parser for Bash Scripts
//!
//! This parser drives the positional lexer and builds a concrete syntax
//! tree. It never fails: malformed input produces `ERROR` nodes plus error
//! records, and the tree still covers every byte of the input.
//!
//! Grammar (simplified):
//!   program      ::= statements
//!   statements   ::= (statement (';' | '&' | '\n'))* [statement]
//!   statement    ::= primary (('&&' | '||') statement
//!                           | ('|' | '|&') statement
//!                           | redirect+)*
//!   primary      ::= command | compound | function_definition
//!                  | test_command | negated_command | declaration_command
//!                  | unset_command | variable_assignment(s)
//!
//! Statement operators are resolved by precedence climbing over the table in
//! `grammar`. Heredoc bodies are drained whenever a line break is consumed
//! and land in the children list of whatever node consumed that line break.

use tracing::{debug, trace, warn};

use crate::cst::tree::{attach_comments, Tree};
use crate::cst::types::{Node, NodeKind, Span};
use crate::parser::grammar::{self, StatementOp};
use crate::parser::heredoc::{self, HeredocRequest};
use crate::parser::lexer::{LexFlags, Lexer, LexerMode, Token, TokenKind};
use crate::parser::types::{CancellationToken, ErrorKind, ParseError, ParseOptions};
use crate::parser::{command_parser, compound_parser, conditional_parser, word_parser};

/// Saved parser position for speculative parsing
#[derive(Debug, Clone)]
pub(crate) struct Checkpoint {
    pos: usize,
    errors: usize,
    heredocs: Vec<HeredocRequest>,
}

/// Which tokens end a statement list besides end of input and closing
/// keywords
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ListContext {
    /// Stray closers become `ERROR` nodes instead of ending the list
    pub top_level: bool,
    /// `;;`, `;&`, `;;&` end the list
    pub in_case_item: bool,
}

impl ListContext {
    pub(crate) fn top_level() -> Self {
        Self {
            top_level: true,
            ..Self::default()
        }
    }
}

/// Bash parser. One instance parses one input.
pub struct Parser<'src> {
    src: &'src str,
    lexer: Lexer<'src>,
    pos: usize,
    modes: Vec<LexerMode>,
    word_flags: LexFlags,
    in_backtick: bool,
    heredocs: Vec<HeredocRequest>,
    errors: Vec<ParseError>,
    depth: usize,
    statements_seen: usize,
    options: ParseOptions,
    cancel: Option<CancellationToken>,
    halted: bool,
    line_starts: Vec<usize>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self::with_options(source, ParseOptions::default())
    }

    pub fn with_options(source: &'src str, options: ParseOptions) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Parser {
            src: source,
            lexer: Lexer::new(source),
            pos: 0,
            modes: vec![LexerMode::Command],
            word_flags: LexFlags::default(),
            in_backtick: false,
            heredocs: Vec::new(),
            errors: Vec::new(),
            depth: 0,
            statements_seen: 0,
            options,
            cancel: None,
            halted: false,
            line_starts,
        }
    }

    /// Probe `token` at every statement boundary and stop early once it is
    /// cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Parse the whole input
    pub fn parse(mut self) -> Tree {
        debug!(len = self.src.len(), "parse start");

        let mut children = Vec::new();
        parse_statements(&mut self, &mut children, ListContext::top_level());

        for request in std::mem::take(&mut self.heredocs) {
            self.unterminated(
                request.redirect_start,
                &format!("heredoc: no `{}` line before end of input", request.delimiter),
            );
        }
        if self.halted && self.pos < self.src.len() {
            children.push(Node::leaf(
                NodeKind::Error,
                Span::new(self.pos, self.src.len()),
            ));
        }

        let mut root = Node::new(NodeKind::Program, Span::new(0, self.src.len()), children);
        attach_comments(&mut root, &self.lexer.comments());

        debug!(
            nodes = root.descendants().count(),
            errors = self.errors.len(),
            halted = self.halted,
            "parse finished"
        );
        Tree::new(self.src, root, self.errors)
    }

    // =========================================================================
    // CURSOR
    // =========================================================================

    pub(crate) fn src(&self) -> &'src str {
        self.src
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Effective lexer mode: command mode reports heredoc-pending while
    /// bodies are queued, so line breaks are never skipped as trivia
    pub(crate) fn mode(&self) -> LexerMode {
        match self.modes.last().copied().unwrap_or(LexerMode::Command) {
            LexerMode::Command if !self.heredocs.is_empty() => LexerMode::HeredocPending,
            mode => mode,
        }
    }

    pub(crate) fn push_mode(&mut self, mode: LexerMode) {
        trace!(?mode, depth = self.modes.len(), "push lexer mode");
        self.modes.push(mode);
    }

    pub(crate) fn pop_mode(&mut self) {
        let mode = self.modes.pop();
        trace!(?mode, depth = self.modes.len(), "pop lexer mode");
        if self.modes.is_empty() {
            self.modes.push(LexerMode::Command);
        }
    }

    pub(crate) fn word_flags(&self) -> LexFlags {
        self.word_flags
    }

    /// Run `f` with different literal-lexing flags
    pub(crate) fn with_word_flags<T>(
        &mut self,
        flags: LexFlags,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let saved = std::mem::replace(&mut self.word_flags, flags);
        let result = f(self);
        self.word_flags = saved;
        result
    }

    /// Run `f` inside `` `...` ``, where every unescaped backtick closes
    pub(crate) fn within_backticks<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.in_backtick, true);
        let result = f(self);
        self.in_backtick = saved;
        result
    }

    pub(crate) fn peek_with(&mut self, flags: LexFlags) -> Token {
        if self.halted {
            return Token {
                kind: TokenKind::Eof,
                span: Span::empty(self.pos),
                adjacent: false,
            };
        }
        let mode = self.mode();
        let flags = LexFlags {
            stop_at_backtick: flags.stop_at_backtick || self.in_backtick,
            ..flags
        };
        self.lexer.next_token(self.pos, mode, flags)
    }

    /// Peek under the current literal flags
    pub(crate) fn peek(&mut self) -> Token {
        self.peek_with(self.word_flags)
    }

    /// Peek at a statement-initial position
    pub(crate) fn peek_statement(&mut self) -> Token {
        self.peek_with(LexFlags {
            statement_start: true,
            assignment: true,
            ..LexFlags::default()
        })
    }

    /// Regex operand at the cursor (`=~` right side or `${x/pattern}`)
    pub(crate) fn peek_regex(&mut self, in_expansion: bool) -> Option<Token> {
        if self.halted {
            return None;
        }
        self.lexer.next_regex(self.pos, in_expansion)
    }

    /// Raw heredoc delimiter word after `<<` or `<<-`
    pub(crate) fn peek_heredoc_start(&mut self) -> Option<Token> {
        if self.halted {
            return None;
        }
        self.lexer.next_heredoc_start(self.pos)
    }

    /// Consume `tok` and return it as a leaf
    pub(crate) fn token_leaf(&mut self, tok: Token) -> Node {
        self.pos = tok.span.end;
        let kind = match tok.kind {
            TokenKind::Operator(op) => NodeKind::Token(op),
            TokenKind::Newline => NodeKind::Token("\n"),
            TokenKind::Word => NodeKind::Word,
            TokenKind::FileDescriptor => NodeKind::FileDescriptor,
            TokenKind::VariableName => NodeKind::VariableName,
            TokenKind::TestOperator => NodeKind::TestOperator,
            TokenKind::RawString => NodeKind::RawString,
            TokenKind::AnsiCString => NodeKind::AnsiiCString,
            TokenKind::Regex => NodeKind::Regex,
            TokenKind::BacktickClose => NodeKind::Token("`"),
            TokenKind::Eof => NodeKind::Error,
            TokenKind::Error => {
                self.error(
                    ErrorKind::LexFailure,
                    tok.span,
                    format!("unexpected character `{}`", tok.text(self.src)),
                );
                NodeKind::Error
            }
        };
        Node::leaf(kind, tok.span)
    }

    /// Consume a keyword token as an anonymous keyword leaf
    pub(crate) fn keyword_leaf(&mut self, tok: Token) -> Node {
        self.pos = tok.span.end;
        let kind = grammar::keyword(tok.text(self.src)).map_or(NodeKind::Word, NodeKind::Token);
        Node::leaf(kind, tok.span)
    }

    /// Consume `span` as a leaf of `kind`
    pub(crate) fn leaf_at(&mut self, kind: NodeKind, span: Span) -> Node {
        self.pos = span.end;
        Node::leaf(kind, span)
    }

    /// Build a node whose span runs from its first child to its last
    pub(crate) fn node(&self, kind: NodeKind, children: Vec<Node>) -> Node {
        let span = match (children.first(), children.last()) {
            (Some(first), Some(last)) => Span::new(first.span.start, last.span.end),
            _ => Span::empty(self.pos),
        };
        Node::new(kind, span, children)
    }

    /// A word with nothing glued to its end, so it can act as a keyword
    pub(crate) fn is_bare_word(&self, tok: &Token) -> bool {
        if tok.kind != TokenKind::Word {
            return false;
        }
        let bytes = self.src.as_bytes();
        match bytes.get(tok.span.end) {
            Some(b'"' | b'\'' | b'`') => false,
            Some(b'$') => !matches!(
                bytes.get(tok.span.end + 1),
                Some(&b) if b.is_ascii_alphanumeric()
                    || matches!(b, b'_' | b'{' | b'(' | b'\'' | b'"' | b'*' | b'@' | b'?' | b'-' | b'$' | b'!' | b'#')
            ),
            _ => true,
        }
    }

    pub(crate) fn is_keyword(&self, tok: &Token, keyword: &str) -> bool {
        self.is_bare_word(tok) && tok.text(self.src) == keyword
    }

    // =========================================================================
    // ERRORS
    // =========================================================================

    /// Record a recovered error. Nothing is recorded once the parse halted.
    pub(crate) fn error(&mut self, kind: ErrorKind, span: Span, message: impl Into<String>) {
        if self.halted {
            return;
        }
        self.record(kind, span, message.into());
    }

    fn record(&mut self, kind: ErrorKind, span: Span, message: String) {
        let (line, column) = self.line_col(span.start);
        debug!(kind = %kind, line, column, message = %message, "recovered parse error");
        self.errors.push(ParseError::new(kind, span, line, column, message));
    }

    /// End of input inside the construct that started at `start`
    pub(crate) fn unterminated(&mut self, start: usize, what: &str) {
        self.error(
            ErrorKind::UnterminatedConstruct,
            Span::new(start, self.src.len()),
            format!("unterminated {}", what),
        );
    }

    /// 1-based line and byte column of `offset`
    pub(crate) fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&start| start <= offset).max(1);
        (line, offset - self.line_starts[line - 1] + 1)
    }

    pub(crate) fn missing(&mut self, tok: Token, expected: &str, construct: &str, start: usize) {
        if tok.is_eof() {
            self.unterminated(start, &format!("{}: expected `{}`", construct, expected));
        } else {
            let found = tok.text(self.src).to_string();
            self.error(
                ErrorKind::SyntaxError,
                tok.span,
                format!("expected `{}` in {}, found `{}`", expected, construct, found),
            );
        }
    }

    /// Consume operator `op` into `out`, or record that it is missing from
    /// the construct opened at `start`
    pub(crate) fn expect_op(
        &mut self,
        out: &mut Vec<Node>,
        op: &str,
        construct: &str,
        start: usize,
    ) -> bool {
        let tok = self.peek();
        if tok.is_op(op) {
            out.push(self.token_leaf(tok));
            return true;
        }
        self.missing(tok, op, construct, start);
        false
    }

    /// Consume reserved word `keyword` into `out`, or record that it is
    /// missing
    pub(crate) fn expect_keyword(
        &mut self,
        out: &mut Vec<Node>,
        keyword: &str,
        construct: &str,
        start: usize,
    ) -> bool {
        let tok = self.peek_statement();
        if self.is_keyword(&tok, keyword) {
            out.push(self.keyword_leaf(tok));
            return true;
        }
        self.missing(tok, keyword, construct, start);
        false
    }

    // =========================================================================
    // BACKTRACKING
    // =========================================================================

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            errors: self.errors.len(),
            heredocs: self.heredocs.clone(),
        }
    }

    /// Return to `checkpoint`. After a halt the error records are kept.
    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        if !self.halted {
            self.errors.truncate(checkpoint.errors);
        }
        self.heredocs = checkpoint.heredocs;
    }

    // =========================================================================
    // LIMITS
    // =========================================================================

    pub(crate) fn is_halted(&self) -> bool {
        self.halted
    }

    /// Enter one nesting level; false once the depth limit is hit
    pub(crate) fn enter(&mut self) -> bool {
        if self.halted {
            return false;
        }
        self.depth += 1;
        if self.depth > self.options.max_depth {
            self.depth -= 1;
            let message = format!("nesting deeper than {} levels", self.options.max_depth);
            self.halt(ErrorKind::LimitExceeded, message);
            return false;
        }
        true
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Zero-width `ERROR` node standing in for a construct cut off by a halt
    pub(crate) fn halted_node(&self) -> Node {
        Node::leaf(NodeKind::Error, Span::empty(self.pos))
    }

    /// Count one statement boundary and probe for cancellation
    pub(crate) fn tick(&mut self) -> bool {
        if self.halted {
            return false;
        }
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            self.halt(ErrorKind::Cancelled, "parse cancelled".to_string());
            return false;
        }
        self.statements_seen += 1;
        if let Some(max) = self.options.max_statements {
            if self.statements_seen > max {
                let message = format!("more than {} statement boundaries", max);
                self.halt(ErrorKind::LimitExceeded, message);
                return false;
            }
        }
        true
    }

    fn halt(&mut self, kind: ErrorKind, message: String) {
        if self.halted {
            return;
        }
        warn!(kind = %kind, offset = self.pos, message = %message, "parse halted");
        self.record(kind, Span::new(self.pos, self.src.len()), message);
        self.halted = true;
    }

    // =========================================================================
    // HEREDOCS AND LINE BREAKS
    // =========================================================================

    pub(crate) fn queue_heredoc(&mut self, request: HeredocRequest) {
        trace!(delimiter = %request.delimiter, quoted = request.quoted, "queue heredoc");
        self.heredocs.push(request);
    }

    /// Consume one line break if present, then drain queued heredoc bodies
    /// into `out`. The line break itself is kept as a leaf only when it
    /// terminates a statement.
    pub(crate) fn consume_newline(&mut self, out: &mut Vec<Node>, keep_leaf: bool) -> bool {
        let tok = self.peek_with(LexFlags::default());
        if tok.kind != TokenKind::Newline {
            return false;
        }
        let leaf = self.token_leaf(tok);
        if keep_leaf {
            out.push(leaf);
        }
        if !self.heredocs.is_empty() {
            self.drain_heredocs(out);
        }
        true
    }

    /// Skip any run of line breaks as trivia
    pub(crate) fn skip_newlines(&mut self, out: &mut Vec<Node>) {
        while self.consume_newline(out, false) {}
    }

    fn drain_heredocs(&mut self, out: &mut Vec<Node>) {
        let requests = std::mem::take(&mut self.heredocs);
        trace!(count = requests.len(), offset = self.pos, "drain heredoc bodies");
        let mut body_start = self.pos;
        for request in requests {
            let extent = heredoc::scan_body(self.src, body_start, &request);
            let body = word_parser::parse_heredoc_body(self, extent.body, request.quoted);
            out.push(body);
            match extent.end {
                Some(end) => out.push(self.leaf_at(NodeKind::HeredocEnd, end)),
                None => self.unterminated(
                    request.redirect_start,
                    &format!("heredoc: no `{}` line", request.delimiter),
                ),
            }
            self.pos = extent.resume_at();
            body_start = match self.src.as_bytes().get(self.pos) {
                Some(b'\r') if self.src.as_bytes().get(self.pos + 1) == Some(&b'\n') => {
                    self.pos + 2
                }
                Some(b'\n') => self.pos + 1,
                _ => self.pos,
            };
        }
    }
}

// =============================================================================
// STATEMENT LISTS
// =============================================================================

/// True when `tok` ends the statement list described by `ctx`
fn ends_list(p: &Parser<'_>, tok: &Token, ctx: ListContext) -> bool {
    match tok.kind {
        TokenKind::Operator(")") => true,
        TokenKind::BacktickClose => true,
        TokenKind::Operator(op) if grammar::CASE_TERMINATORS.contains(&op) => ctx.in_case_item,
        TokenKind::Word => {
            p.is_bare_word(tok) && grammar::is_closing_keyword(tok.text(p.src()))
        }
        _ => false,
    }
}

/// Parse statements with their terminators into `out` until the list ends.
///
/// Terminators (`;`, `&`, a line break) become anonymous leaves; blank lines
/// are trivia. A statement followed by anything else starts error recovery.
pub(crate) fn parse_statements(p: &mut Parser<'_>, out: &mut Vec<Node>, ctx: ListContext) {
    loop {
        if !p.tick() {
            break;
        }
        let tok = p.peek_statement();
        match tok.kind {
            TokenKind::Eof => break,
            TokenKind::Newline => {
                p.consume_newline(out, false);
                continue;
            }
            _ => {}
        }
        if ends_list(p, &tok, ctx) {
            if !ctx.top_level {
                break;
            }
            let text = tok.text(p.src()).to_string();
            p.error(ErrorKind::SyntaxError, tok.span, format!("unexpected `{}`", text));
            let leaf = p.keyword_leaf(tok);
            out.push(p.node(NodeKind::Error, vec![leaf]));
            continue;
        }

        let before = p.pos();
        match parse_statement(p) {
            Some(statement) => out.push(statement),
            None => {
                recover(p, out, ctx);
                continue;
            }
        }

        let tok = p.peek_with(LexFlags::default());
        match tok.kind {
            TokenKind::Operator(op) if grammar::TERMINATORS.contains(&op) => {
                out.push(p.token_leaf(tok))
            }
            TokenKind::Newline => {
                p.consume_newline(out, true);
            }
            TokenKind::Eof => break,
            _ if ends_list(p, &tok, ctx) => {}
            _ => recover(p, out, ctx),
        }

        if p.pos() == before && !p.is_halted() {
            let tok = p.peek();
            if tok.is_eof() {
                break;
            }
            let leaf = p.token_leaf(tok);
            out.push(p.node(NodeKind::Error, vec![leaf]));
        }
    }
}

/// Wrap tokens up to the next terminator or list end in an `ERROR` node.
/// Always consumes at least one token.
fn recover(p: &mut Parser<'_>, out: &mut Vec<Node>, ctx: ListContext) {
    let first = p.peek_with(LexFlags::default());
    if first.is_eof() || first.kind == TokenKind::Newline {
        return;
    }
    let mut children = Vec::new();
    loop {
        let tok = p.peek_with(LexFlags::default());
        if tok.is_eof() || tok.kind == TokenKind::Newline {
            break;
        }
        if !children.is_empty()
            && (matches!(tok.kind, TokenKind::Operator(op) if grammar::TERMINATORS.contains(&op))
                || ends_list(p, &tok, ctx))
        {
            break;
        }
        if word_parser::is_literal_start(&tok) {
            match word_parser::parse_literal(p) {
                Some(literal) => children.push(literal),
                None => break,
            }
        } else {
            children.push(p.token_leaf(tok));
        }
        if p.is_halted() {
            break;
        }
    }

    if first.kind != TokenKind::Error {
        let text = first.text(p.src()).to_string();
        let message = if matches!(first.kind, TokenKind::Operator(op) if grammar::CASE_TERMINATORS.contains(&op))
        {
            format!("`{}` outside a case item", text)
        } else {
            format!("unexpected `{}`", text)
        };
        let end = children.last().map_or(first.span.end, |n| n.span.end);
        p.error(ErrorKind::SyntaxError, Span::new(first.span.start, end), message);
    }
    if children.len() == 1 && children[0].is_error() && children[0].is_leaf() {
        out.append(&mut children);
    } else if !children.is_empty() {
        out.push(p.node(NodeKind::Error, children));
    }
}

// =============================================================================
// STATEMENTS
// =============================================================================

pub(crate) fn parse_statement(p: &mut Parser<'_>) -> Option<Node> {
    parse_statement_prec(p, i8::MIN)
}

/// Precedence climbing over the statement operators. Operators whose
/// precedence is below `min_prec` are left for an enclosing call.
pub(crate) fn parse_statement_prec(p: &mut Parser<'_>, min_prec: i8) -> Option<Node> {
    let mut lhs = parse_primary_statement(p)?;
    loop {
        let tok = p.peek_with(LexFlags::default());
        let op = match tok.kind {
            TokenKind::Operator(op) if grammar::LIST_OPERATORS.contains(&op) => StatementOp::List,
            TokenKind::Operator(op) if grammar::PIPE_OPERATORS.contains(&op) => StatementOp::Pipe,
            _ if command_parser::is_redirect_start(&tok) => StatementOp::Redirect,
            _ => break,
        };
        let prec = grammar::statement_prec(op);
        if prec < min_prec {
            break;
        }

        if op == StatementOp::Redirect {
            let mut children = vec![lhs];
            while let Some(redirect) = command_parser::parse_redirect(p) {
                children.push(redirect);
            }
            lhs = p.node(NodeKind::RedirectedStatement, children);
            continue;
        }

        let kind = match op {
            StatementOp::Pipe => NodeKind::Pipeline,
            _ => NodeKind::List,
        };
        let mut children = if kind == NodeKind::Pipeline && lhs.kind == NodeKind::Pipeline {
            lhs.children
        } else {
            vec![lhs]
        };
        let op_text = tok.text(p.src()).to_string();
        children.push(p.token_leaf(tok));
        p.skip_newlines(&mut children);
        match parse_statement_prec(p, prec + 1) {
            Some(rhs) => children.push(rhs),
            None => {
                let next = p.peek_statement();
                p.error(
                    ErrorKind::SyntaxError,
                    next.span,
                    format!("expected a command after `{}`", op_text),
                );
            }
        }
        lhs = p.node(kind, children);
    }
    Some(lhs)
}

fn parse_primary_statement(p: &mut Parser<'_>) -> Option<Node> {
    if !p.enter() {
        return Some(p.halted_node());
    }
    let node = dispatch_statement(p);
    p.leave();
    node
}

fn dispatch_statement(p: &mut Parser<'_>) -> Option<Node> {
    let tok = p.peek_statement();
    match tok.kind {
        TokenKind::Word => {}
        TokenKind::VariableName => return Some(command_parser::parse_command(p)),
        TokenKind::Operator("(") => return Some(compound_parser::parse_subshell(p)),
        TokenKind::Operator("((") => return Some(conditional_parser::parse_arithmetic_command(p)),
        _ if command_parser::is_redirect_start(&tok) || word_parser::is_literal_start(&tok) => {
            return Some(command_parser::parse_command(p));
        }
        _ => return None,
    }

    if p.is_bare_word(&tok) {
        match tok.text(p.src()) {
            "if" => return Some(compound_parser::parse_if(p)),
            "for" | "select" => return Some(compound_parser::parse_for(p)),
            "while" | "until" => return Some(compound_parser::parse_while(p)),
            "case" => return Some(compound_parser::parse_case(p)),
            "function" => return Some(compound_parser::parse_function(p)),
            "{" => return Some(compound_parser::parse_compound_statement(p)),
            "[" | "[[" => return Some(conditional_parser::parse_test_command(p)),
            "!" => return Some(parse_negated(p)),
            text if grammar::is_closing_keyword(text) => return None,
            text if grammar::is_declaration_command(text) => {
                return Some(command_parser::parse_declaration(p));
            }
            text if grammar::is_unset_command(text) => {
                return Some(command_parser::parse_unset(p));
            }
            _ => {}
        }
        if let Some(definition) = compound_parser::try_function_definition(p) {
            return Some(definition);
        }
    }
    Some(command_parser::parse_command(p))
}

/// `! statement`; the negation covers a whole pipeline
fn parse_negated(p: &mut Parser<'_>) -> Node {
    let bang = p.peek_statement();
    let mut children = vec![p.keyword_leaf(bang)];
    match parse_statement_prec(p, grammar::statement_prec(StatementOp::Pipe)) {
        Some(inner) => children.push(inner),
        None => {
            let next = p.peek_statement();
            p.error(ErrorKind::SyntaxError, next.span, "expected a command after `!`");
        }
    }
    p.node(NodeKind::NegatedCommand, children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sexp(src: &str) -> String {
        Parser::new(src).parse().to_sexp()
    }

    #[test]
    fn test_parse_empty() {
        let tree = Parser::new("").parse();
        assert_eq!(tree.to_sexp(), "(program)");
        assert!(!tree.has_errors());
    }

    #[test]
    fn test_parse_simple_command() {
        assert_eq!(
            sexp("echo hello"),
            "(program (command (command_name (word)) (word)))"
        );
    }

    #[test]
    fn test_parse_pipeline_is_flat() {
        assert_eq!(
            sexp("a | b |& c"),
            "(program (pipeline (command (command_name (word))) \
             (command (command_name (word))) (command (command_name (word)))))"
        );
    }

    #[test]
    fn test_list_groups_left() {
        assert_eq!(
            sexp("a && b || c"),
            "(program (list (list (command (command_name (word))) \
             (command (command_name (word)))) (command (command_name (word)))))"
        );
    }

    #[test]
    fn test_pipe_binds_tighter_than_list() {
        assert_eq!(
            sexp("a | b && c"),
            "(program (list (pipeline (command (command_name (word))) \
             (command (command_name (word)))) (command (command_name (word)))))"
        );
    }

    #[test]
    fn test_redirect_decorates_whole_pipeline() {
        assert_eq!(
            sexp("a | b > out"),
            "(program (redirected_statement (pipeline (command (command_name (word))) \
             (command (command_name (word)))) (file_redirect (word))))"
        );
    }

    #[test]
    fn test_newline_after_list_operator() {
        let tree = Parser::new("a &&\n  b").parse();
        assert!(!tree.has_errors());
        assert_eq!(tree.root().children[0].kind, NodeKind::List);
    }

    #[test]
    fn test_terminators_are_anonymous_children() {
        let tree = Parser::new("a; b &\nc").parse();
        let kinds: Vec<_> = tree.root().children.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Command,
                NodeKind::Token(";"),
                NodeKind::Command,
                NodeKind::Token("&"),
                NodeKind::Command,
            ]
        );
    }

    #[test]
    fn test_blank_lines_are_trivia() {
        let tree = Parser::new("a\n\n\nb\n").parse();
        let kinds: Vec<_> = tree.root().children.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Command,
                NodeKind::Token("\n"),
                NodeKind::Command,
                NodeKind::Token("\n"),
            ]
        );
    }

    #[test]
    fn test_negated_pipeline() {
        assert_eq!(
            sexp("! a | b"),
            "(program (negated_command (pipeline (command (command_name (word))) \
             (command (command_name (word))))))"
        );
    }

    #[test]
    fn test_stray_closer_at_top_level() {
        let tree = Parser::new("fi\necho ok").parse();
        assert!(tree.has_errors());
        assert_eq!(tree.errors()[0].kind, ErrorKind::SyntaxError);
        assert!(tree.root().children[0].is_error());
        assert_eq!(tree.reconstruct(), "fi\necho ok");
    }

    #[test]
    fn test_double_semicolon_outside_case() {
        let tree = Parser::new("echo a ;; echo b").parse();
        assert!(tree
            .errors()
            .iter()
            .any(|e| e.kind == ErrorKind::SyntaxError && e.message.contains(";;")));
        assert_eq!(tree.reconstruct(), "echo a ;; echo b");
    }

    #[test]
    fn test_error_line_and_column() {
        let tree = Parser::new("echo ok\n  )").parse();
        let err = &tree.errors()[0];
        assert_eq!((err.line, err.column), (2, 3));
    }

    #[test]
    fn test_depth_limit_halts() {
        let options = ParseOptions {
            max_depth: 4,
            ..ParseOptions::default()
        };
        let src = "{ { { { { echo deep; }; }; }; }; }";
        let tree = Parser::with_options(src, options).parse();
        assert!(tree
            .errors()
            .iter()
            .any(|e| e.kind == ErrorKind::LimitExceeded));
        assert_eq!(tree.reconstruct(), src);
        assert!(tree.root().children.last().is_some_and(|n| n.is_error()));
    }

    #[test]
    fn test_statement_budget_halts() {
        let options = ParseOptions {
            max_statements: Some(3),
            ..ParseOptions::default()
        };
        let src = "a\nb\nc\nd\ne\n";
        let tree = Parser::with_options(src, options).parse();
        assert_eq!(tree.errors().len(), 1);
        assert_eq!(tree.errors()[0].kind, ErrorKind::LimitExceeded);
        assert_eq!(tree.reconstruct(), src);
    }

    #[test]
    fn test_cancelled_parse() {
        let token = CancellationToken::new();
        token.cancel();
        let tree = Parser::new("echo a").with_cancellation(token).parse();
        assert!(tree.was_cancelled());
        assert_eq!(tree.root().children.len(), 1);
        assert!(tree.root().children[0].is_error());
    }
}
