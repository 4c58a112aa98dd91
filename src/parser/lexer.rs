//! Stateful Lexer for Bash Scripts
//!
//! The lexer is positional: the parser asks for the next token at a byte
//! offset under a mode and a set of flags, and the lexer answers with one
//! token. Nothing is buffered, so the parser can back up freely.
//!
//! It handles:
//! - Operators, with mode-scoped operator sets for `[ ]`, `[[ ]]`, `(( ))`
//! - Words, quotes, and the expansion openers (`$(`, `${`, `$((`, ...)
//! - Variable-name lookahead for assignments
//! - The adjacency bit that licenses concatenation
//! - Regex literals after `=~` and inside `${x/pattern/...}`
//! - Heredoc start markers
//!
//! Comments seen while skipping trivia are remembered by start offset, so
//! re-lexing after a backtrack does not duplicate them.

use std::collections::BTreeMap;

use crate::cst::types::Span;
use crate::parser::trivia::{self, TriviaRules};

/// Token categories produced by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Newline,
    Operator(&'static str),
    Word,
    /// Digits written directly before a redirect operator (`2>`)
    FileDescriptor,
    /// Identifier directly followed by `=`, `+=`, or a subscript and `=`
    VariableName,
    /// `-f`, `-eq`, ... inside a test expression
    TestOperator,
    RawString,
    AnsiCString,
    Regex,
    /// Backtick that closes the enclosing `` `...` `` substitution
    BacktickClose,
    /// No token matches here; spans one character
    Error,
}

/// A lexed token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// No trivia between the previous token and this one
    pub adjacent: bool,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.span.start..self.span.end]
    }

    pub fn is_op(&self, op: &str) -> bool {
        matches!(self.kind, TokenKind::Operator(o) if o == op)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

/// Lexer mode, pushed and popped by the parser around constructs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerMode {
    Command,
    /// Inside `[ ... ]`
    TestBracket,
    /// Inside `[[ ... ]]`
    DoubleTestBracket,
    /// Inside `(( ... ))`, `$(( ... ))`, and `for (( ... ))`
    Arithmetic,
    /// Command mode with heredoc requests queued; newlines always matter
    HeredocPending,
}

/// Per-request lexing switches chosen by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LexFlags {
    /// Allow variable-name lookahead (`name=`, `name+=`, `name[i]=`)
    pub assignment: bool,
    /// Statement-initial position; allows the `((` operator
    pub statement_start: bool,
    /// `}` closes an enclosing construct
    pub stop_at_brace: bool,
    /// `]` closes an enclosing construct
    pub stop_at_bracket: bool,
    /// A backtick closes an enclosing substitution instead of opening one
    pub stop_at_backtick: bool,
    /// Inside `${ ... }`: shell operators are ordinary word characters
    pub in_expansion: bool,
    /// Newlines are trivia here
    pub newline_trivia: bool,
}

// =============================================================================
// OPERATOR TABLES
// =============================================================================

/// Command-mode operators, longest first
const COMMAND_OPS: &[&str] = &[
    ";;&", "<<<", "<<-", "&>>", ";;", ";&", "&&", "||", "|&", "<<", ">>", "<&", ">&", ">|", "<>",
    "&>", "<(", ">(", "((", ";", "&", "|", "<", ">", "(", ")",
];

/// Test-mode operators, longest first
const TEST_OPS: &[&str] = &[
    "&&", "||", "==", "!=", "=~", "<=", ">=", "<", ">", "=", "!", "(", ")",
];

/// Arithmetic-mode operators, longest first
const ARITH_OPS: &[&str] = &[
    "<<=", ">>=", "**", "++", "--", "+=", "-=", "*=", "/=", "%=", "|=", "^=", "&=", "<<", ">>",
    "<=", ">=", "==", "!=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "&",
    "|", "^", "?", ":", ",", "(", ")", "[", "]", ";",
];

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c)
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Check if a string is a valid shell variable name
pub fn is_valid_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty() && is_name_start(bytes[0]) && bytes[1..].iter().all(|&b| is_name_char(b))
}

/// Characters that may follow `$` to begin a simple expansion
fn is_expansion_start(b: u8) -> bool {
    is_name_char(b) || matches!(b, b'*' | b'@' | b'?' | b'-' | b'$' | b'!' | b'#')
}

/// Byte length of the UTF-8 character starting at `i`
pub fn char_len_at(src: &str, i: usize) -> usize {
    src[i..].chars().next().map_or(1, char::len_utf8)
}

/// The end of a test-mode operator or closer must be followed by one of these
fn is_test_boundary(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i) {
        None => true,
        Some(&b) => is_space(b) || matches!(b, b';' | b'&' | b'|' | b')'),
    }
}

/// Stateful lexer
pub struct Lexer<'src> {
    src: &'src str,
    comments: BTreeMap<usize, Span>,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            src,
            comments: BTreeMap::new(),
        }
    }

    /// Comments seen so far, in source order
    pub fn comments(&self) -> Vec<Span> {
        self.comments.values().copied().collect()
    }

    /// Skip trivia at `pos` under the given mode
    pub fn skip_trivia(&mut self, pos: usize, mode: LexerMode, flags: LexFlags) -> usize {
        let rules = TriviaRules {
            newlines: match mode {
                LexerMode::HeredocPending => false,
                LexerMode::DoubleTestBracket | LexerMode::Arithmetic => true,
                LexerMode::Command | LexerMode::TestBracket => flags.newline_trivia,
            },
            comments: mode != LexerMode::Arithmetic,
        };
        let mut found = Vec::new();
        let start = trivia::skip(self.src, pos, rules, &mut found);
        for span in found {
            self.comments.insert(span.start, span);
        }
        start
    }

    /// Lex one token at `pos`
    pub fn next_token(&mut self, pos: usize, mode: LexerMode, flags: LexFlags) -> Token {
        let start = self.skip_trivia(pos, mode, flags);
        let adjacent = start == pos;
        let (kind, end) = self.lex_at(start, mode, flags);
        Token {
            kind,
            span: Span::new(start, end),
            adjacent,
        }
    }

    fn lex_at(&self, start: usize, mode: LexerMode, flags: LexFlags) -> (TokenKind, usize) {
        let bytes = self.src.as_bytes();
        if start >= bytes.len() {
            return (TokenKind::Eof, start);
        }
        if bytes[start] == b'\n' {
            return (TokenKind::Newline, start + 1);
        }
        match mode {
            LexerMode::Command | LexerMode::HeredocPending => self.lex_command(start, flags),
            LexerMode::TestBracket | LexerMode::DoubleTestBracket => {
                self.lex_test(start, mode, flags)
            }
            LexerMode::Arithmetic => self.lex_arithmetic(start),
        }
    }

    // =========================================================================
    // COMMAND MODE
    // =========================================================================

    fn lex_command(&self, start: usize, flags: LexFlags) -> (TokenKind, usize) {
        let bytes = self.src.as_bytes();
        let rest = &self.src[start..];

        match bytes[start] {
            b'}' if flags.stop_at_brace => return (TokenKind::Operator("}"), start + 1),
            b']' if flags.stop_at_bracket => return (TokenKind::Operator("]"), start + 1),
            b'`' if flags.stop_at_backtick => return (TokenKind::BacktickClose, start + 1),
            _ => {}
        }
        if let Some(tok) = self.lex_quote_or_dollar(start) {
            return tok;
        }

        if !flags.in_expansion {
            if let Some(end) = self.scan_file_descriptor(start) {
                return (TokenKind::FileDescriptor, end);
            }
            for &op in COMMAND_OPS {
                if !rest.starts_with(op) {
                    continue;
                }
                if op == "((" && !(flags.statement_start && self.is_arithmetic_command(start)) {
                    continue;
                }
                return (TokenKind::Operator(op), start + op.len());
            }
        }

        if flags.assignment {
            if let Some(end) = self.scan_variable_name(start) {
                return (TokenKind::VariableName, end);
            }
        }

        self.word_or_error(start, flags)
    }

    /// Quotes and `$` forms, shared by command and test modes
    fn lex_quote_or_dollar(&self, start: usize) -> Option<(TokenKind, usize)> {
        let bytes = self.src.as_bytes();
        let rest = &self.src[start..];
        match bytes[start] {
            b'\'' => Some((TokenKind::RawString, self.scan_raw_string(start + 1))),
            b'"' => Some((TokenKind::Operator("\""), start + 1)),
            b'`' => Some((TokenKind::Operator("`"), start + 1)),
            b'$' => {
                if rest.starts_with("$'") {
                    Some((TokenKind::AnsiCString, self.scan_ansi_c_string(start + 2)))
                } else if rest.starts_with("$((") {
                    if is_dollar_dparen_subshell(self.src, start) {
                        Some((TokenKind::Operator("$("), start + 2))
                    } else {
                        Some((TokenKind::Operator("$(("), start + 3))
                    }
                } else if rest.starts_with("$(") {
                    Some((TokenKind::Operator("$("), start + 2))
                } else if rest.starts_with("${") {
                    Some((TokenKind::Operator("${"), start + 2))
                } else if rest.starts_with("$\"")
                    || bytes.get(start + 1).copied().is_some_and(is_expansion_start)
                {
                    Some((TokenKind::Operator("$"), start + 1))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Scan to the closing `'` (inclusive), or to end of input
    fn scan_raw_string(&self, from: usize) -> usize {
        match self.src[from..].find('\'') {
            Some(off) => from + off + 1,
            None => self.src.len(),
        }
    }

    /// Scan a `$'...'` body honoring backslash escapes
    fn scan_ansi_c_string(&self, from: usize) -> usize {
        let bytes = self.src.as_bytes();
        let mut i = from;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 1 + bytes.get(i + 1).map_or(0, |_| char_len_at(self.src, i + 1)),
                b'\'' => return i + 1,
                _ => i += 1,
            }
        }
        bytes.len()
    }

    /// Digits directly followed by `<` or `>`
    fn scan_file_descriptor(&self, start: usize) -> Option<usize> {
        let bytes = self.src.as_bytes();
        let mut i = start;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i > start && matches!(bytes.get(i), Some(b'<' | b'>')) {
            Some(i)
        } else {
            None
        }
    }

    /// Identifier followed by `=`, `+=`, or `[...]` and then `=`/`+=`.
    /// Returns the end of the identifier.
    fn scan_variable_name(&self, start: usize) -> Option<usize> {
        let bytes = self.src.as_bytes();
        if !is_name_start(bytes[start]) {
            return None;
        }
        let mut i = start + 1;
        while i < bytes.len() && is_name_char(bytes[i]) {
            i += 1;
        }
        let name_end = i;
        if bytes.get(i) == Some(&b'[') {
            i = self.skip_subscript(i)?;
        }
        match (bytes.get(i), bytes.get(i + 1)) {
            (Some(b'='), _) | (Some(b'+'), Some(b'=')) => Some(name_end),
            _ => None,
        }
    }

    /// Position after the `]` that balances the `[` at `open`
    fn skip_subscript(&self, open: usize) -> Option<usize> {
        let bytes = self.src.as_bytes();
        let mut depth = 0usize;
        let mut i = open;
        while i < bytes.len() {
            match bytes[i] {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i + 1);
                    }
                }
                b'\\' => i += 1,
                b'\'' => i = self.scan_raw_string(i + 1) - 1,
                b'"' => i = skip_double_quoted(bytes, i + 1)?,
                b'\n' => return None,
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn word_or_error(&self, start: usize, flags: LexFlags) -> (TokenKind, usize) {
        let end = self.scan_word(start, flags);
        if end > start {
            (TokenKind::Word, end)
        } else {
            (TokenKind::Error, start + char_len_at(self.src, start))
        }
    }

    /// Scan a bare word. A backslash escapes the next character; a
    /// backslash before a line break ends the word (that is trivia).
    fn scan_word(&self, start: usize, flags: LexFlags) -> usize {
        let bytes = self.src.as_bytes();
        let mut i = start;
        while i < bytes.len() {
            let b = bytes[i];
            match b {
                b'\\' => {
                    if trivia::line_continuation_len(bytes, i).is_some() {
                        break;
                    }
                    i += 1;
                    if i < bytes.len() {
                        i += char_len_at(self.src, i);
                    }
                    continue;
                }
                b'\'' | b'"' | b'`' => break,
                b'$' => {
                    if matches!(bytes.get(i + 1), Some(b'(' | b'{' | b'\'' | b'"'))
                        || bytes.get(i + 1).copied().is_some_and(is_expansion_start)
                    {
                        break;
                    }
                }
                b';' | b'&' | b'|' | b'(' | b')' | b'<' | b'>' if !flags.in_expansion => break,
                b'}' if flags.stop_at_brace => break,
                b']' if flags.stop_at_bracket => break,
                _ if is_space(b) => break,
                _ => {}
            }
            i += 1;
        }
        i
    }

    /// Statement-initial `((` opens an arithmetic command unless the
    /// lookahead shows nested subshells
    fn is_arithmetic_command(&self, start: usize) -> bool {
        !dparen_closes_with_spaced_parens(self.src, start + 2)
            && !looks_like_nested_subshells(self.src, start + 2)
    }

    // =========================================================================
    // TEST MODE
    // =========================================================================

    fn lex_test(&self, start: usize, mode: LexerMode, flags: LexFlags) -> (TokenKind, usize) {
        let bytes = self.src.as_bytes();
        let rest = &self.src[start..];

        let closer = if mode == LexerMode::DoubleTestBracket {
            "]]"
        } else {
            "]"
        };
        if rest.starts_with(closer) && is_test_boundary(bytes, start + closer.len()) {
            return (TokenKind::Operator(closer), start + closer.len());
        }
        if bytes[start] == b'`' && flags.stop_at_backtick {
            return (TokenKind::BacktickClose, start + 1);
        }
        if let Some(tok) = self.lex_quote_or_dollar(start) {
            return tok;
        }

        for &op in TEST_OPS {
            if !rest.starts_with(op) {
                continue;
            }
            let needs_boundary = op.starts_with('=') || op.starts_with('!');
            if needs_boundary && !is_test_boundary(bytes, start + op.len()) {
                continue;
            }
            return (TokenKind::Operator(op), start + op.len());
        }

        if bytes[start] == b'-' {
            let mut i = start + 1;
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            if i > start + 1 && is_test_boundary(bytes, i) {
                return (TokenKind::TestOperator, i);
            }
        }

        self.word_or_error(start, flags)
    }

    // =========================================================================
    // ARITHMETIC MODE
    // =========================================================================

    fn lex_arithmetic(&self, start: usize) -> (TokenKind, usize) {
        let bytes = self.src.as_bytes();
        let b = bytes[start];

        if is_name_start(b) {
            let mut i = start + 1;
            while i < bytes.len() && is_name_char(bytes[i]) {
                i += 1;
            }
            return (TokenKind::Word, i);
        }
        if b.is_ascii_digit() {
            let mut i = start + 1;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'#' | b'@'))
            {
                i += 1;
            }
            return (TokenKind::Word, i);
        }
        if let Some(tok) = self.lex_quote_or_dollar(start) {
            return tok;
        }

        let rest = &self.src[start..];
        for &op in ARITH_OPS {
            if rest.starts_with(op) {
                return (TokenKind::Operator(op), start + op.len());
            }
        }
        (TokenKind::Error, start + char_len_at(self.src, start))
    }

    // =========================================================================
    // REGEX AND HEREDOC START
    // =========================================================================

    /// Scan a regex literal at `pos`.
    ///
    /// In a test expression the regex ends at unquoted whitespace or `]]`
    /// at bracket depth zero. Inside `${x/pattern/...}` it ends at `/` or
    /// `}` at depth zero. Returns `None` when the pattern is empty or, in a
    /// test expression, starts with a quote or `$` (those parse as
    /// ordinary literals).
    pub fn next_regex(&mut self, pos: usize, in_expansion: bool) -> Option<Token> {
        let start = if in_expansion {
            pos
        } else {
            self.skip_trivia(pos, LexerMode::DoubleTestBracket, LexFlags::default())
        };
        let bytes = self.src.as_bytes();
        if !in_expansion && matches!(bytes.get(start), Some(b'\'' | b'"' | b'$')) {
            return None;
        }

        let mut depth = 0usize;
        let mut i = start;
        while i < bytes.len() {
            let b = bytes[i];
            if depth == 0 {
                if in_expansion && matches!(b, b'/' | b'}') {
                    break;
                }
                if !in_expansion
                    && (is_space(b)
                        || (self.src[i..].starts_with("]]") && is_test_boundary(bytes, i + 2)))
                {
                    break;
                }
            }
            match b {
                b'\\' => {
                    i += 1;
                    if i < bytes.len() {
                        i += char_len_at(self.src, i);
                    }
                    continue;
                }
                b'\'' => {
                    i = self.scan_raw_string(i + 1);
                    continue;
                }
                b'"' => {
                    i = skip_double_quoted(bytes, i + 1).map_or(bytes.len(), |end| end + 1);
                    continue;
                }
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }

        if i == start {
            return None;
        }
        Some(Token {
            kind: TokenKind::Regex,
            span: Span::new(start, i),
            adjacent: start == pos,
        })
    }

    /// Scan the raw delimiter word after `<<` or `<<-`, quotes included
    pub fn next_heredoc_start(&mut self, pos: usize) -> Option<Token> {
        let start = self.skip_trivia(pos, LexerMode::HeredocPending, LexFlags::default());
        let bytes = self.src.as_bytes();
        let mut i = start;
        while i < bytes.len() {
            match bytes[i] {
                b'\'' => i = self.scan_raw_string(i + 1),
                b'"' => i = skip_double_quoted(bytes, i + 1).map_or(bytes.len(), |end| end + 1),
                b'\\' => {
                    i += 1;
                    if i < bytes.len() && bytes[i] != b'\n' {
                        i += char_len_at(self.src, i);
                    }
                }
                b';' | b'<' | b'>' | b'&' | b'|' | b'(' | b')' => break,
                b if is_space(b) => break,
                _ => i += 1,
            }
        }
        if i == start {
            return None;
        }
        Some(Token {
            kind: TokenKind::Word,
            span: Span::new(start, i),
            adjacent: start == pos,
        })
    }
}

/// Offset of the closing `"` for a double-quoted run starting at `from`
fn skip_double_quoted(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

// =============================================================================
// PAREN LOOKAHEAD HEURISTICS
// =============================================================================

/// Walk the unquoted text after `((` from `from`, tracking paren depth
/// from 2, and decide whether it is a subshell. Joining commands at depth 1
/// (`|`, `||`, `&&`) means a subshell; `inner_close` judges each `)` that
/// brings the depth back to 1. Reaching depth 0 or end of input means
/// arithmetic.
fn dparen_is_subshell(
    bytes: &[u8],
    from: usize,
    inner_close: impl Fn(usize) -> Option<bool>,
) -> bool {
    let mut pos = from;
    let mut depth = 2;
    let mut quote: Option<u8> = None;

    while pos < bytes.len() && depth > 0 {
        let c = bytes[pos];
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (None, b'\\') | (Some(b'"'), b'\\') => {
                pos += 2;
                continue;
            }
            (Some(_), _) => {}
            (None, b'\'' | b'"') => quote = Some(c),
            (None, b'(') => depth += 1,
            (None, b')') => {
                depth -= 1;
                if depth == 1 {
                    if let Some(verdict) = inner_close(pos) {
                        return verdict;
                    }
                }
            }
            (None, b'|') if depth == 1 => return true,
            (None, b'&') if depth == 1 && bytes.get(pos + 1) == Some(&b'&') => return true,
            _ => {}
        }
        pos += 1;
    }
    false
}

/// Check if `$((` at `start` opens a command substitution wrapping a
/// subshell rather than an arithmetic expansion: an inner `)` not directly
/// followed by `)` means more command text follows, as in
/// `$((cmd || other)2>/dev/null)`.
pub fn is_dollar_dparen_subshell(src: &str, start: usize) -> bool {
    let bytes = src.as_bytes();
    dparen_is_subshell(bytes, start + 3, |pos| Some(bytes.get(pos + 1) != Some(&b')')))
}

/// Check if statement-initial `((` is really two nested subshells because
/// the inner group closes with `) )` or joins commands at depth 1.
fn dparen_closes_with_spaced_parens(src: &str, start: usize) -> bool {
    let bytes = src.as_bytes();
    dparen_is_subshell(bytes, start, |pos| {
        if bytes.get(pos + 1) == Some(&b')') {
            return Some(false);
        }
        let gap = bytes[pos + 1..]
            .iter()
            .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\n'))
            .count();
        (gap > 0 && bytes.get(pos + 1 + gap) == Some(&b')')).then_some(true)
    })
}

/// Check if the text after `((` starts like a command inside a subshell,
/// e.g. `((cd dir && make) || exit)`
fn looks_like_nested_subshells(src: &str, start: usize) -> bool {
    let bytes = src.as_bytes();
    let mut pos = start;
    let c = loop {
        while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t') {
            pos += 1;
        }
        match bytes.get(pos) {
            Some(b'(') => pos += 1,
            Some(&c) => break c,
            None => return false,
        }
    };

    let is_special_command = c == b'!' || c == b'[';
    if !is_name_start(c) && !is_special_command {
        return false;
    }

    let mut word_end = pos;
    while word_end < bytes.len()
        && (is_name_char(bytes[word_end]) || matches!(bytes[word_end], b'-' | b'.'))
    {
        word_end += 1;
    }
    if word_end == pos {
        return is_special_command;
    }

    let mut after_word = word_end;
    while after_word < bytes.len() && matches!(bytes[after_word], b' ' | b'\t') {
        after_word += 1;
    }
    let Some(&next) = bytes.get(after_word) else {
        return false;
    };

    if next == b'=' && bytes.get(after_word + 1) != Some(&b'=') {
        return false;
    }
    if next == b'\n' {
        return false;
    }
    if word_end == after_word
        && matches!(
            next,
            b'+' | b'*' | b'/' | b'%' | b'<' | b'>' | b'&' | b'|' | b'^' | b'!' | b'~' | b'?' | b':'
        )
    {
        return false;
    }
    if next == b')' && bytes.get(after_word + 1) == Some(&b')') {
        return false;
    }

    // Command-like arguments after whitespace: look for `)` on this line
    if after_word > word_end
        && (matches!(next, b'-' | b'"' | b'\'' | b'$' | b'_' | b'/' | b'.')
            || next.is_ascii_alphabetic())
    {
        return bytes[after_word..]
            .iter()
            .take_while(|&&b| b != b'\n')
            .any(|&b| b == b')');
    }

    if next == b')' {
        let mut after_paren = after_word + 1;
        while after_paren < bytes.len() && matches!(bytes[after_paren], b' ' | b'\t') {
            after_paren += 1;
        }
        return matches!(bytes.get(after_paren), Some(b'|' | b';'))
            || (bytes.get(after_paren) == Some(&b'&') && bytes.get(after_paren + 1) == Some(&b'&'));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str, mode: LexerMode, flags: LexFlags) -> Vec<(TokenKind, String)> {
        let mut lexer = Lexer::new(src);
        let mut pos = 0;
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token(pos, mode, flags);
            if tok.is_eof() {
                break;
            }
            out.push((tok.kind, tok.text(src).to_string()));
            pos = tok.span.end;
        }
        out
    }

    fn command(src: &str) -> Vec<(TokenKind, String)> {
        lex_all(src, LexerMode::Command, LexFlags::default())
    }

    #[test]
    fn test_simple_command() {
        let toks = command("echo hello world");
        assert_eq!(toks.len(), 3);
        assert!(toks.iter().all(|(k, _)| *k == TokenKind::Word));
        assert_eq!(toks[1].1, "hello");
    }

    #[test]
    fn test_pipeline_operators() {
        let toks = command("a |& b && c");
        assert_eq!(toks[1].0, TokenKind::Operator("|&"));
        assert_eq!(toks[3].0, TokenKind::Operator("&&"));
    }

    #[test]
    fn test_file_descriptor_and_redirect() {
        let toks = command("cmd 2>&1");
        assert_eq!(toks[1], (TokenKind::FileDescriptor, "2".to_string()));
        assert_eq!(toks[2].0, TokenKind::Operator(">&"));
        assert_eq!(toks[3], (TokenKind::Word, "1".to_string()));
    }

    #[test]
    fn test_variable_name_lookahead() {
        let flags = LexFlags {
            assignment: true,
            ..LexFlags::default()
        };
        let toks = lex_all("x=1", LexerMode::Command, flags);
        assert_eq!(toks[0], (TokenKind::VariableName, "x".to_string()));

        let toks = lex_all("arr[i+1]+=v", LexerMode::Command, flags);
        assert_eq!(toks[0], (TokenKind::VariableName, "arr".to_string()));

        let toks = lex_all("x =1", LexerMode::Command, flags);
        assert_eq!(toks[0], (TokenKind::Word, "x".to_string()));
    }

    #[test]
    fn test_adjacency_bit() {
        let mut lexer = Lexer::new("foo\"bar\" baz");
        let flags = LexFlags::default();
        let first = lexer.next_token(0, LexerMode::Command, flags);
        let quote = lexer.next_token(first.span.end, LexerMode::Command, flags);
        assert!(quote.adjacent);
        assert!(quote.is_op("\""));
        let baz = lexer.next_token(8, LexerMode::Command, flags);
        assert!(!baz.adjacent);
    }

    #[test]
    fn test_dollar_forms() {
        let toks = command("$x ${y} $(z) $((1)) $'a\\'b' $ ");
        let kinds: Vec<_> = toks.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds[0], TokenKind::Operator("$"));
        assert_eq!(kinds[2], TokenKind::Operator("${"));
        assert!(toks.iter().any(|(k, _)| *k == TokenKind::Operator("$(")));
        assert!(toks.iter().any(|(k, _)| *k == TokenKind::Operator("$((")));
        assert!(toks
            .iter()
            .any(|(k, t)| *k == TokenKind::AnsiCString && t == "$'a\\'b'"));
        assert_eq!(toks.last().map(|(_, t)| t.as_str()), Some("$"));
    }

    #[test]
    fn test_raw_string_unterminated_runs_to_eof() {
        let toks = command("'abc");
        assert_eq!(toks, vec![(TokenKind::RawString, "'abc".to_string())]);
    }

    #[test]
    fn test_comment_is_trivia_and_recorded() {
        let mut lexer = Lexer::new("echo # hi\n");
        let flags = LexFlags::default();
        let echo = lexer.next_token(0, LexerMode::Command, flags);
        let nl = lexer.next_token(echo.span.end, LexerMode::Command, flags);
        assert_eq!(nl.kind, TokenKind::Newline);
        // Lexing again from the same place does not duplicate the comment
        lexer.next_token(echo.span.end, LexerMode::Command, flags);
        assert_eq!(lexer.comments(), vec![Span::new(5, 9)]);
    }

    #[test]
    fn test_line_continuation_ends_word() {
        let toks = command("a\\\nb");
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[1].1, "b");
    }

    #[test]
    fn test_escaped_space_stays_in_word() {
        let toks = command("a\\ b");
        assert_eq!(toks, vec![(TokenKind::Word, "a\\ b".to_string())]);
    }

    #[test]
    fn test_dparen_only_at_statement_start() {
        let start = LexFlags {
            statement_start: true,
            ..LexFlags::default()
        };
        let toks = lex_all("((x))", LexerMode::Command, start);
        assert_eq!(toks[0].0, TokenKind::Operator("(("));
        let toks = command("((x))");
        assert_eq!(toks[0].0, TokenKind::Operator("("));
    }

    #[test]
    fn test_nested_subshells_are_not_arithmetic() {
        let start = LexFlags {
            statement_start: true,
            ..LexFlags::default()
        };
        let toks = lex_all("((cd /tmp && ls) || echo no)", LexerMode::Command, start);
        assert_eq!(toks[0].0, TokenKind::Operator("("));
    }

    #[test]
    fn test_dollar_dparen_subshell_heuristic() {
        assert!(!is_dollar_dparen_subshell("$((1 + 2))", 0));
        assert!(is_dollar_dparen_subshell("$((echo a) | cat)", 0));
        assert!(is_dollar_dparen_subshell("$((a || b) 2>/dev/null)", 0));
    }

    #[test]
    fn test_test_mode_operators() {
        let toks = lex_all(
            "-f file && $a == b ]]",
            LexerMode::DoubleTestBracket,
            LexFlags::default(),
        );
        assert_eq!(toks[0], (TokenKind::TestOperator, "-f".to_string()));
        assert_eq!(toks[2].0, TokenKind::Operator("&&"));
        assert_eq!(toks[5].0, TokenKind::Operator("=="));
        assert_eq!(toks[7].0, TokenKind::Operator("]]"));
    }

    #[test]
    fn test_test_mode_equals_needs_boundary() {
        let toks = lex_all("a=b ]", LexerMode::TestBracket, LexFlags::default());
        assert_eq!(toks[0], (TokenKind::Word, "a=b".to_string()));
        assert_eq!(toks[1].0, TokenKind::Operator("]"));
    }

    #[test]
    fn test_arithmetic_mode() {
        let toks = lex_all("x+=0x1F**2", LexerMode::Arithmetic, LexFlags::default());
        let texts: Vec<_> = toks.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["x", "+=", "0x1F", "**", "2"]);
    }

    #[test]
    fn test_arithmetic_newlines_are_trivia() {
        let toks = lex_all("1 +\n 2", LexerMode::Arithmetic, LexFlags::default());
        assert_eq!(toks.len(), 3);
    }

    #[test]
    fn test_arithmetic_unknown_char_is_error() {
        let toks = lex_all("@", LexerMode::Arithmetic, LexFlags::default());
        assert_eq!(toks[0].0, TokenKind::Error);
    }

    #[test]
    fn test_regex_scan() {
        let src = "^[a-z]+( [0-9])?$ ]]";
        let mut lexer = Lexer::new(src);
        let tok = lexer.next_regex(0, false).unwrap();
        assert_eq!(tok.text(src), "^[a-z]+( [0-9])?$");
        let src = "(a|b) ]]";
        let tok = Lexer::new(src).next_regex(0, false).unwrap();
        assert_eq!(tok.text(src), "(a|b)");
        assert!(Lexer::new("\"x\"").next_regex(0, false).is_none());
    }

    #[test]
    fn test_regex_scan_in_expansion() {
        let src = "a*b/c}";
        let tok = Lexer::new(src).next_regex(0, true).unwrap();
        assert_eq!(tok.text(src), "a*b");
    }

    #[test]
    fn test_heredoc_start_keeps_quotes() {
        let src = " 'EOF' > out";
        let tok = Lexer::new(src).next_heredoc_start(0).unwrap();
        assert_eq!(tok.text(src), "'EOF'");
    }

    #[test]
    fn test_expansion_flags_make_operators_word_chars() {
        let flags = LexFlags {
            in_expansion: true,
            stop_at_brace: true,
            ..LexFlags::default()
        };
        let toks = lex_all("a|b}", LexerMode::Command, flags);
        assert_eq!(toks[0], (TokenKind::Word, "a|b".to_string()));
        assert_eq!(toks[1].0, TokenKind::Operator("}"));
    }

    #[test]
    fn test_long_open_paren_run_is_scanned_iteratively() {
        let src = "(".repeat(100_000);
        let flags = LexFlags {
            statement_start: true,
            ..LexFlags::default()
        };
        let tok = Lexer::new(&src).next_token(0, LexerMode::Command, flags);
        assert_eq!(tok.kind, TokenKind::Operator("(("));
    }

    #[test]
    fn test_backtick_opens_or_closes_by_flag() {
        assert_eq!(command("`pwd")[0].0, TokenKind::Operator("`"));

        let flags = LexFlags {
            stop_at_backtick: true,
            ..LexFlags::default()
        };
        let toks = lex_all("pwd`/bin", LexerMode::Command, flags);
        assert_eq!(toks[0], (TokenKind::Word, "pwd".to_string()));
        assert_eq!(toks[1].0, TokenKind::BacktickClose);
        assert_eq!(toks[2], (TokenKind::Word, "/bin".to_string()));
    }
}
