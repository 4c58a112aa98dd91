//! Parser Types and Constants
//!
//! Shared types, limits, options, and error records used across parser
//! modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::cst::types::Span;

// Parser limits to prevent hangs and resource exhaustion
pub const MAX_PARSER_DEPTH: usize = 200; // Max recursion depth for nested constructs
pub const MAX_STATEMENTS: usize = 100_000; // Max statement boundaries per parse

// =============================================================================
// ERRORS
// =============================================================================

/// Category of a recovered parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No token matches at the current position under the active mode
    LexFailure,
    /// The token stream matches no grammar alternative here
    SyntaxError,
    /// End of input inside a quote, expansion, heredoc, or bracketed construct
    UnterminatedConstruct,
    /// Nesting depth or statement budget exhausted; the parse was halted
    LimitExceeded,
    /// The caller cancelled the parse
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LexFailure => "lex failure",
            Self::SyntaxError => "syntax error",
            Self::UnterminatedConstruct => "unterminated construct",
            Self::LimitExceeded => "limit exceeded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recovered error. The tree is still complete when these are present.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind} at {line}:{column}: {message}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub span: Span,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(
        kind: ErrorKind,
        span: Span,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            span,
            line,
            column,
            message: message.into(),
        }
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Tunable limits for a parse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Maximum nesting of statements, literals, and sub-expressions
    pub max_depth: usize,
    /// Statement boundaries allowed before the parse is halted
    pub max_statements: Option<usize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_PARSER_DEPTH,
            max_statements: Some(MAX_STATEMENTS),
        }
    }
}

/// Cooperative cancellation flag, probed at every statement boundary.
///
/// Clones share the flag, so one clone can be handed to the parse and
/// another kept by the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParseError::new(
            ErrorKind::UnterminatedConstruct,
            Span::new(0, 9),
            1,
            1,
            "unterminated string",
        );
        assert_eq!(
            err.to_string(),
            "unterminated construct at 1:1: unterminated string"
        );
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ParseOptions = serde_json::from_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(options.max_depth, 8);
        assert_eq!(options.max_statements, Some(MAX_STATEMENTS));
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::LexFailure).unwrap();
        assert_eq!(json, "\"lex_failure\"");
    }
}
