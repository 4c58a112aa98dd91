//! Parser module for bash scripts
//!
//! This module contains the trivia skipper, the stateful lexer, the grammar
//! tables, and the recursive descent parser that builds the concrete syntax
//! tree.

pub mod trivia;
pub mod types;
pub mod lexer;
pub mod heredoc;
pub mod grammar;
pub mod arithmetic_parser;
pub mod word_parser;
pub mod expansion_parser;
pub mod conditional_parser;
pub mod compound_parser;
pub mod command_parser;
pub mod parser;

// Re-exports
pub use lexer::{Lexer, LexerMode, Token, TokenKind};
pub use parser::Parser;
pub use types::{CancellationToken, ErrorKind, ParseError, ParseOptions};
