//! Concrete Syntax Tree for Bash
//!
//! The parser produces a lossless tree: the text of every leaf, with the
//! trivia between leaves, reproduces the input byte for byte.
//!
//! Architecture:
//!   Input → Trivia Skipper + Stateful Lexer → Parser Engine → CST

pub mod tree;
pub mod types;

pub use tree::Tree;
pub use types::{Descendants, Node, NodeKind, Span};
