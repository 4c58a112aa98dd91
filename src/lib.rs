//! bash-cst - A concrete syntax tree parser for bash scripts
//!
//! This library parses bash source text into a lossless concrete syntax
//! tree: every byte of the input is covered, malformed input yields `ERROR`
//! nodes plus error records instead of a failure, and node kinds follow the
//! stable schema used by editors and linters.
//!
//! ```
//! let tree = bash_cst::parse("echo hello | wc -c");
//! assert_eq!(
//!     tree.to_sexp(),
//!     "(program (pipeline (command (command_name (word)) (word)) \
//!      (command (command_name (word)) (word))))"
//! );
//! assert_eq!(tree.reconstruct(), "echo hello | wc -c");
//! ```

pub mod cst;
pub mod parser;

pub use cst::{Node, NodeKind, Span, Tree};
pub use parser::{CancellationToken, ErrorKind, ParseError, ParseOptions, Parser};

/// Parse `source` with default options
pub fn parse(source: &str) -> Tree {
    Parser::new(source).parse()
}
