//! Grammar Rule Table
//!
//! Static, read-only grammar data shared by every parse: the positional
//! keyword sets and one precedence table per sublanguage. Each table is an
//! ordered list of levels from loosest to tightest binding, with the
//! associativity of every level. The parsers climb these tables; they never
//! use precedence to reject an otherwise valid parse.

use std::collections::HashMap;

/// Operator associativity within one precedence level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// One row of a precedence table
#[derive(Debug, Clone, Copy)]
pub struct PrecLevel {
    pub operators: &'static [&'static str],
    pub assoc: Assoc,
}

impl PrecLevel {
    /// The table's own copy of `text`, when this level owns that operator
    pub fn lookup(&self, text: &str) -> Option<&'static str> {
        self.operators.iter().copied().find(|op| *op == text)
    }
}

// =============================================================================
// KEYWORDS
// =============================================================================

/// Reserved words, recognized only at the start of a statement
pub const RESERVED_WORDS: &[&str] = &[
    "if", "then", "elif", "else", "fi", "for", "select", "while", "until", "do", "done", "case",
    "esac", "in", "function", "!", "{", "}", "[[", "[",
];

/// Words that end a statement list when they appear in statement position
pub const CLOSING_KEYWORDS: &[&str] = &["then", "elif", "else", "fi", "do", "done", "esac", "}"];

/// Builtins with a dedicated declaration node
pub const DECLARATION_COMMANDS: &[&str] = &["declare", "typeset", "export", "readonly", "local"];

/// Builtins with a dedicated unset node
pub const UNSET_COMMANDS: &[&str] = &["unset", "unsetenv"];

lazy_static::lazy_static! {
    /// Interned keyword text, so keyword leaves can carry `&'static str` kinds
    static ref KEYWORD_TABLE: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        for word in RESERVED_WORDS
            .iter()
            .chain(DECLARATION_COMMANDS)
            .chain(UNSET_COMMANDS)
        {
            m.insert(*word, *word);
        }
        m
    };
}

/// Static copy of a keyword or builtin name
pub fn keyword(text: &str) -> Option<&'static str> {
    KEYWORD_TABLE.get(text).copied()
}

pub fn is_closing_keyword(text: &str) -> bool {
    CLOSING_KEYWORDS.contains(&text)
}

pub fn is_declaration_command(text: &str) -> bool {
    DECLARATION_COMMANDS.contains(&text)
}

pub fn is_unset_command(text: &str) -> bool {
    UNSET_COMMANDS.contains(&text)
}

// =============================================================================
// STATEMENT LEVEL
// =============================================================================

/// Statement-level operator forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOp {
    /// `&&` / `||` producing a `list`
    List,
    /// `|` / `|&` producing a `pipeline`
    Pipe,
    /// Trailing redirects producing a `redirected_statement`
    Redirect,
}

/// Statement precedence, loosest to tightest:
///
/// | prec | form                    | operators      | assoc |
/// |------|-------------------------|----------------|-------|
/// | -1   | list                    | `&&` `\|\|`    | left  |
/// | -1   | redirected_statement    | trailing redirects | left (postfix) |
/// | 1    | pipeline                | `\|` `\|&`     | left  |
///
/// `&&` and `||` share one level, so `a && b || c` groups left to right.
/// Redirects share the list level, so they decorate the whole statement
/// to their left once that statement is otherwise complete.
pub fn statement_prec(op: StatementOp) -> i8 {
    match op {
        StatementOp::List | StatementOp::Redirect => -1,
        StatementOp::Pipe => 1,
    }
}

pub const LIST_OPERATORS: &[&str] = &["&&", "||"];
pub const PIPE_OPERATORS: &[&str] = &["|", "|&"];

/// Operators that begin a file, heredoc, or herestring redirect
pub const REDIRECT_OPERATORS: &[&str] = &[
    "<", ">", ">>", "&>", "&>>", "<&", ">&", ">|", "<>", "<<", "<<-", "<<<",
];

pub const HEREDOC_OPERATORS: &[&str] = &["<<", "<<-"];

/// Statement terminators
pub const TERMINATORS: &[&str] = &[";", "&"];

/// `case` item terminators
pub const CASE_TERMINATORS: &[&str] = &[";;", ";&", ";;&"];

// =============================================================================
// TEST EXPRESSIONS
// =============================================================================

/// Binary test operators, loosest to tightest. Unary `!` (right
/// associative) sits below these, and unary test operators (`-f`, `-d`, ...)
/// bind tightest of all.
pub const TEST_LEVELS: &[PrecLevel] = &[
    PrecLevel {
        operators: &["||", "-o"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["&&", "-a"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["=", "==", "!=", "=~", "-eq", "-ne"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &[
            "<", "<=", ">", ">=", "-lt", "-le", "-gt", "-ge", "-nt", "-ot", "-ef",
        ],
        assoc: Assoc::Left,
    },
];

/// Alphabetic binary test operators (spelled like unary test operators)
pub fn is_binary_test_operator(text: &str) -> bool {
    TEST_LEVELS.iter().any(|level| level.lookup(text).is_some())
}

// =============================================================================
// ARITHMETIC EXPRESSIONS
// =============================================================================

/// Index of the ternary level in [`ARITH_LEVELS`]
pub const ARITH_TERNARY_LEVEL: usize = 2;

/// Arithmetic precedence, loosest to tightest, C-like. The ternary row has
/// no binary operators; `?:` is handled specially at that level and is
/// right associative. Unary prefix operators bind tighter than every row
/// and postfix `++`/`--` tightest of all.
pub const ARITH_LEVELS: &[PrecLevel] = &[
    PrecLevel {
        operators: &[","],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["=", "+=", "-=", "*=", "/=", "%=", "<<=", ">>=", "&=", "^=", "|="],
        assoc: Assoc::Right,
    },
    PrecLevel {
        operators: &[],
        assoc: Assoc::Right,
    },
    PrecLevel {
        operators: &["||"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["&&"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["|"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["^"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["&"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["==", "!="],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["<", "<=", ">", ">="],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["<<", ">>"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["+", "-"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["*", "/", "%"],
        assoc: Assoc::Left,
    },
    PrecLevel {
        operators: &["**"],
        assoc: Assoc::Right,
    },
];

pub const ARITH_PREFIX_OPERATORS: &[&str] = &["-", "+", "!", "~", "++", "--"];
pub const ARITH_POSTFIX_OPERATORS: &[&str] = &["++", "--"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(keyword("fi"), Some("fi"));
        assert_eq!(keyword("declare"), Some("declare"));
        assert_eq!(keyword("echo"), None);
    }

    #[test]
    fn test_list_binds_looser_than_pipe() {
        assert!(statement_prec(StatementOp::List) < statement_prec(StatementOp::Pipe));
        assert_eq!(
            statement_prec(StatementOp::List),
            statement_prec(StatementOp::Redirect)
        );
    }

    #[test]
    fn test_test_levels_order() {
        let level_of = |op: &str| TEST_LEVELS.iter().position(|l| l.lookup(op).is_some());
        assert!(level_of("-o") < level_of("-a"));
        assert!(level_of("&&") < level_of("="));
        assert!(level_of("-eq") < level_of("-lt"));
        assert_eq!(level_of("-f"), None);
    }

    #[test]
    fn test_arith_levels_order() {
        let level_of = |op: &str| ARITH_LEVELS.iter().position(|l| l.lookup(op).is_some());
        assert_eq!(level_of(","), Some(0));
        assert!(level_of("=") < Some(ARITH_TERNARY_LEVEL));
        assert!(level_of("||") > Some(ARITH_TERNARY_LEVEL));
        assert!(level_of("|") < level_of("^"));
        assert!(level_of("^") < level_of("&"));
        assert!(level_of("+") < level_of("*"));
        assert_eq!(ARITH_LEVELS[1].assoc, Assoc::Right);
    }

    #[test]
    fn test_binary_test_operator() {
        assert!(is_binary_test_operator("-nt"));
        assert!(!is_binary_test_operator("-z"));
    }
}
