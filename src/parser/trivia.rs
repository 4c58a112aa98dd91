//! Trivia Skipper
//!
//! Advances past whitespace, line continuations (`\` followed by a line
//! break), and `#` comments. Trivia never becomes a node of its own; comment
//! spans are reported back so the tree can carry them as `comment` leaves.

use crate::cst::types::Span;

/// What counts as trivia at a given token boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriviaRules {
    /// `\n` is skipped instead of being returned as a token
    pub newlines: bool,
    /// `#` at a word boundary starts a comment
    pub comments: bool,
}

/// Skip trivia starting at `pos` and return the offset of the next
/// meaningful byte. Comments found along the way are pushed to `comments`.
pub fn skip(src: &str, pos: usize, rules: TriviaRules, comments: &mut Vec<Span>) -> usize {
    let bytes = src.as_bytes();
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\r' | 0x0b | 0x0c => i += 1,
            b'\n' if rules.newlines => i += 1,
            b'\\' => match line_continuation_len(bytes, i) {
                Some(len) => i += len,
                None => break,
            },
            b'#' if rules.comments && comment_may_start(bytes, i) => {
                let end = memchr_newline(bytes, i);
                comments.push(Span::new(i, end));
                i = end;
            }
            _ => break,
        }
    }
    i
}

/// True when `text` consists only of trivia that [`skip`] would consume
/// with newlines allowed. Comments are not included; they are leaves.
pub fn is_trivia(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c => i += 1,
            b'\\' => match line_continuation_len(bytes, i) {
                Some(len) => i += len,
                None => return false,
            },
            _ => return false,
        }
    }
    true
}

/// Length of a `\`-newline (or `\`-CRLF) continuation at `i`
pub fn line_continuation_len(bytes: &[u8], i: usize) -> Option<usize> {
    match (bytes.get(i), bytes.get(i + 1), bytes.get(i + 2)) {
        (Some(b'\\'), Some(b'\n'), _) => Some(2),
        (Some(b'\\'), Some(b'\r'), Some(b'\n')) => Some(3),
        _ => None,
    }
}

/// A `#` only opens a comment at the start of a word
fn comment_may_start(bytes: &[u8], i: usize) -> bool {
    i == 0
        || matches!(
            bytes[i - 1],
            b' ' | b'\t' | b'\r' | b'\n' | b';' | b'&' | b'|' | b'(' | b')' | b'<' | b'>' | 0x0b | 0x0c
        )
}

fn memchr_newline(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| from + p)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMAND: TriviaRules = TriviaRules {
        newlines: false,
        comments: true,
    };

    #[test]
    fn test_skip_spaces_and_tabs() {
        let mut comments = Vec::new();
        assert_eq!(skip("  \tx", 0, COMMAND, &mut comments), 3);
        assert!(comments.is_empty());
    }

    #[test]
    fn test_skip_stops_at_newline_when_significant() {
        let mut comments = Vec::new();
        assert_eq!(skip("  \nx", 0, COMMAND, &mut comments), 2);
    }

    #[test]
    fn test_skip_line_continuation() {
        let mut comments = Vec::new();
        assert_eq!(skip(" \\\n  x", 0, COMMAND, &mut comments), 5);
    }

    #[test]
    fn test_skip_records_comment() {
        let mut comments = Vec::new();
        let src = "  # note\nx";
        assert_eq!(skip(src, 0, COMMAND, &mut comments), 8);
        assert_eq!(comments, vec![Span::new(2, 8)]);
    }

    #[test]
    fn test_hash_inside_word_is_not_comment() {
        let mut comments = Vec::new();
        // Position 3 follows a closing quote with no space: part of a word
        assert_eq!(skip("\"a\"#b", 3, COMMAND, &mut comments), 3);
        assert!(comments.is_empty());
    }

    #[test]
    fn test_comments_disabled() {
        let mut comments = Vec::new();
        let rules = TriviaRules {
            newlines: true,
            comments: false,
        };
        assert_eq!(skip(" #x", 0, rules, &mut comments), 1);
    }

    #[test]
    fn test_is_trivia() {
        assert!(is_trivia(" \t\n\\\n"));
        assert!(!is_trivia(" x"));
        assert!(!is_trivia("\\ "));
    }
}
