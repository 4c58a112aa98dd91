//! Heredoc Requests and Body Scanning
//!
//! A heredoc redirect queues a request when the parser shifts its start
//! marker. The queue is drained, in declaration order, the next time the
//! parser consumes a line break; each body runs up to a line that equals the
//! delimiter (after leading-tab stripping for `<<-`).

use crate::cst::types::Span;

/// A pending heredoc body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeredocRequest {
    /// Delimiter text with quoting removed
    pub delimiter: String,
    /// `<<-`: leading tabs are ignored on the terminator line
    pub strip_tabs: bool,
    /// Any part of the delimiter was quoted or escaped; the body is literal
    pub quoted: bool,
    /// Start of the `<<` operator, for error reporting
    pub redirect_start: usize,
}

impl HeredocRequest {
    /// Build a request from the raw heredoc start text (`EOF`, `'EOF'`,
    /// `"E"OF`, `\EOF`, ...)
    pub fn from_marker(raw: &str, strip_tabs: bool, redirect_start: usize) -> Self {
        let (delimiter, quoted) = unquote_delimiter(raw);
        Self {
            delimiter,
            strip_tabs,
            quoted,
            redirect_start,
        }
    }
}

/// Remove shell quoting from a delimiter word. Any quote or backslash marks
/// the delimiter as quoted.
pub fn unquote_delimiter(raw: &str) -> (String, bool) {
    let mut delimiter = String::with_capacity(raw.len());
    let mut quoted = false;
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                quoted = true;
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                    delimiter.push(inner);
                }
            }
            '\\' => {
                quoted = true;
                if let Some(next) = chars.next() {
                    delimiter.push(next);
                }
            }
            _ => delimiter.push(c),
        }
    }
    (delimiter, quoted)
}

/// Where a heredoc body ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyExtent {
    /// The body text, up to (not including) the terminator line
    pub body: Span,
    /// The delimiter on the terminator line, after stripped tabs; `None`
    /// when the input ended first
    pub end: Option<Span>,
}

impl BodyExtent {
    /// Offset just past the terminator text (or end of input)
    pub fn resume_at(&self) -> usize {
        self.end.map_or(self.body.end, |end| end.end)
    }
}

/// Find the body of `request` starting at `body_start`, the first byte after
/// the line break that triggered the drain.
pub fn scan_body(src: &str, body_start: usize, request: &HeredocRequest) -> BodyExtent {
    let mut line_start = body_start;
    while line_start < src.len() {
        let line_end = src[line_start..]
            .find('\n')
            .map_or(src.len(), |off| line_start + off);
        let line = &src[line_start..line_end];
        let tabs = if request.strip_tabs {
            line.len() - line.trim_start_matches('\t').len()
        } else {
            0
        };
        let candidate = &line[tabs..];
        let candidate = candidate.strip_suffix('\r').unwrap_or(candidate);
        if candidate == request.delimiter {
            return BodyExtent {
                body: Span::new(body_start, line_start),
                end: Some(Span::new(line_start + tabs, line_start + tabs + candidate.len())),
            };
        }
        if line_end == src.len() {
            break;
        }
        line_start = line_end + 1;
    }
    BodyExtent {
        body: Span::new(body_start, src.len()),
        end: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(delimiter: &str, strip_tabs: bool) -> HeredocRequest {
        HeredocRequest::from_marker(delimiter, strip_tabs, 0)
    }

    #[test]
    fn test_unquote_plain() {
        assert_eq!(unquote_delimiter("EOF"), ("EOF".to_string(), false));
    }

    #[test]
    fn test_unquote_quoted_forms() {
        assert_eq!(unquote_delimiter("'EOF'"), ("EOF".to_string(), true));
        assert_eq!(unquote_delimiter("\"E\"OF"), ("EOF".to_string(), true));
        assert_eq!(unquote_delimiter("\\EOF"), ("EOF".to_string(), true));
    }

    #[test]
    fn test_scan_body_finds_terminator() {
        let src = "hello $name\nEOF\nrest";
        let extent = scan_body(src, 0, &request("EOF", false));
        assert_eq!(&src[extent.body.start..extent.body.end], "hello $name\n");
        assert_eq!(extent.end, Some(Span::new(12, 15)));
        assert_eq!(extent.resume_at(), 15);
    }

    #[test]
    fn test_scan_body_strips_tabs() {
        let src = "\tbody\n\t\tEOF\n";
        let extent = scan_body(src, 0, &request("EOF", true));
        assert_eq!(extent.end, Some(Span::new(8, 11)));
    }

    #[test]
    fn test_scan_body_without_strip_needs_exact_line() {
        let src = "\tEOF\nEOF";
        let extent = scan_body(src, 0, &request("EOF", false));
        assert_eq!(extent.end, Some(Span::new(5, 8)));
    }

    #[test]
    fn test_scan_body_unterminated() {
        let src = "line one\nline two";
        let extent = scan_body(src, 0, &request("EOF", false));
        assert_eq!(extent.body, Span::new(0, src.len()));
        assert_eq!(extent.end, None);
    }

    #[test]
    fn test_empty_body() {
        let src = "EOF\n";
        let extent = scan_body(src, 0, &request("EOF", false));
        assert!(extent.body.is_empty());
    }
}
