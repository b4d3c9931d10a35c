//! Diagnostics.
//!
//! Every compilation phase reports problems by appending `Diagnostic`
//! values to the translation unit; nothing in the core writes to stderr
//! or exits the process. The CLI decides what to render and whether a
//! phase gate stops the pipeline early.
//!
//! Rendering follows the classic layout: a severity header, the source
//! line with a line-number gutter, and a caret-and-tildes underline
//! covering the offending span.

use std::fmt::Write as _;

const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Width of the line-number gutter, `%3d| `.
const GUTTER: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    /// Attached to a preceding error ("previous definition is here").
    Note,
}

/// A half-open byte range in the source with its 1-based line/column
/// position. `len` is the highlighted width in columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub index: u32,
    pub len: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    /// Merge the spans of the first and last token of a node into one
    /// highlight. Extents that cross a line boundary are truncated to
    /// the end of the first line at render time (`len` = 0 marks that).
    pub fn extent(begin: Span, end: Span) -> Span {
        if begin.line == end.line {
            Span {
                index: begin.index,
                len: (end.column + end.len).saturating_sub(begin.column),
                line: begin.line,
                column: begin.column,
            }
        } else {
            Span {
                index: begin.index,
                len: 0,
                line: begin.line,
                column: begin.column,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn note(message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Note,
            message: message.into(),
            span,
        }
    }
}

/// Render the source line containing `span` with a gutter and a
/// `^~~~` underline. Shared by the diagnostic renderer and the token
/// dump.
pub fn snippet(source: &str, span: Span) -> String {
    if span.line == 0 {
        return String::new();
    }

    let bytes = source.as_bytes();
    let mut start = span.index as usize;
    start = start.min(bytes.len());
    while start > 0 && bytes[start - 1] != b'\n' {
        start -= 1;
    }
    let mut end = span.index as usize;
    end = end.min(bytes.len());
    while end < bytes.len() && bytes[end] != b'\n' {
        end += 1;
    }

    let line_text = &source[start..end];
    let mut out = String::new();
    let _ = writeln!(out, "{:3}| {}", span.line, line_text);

    // A zero-length span marks a multi-line extent: underline from the
    // span start to the end of the first line.
    let line_cols = line_text.chars().count() as u32;
    let len = if span.len == 0 {
        line_cols.saturating_sub(span.column - 1).max(1)
    } else {
        span.len.max(1)
    };

    let offset = span.column as usize - 1 + GUTTER;
    for _ in 0..offset {
        out.push(' ');
    }
    out.push('^');
    for _ in 1..len {
        out.push('~');
    }
    out.push('\n');
    out
}

/// Render one diagnostic: header, source line, underline.
pub fn render(diag: &Diagnostic, source: &str, color: bool) -> String {
    let mut out = String::new();
    let label = match diag.severity {
        Severity::Error => "error",
        Severity::Note => "note",
    };
    if color && diag.severity == Severity::Error {
        let _ = write!(out, "{}{}{}", RED, label, RESET);
    } else {
        out.push_str(label);
    }
    let _ = writeln!(out, ": {}", diag.message);
    out.push_str(&snippet(source, diag.span));
    out
}

/// Render a whole diagnostic list in order.
pub fn render_all(diags: &[Diagnostic], source: &str, color: bool) -> String {
    let mut out = String::new();
    for diag in diags {
        out.push_str(&render(diag, source, color));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(index: u32, len: u32, line: u32, column: u32) -> Span {
        Span {
            index,
            len,
            line,
            column,
        }
    }

    #[test]
    fn test_snippet_underlines_span() {
        let source = "int x = 1;\nint x = 2;\n";
        // second "x", line 2 column 5, byte 15
        let out = snippet(source, span(15, 1, 2, 5));
        assert_eq!(out, "  2| int x = 2;\n         ^\n");
    }

    #[test]
    fn test_snippet_tildes_for_wide_span() {
        let source = "return value;\n";
        let out = snippet(source, span(0, 6, 1, 1));
        assert_eq!(out, "  1| return value;\n     ^~~~~~\n");
    }

    #[test]
    fn test_render_error_header_plain() {
        let source = "int\n";
        let diag = Diagnostic::error("something is wrong", span(0, 3, 1, 1));
        let out = render(&diag, source, false);
        assert!(out.starts_with("error: something is wrong\n"));
    }

    #[test]
    fn test_render_error_header_color() {
        let source = "int\n";
        let diag = Diagnostic::error("bad", span(0, 3, 1, 1));
        let out = render(&diag, source, true);
        assert!(out.starts_with("\x1b[31merror\x1b[0m: bad\n"));
    }

    #[test]
    fn test_extent_same_line() {
        let merged = Span::extent(span(4, 1, 1, 5), span(8, 2, 1, 9));
        assert_eq!(merged.len, 6);
        assert_eq!(merged.column, 5);
    }

    #[test]
    fn test_extent_multi_line_marks_zero_len() {
        let merged = Span::extent(span(4, 1, 1, 5), span(30, 1, 3, 2));
        assert_eq!(merged.len, 0);
    }
}
