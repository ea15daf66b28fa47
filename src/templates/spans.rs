//! Locating `${{ ... }}` spans inside string values
//!
//! A custom scanner rather than a regex: `}}` inside a single-quoted
//! expression string (e.g. `${{ format('{{0}}', x) }}`) must not close the span.

pub const OPEN_EXPRESSION: &str = "${{";
pub const CLOSE_EXPRESSION: &str = "}}";

/// Byte offsets of one expression span, `start` at `${{` and `end` just
/// past the closing `}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpressionSpan {
    pub start: usize,
    pub end: usize,
}

impl ExpressionSpan {
    /// The text between the delimiters.
    pub fn inner<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start + OPEN_EXPRESSION.len()..self.end - CLOSE_EXPRESSION.len()]
    }
}

/// An opening `${{` at this byte offset has no closing `}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnclosedExpression {
    pub start: usize,
}

pub fn contains_expression(text: &str) -> bool {
    text.contains(OPEN_EXPRESSION)
}

/// Scan text for expression spans, in order.
pub fn scan_expressions(text: &str) -> Result<Vec<ExpressionSpan>, UnclosedExpression> {
    let mut spans = Vec::new();
    let mut offset = 0;

    while let Some(found) = text[offset..].find(OPEN_EXPRESSION) {
        let start = offset + found;
        let end = find_expression_end(text, start + OPEN_EXPRESSION.len())
            .ok_or(UnclosedExpression { start })?;
        spans.push(ExpressionSpan { start, end });
        offset = end;
    }

    Ok(spans)
}

/// Find the end (exclusive) of the `}}` closing an expression whose body
/// starts at `from`. Single-quoted strings are skipped; a doubled quote
/// inside one is an escaped quote.
fn find_expression_end(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut i = from;
    let mut in_string = false;

    while i < len {
        match bytes[i] {
            b'\'' if in_string => {
                if i + 1 < len && bytes[i + 1] == b'\'' {
                    i += 1;
                } else {
                    in_string = false;
                }
            }
            b'\'' => in_string = true,
            b'}' if !in_string && i + 1 < len && bytes[i + 1] == b'}' => {
                return Some(i + 2);
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Convert a byte offset to zero-based (line, column) coordinates
pub fn offset_to_line_col(text: &str, offset: usize) -> (u32, u32) {
    let mut line = 0u32;
    let mut col = 0u32;

    for (i, ch) in text.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
    }

    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inners(text: &str) -> Vec<&str> {
        scan_expressions(text)
            .unwrap()
            .iter()
            .map(|s| s.inner(text))
            .collect()
    }

    #[test]
    fn test_single_expression() {
        assert_eq!(inners("${{ github.ref }}"), vec![" github.ref "]);
    }

    #[test]
    fn test_multiple_expressions_with_text() {
        let text = "prefix-${{ a }}-${{b}}-suffix";
        let spans = scan_expressions(text).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], ExpressionSpan { start: 7, end: 15 });
        assert_eq!(inners(text), vec![" a ", "b"]);
    }

    #[test]
    fn test_braces_inside_strings() {
        assert_eq!(
            inners("${{ format('{{0}}}}', 'it''s') }}"),
            vec![" format('{{0}}}}', 'it''s') "]
        );
    }

    #[test]
    fn test_unclosed_expression() {
        assert_eq!(
            scan_expressions("ok ${{ a }} then ${{ b"),
            Err(UnclosedExpression { start: 17 })
        );
    }

    #[test]
    fn test_no_expression() {
        assert!(inners("plain {{ text }}").is_empty());
        assert!(!contains_expression("plain"));
    }

    #[test]
    fn test_offset_to_line_col() {
        let text = "abc\ndef\nghi";
        assert_eq!(offset_to_line_col(text, 0), (0, 0));
        assert_eq!(offset_to_line_col(text, 5), (1, 1));
        assert_eq!(offset_to_line_col(text, 8), (2, 0));
    }
}
