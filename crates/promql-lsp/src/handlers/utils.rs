//! Shared utility functions for LSP handlers.
//!
//! LSP positions count lines and UTF-16 code units, while the parser works
//! with byte offsets. The conversions here go through the document [`Rope`].

use lsp_types::{Position, Range};
use promql_syntax::Span;
use ropey::{Rope, RopeSlice};

/// Convert an LSP position to a byte offset.
///
/// A column past the end of its line is clamped to the line end. Returns
/// `None` when the line does not exist.
pub fn position_to_offset(text: &Rope, position: Position) -> Option<usize> {
    let line_idx = position.line as usize;
    if line_idx >= text.len_lines() {
        return None;
    }

    let line = text.line(line_idx);
    let col = (position.character as usize).min(line_len_utf16(line));
    let char_idx = text.line_to_char(line_idx) + line.utf16_cu_to_char(col);
    Some(text.char_to_byte(char_idx))
}

/// Convert a byte offset to an LSP position.
///
/// Offsets past the end of the text map to the end of the text.
pub fn offset_to_position(text: &Rope, offset: usize) -> Position {
    let char_idx = text.byte_to_char(offset.min(text.len_bytes()));
    let line_idx = text.char_to_line(char_idx);
    let line_start = text.line_to_char(line_idx);
    let col = text.char_to_utf16_cu(char_idx) - text.char_to_utf16_cu(line_start);
    Position::new(line_idx as u32, col as u32)
}

/// Convert a byte span to an LSP range.
pub fn span_to_range(text: &Rope, span: Span) -> Range {
    Range {
        start: offset_to_position(text, span.start),
        end: offset_to_position(text, span.end),
    }
}

/// Text covered by a byte span.
pub fn span_text(text: &Rope, span: Span) -> String {
    let len = text.len_bytes();
    let start = text.byte_to_char(span.start.min(len));
    let end = text.byte_to_char(span.end.min(len));
    if start >= end {
        return String::new();
    }
    text.slice(start..end).to_string()
}

/// Check if a character is part of a PromQL identifier.
pub const fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

/// The identifier fragment directly before a byte offset.
pub fn word_before(text: &Rope, offset: usize) -> String {
    let char_idx = text.byte_to_char(offset.min(text.len_bytes()));
    let mut chars = text.chars_at(char_idx);
    let mut word = Vec::new();
    while let Some(c) = chars.prev() {
        if !is_word_char(c) {
            break;
        }
        word.push(c);
    }
    word.iter().rev().collect()
}

/// Whether a byte offset lies inside a string literal or a comment.
///
/// Scans lexically from the start of the document, so it also works when the
/// query does not parse.
pub fn in_string_or_comment(text: &Rope, offset: usize) -> bool {
    let end = text.byte_to_char(offset.min(text.len_bytes()));
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut comment = false;

    for c in text.slice(..end).chars() {
        if comment {
            comment = c != '\n';
            continue;
        }
        match quote {
            Some(_) if escaped => escaped = false,
            Some(q) if c == '\\' && q != '`' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' | '`' => quote = Some(c),
                '#' => comment = true,
                _ => {}
            },
        }
    }

    quote.is_some() || comment
}

fn line_len_utf16(line: RopeSlice<'_>) -> usize {
    let mut len = line.len_chars();
    if len > 0 && line.char(len - 1) == '\n' {
        len -= 1;
        if len > 0 && line.char(len - 1) == '\r' {
            len -= 1;
        }
    }
    line.char_to_utf16_cu(len)
}
