//! Markdown formatting helpers for the body editor.
//!
//! Positions are char indices, as reported by the text widget.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub text: String,
    /// Char index where the cursor goes afterwards.
    pub cursor: usize,
}

fn byte_index(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map_or(text.len(), |(i, _)| i)
}

fn clamp(text: &str, selection: Range<usize>) -> Range<usize> {
    let len = text.chars().count();
    let (a, b) = (selection.start.min(len), selection.end.min(len));
    a.min(b)..a.max(b)
}

fn splice(text: &str, selection: Range<usize>, replacement: &str) -> String {
    let start = byte_index(text, selection.start);
    let end = byte_index(text, selection.end);
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..start]);
    out.push_str(replacement);
    out.push_str(&text[end..]);
    out
}

/// Replaces the selection with `snippet` and puts the cursor after it.
pub(crate) fn insert(text: &str, selection: Range<usize>, snippet: &str) -> Edit {
    let selection = clamp(text, selection);
    Edit {
        text: splice(text, selection.clone(), snippet),
        cursor: selection.start + snippet.chars().count(),
    }
}

/// `**bold**` / `*italic*`. With nothing selected the cursor lands between the markers.
pub(crate) fn wrap(text: &str, selection: Range<usize>, marker: &str) -> Edit {
    let selection = clamp(text, selection);
    let marker_len = marker.chars().count();
    if selection.is_empty() {
        return Edit {
            text: splice(text, selection.clone(), &format!("{marker}{marker}")),
            cursor: selection.start + marker_len,
        };
    }

    let start = byte_index(text, selection.start);
    let end = byte_index(text, selection.end);
    let wrapped = format!("{marker}{}{marker}", &text[start..end]);
    Edit {
        text: splice(text, selection.clone(), &wrapped),
        cursor: selection.end + 2 * marker_len,
    }
}

/// Prefixes the line holding the cursor with `level` hashes.
pub(crate) fn heading(text: &str, cursor: usize, level: usize) -> Edit {
    let cursor = cursor.min(text.chars().count());
    let byte = byte_index(text, cursor);
    let line_start = text[..byte].rfind('\n').map_or(0, |i| i + 1);
    let line_start_char = text[..line_start].chars().count();

    let prefix = format!("{} ", "#".repeat(level.clamp(1, 6)));
    Edit {
        text: splice(text, line_start_char..line_start_char, &prefix),
        cursor: cursor + prefix.chars().count(),
    }
}

pub(crate) fn link(label: &str, url: &str) -> String {
    format!("[{label}]({url})")
}

/// Fenced block with the cursor on its empty middle line.
pub(crate) fn code_block(text: &str, selection: Range<usize>, lang: &str) -> Edit {
    let opening = format!("```{}\n", lang.trim());
    let edit = insert(text, selection.clone(), &format!("{opening}\n```"));
    let start = clamp(text, selection).start;
    Edit {
        cursor: start + opening.chars().count(),
        ..edit
    }
}

pub(crate) fn list_item(text: &str, selection: Range<usize>) -> Edit {
    insert(text, selection, "- ")
}
