//! Title to filename conversion.

use chrono::NaiveDate;

use crate::error::{EditorError, Result};

/// Lowercase, drop punctuation, and join words with single hyphens.
///
/// Letters outside ASCII are kept as they are. A title made only of punctuation
/// gives an empty slug.
pub(crate) fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() || c == '-' || c == '_' {
            pending_sep = true;
        } else if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c);
        }
    }

    slug
}

/// `<YYYY-MM-DD>-<slug>.md`
pub(crate) fn post_filename(date: NaiveDate, title: &str) -> Result<String> {
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(EditorError::validation(format!(
            "Title {title:?} has no letters or digits to build a filename from"
        )));
    }
    Ok(format!("{}-{slug}.md", date.format("%Y-%m-%d")))
}
