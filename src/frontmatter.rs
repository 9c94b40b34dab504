//! Jekyll-style front matter.
//!
//! ```text
//! ---
//! layout: post
//! title: "Hello"
//! date: 2024-03-01 09:30:00
//! categories: blog
//! tags: [rust, web]
//! ---
//!
//! body...
//! ```
//!
//! Only the keys above are understood. Anything else in the block is dropped on
//! the next save.

use std::{fmt::Write as _, path::Path};

const DELIMITER: &str = "---";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Metadata {
    pub title: String,
    pub date: String,
    pub category: String,
    pub tags: Vec<String>,
}

impl Metadata {
    /// Title for a file imported without front matter: `my_first-post.md` -> `My First Post`.
    pub fn title_from_path(path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut title = String::with_capacity(stem.len());
        let mut prev_alpha = false;
        for c in stem.chars() {
            let c = if c == '-' || c == '_' { ' ' } else { c };
            if c.is_alphabetic() {
                if prev_alpha {
                    title.extend(c.to_lowercase());
                } else {
                    title.extend(c.to_uppercase());
                }
                prev_alpha = true;
            } else {
                title.push(c);
                prev_alpha = false;
            }
        }
        title
    }

    /// Comma separated form used by the tag entry field.
    pub fn tags_line(&self) -> String {
        self.tags.join(", ")
    }

    pub fn set_tags_line(&mut self, line: &str) {
        self.tags = split_tags(line);
    }
}

/// Split `a, b ,"c"` into `["a", "b", "c"]`, dropping empty entries.
pub(crate) fn split_tags(list: &str) -> Vec<String> {
    list.split(',')
        .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a post into metadata and body.
///
/// Never fails: text without a well formed front matter block is returned whole
/// as the body with default metadata.
pub(crate) fn decode(text: &str) -> (Metadata, String) {
    if !text.starts_with(DELIMITER) {
        return (Metadata::default(), text.to_string());
    }

    let parts: Vec<&str> = text.splitn(3, DELIMITER).collect();
    let [_, block, body] = parts[..] else {
        return (Metadata::default(), text.to_string());
    };

    let mut title = None;
    let mut date = None;
    let mut category = None;
    let mut tags = None;

    for line in block.lines().map(str::trim) {
        if let Some(v) = value_of(line, "title") {
            title.get_or_insert_with(|| unquote(v));
        } else if let Some(v) = value_of(line, "date") {
            date.get_or_insert_with(|| unquote(v));
        } else if let Some(v) = value_of(line, "categories") {
            category.get_or_insert_with(|| unquote(v));
        } else if let Some(v) = value_of(line, "tags") {
            // a malformed first line still claims the key
            tags.get_or_insert_with(|| {
                v.strip_prefix('[')
                    .and_then(|v| v.strip_suffix(']'))
                    .map(split_tags)
                    .unwrap_or_default()
            });
        }
        // `layout` is always written as `post`
    }

    let meta = Metadata {
        title: title.unwrap_or_default(),
        date: date.unwrap_or_default(),
        category: category.unwrap_or_default(),
        tags: tags.unwrap_or_default(),
    };
    (meta, body.trim().to_string())
}

/// Inverse of [`decode`]. The title is always double quoted, with `\` and `"` escaped.
pub(crate) fn encode(meta: &Metadata, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 128);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str("layout: post\n");
    let _ = writeln!(out, "title: \"{}\"", escape(&meta.title));
    let _ = writeln!(out, "date: {}", meta.date);
    let _ = writeln!(out, "categories: {}", meta.category);
    if !meta.tags.is_empty() {
        let _ = writeln!(out, "tags: [{}]", meta.tags.join(", "));
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(body.trim());
    out.push('\n');
    out
}

fn value_of<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.strip_prefix(key)?.strip_prefix(':').map(str::trim)
}

/// Strip one pair of matching surrounding quotes.
pub(crate) fn unquote(value: &str) -> String {
    if value.len() >= 2 {
        if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            return unescape(inner);
        }
        if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            return inner.to_string();
        }
    }
    value.to_string()
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next().unwrap_or('\\')),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        Metadata {
            title: "Hello, World".to_string(),
            date: "2024-03-01 09:30:00".to_string(),
            category: "blog".to_string(),
            tags: vec!["rust".to_string(), "web dev".to_string()],
        }
    }

    #[test]
    fn test_decode_full_block() {
        let text = "---\nlayout: post\ntitle: \"Hello\"\ndate: 2024-01-01 10:00:00\ncategories: notes\ntags: [go, \"web dev\", rust]\n---\n\n# Heading\n\nBody text.\n";
        let (meta, body) = decode(text);
        assert_eq!(meta.title, "Hello");
        assert_eq!(meta.date, "2024-01-01 10:00:00");
        assert_eq!(meta.category, "notes");
        assert_eq!(meta.tags, vec!["go", "web dev", "rust"]);
        assert_eq!(body, "# Heading\n\nBody text.");
    }

    #[test]
    fn test_decode_without_front_matter() {
        let text = "# Just markdown\n\nnothing else\n";
        let (meta, body) = decode(text);
        assert_eq!(meta, Metadata::default());
        assert_eq!(body, text);
    }

    #[test]
    fn test_decode_unterminated_block_is_body() {
        let text = "---\ntitle: lost\nno closing delimiter";
        let (meta, body) = decode(text);
        assert_eq!(meta, Metadata::default());
        assert_eq!(body, text);
    }

    #[test]
    fn test_decode_first_key_wins() {
        let text = "---\ntitle: First\ntitle: Second\n---\nbody";
        let (meta, _) = decode(text);
        assert_eq!(meta.title, "First");
    }

    #[test]
    fn test_decode_malformed_tags_still_win() {
        let (meta, body) = decode("---\ntags: rust, web\ntags: [late]\n---\nbody");
        assert!(meta.tags.is_empty());
        assert_eq!(body, "body");
    }

    #[test]
    fn test_decode_key_needs_colon_right_after_name() {
        let text = "---\ntitles: nope\ntitle : nope\ntitle: yes\n---\nbody";
        let (meta, _) = decode(text);
        assert_eq!(meta.title, "yes");
    }

    #[test]
    fn test_decode_tags_require_brackets() {
        let (meta, _) = decode("---\ntags: a, b\n---\nbody");
        assert!(meta.tags.is_empty());

        let (meta, _) = decode("---\ntags: [a, , 'b' ,]\n---\nbody");
        assert_eq!(meta.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_single_quoted_title() {
        let (meta, _) = decode("---\ntitle: 'Quoted'\n---\n");
        assert_eq!(meta.title, "Quoted");
    }

    #[test]
    fn test_decode_keeps_horizontal_rules_in_body() {
        let text = "---\ntitle: x\n---\n\nabove\n\n---\n\nbelow";
        let (_, body) = decode(text);
        assert_eq!(body, "above\n\n---\n\nbelow");
    }

    #[test]
    fn test_encode_layout() {
        let text = encode(&sample(), "\n\nBody\n\n");
        assert_eq!(
            text,
            "---\nlayout: post\ntitle: \"Hello, World\"\ndate: 2024-03-01 09:30:00\ncategories: blog\ntags: [rust, web dev]\n---\n\nBody\n"
        );
    }

    #[test]
    fn test_encode_omits_empty_tags() {
        let meta = Metadata {
            tags: vec![],
            ..sample()
        };
        assert!(!encode(&meta, "b").contains("tags:"));
    }

    #[test]
    fn test_round_trip() {
        let meta = sample();
        let body = "# Title\n\nSome *markdown* with a colon: here.\n\n---\n\nAfter the rule.";
        let (decoded, decoded_body) = decode(&encode(&meta, body));
        assert_eq!(decoded, meta);
        assert_eq!(decoded_body, body);
    }

    #[test]
    fn test_round_trip_title_with_quotes() {
        let meta = Metadata {
            title: r#"The "best" \ worst"#.to_string(),
            ..sample()
        };
        let encoded = encode(&meta, "body");
        assert!(encoded.contains(r#"title: "The \"best\" \\ worst""#));
        assert_eq!(decode(&encoded).0, meta);
    }

    #[test]
    fn test_title_from_path() {
        assert_eq!(
            Metadata::title_from_path(Path::new("/tmp/my_first-post.md")),
            "My First Post"
        );
        assert_eq!(Metadata::title_from_path(Path::new("NOTES.md")), "Notes");
    }

    #[test]
    fn test_tags_line() {
        let mut meta = Metadata::default();
        meta.set_tags_line(" rust,  web dev ,,");
        assert_eq!(meta.tags, vec!["rust", "web dev"]);
        assert_eq!(meta.tags_line(), "rust, web dev");
    }
}
