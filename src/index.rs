use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::{
    error::{EditorError, Result},
    frontmatter,
};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct PostSummary {
    pub filename: String,
    pub title: String,
    #[serde(skip_serializing)]
    pub path: PathBuf,
}

fn is_post(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "md")
}

fn post_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!("Posts directory {dir:?} does not exist yet");
        return Ok(vec![]);
    }

    let entries = fs::read_dir(dir).map_err(|e| EditorError::io("Failed to list", dir, e))?;
    let mut paths = vec![];
    for entry in entries {
        let entry = entry.map_err(|e| EditorError::io("Failed to list", dir, e))?;
        let path = entry.path();
        if is_post(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// All `*.md` files in `dir`, newest first (filenames start with the date).
pub(crate) fn scan(dir: &Path) -> Result<Vec<PostSummary>> {
    let mut summaries: Vec<PostSummary> = post_paths(dir)?
        .into_iter()
        .map(|path| {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let title = fs::read_to_string(&path)
                .ok()
                .and_then(|content| extract_title(&content))
                .unwrap_or_else(|| filename.clone());
            PostSummary {
                filename,
                title,
                path,
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.filename.cmp(&a.filename));
    Ok(summaries)
}

/// Reads only the `title:` line of the front matter block.
pub(crate) fn extract_title(content: &str) -> Option<String> {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    static TITLE: OnceLock<Regex> = OnceLock::new();

    let header = HEADER.get_or_init(|| {
        RegexBuilder::new(r"\A---\r?\n(.*?)\r?\n---")
            .dot_matches_new_line(true)
            .build()
            .unwrap()
    });
    let title = TITLE.get_or_init(|| Regex::new(r"(?m)^[ \t]*title:[ \t]*(.*?)[ \t]*\r?$").unwrap());

    let block = header.captures(content)?.get(1)?.as_str();
    let value = title.captures(block)?.get(1)?.as_str();
    let value = frontmatter::unquote(value);
    (!value.is_empty()).then_some(value)
}

/// Case-insensitive match against filename and title, keeping the scan order.
pub(crate) fn filter(summaries: &[PostSummary], needle: &str) -> Vec<PostSummary> {
    let needle = needle.to_lowercase();
    if needle.is_empty() {
        return summaries.to_vec();
    }
    summaries
        .iter()
        .filter(|s| {
            s.filename.to_lowercase().contains(&needle) || s.title.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Categories and tags seen in existing posts, offered as suggestions while editing.
#[derive(Debug, Clone, Default)]
pub(crate) struct KnownTerms {
    pub categories: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

impl KnownTerms {
    pub fn scan(dir: &Path, default_category: &str) -> Self {
        let mut terms = Self::default();
        terms.categories.insert(default_category.to_string());

        let paths = match post_paths(dir) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("{e}");
                return terms;
            }
        };
        for path in paths {
            let Ok(content) = fs::read_to_string(&path) else {
                warn!("Skipping unreadable post {path:?}");
                continue;
            };
            let (meta, _) = frontmatter::decode(&content);
            if !meta.category.is_empty() {
                terms.categories.insert(meta.category);
            }
            terms.tags.extend(meta.tags);
        }
        terms
    }
}
