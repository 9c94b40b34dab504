use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
};

use fs_extra::file::CopyOptions;
use log::info;

use crate::error::{EditorError, Result};

/// First free name in `dir`: `cat.png`, `cat_1.png`, `cat_2.png`, ...
fn free_name(dir: &Path, filename: &OsStr) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let original = Path::new(filename);
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| dir.join(format!("{stem}_{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Copies an image into `assets_dir` without touching existing files.
/// Returns the name it was stored under.
pub(crate) fn import_image(source: &Path, assets_dir: &Path) -> Result<String> {
    let filename = source
        .file_name()
        .ok_or_else(|| EditorError::validation(format!("{source:?} is not a file")))?;

    std::fs::create_dir_all(assets_dir)
        .map_err(|e| EditorError::io("Failed to create", assets_dir, e))?;

    let dest = free_name(assets_dir, filename);
    fs_extra::file::copy(source, &dest, &CopyOptions::new())
        .map_err(|e| EditorError::io("Failed to copy", source, io::Error::other(e.to_string())))?;

    info!("Copied {source:?} to {dest:?}");
    Ok(dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default())
}

/// `![alt](/assets/img/name.png)` followed by a newline. Empty alt text falls back to the file stem.
pub(crate) fn image_markdown(alt: &str, url_prefix: &str, filename: &str) -> String {
    let alt = match alt.trim() {
        "" => Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        alt => alt.to_string(),
    };
    format!("![{alt}]({}/{filename})\n", url_prefix.trim_end_matches('/'))
}
