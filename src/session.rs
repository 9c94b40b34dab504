//! State of the post currently open in the editor.
//!
//! ```text
//!            new / discard / delete
//!   any ─────────────────────────────▶ Empty
//!   any ──────────── load ───────────▶ Loaded(clean)
//!   Loaded(clean) ── edit ───────────▶ Loaded(dirty)
//!   Empty / Loaded ─ save ───────────▶ Loaded(clean)
//! ```
//!
//! Resolving unsaved changes before `new_post`/`load` is up to the caller.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};

use crate::{
    config::Config,
    debounce::Debounce,
    error::{EditorError, Result},
    frontmatter::{self, Metadata},
    slug,
};

pub(crate) const APP_NAME: &str = "Blog Desk";
pub(crate) const PLACEHOLDER_BODY: &str = "# Your Post Title\n\nWrite your content here...";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Title,
    Date,
    Category,
    Tags,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    /// Not saved yet; no filename assigned.
    Empty,
    Loaded { dirty: bool },
}

#[derive(Debug)]
pub(crate) struct Session {
    pub meta: Metadata,
    pub body: String,
    filename: Option<String>,
    dirty: bool,
    preview: Debounce,
    pub auto_preview: bool,
    default_category: String,
}

impl Session {
    pub fn new(config: &Config, now: NaiveDateTime) -> Self {
        let mut session = Self {
            meta: Metadata::default(),
            body: String::new(),
            filename: None,
            dirty: false,
            preview: Debounce::new(config.preview_delay()),
            auto_preview: config.auto_preview,
            default_category: config.default_category.clone(),
        };
        session.new_post(now);
        session
    }

    pub fn state(&self) -> SessionState {
        match self.filename {
            None => SessionState::Empty,
            Some(_) => SessionState::Loaded { dirty: self.dirty },
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn window_title(&self) -> String {
        let mut title = APP_NAME.to_string();
        if let Some(filename) = &self.filename {
            title.push_str(" - ");
            title.push_str(filename);
        }
        if self.dirty {
            title.push_str(" *");
        }
        title
    }

    pub fn new_post(&mut self, now: NaiveDateTime) {
        self.meta = Metadata {
            title: String::new(),
            date: now.format(DATE_FORMAT).to_string(),
            category: self.default_category.clone(),
            tags: vec![],
        };
        self.body = PLACEHOLDER_BODY.to_string();
        self.filename = None;
        self.dirty = false;
        self.preview.cancel();
    }

    /// Drops unsaved edits and starts over with a fresh post.
    pub fn discard(&mut self, now: NaiveDateTime) {
        debug!("Discarding edits of {:?}", self.filename);
        self.new_post(now);
    }

    pub fn load(&mut self, path: &Path) -> Result<()> {
        let content =
            fs::read_to_string(path).map_err(|e| EditorError::io("Failed to load", path, e))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| EditorError::validation(format!("{path:?} is not a file")))?;

        let (meta, body) = frontmatter::decode(&content);
        self.meta = meta;
        self.body = body;
        self.filename = Some(filename);
        self.dirty = false;
        self.preview.cancel();
        info!("Loaded {path:?}");
        Ok(())
    }

    /// Opens a markdown file from outside the posts directory as a new, unsaved post.
    pub fn import(&mut self, path: &Path, now: NaiveDateTime) -> Result<()> {
        let content =
            fs::read_to_string(path).map_err(|e| EditorError::io("Failed to import", path, e))?;
        let (meta, body) = frontmatter::decode(&content);

        self.new_post(now);
        if meta.title.is_empty() {
            self.meta.title = Metadata::title_from_path(path);
        } else {
            self.meta.title = meta.title;
        }
        if !meta.date.is_empty() {
            self.meta.date = meta.date;
        }
        if !meta.category.is_empty() {
            self.meta.category = meta.category;
        }
        self.meta.tags = meta.tags;
        self.body = body;
        self.dirty = true;
        info!("Imported {path:?}");
        Ok(())
    }

    pub fn edit(&mut self, field: Field, value: &str, now: Instant) {
        match field {
            Field::Title => self.meta.title = value.to_string(),
            Field::Date => self.meta.date = value.to_string(),
            Field::Category => self.meta.category = value.to_string(),
            Field::Tags => self.meta.set_tags_line(value),
            Field::Body => {
                self.body = value.to_string();
                if self.auto_preview {
                    self.preview.schedule(now);
                }
            }
        }
        self.dirty = true;
    }

    /// True once per quiet period after the last body edit.
    pub fn preview_due(&mut self, now: Instant) -> bool {
        self.preview.fire(now)
    }

    pub fn preview_timer(&self) -> &Debounce {
        &self.preview
    }

    /// Writes the post into `posts_dir` and returns its path.
    ///
    /// The filename is chosen on first save and kept afterwards, even if the
    /// title changes.
    pub fn save(&mut self, posts_dir: &Path, today: NaiveDate) -> Result<PathBuf> {
        let title = self.meta.title.trim();
        if title.is_empty() {
            return Err(EditorError::validation("Title is required!"));
        }

        let (filename, first_save) = match &self.filename {
            Some(filename) => (filename.clone(), false),
            None => {
                let date = self.post_date().unwrap_or(today);
                (slug::post_filename(date, title)?, true)
            }
        };
        let path = posts_dir.join(&filename);
        if first_save && path.exists() {
            return Err(EditorError::validation(format!(
                "{filename} already exists; choose another title"
            )));
        }

        let meta = Metadata {
            title: title.to_string(),
            ..self.meta.clone()
        };
        let content = frontmatter::encode(&meta, &self.body);

        fs::create_dir_all(posts_dir)
            .map_err(|e| EditorError::io("Failed to create", posts_dir, e))?;
        fs::write(&path, content).map_err(|e| EditorError::io("Failed to save", &path, e))?;

        self.meta = meta;
        self.filename = Some(filename);
        self.dirty = false;
        info!("Saved {path:?}");
        Ok(path)
    }

    /// Removes the loaded post from disk and starts a new one.
    pub fn delete(&mut self, posts_dir: &Path, now: NaiveDateTime) -> Result<PathBuf> {
        let Some(filename) = &self.filename else {
            return Err(EditorError::validation("No post selected!"));
        };
        let path = posts_dir.join(filename);
        fs::remove_file(&path).map_err(|e| EditorError::io("Failed to delete", &path, e))?;
        info!("Deleted {path:?}");
        self.new_post(now);
        Ok(path)
    }

    /// The `YYYY-MM-DD` prefix of the date field.
    fn post_date(&self) -> Option<NaiveDate> {
        let date = self.meta.date.trim();
        NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d").ok()
    }
}
