//! The editor window. Every user action is turned into a call on [`Session`];
//! the panels are redrawn from the session on each frame.

use std::{ops::Range, path::PathBuf, time::Instant};

use chrono::Local;
use eframe::{egui, App, Frame, NativeOptions};
use egui::{
    text::CCursor, text_edit::CCursorRange, Align2, Color32, Key, Modifiers, RichText, TextStyle,
    ViewportCommand,
};
use egui_commonmark::{CommonMarkCache, CommonMarkViewer};
use log::{error, info, warn};

use crate::{
    assets,
    config::{Config, Paths},
    error::{EditorError, VcsError},
    format::{self, Edit},
    index::{self, KnownTerms, PostSummary},
    render::{self, Rendered},
    session::{Field, Session, SessionState, APP_NAME},
    vcs::{self, Repository},
};

/// Actions that replace the open post and so need unsaved changes resolved first.
#[derive(Debug, Clone)]
enum Intent {
    NewPost,
    Load(PathBuf),
    Import,
    Publish,
    Quit,
}

#[derive(Debug)]
enum Dialog {
    UnsavedChanges(Intent),
    ConfirmDelete(String),
    Publish { message: String },
    Link { text: String, url: String },
    CodeBlock { lang: String },
    ImageAlt { filename: String, alt: String },
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Confirm,
    Alternate,
    Cancel,
}

impl Dialog {
    fn title(&self) -> &'static str {
        match self {
            Dialog::UnsavedChanges(_) => "Unsaved Changes",
            Dialog::ConfirmDelete(_) => "Delete Post",
            Dialog::Publish { .. } => "Commit Message",
            Dialog::Link { .. } => "Insert Link",
            Dialog::CodeBlock { .. } => "Code Block",
            Dialog::ImageAlt { .. } => "Alt Text",
            Dialog::Error(_) => "Error",
        }
    }
}

pub(crate) struct BlogDeskApp {
    paths: Paths,
    url_prefix: String,
    session: Session,
    repo: Option<Repository>,

    posts: Vec<PostSummary>,
    search: String,
    visible_count: usize,
    known: KnownTerms,
    default_category: String,
    preview: Rendered,
    /// Body as of the last preview refresh.
    preview_source: String,
    markdown: CommonMarkCache,

    /// Last selection reported by the body editor, in chars.
    selection: Range<usize>,
    pending_cursor: Option<usize>,
    dialog: Option<Dialog>,
    status: String,
    shown_title: String,
    allow_close: bool,
}

impl BlogDeskApp {
    pub fn new(config: Config, paths: Paths) -> Self {
        for dir in [&paths.posts, &paths.assets] {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("Failed to create {dir:?}: {e}");
            }
        }

        let repo = Repository::discover(&paths.root);
        let mut app = Self {
            session: Session::new(&config, Local::now().naive_local()),
            url_prefix: config.asset_url_prefix.clone(),
            default_category: config.default_category.clone(),
            repo,
            posts: vec![],
            search: String::new(),
            visible_count: 0,
            known: KnownTerms::default(),
            preview: Rendered::default(),
            preview_source: String::new(),
            markdown: CommonMarkCache::default(),
            selection: 0..0,
            pending_cursor: None,
            dialog: None,
            status: String::new(),
            shown_title: String::new(),
            allow_close: false,
            paths,
        };
        app.refresh_posts();
        app.refresh_preview();
        app
    }

    fn refresh_posts(&mut self) {
        match index::scan(&self.paths.posts) {
            Ok(posts) => self.posts = posts,
            Err(e) => self.fail(e),
        }
        self.known = KnownTerms::scan(&self.paths.posts, &self.default_category);
    }

    fn refresh_preview(&mut self) {
        self.preview_source = self.session.body.trim().to_string();
        self.preview = render::render_markdown(&self.preview_source);
    }

    fn fail(&mut self, e: impl Into<EditorError>) {
        let e = e.into();
        let message = e.to_string();
        if e.is_validation() {
            warn!("{message}");
        } else {
            error!("{message}");
        }
        self.status = message.clone();
        self.dialog = Some(Dialog::Error(message));
    }

    fn request(&mut self, intent: Intent) {
        if self.session.is_dirty() {
            self.dialog = Some(Dialog::UnsavedChanges(intent));
        } else {
            self.perform(intent);
        }
    }

    fn perform(&mut self, intent: Intent) {
        let now = Local::now().naive_local();
        match intent {
            Intent::NewPost => {
                self.session.new_post(now);
                self.status = "New post".to_string();
            }
            Intent::Load(path) => {
                if let Err(e) = self.session.load(&path) {
                    return self.fail(e);
                }
                self.status = format!("Loaded: {}", self.session.filename().unwrap_or_default());
            }
            Intent::Import => {
                let Some(path) = rfd::FileDialog::new()
                    .set_title("Import Markdown")
                    .add_filter("Markdown", &["md", "markdown"])
                    .add_filter("Text", &["txt"])
                    .add_filter("All", &["*"])
                    .pick_file()
                else {
                    return;
                };
                if let Err(e) = self.session.import(&path, now) {
                    return self.fail(e);
                }
                self.status = format!("Imported: {}", path.display());
            }
            Intent::Publish => {
                if self.repo.is_none() {
                    return self.fail(VcsError::NoRepository);
                }
                self.dialog = Some(Dialog::Publish {
                    message: vcs::default_commit_message(now),
                });
                return;
            }
            Intent::Quit => {
                self.allow_close = true;
                return;
            }
        }
        self.refresh_preview();
    }

    fn save(&mut self) -> bool {
        match self
            .session
            .save(&self.paths.posts, Local::now().date_naive())
        {
            Ok(path) => {
                self.status = format!("Saved: {}", path.display());
                self.refresh_posts();
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    fn delete(&mut self) {
        match self
            .session
            .delete(&self.paths.posts, Local::now().naive_local())
        {
            Ok(path) => {
                self.status = format!("Deleted: {}", path.display());
                self.refresh_posts();
                self.refresh_preview();
            }
            Err(e) => self.fail(e),
        }
    }

    fn publish(&mut self, message: &str) {
        let Some(repo) = &self.repo else {
            return self.fail(VcsError::NoRepository);
        };
        match repo.publish(message) {
            Ok(outcome) => {
                info!("Published {}", outcome.commit);
                self.status = format!("Published successfully ({})", outcome.commit);
            }
            Err(VcsError::NothingToCommit) => self.status = "No changes to publish!".to_string(),
            Err(e) => self.fail(e),
        }
    }

    fn apply(&mut self, edit: Edit) {
        self.session.edit(Field::Body, &edit.text, Instant::now());
        self.pending_cursor = Some(edit.cursor);
    }

    fn wrap(&mut self, marker: &str) {
        let edit = format::wrap(&self.session.body, self.selection.clone(), marker);
        self.apply(edit);
    }

    fn heading(&mut self, level: usize) {
        let edit = format::heading(&self.session.body, self.selection.start, level);
        self.apply(edit);
    }

    fn insert(&mut self, snippet: &str) {
        let edit = format::insert(&self.session.body, self.selection.clone(), snippet);
        self.apply(edit);
    }

    fn pick_image(&mut self) {
        let Some(source) = rfd::FileDialog::new()
            .set_title("Select Image")
            .add_filter("Images", &["png", "jpg", "jpeg", "gif", "bmp", "webp"])
            .add_filter("All", &["*"])
            .pick_file()
        else {
            return;
        };
        match assets::import_image(&source, &self.paths.assets) {
            Ok(filename) => {
                let alt = std::path::Path::new(&filename)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                self.dialog = Some(Dialog::ImageAlt { filename, alt });
            }
            Err(e) => self.fail(e),
        }
    }

    fn preview_in_browser(&mut self) {
        match render::open_in_browser(&self.session.meta.title, &self.session.body) {
            Ok(path) => self.status = format!("Preview: {}", path.display()),
            Err(e) => self.fail(e),
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if self.dialog.is_some() {
            return;
        }
        let pressed = |key: Key, modifiers: Modifiers| ctx.input_mut(|i| i.consume_key(modifiers, key));

        if pressed(Key::S, Modifiers::COMMAND) {
            self.save();
        }
        if pressed(Key::N, Modifiers::COMMAND) {
            self.request(Intent::NewPost);
        }
        if pressed(Key::O, Modifiers::COMMAND) {
            self.request(Intent::Import);
        }
        if pressed(Key::P, Modifiers::COMMAND) {
            self.request(Intent::Publish);
        }
        if pressed(Key::B, Modifiers::COMMAND) {
            self.wrap("**");
        }
        if pressed(Key::I, Modifiers::COMMAND) {
            self.wrap("*");
        }
        if pressed(Key::F5, Modifiers::NONE) {
            self.refresh_preview();
        }
    }

    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("New Post\tCtrl+N").clicked() {
                        self.request(Intent::NewPost);
                        ui.close_menu();
                    }
                    if ui.button("Import Markdown…\tCtrl+O").clicked() {
                        self.request(Intent::Import);
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Save\tCtrl+S").clicked() {
                        self.save();
                        ui.close_menu();
                    }
                    let loaded = self.session.filename().map(str::to_string);
                    if ui
                        .add_enabled(loaded.is_some(), egui::Button::new("Delete Post"))
                        .clicked()
                    {
                        self.dialog = loaded.map(Dialog::ConfirmDelete);
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Preview in Browser").clicked() {
                        self.preview_in_browser();
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(self.repo.is_some(), egui::Button::new("Publish\tCtrl+P"))
                        .clicked()
                    {
                        self.request(Intent::Publish);
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        self.request(Intent::Quit);
                        ui.close_menu();
                    }
                });
                ui.menu_button("Format", |ui| {
                    if ui.button("Bold\tCtrl+B").clicked() {
                        self.wrap("**");
                        ui.close_menu();
                    }
                    if ui.button("Italic\tCtrl+I").clicked() {
                        self.wrap("*");
                        ui.close_menu();
                    }
                    ui.separator();
                    for level in 1..=3 {
                        if ui.button(format!("Heading {level}")).clicked() {
                            self.heading(level);
                            ui.close_menu();
                        }
                    }
                    ui.separator();
                    if ui.button("Link…").clicked() {
                        self.dialog = Some(Dialog::Link {
                            text: String::new(),
                            url: String::new(),
                        });
                        ui.close_menu();
                    }
                    if ui.button("Image…").clicked() {
                        self.pick_image();
                        ui.close_menu();
                    }
                    if ui.button("Code Block…").clicked() {
                        self.dialog = Some(Dialog::CodeBlock {
                            lang: String::new(),
                        });
                        ui.close_menu();
                    }
                    if ui.button("List Item").clicked() {
                        let edit = format::list_item(&self.session.body, self.selection.clone());
                        self.apply(edit);
                        ui.close_menu();
                    }
                });
                ui.menu_button("View", |ui| {
                    if ui.button("Refresh Preview\tF5").clicked() {
                        self.refresh_preview();
                        ui.close_menu();
                    }
                    if ui.button("Refresh Posts").clicked() {
                        self.refresh_posts();
                        ui.close_menu();
                    }
                    ui.checkbox(&mut self.session.auto_preview, "Auto Preview");
                });
            });
        });
    }

    fn show_posts_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("posts_panel")
            .default_width(300.0)
            .resizable(true)
            .show(ctx, |ui| {
                ui.heading("Posts");
                ui.horizontal(|ui| {
                    ui.label("Search:");
                    ui.text_edit_singleline(&mut self.search);
                });
                ui.separator();

                let visible = index::filter(&self.posts, &self.search);
                let current = self.session.filename().map(str::to_string);
                let mut clicked = None;
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for post in &visible {
                        let selected = current.as_deref() == Some(post.filename.as_str());
                        let label = format!("{} - {}", post.filename, post.title);
                        if ui.selectable_label(selected, label).clicked() && !selected {
                            clicked = Some(post.path.clone());
                        }
                    }
                });
                self.visible_count = visible.len();
                if let Some(path) = clicked {
                    self.request(Intent::Load(path));
                }
            });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("Showing {} posts", self.visible_count));
                ui.separator();
                let state = match self.session.state() {
                    SessionState::Empty => "Draft",
                    SessionState::Loaded { dirty: true } => "Modified",
                    SessionState::Loaded { dirty: false } => "Saved",
                };
                ui.label(RichText::new(state).strong());
                if self.session.preview_timer().is_pending() {
                    ui.spinner();
                }
                ui.separator();
                ui.label(&self.status);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .add_enabled(self.repo.is_some(), egui::Button::new("Publish"))
                        .clicked()
                    {
                        self.request(Intent::Publish);
                    }
                    if ui.button("Save").clicked() {
                        self.save();
                    }
                    let git = if self.repo.is_some() {
                        RichText::new("git ✓")
                    } else {
                        RichText::new("no git repository").color(Color32::from_rgb(239, 68, 68))
                    };
                    ui.label(git);
                });
            });
        });
    }

    fn show_preview_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("preview_panel")
            .default_width(480.0)
            .resizable(true)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Preview");
                    if ui.small_button("Open in Browser").clicked() {
                        self.preview_in_browser();
                    }
                });
                ui.separator();
                egui::ScrollArea::vertical().show(ui, |ui| {
                    if !self.preview.toc.is_empty() {
                        ui.label(RichText::new("Contents").strong());
                        for entry in &self.preview.toc {
                            let indent = "  ".repeat(entry.level.saturating_sub(1));
                            ui.label(format!("{indent}{}", entry.text));
                        }
                        ui.separator();
                    }
                    CommonMarkViewer::new("preview_markdown").show(
                        ui,
                        &mut self.markdown,
                        &self.preview_source,
                    );
                });
            });
    }

    fn show_metadata_form(&mut self, ui: &mut egui::Ui) {
        let now = Instant::now();
        egui::Grid::new("metadata_form")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                let mut title = self.session.meta.title.clone();
                ui.label("Title:");
                if ui
                    .add(egui::TextEdit::singleline(&mut title).desired_width(f32::INFINITY))
                    .changed()
                {
                    self.session.edit(Field::Title, &title, now);
                }
                ui.end_row();

                let mut date = self.session.meta.date.clone();
                ui.label("Date:");
                if ui.text_edit_singleline(&mut date).changed() {
                    self.session.edit(Field::Date, &date, now);
                }
                ui.end_row();

                let mut category = self.session.meta.category.clone();
                ui.label("Category:");
                ui.horizontal(|ui| {
                    let mut changed = ui.text_edit_singleline(&mut category).changed();
                    egui::ComboBox::from_id_source("category_suggestions")
                        .selected_text("▼")
                        .width(24.0)
                        .show_ui(ui, |ui| {
                            for known in &self.known.categories {
                                if ui.selectable_label(*known == category, known).clicked() {
                                    category = known.clone();
                                    changed = true;
                                }
                            }
                        });
                    if changed {
                        self.session.edit(Field::Category, &category, now);
                    }
                });
                ui.end_row();

                let mut tags = self.session.meta.tags_line();
                ui.label("Tags:");
                ui.horizontal(|ui| {
                    let mut changed = ui.text_edit_singleline(&mut tags).changed();
                    ui.menu_button("+", |ui| {
                        for known in &self.known.tags {
                            if ui.button(known).clicked() {
                                if !self.session.meta.tags.contains(known) {
                                    tags = if tags.trim().is_empty() {
                                        known.clone()
                                    } else {
                                        format!("{tags}, {known}")
                                    };
                                    changed = true;
                                }
                                ui.close_menu();
                            }
                        }
                    });
                    if changed {
                        self.session.edit(Field::Tags, &tags, now);
                    }
                });
                ui.end_row();
            });
    }

    fn show_editor(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_metadata_form(ui);
            ui.separator();

            let mut body = self.session.body.clone();
            egui::ScrollArea::vertical().show(ui, |ui| {
                let output = egui::TextEdit::multiline(&mut body)
                    .id(egui::Id::new("body_editor"))
                    .font(TextStyle::Monospace)
                    .desired_rows(30)
                    .desired_width(f32::INFINITY)
                    .show(ui);

                if output.response.changed() {
                    self.session.edit(Field::Body, &body, Instant::now());
                }
                if let Some(range) = output.cursor_range {
                    let range = range.as_ccursor_range();
                    let (a, b) = (range.primary.index, range.secondary.index);
                    self.selection = a.min(b)..a.max(b);
                }
                if let Some(cursor) = self.pending_cursor.take() {
                    let mut state = output.state;
                    state.set_ccursor_range(Some(CCursorRange::one(CCursor::new(cursor))));
                    state.store(ui.ctx(), output.response.id);
                    output.response.request_focus();
                    self.selection = cursor..cursor;
                }
            });
        });
    }

    fn show_dialog(&mut self, ctx: &egui::Context) {
        let Some(mut dialog) = self.dialog.take() else {
            return;
        };

        let mut reply = None;
        egui::Window::new(dialog.title())
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                let buttons = |ui: &mut egui::Ui, confirm: &str, alternate: Option<&str>| {
                    let mut reply = None;
                    ui.horizontal(|ui| {
                        if ui.button(confirm).clicked() {
                            reply = Some(Reply::Confirm);
                        }
                        if let Some(alternate) = alternate {
                            if ui.button(alternate).clicked() {
                                reply = Some(Reply::Alternate);
                            }
                        }
                        if ui.button("Cancel").clicked() {
                            reply = Some(Reply::Cancel);
                        }
                    });
                    reply
                };

                reply = match &mut dialog {
                    Dialog::UnsavedChanges(_) => {
                        ui.label("Save changes to the current post first?");
                        buttons(ui, "Save", Some("Don't Save"))
                    }
                    Dialog::ConfirmDelete(filename) => {
                        ui.label(format!("Delete {filename}?"));
                        buttons(ui, "Delete", None)
                    }
                    Dialog::Publish { message } => {
                        ui.label("Enter commit message:");
                        ui.text_edit_singleline(message);
                        buttons(ui, "Publish", None)
                    }
                    Dialog::Link { text, url } => {
                        egui::Grid::new("link_form").num_columns(2).show(ui, |ui| {
                            ui.label("Link Text:");
                            ui.text_edit_singleline(text);
                            ui.end_row();
                            ui.label("URL:");
                            ui.text_edit_singleline(url);
                            ui.end_row();
                        });
                        buttons(ui, "Insert", None)
                    }
                    Dialog::CodeBlock { lang } => {
                        ui.label("Enter language (optional):");
                        ui.text_edit_singleline(lang);
                        buttons(ui, "Insert", None)
                    }
                    Dialog::ImageAlt { alt, .. } => {
                        ui.label("Enter alt text:");
                        ui.text_edit_singleline(alt);
                        buttons(ui, "Insert", None)
                    }
                    Dialog::Error(message) => {
                        ui.label(RichText::new(message.as_str()).color(Color32::from_rgb(239, 68, 68)));
                        if ui.button("OK").clicked() {
                            Some(Reply::Cancel)
                        } else {
                            None
                        }
                    }
                };
            });

        let Some(reply) = reply else {
            self.dialog = Some(dialog);
            return;
        };
        if reply == Reply::Cancel {
            return;
        }

        match dialog {
            Dialog::UnsavedChanges(intent) => {
                if reply == Reply::Confirm && !self.save() {
                    return;
                }
                if reply == Reply::Alternate && matches!(intent, Intent::Quit) {
                    self.session.discard(Local::now().naive_local());
                }
                self.perform(intent);
            }
            Dialog::ConfirmDelete(_) => self.delete(),
            Dialog::Publish { message } => self.publish(&message),
            Dialog::Link { text, url } => {
                if text.is_empty() || url.is_empty() {
                    self.dialog = Some(Dialog::Link { text, url });
                } else {
                    self.insert(&format::link(&text, &url));
                }
            }
            Dialog::CodeBlock { lang } => {
                let edit = format::code_block(&self.session.body, self.selection.clone(), &lang);
                self.apply(edit);
            }
            Dialog::ImageAlt { filename, alt } => {
                self.insert(&assets::image_markdown(&alt, &self.url_prefix, &filename));
                self.status = format!("Image inserted: {filename}");
            }
            Dialog::Error(_) => {}
        }
    }

    fn handle_close(&mut self, ctx: &egui::Context) {
        if self.allow_close {
            ctx.send_viewport_cmd(ViewportCommand::Close);
            return;
        }
        if ctx.input(|i| i.viewport().close_requested()) && self.session.is_dirty() {
            ctx.send_viewport_cmd(ViewportCommand::CancelClose);
            self.dialog = Some(Dialog::UnsavedChanges(Intent::Quit));
        }
    }

    fn sync_window_title(&mut self, ctx: &egui::Context) {
        let title = self.session.window_title();
        if title != self.shown_title {
            ctx.send_viewport_cmd(ViewportCommand::Title(title.clone()));
            self.shown_title = title;
        }
    }
}

impl App for BlogDeskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.handle_shortcuts(ctx);

        let now = Instant::now();
        if self.session.preview_due(now) {
            self.refresh_preview();
        }
        if let Some(remaining) = self.session.preview_timer().remaining(now) {
            ctx.request_repaint_after(remaining);
        }

        self.show_menu_bar(ctx);
        self.show_status_bar(ctx);
        self.show_posts_panel(ctx);
        self.show_preview_panel(ctx);
        self.show_editor(ctx);
        self.show_dialog(ctx);

        self.sync_window_title(ctx);
        self.handle_close(ctx);
    }
}

pub(crate) fn run(config: Config, paths: Paths) -> anyhow::Result<()> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([1500.0, 1000.0])
            .with_min_inner_size([1200.0, 700.0]),
        ..Default::default()
    };
    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |_cc| Box::new(BlogDeskApp::new(config, paths))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}
