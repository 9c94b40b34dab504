use std::{collections::HashMap, io::Write as _, path::PathBuf};

use log::debug;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use pulldown_cmark::{html as cmark_html, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::{
    error::{EditorError, Result},
    slug::slugify,
};

const STYLE: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif;
       max-width: 800px; margin: 0 auto; padding: 2rem; line-height: 1.6; }
pre { background: #f5f5f5; padding: 1rem; overflow-x: auto; }
code { background: #f5f5f5; padding: 0.2rem; }
blockquote { border-left: 4px solid #ccc; margin: 1rem 0; padding-left: 1rem; color: #666; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ddd; padding: 0.5rem; text-align: left; }
th { background: #f5f5f5; }
.toc li.toc-h2 { margin-left: 1rem; }
.toc li.toc-h3 { margin-left: 2rem; }
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TocEntry {
    pub level: usize,
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Rendered {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

impl Rendered {
    pub fn toc_html(&self) -> Markup {
        html! {
            @if !self.toc.is_empty() {
                div.toc {
                    ul {
                        @for entry in &self.toc {
                            li class={ "toc-h" (entry.level) } {
                                a href={ "#" (entry.id) } { (entry.text) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

/// Hands out heading ids, suffixing repeats with `-1`, `-2`, ...
#[derive(Default)]
struct HeadingIds(HashMap<String, usize>);

impl HeadingIds {
    fn claim(&mut self, text: &str) -> String {
        let base = match slugify(text) {
            s if s.is_empty() => "section".to_string(),
            s => s,
        };
        let seen = self.0.entry(base.clone()).or_insert(0);
        let id = if *seen == 0 {
            base
        } else {
            format!("{base}-{seen}")
        };
        *seen += 1;
        id
    }
}

/// Markdown to HTML with heading anchors, a table of contents and
/// `codehilite` wrappers around fenced code.
pub(crate) fn render_markdown(body: &str) -> Rendered {
    let events: Vec<Event> = Parser::new_ext(body, options()).collect();

    // heading texts, in document order
    let mut texts = vec![];
    let mut current: Option<String> = None;
    for event in &events {
        match event {
            Event::Start(Tag::Heading { .. }) => current = Some(String::new()),
            Event::Text(t) | Event::Code(t) => {
                if let Some(c) = current.as_mut() {
                    c.push_str(t);
                }
            }
            Event::End(TagEnd::Heading(_)) => texts.extend(current.take()),
            _ => {}
        }
    }

    let mut texts = texts.into_iter();
    let mut ids = HeadingIds::default();
    let mut toc = vec![];
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let text = texts.next().unwrap_or_default();
                let id = match id {
                    Some(id) => id.to_string(),
                    None => ids.claim(&text),
                };
                toc.push(TocEntry {
                    level: level as usize,
                    id: id.clone(),
                    text,
                });
                out.push(Event::Start(Tag::Heading {
                    level,
                    id: Some(CowStr::from(id)),
                    classes,
                    attrs,
                }));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                out.push(Event::Html("<div class=\"codehilite\">\n".into()));
                out.push(Event::Start(Tag::CodeBlock(kind)));
            }
            Event::End(TagEnd::CodeBlock) => {
                out.push(Event::End(TagEnd::CodeBlock));
                out.push(Event::Html("</div>\n".into()));
            }
            event => out.push(event),
        }
    }

    let mut html_out = String::new();
    cmark_html::push_html(&mut html_out, out.into_iter());
    Rendered {
        html: html_out,
        toc,
    }
}

/// A complete page for viewing the post in a browser.
pub(crate) fn standalone_document(title: &str, body: &str) -> String {
    let rendered = render_markdown(body);
    let title = if title.trim().is_empty() {
        "Preview"
    } else {
        title
    };
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (title) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                (rendered.toc_html())
                (PreEscaped(&rendered.html))
            }
        }
    }
    .into_string()
}

/// Writes the page to a temp file that outlives the process and opens the system browser.
pub(crate) fn open_in_browser(title: &str, body: &str) -> Result<PathBuf> {
    let document = standalone_document(title, body);
    let tmp = std::env::temp_dir();

    let mut file = tempfile::Builder::new()
        .prefix("blogdesk-preview-")
        .suffix(".html")
        .tempfile()
        .map_err(|e| EditorError::io("Failed to create", &tmp, e))?;
    file.write_all(document.as_bytes())
        .map_err(|e| EditorError::io("Failed to write", file.path(), e))?;
    let (_, path) = file
        .keep()
        .map_err(|e| EditorError::io("Failed to keep", &tmp, e.error))?;

    debug!("Opening {path:?}");
    open::that(&path).map_err(|e| EditorError::io("Failed to open", &path, e))?;
    Ok(path)
}
