//! Headless counterparts of the editor actions.

use std::{io::Write, path::Path, time::Instant};

use anyhow::{bail, Context};
use chrono::{Local, NaiveDateTime};

use crate::{
    config::{Config, Paths},
    error::VcsError,
    frontmatter, index, render,
    session::{Field, Session},
    vcs::{self, Repository},
};

pub(crate) fn list(paths: &Paths, filter: &str, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let posts = index::scan(&paths.posts)?;
    let posts = index::filter(&posts, filter);
    if json {
        serde_json::to_writer_pretty(&mut *out, &posts)?;
        writeln!(out)?;
    } else {
        for post in posts {
            writeln!(out, "{} - {}", post.filename, post.title)?;
        }
    }
    Ok(())
}

pub(crate) struct NewPost<'a> {
    pub title: &'a str,
    pub date: Option<&'a str>,
    pub category: Option<&'a str>,
    pub tags: Option<&'a str>,
    pub body: Option<String>,
}

pub(crate) fn new_post(
    config: &Config,
    paths: &Paths,
    post: NewPost,
    now: NaiveDateTime,
) -> anyhow::Result<std::path::PathBuf> {
    let mut session = Session::new(config, now);
    let at = Instant::now();
    session.edit(Field::Title, post.title, at);
    if let Some(date) = post.date {
        session.edit(Field::Date, date, at);
    }
    if let Some(category) = post.category {
        session.edit(Field::Category, category, at);
    }
    if let Some(tags) = post.tags {
        session.edit(Field::Tags, tags, at);
    }
    if let Some(body) = &post.body {
        session.edit(Field::Body, body, at);
    }
    Ok(session.save(&paths.posts, now.date())?)
}

fn read_post(file: &Path) -> anyhow::Result<(frontmatter::Metadata, String)> {
    let content = std::fs::read_to_string(file).with_context(|| format!("{file:?}"))?;
    Ok(frontmatter::decode(&content))
}

pub(crate) fn show(file: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let (_, body) = read_post(file)?;
    out.write_all(render::render_markdown(&body).html.as_bytes())?;
    Ok(())
}

pub(crate) fn preview(file: &Path) -> anyhow::Result<std::path::PathBuf> {
    let (meta, body) = read_post(file)?;
    Ok(render::open_in_browser(&meta.title, &body)?)
}

pub(crate) fn publish(paths: &Paths, message: Option<&str>) -> anyhow::Result<String> {
    let Some(repo) = Repository::discover(&paths.root) else {
        bail!(VcsError::NoRepository);
    };
    let message = match message {
        Some(message) => message.to_string(),
        None => vcs::default_commit_message(Local::now().naive_local()),
    };
    let outcome = repo
        .publish(&message)
        .with_context(|| format!("while publishing from {:?}", repo.root()))?;
    Ok(outcome.commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn site() -> (TempDir, Config, Paths) {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let paths = Paths::new(dir.path(), &config);
        (dir, config, paths)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 4)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_new_then_list() {
        let (_dir, config, paths) = site();
        let path = new_post(
            &config,
            &paths,
            NewPost {
                title: "Hello CLI",
                date: None,
                category: Some("notes"),
                tags: Some("cli, rust"),
                body: Some("Body from a file".to_string()),
            },
            now(),
        )
        .unwrap();
        assert_eq!(path, paths.posts.join("2024-05-04-hello-cli.md"));

        let (meta, body) = read_post(&path).unwrap();
        assert_eq!(meta.category, "notes");
        assert_eq!(meta.tags, vec!["cli", "rust"]);
        assert_eq!(body, "Body from a file");

        let mut out = vec![];
        list(&paths, "hello", false, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2024-05-04-hello-cli.md - Hello CLI\n");

        let mut out = vec![];
        list(&paths, "", true, &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json[0]["title"], "Hello CLI");
        assert!(json[0].get("path").is_none());
    }

    #[test]
    fn test_new_without_title_fails() {
        let (_dir, config, paths) = site();
        let post = NewPost {
            title: "",
            date: None,
            category: None,
            tags: None,
            body: None,
        };
        assert!(new_post(&config, &paths, post, now()).is_err());
        assert!(!paths.posts.exists());
    }

    #[test]
    fn test_show_renders_body_only() {
        let (dir, _, _) = site();
        let file = dir.path().join("post.md");
        std::fs::write(&file, "---\ntitle: x\n---\n\n# Hi\n").unwrap();
        let mut out = vec![];
        show(&file, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<h1 id=\"hi\">Hi</h1>\n");
    }

    #[test]
    fn test_publish_without_repository() {
        let (_dir, _, paths) = site();
        let err = publish(&paths, Some("msg")).unwrap_err();
        assert_eq!(err.to_string(), "No Git repository found");
    }
}
