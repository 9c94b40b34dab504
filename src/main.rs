use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Local;
use clap::{command, value_parser, Arg, ArgAction, ArgMatches, Command};
use config::{Config, Paths, CONFIG_FILE};

mod app;
mod assets;
mod commands;
mod config;
mod debounce;
mod error;
mod format;
mod frontmatter;
mod index;
mod render;
mod session;
mod slug;
mod vcs;

fn file_arg() -> Arg {
    Arg::new("file")
        .help("Post file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

fn cli() -> Command {
    command!()
        .args(&[
            Arg::new("root")
                .long("root")
                .short('r')
                .help("Site root. Posts, assets and the Git repository live here.")
                .env("BLOGDESK_ROOT")
                .value_parser(value_parser!(PathBuf))
                .default_value("."),
            Arg::new("config")
                .long("config")
                .help("Settings file [default: <root>/blogdesk.json]")
                .value_parser(value_parser!(PathBuf)),
            Arg::new("posts_dir")
                .long("posts-dir")
                .help("Posts directory, relative to the root")
                .value_parser(value_parser!(PathBuf)),
            Arg::new("assets_dir")
                .long("assets-dir")
                .help("Image directory, relative to the root")
                .value_parser(value_parser!(PathBuf)),
        ])
        .subcommand(Command::new("gui").about("Open the editor window (default)"))
        .subcommand(
            Command::new("list")
                .about("List posts, newest first")
                .arg(Arg::new("filter").help("Case-insensitive filter on filename and title"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("new")
                .about("Create a post")
                .arg(Arg::new("title").long("title").short('t').required(true))
                .arg(Arg::new("date").long("date").help("Defaults to now"))
                .arg(Arg::new("category").long("category").short('c'))
                .arg(Arg::new("tags").long("tags").help("Comma separated"))
                .arg(
                    Arg::new("body_file")
                        .long("body-file")
                        .help("Markdown file holding the body")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print the rendered HTML of a post")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("preview")
                .about("Open a post in the browser")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("publish")
                .about("Commit every change and push")
                .arg(Arg::new("message").long("message").short('m')),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<(Config, Paths)> {
    let root: &PathBuf = matches.get_one("root").context("root")?;
    if !root.is_dir() {
        bail!("root must be a directory.");
    }

    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| root.join(CONFIG_FILE));
    let mut config = Config::load(&config_path)?;
    if let Some(dir) = matches.get_one::<PathBuf>("posts_dir") {
        config.posts_dir = dir.clone();
    }
    if let Some(dir) = matches.get_one::<PathBuf>("assets_dir") {
        config.assets_dir = dir.clone();
    }

    let paths = Paths::new(root, &config);
    Ok((config, paths))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let (config, paths) = load_config(&matches)?;

    match matches.subcommand() {
        None | Some(("gui", _)) => app::run(config, paths)?,
        Some(("list", sub)) => {
            let filter = sub.get_one::<String>("filter").map_or("", String::as_str);
            commands::list(&paths, filter, sub.get_flag("json"), &mut std::io::stdout().lock())?;
        }
        Some(("new", sub)) => {
            let body = sub
                .get_one::<PathBuf>("body_file")
                .map(|f| std::fs::read_to_string(f).with_context(|| format!("{f:?}")))
                .transpose()?;
            let post = commands::NewPost {
                title: sub.get_one::<String>("title").map_or("", String::as_str),
                date: sub.get_one::<String>("date").map(String::as_str),
                category: sub.get_one::<String>("category").map(String::as_str),
                tags: sub.get_one::<String>("tags").map(String::as_str),
                body,
            };
            let path = commands::new_post(&config, &paths, post, Local::now().naive_local())?;
            println!("{}", path.display());
        }
        Some(("show", sub)) => {
            let file: &PathBuf = sub.get_one("file").context("file")?;
            commands::show(file, &mut std::io::stdout().lock())?;
        }
        Some(("preview", sub)) => {
            let file: &PathBuf = sub.get_one("file").context("file")?;
            let page = commands::preview(file)?;
            println!("{}", page.display());
        }
        Some(("publish", sub)) => {
            let message = sub.get_one::<String>("message").map(String::as_str);
            let commit = commands::publish(&paths, message)?;
            println!("Published {commit}");
        }
        Some((name, _)) => bail!("unknown command {name}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().to_str().unwrap();
        let matches = cli()
            .try_get_matches_from(["blogdesk", "--root", root, "--posts-dir", "content", "list"])
            .unwrap();
        let (config, paths) = load_config(&matches).unwrap();
        assert_eq!(config.posts_dir, PathBuf::from("content"));
        assert_eq!(paths.posts, dir.path().join("content"));
        assert_eq!(paths.assets, dir.path().join("assets/img"));
    }
}
