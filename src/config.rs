use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use log::info;
use serde::Deserialize;

pub(crate) const CONFIG_FILE: &str = "blogdesk.json";

/// Settings read from `blogdesk.json` in the site root. Every field is optional.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub posts_dir: PathBuf,
    pub assets_dir: PathBuf,
    /// URL under which `assets_dir` is served.
    pub asset_url_prefix: String,
    pub default_category: String,
    pub preview_delay_ms: u64,
    pub auto_preview: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            posts_dir: PathBuf::from("_posts"),
            assets_dir: PathBuf::from("assets/img"),
            asset_url_prefix: "/assets/img".to_string(),
            default_category: "blog".to_string(),
            preview_delay_ms: 1000,
            auto_preview: true,
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            info!("Config file({config_path:?}) does not exist. using defaults...");
            return Ok(Self::default());
        }
        let fd = File::open(config_path).with_context(|| format!("{config_path:?}"))?;
        let reader = BufReader::new(fd);
        serde_json::from_reader(reader).with_context(|| format!("while parsing {config_path:?}"))
    }

    pub fn preview_delay(&self) -> Duration {
        Duration::from_millis(self.preview_delay_ms)
    }
}

/// Resolved locations inside the site root.
#[derive(Debug, Clone)]
pub(crate) struct Paths {
    pub root: PathBuf,
    pub posts: PathBuf,
    pub assets: PathBuf,
}

impl Paths {
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            root: root.to_path_buf(),
            posts: root.join(&config.posts_dir),
            assets: root.join(&config.assets_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.preview_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "posts_dir": "content/posts", "preview_delay_ms": 250 }"#)
            .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.posts_dir, PathBuf::from("content/posts"));
        assert_eq!(config.preview_delay_ms, 250);
        assert_eq!(config.default_category, "blog");

        let paths = Paths::new(dir.path(), &config);
        assert_eq!(paths.posts, dir.path().join("content/posts"));
        assert_eq!(paths.assets, dir.path().join("assets/img"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "post_dir": "typo" }"#).unwrap();
        assert!(Config::load(&path).is_err());
    }
}
