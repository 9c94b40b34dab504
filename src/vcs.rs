//! Publishing: status, staging and commits through `gix`, pushing through the `git` executable.

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use chrono::NaiveDateTime;
use gix::{
    bstr::{BString, ByteSlice},
    glob::wildmatch,
    index::{
        entry::{Flags, Mode, Stat},
        fs::Metadata,
        State,
    },
    objs::{tree, Tree},
    status::UntrackedFiles,
    ObjectId, ThreadSafeRepository,
};
use log::{debug, info, warn};

use crate::error::VcsError;

type Result<T> = std::result::Result<T, VcsError>;

pub(crate) fn default_commit_message(now: NaiveDateTime) -> String {
    format!("Updated blog post: {}", now.format("%Y-%m-%d %H:%M"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PublishOutcome {
    /// Abbreviated id of the new commit.
    pub commit: String,
}

#[derive(Clone)]
pub(crate) struct Repository {
    repo: ThreadSafeRepository,
    root: PathBuf,
}

impl Repository {
    /// Finds the work tree containing `dir`. `None` when there is none.
    pub fn discover(dir: &Path) -> Option<Self> {
        let dir = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let repo = match gix::discover(&dir) {
            Ok(repo) => repo,
            Err(e) => {
                info!("{dir:?} is not inside a Git repository: {e}");
                return None;
            }
        };
        if repo.is_bare() {
            warn!("{:?} is a bare repository", repo.path());
            return None;
        }

        let root = repo.path().parent()?.to_path_buf();
        info!("Git repository detected at {root:?}");
        Some(Self {
            repo: repo.into_sync(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Changes between HEAD, the index and the work tree. Untracked files count.
    pub fn is_dirty(&self) -> Result<bool> {
        let repo = self.repo.to_thread_local();
        let mut changes = repo
            .status(gix::progress::Discard)
            .map_err(VcsError::git)?
            .untracked_files(UntrackedFiles::Files)
            .into_iter(Vec::<BString>::new())
            .map_err(VcsError::git)?;
        Ok(changes.next().transpose().map_err(VcsError::git)?.is_some())
    }

    /// Rebuilds the index from the work tree, like `git add -A`, and returns the
    /// id of the matching tree.
    pub fn stage_all(&self) -> Result<ObjectId> {
        let repo = self.repo.to_thread_local();
        let mut stage = Stage {
            repo: &repo,
            root: &self.root,
            ignore: IgnoreRules::read(&self.root)?,
            index: State::new(repo.object_hash()),
        };
        let tree = stage.collect(&self.root)?;
        let tree_id = stage.write_tree(&tree)?;

        let mut index = stage.index;
        index.sort_entries();
        let mut file = gix::index::File::from_state(index, repo.index_path());
        file.write(gix::index::write::Options::default())
            .map_err(VcsError::git)?;
        debug!("staged tree {tree_id}");
        Ok(tree_id)
    }

    /// Stages everything and commits it on HEAD. Returns the abbreviated commit id.
    pub fn commit(&self, message: &str) -> Result<String> {
        if message.trim().is_empty() {
            return Err(VcsError::EmptyMessage);
        }
        let tree_id = self.stage_all()?;

        let repo = self.repo.to_thread_local();
        // unborn HEAD gives a root commit
        let parent = repo.head_id().ok().map(|id| id.detach());
        let id = repo
            .commit("HEAD", message, tree_id, parent)
            .map_err(VcsError::git)?;
        Ok(id.shorten_or_id().to_string())
    }

    fn git(&self, args: &[&str]) -> Command {
        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(&self.root)
            // credential prompts would hang the window
            .env("GIT_TERMINAL_PROMPT", "0");
        command
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        debug!("git {}", args.join(" "));
        let output = self
            .git(args)
            .output()
            .map_err(|e| VcsError::Command {
                command: args.join(" "),
                stderr: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(VcsError::Command {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Pushes the current branch, creating the upstream on `origin` the first time.
    pub fn push(&self) -> Result<()> {
        let has_upstream = self
            .run(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{upstream}"])
            .is_ok();
        let args: &[&str] = if has_upstream {
            &["push"]
        } else {
            &["push", "--set-upstream", "origin", "HEAD"]
        };
        self.run(args).map(|_| ()).map_err(|e| match e {
            VcsError::Command { stderr, .. } => VcsError::Push(stderr),
            e => e,
        })
    }

    /// Stage everything, commit and push.
    pub fn publish(&self, message: &str) -> Result<PublishOutcome> {
        if message.trim().is_empty() {
            return Err(VcsError::EmptyMessage);
        }
        if !self.is_dirty()? {
            return Err(VcsError::NothingToCommit);
        }

        let commit = self.commit(message)?;
        info!("Committed {commit}");
        self.push()?;
        info!("Pushed {commit}");
        Ok(PublishOutcome { commit })
    }
}

/// Index and tree objects built from one walk of the work tree.
struct Stage<'a> {
    repo: &'a gix::Repository,
    root: &'a Path,
    ignore: IgnoreRules,
    index: State,
}

impl Stage<'_> {
    fn collect(&mut self, dir: &Path) -> Result<Tree> {
        let read = |e: std::io::Error| VcsError::git(format!("{}: {e}", dir.display()));
        let mut entries = Vec::new();

        for entry in fs::read_dir(dir).map_err(read)? {
            let entry = entry.map_err(read)?;
            let path = entry.path();
            let Ok(name) = entry.file_name().into_string() else {
                warn!("Skipping {path:?}: file name is not UTF-8");
                continue;
            };
            let rel = self.relative(&path);
            let file_type = entry.file_type().map_err(read)?;
            if name == ".git" || self.ignore.matches(&rel, file_type.is_dir()) {
                continue;
            }

            if file_type.is_dir() {
                let sub_tree = self.collect(&path)?;
                // git has no empty directories
                if sub_tree.entries.is_empty() {
                    continue;
                }
                entries.push(tree::Entry {
                    mode: tree::EntryKind::Tree.into(),
                    oid: self.write_tree(&sub_tree)?,
                    filename: name.into(),
                });
            } else if file_type.is_file() {
                let (oid, kind) = self.add_file(&path, &rel)?;
                entries.push(tree::Entry {
                    mode: kind.into(),
                    oid,
                    filename: name.into(),
                });
            }
        }

        sort_tree_entries(&mut entries);
        Ok(Tree { entries })
    }

    fn add_file(&mut self, path: &Path, rel: &str) -> Result<(ObjectId, tree::EntryKind)> {
        let fail = |e: &dyn std::fmt::Display| VcsError::git(format!("{}: {e}", path.display()));
        let contents = fs::read(path).map_err(|e| fail(&e))?;
        let oid = self
            .repo
            .write_blob(contents)
            .map_err(|e| fail(&e))?
            .detach();

        let metadata = Metadata::from_path_no_follow(path).map_err(|e| fail(&e))?;
        let stat = Stat::from_fs(&metadata).map_err(|e| fail(&e))?;
        let (mode, kind) = if is_executable(path) {
            (Mode::FILE_EXECUTABLE, tree::EntryKind::BlobExecutable)
        } else {
            (Mode::FILE, tree::EntryKind::Blob)
        };
        self.index
            .dangerously_push_entry(stat, oid, Flags::empty(), mode, rel.into());
        Ok((oid, kind))
    }

    fn write_tree(&self, tree: &Tree) -> Result<ObjectId> {
        Ok(self
            .repo
            .write_object(tree)
            .map_err(VcsError::git)?
            .detach())
    }

    /// Work-tree relative path with `/` separators, as stored in the index.
    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_: &Path) -> bool {
    false
}

/// Git orders tree entries by name, comparing directories as if they ended with `/`.
fn sort_tree_entries(entries: &mut [tree::Entry]) {
    let tree_mode: tree::EntryMode = tree::EntryKind::Tree.into();
    entries.sort_by_cached_key(|e| {
        let mut key = e.filename.as_slice().to_vec();
        if e.mode == tree_mode {
            key.push(b'/');
        }
        key
    });
}

// Bits of `gix::ignore::search::pattern::Mode`
const NO_SUB_DIR: u32 = 1 << 0;
const MUST_BE_DIR: u32 = 1 << 2;
const NEGATIVE: u32 = 1 << 3;
const ABSOLUTE: u32 = 1 << 4;

/// Patterns of the root `.gitignore`. The last matching pattern decides.
struct IgnoreRules {
    patterns: Vec<(BString, u32)>,
}

impl IgnoreRules {
    fn read(root: &Path) -> Result<Self> {
        let path = root.join(".gitignore");
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(VcsError::git(format!("{}: {e}", path.display()))),
        };
        Ok(Self::parse(&bytes))
    }

    fn parse(bytes: &[u8]) -> Self {
        let patterns = gix::ignore::parse(bytes)
            .map(|(pattern, _, _)| (pattern.text, pattern.mode.bits()))
            .collect();
        Self { patterns }
    }

    fn matches(&self, rel: &str, is_dir: bool) -> bool {
        let mut ignored = false;
        for (text, mode) in &self.patterns {
            if mode & MUST_BE_DIR != 0 && !is_dir {
                continue;
            }
            // patterns without a slash match the file name at any depth
            let subject = if mode & NO_SUB_DIR != 0 && mode & ABSOLUTE == 0 {
                rel.rsplit_once('/').map_or(rel, |(_, name)| name)
            } else {
                rel
            };
            if wildmatch(
                text.as_bstr(),
                subject.into(),
                wildmatch::Mode::NO_MATCH_SLASH_LITERAL,
            ) {
                ignored = mode & NEGATIVE == 0;
            }
        }
        ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn run(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(output.status.success(), "git {args:?} failed");
        String::from_utf8(output.stdout).unwrap()
    }

    fn init_repo(dir: &Path) -> Repository {
        gix::init(dir).unwrap();
        let config = dir.join(".git/config");
        let mut text = fs::read_to_string(&config).unwrap();
        text.push_str("[user]\n\tname = Test\n\temail = test@example.com\n");
        fs::write(&config, text).unwrap();
        Repository::discover(dir).expect("repository")
    }

    #[test]
    fn test_default_commit_message() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        assert_eq!(default_commit_message(now), "Updated blog post: 2024-03-01 14:05");
    }

    #[test]
    fn test_discover_outside_repository() {
        let dir = TempDir::new().unwrap();
        assert!(Repository::discover(dir.path()).is_none());
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        fs::create_dir_all(dir.path().join("_posts")).unwrap();

        let repo = Repository::discover(&dir.path().join("_posts")).unwrap();
        assert_eq!(repo.root(), fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_publish_clean_tree_is_nothing_to_commit() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        assert!(!repo.is_dirty().unwrap());
        assert!(matches!(
            repo.publish("msg"),
            Err(VcsError::NothingToCommit)
        ));
    }

    #[test]
    fn test_publish_rejects_empty_message() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        fs::write(dir.path().join("a.md"), "a").unwrap();
        assert!(matches!(repo.publish("  "), Err(VcsError::EmptyMessage)));
        assert!(matches!(repo.commit(""), Err(VcsError::EmptyMessage)));
    }

    #[test]
    fn test_commit_stages_nested_files() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        fs::create_dir_all(dir.path().join("_posts")).unwrap();
        fs::create_dir_all(dir.path().join("drafts")).unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::write(dir.path().join(".gitignore"), "drafts/\n*.log\n").unwrap();
        fs::write(dir.path().join("_posts/2024-03-01-hello.md"), "hello").unwrap();
        fs::write(dir.path().join("drafts/wip.md"), "wip").unwrap();
        fs::write(dir.path().join("build.log"), "noise").unwrap();
        assert!(repo.is_dirty().unwrap());

        let commit = repo.commit("Add hello").unwrap();
        assert!(!commit.is_empty());
        assert!(!repo.is_dirty().unwrap());

        let local = repo.repo.to_thread_local();
        let mut head = local.head().unwrap();
        let head_commit = head.peel_to_commit_in_place().unwrap();
        assert_eq!(
            head_commit.message().unwrap().summary().to_string(),
            "Add hello"
        );

        if git_available() {
            let files = run(dir.path(), &["ls-files"]);
            assert_eq!(files, ".gitignore\n_posts/2024-03-01-hello.md\n");
            assert_eq!(run(dir.path(), &["status", "--porcelain"]), "");
        }
    }

    #[test]
    fn test_commit_records_deletions() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        repo.commit("Add two").unwrap();

        fs::remove_file(dir.path().join("a.md")).unwrap();
        assert!(repo.is_dirty().unwrap());
        repo.commit("Remove one").unwrap();
        assert!(!repo.is_dirty().unwrap());

        let local = repo.repo.to_thread_local();
        let mut head = local.head().unwrap();
        let head_commit = head.peel_to_commit_in_place().unwrap();
        assert_eq!(head_commit.parent_ids().count(), 1);
    }

    #[test]
    fn test_publish_commits_and_pushes() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let remote = dir.path().join("remote.git");
        let work = dir.path().join("site");
        fs::create_dir_all(&remote).unwrap();
        fs::create_dir_all(work.join("_posts")).unwrap();
        run(&remote, &["init", "-q", "--bare"]);

        let repo = init_repo(&work);
        run(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
        fs::write(work.join("_posts/2024-03-01-hello.md"), "---\ntitle: x\n---\n").unwrap();

        let outcome = repo.publish("Add hello").unwrap();
        assert!(!outcome.commit.is_empty());
        assert!(!repo.is_dirty().unwrap());

        // second publish goes through the configured upstream
        fs::write(work.join("_posts/2024-03-02-again.md"), "body").unwrap();
        let again = repo.publish("Add again").unwrap();
        let pushed = run(&remote, &["rev-parse", "--short", "HEAD"]);
        assert!(pushed.trim().starts_with(&again.commit) || again.commit.starts_with(pushed.trim()));
    }

    #[test]
    fn test_push_failure_is_reported_after_commit() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        fs::write(dir.path().join("a.md"), "a").unwrap();

        assert!(matches!(repo.publish("no remote"), Err(VcsError::Push(_))));
        assert!(!repo.is_dirty().unwrap());
    }

    #[test]
    fn test_git_commands_never_prompt() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        let command = repo.git(&["push"]);
        let prompt = command
            .get_envs()
            .find(|(key, _)| key.to_str() == Some("GIT_TERMINAL_PROMPT"))
            .and_then(|(_, value)| value);
        assert_eq!(prompt, Some(std::ffi::OsStr::new("0")));
    }

    #[test]
    fn test_ignore_rules() {
        let rules = IgnoreRules::parse(b"*.log\n!keep.log\n_site/\n/CNAME.bak\n");
        assert!(rules.matches("error.log", false));
        assert!(rules.matches("_posts/error.log", false));
        assert!(!rules.matches("keep.log", false));
        assert!(rules.matches("_site", true));
        assert!(!rules.matches("_site", false));
        assert!(rules.matches("CNAME.bak", false));
        assert!(!rules.matches("assets/CNAME.bak", false));
        assert!(!rules.matches("_posts/2024-01-01-a.md", false));
    }

    #[test]
    fn test_tree_entries_sort_like_git() {
        let null = ObjectId::null(gix::hash::Kind::Sha1);
        let mut entries = vec![
            tree::Entry { mode: tree::EntryKind::Blob.into(), filename: "foo.md".into(), oid: null },
            tree::Entry { mode: tree::EntryKind::Tree.into(), filename: "foo".into(), oid: null },
            tree::Entry { mode: tree::EntryKind::Blob.into(), filename: "foo-bar".into(), oid: null },
        ];
        sort_tree_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.filename.to_string()).collect();
        assert_eq!(names, ["foo-bar", "foo.md", "foo"]);
    }
}
