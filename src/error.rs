use std::{fmt::Display, io, path::PathBuf};

use thiserror::Error;

/// Failures surfaced to the user by editor operations.
///
/// Malformed front matter is never an error; the codec degrades to "whole text is body".
#[derive(Error, Debug)]
pub(crate) enum EditorError {
    #[error("{0}")]
    Validation(String),

    #[error("{action} {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error(transparent)]
    Vcs(#[from] VcsError),
}

#[derive(Error, Debug)]
pub(crate) enum VcsError {
    #[error("No Git repository found")]
    NoRepository,

    #[error("No changes to publish")]
    NothingToCommit,

    #[error("Commit message cannot be empty")]
    EmptyMessage,

    #[error("Git: {0}")]
    Git(String),

    #[error("`git {command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("Failed to push: {0}")]
    Push(String),
}

impl VcsError {
    pub fn git(cause: impl Display) -> Self {
        Self::Git(cause.to_string())
    }
}

pub(crate) type Result<T> = std::result::Result<T, EditorError>;

impl EditorError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
