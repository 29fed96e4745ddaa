use std::path::PathBuf;
use thiserror::Error;

/// Reasons a `chdir` can be refused. None of them mutate history or listing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Access denied: {}", .0.display())]
    AccessDenied(PathBuf),
}

impl NavigationError {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::NotFound(path) | Self::NotADirectory(path) | Self::AccessDenied(path) => path,
        }
    }

    /// Fluent message id used when presenting this error.
    pub fn message_id(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "error-not-found",
            Self::NotADirectory(_) => "error-not-a-directory",
            Self::AccessDenied(_) => "error-access-denied",
        }
    }
}

/// A path field value that cannot be resolved to a destination.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct InvalidPath {
    pub reason: String,
}

impl InvalidPath {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}
