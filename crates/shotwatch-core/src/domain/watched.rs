//! The single directory observed for the process lifetime

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};

use super::errors::DomainError;

/// The absolute directory under observation
///
/// Immutable once constructed. Event paths are turned into index filenames by
/// stripping this root with [`WatchedDirectory::relative_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchedDirectory(PathBuf);

impl WatchedDirectory {
    /// Create a WatchedDirectory without touching the filesystem
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is empty, relative, or
    /// contains `.`/`..` components
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(DomainError::InvalidPath(
                "Watched directory cannot be empty".to_string(),
            ));
        }
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "Watched directory must be absolute: {}",
                path.display()
            )));
        }
        if path
            .components()
            .any(|c| matches!(c, Component::CurDir | Component::ParentDir))
        {
            return Err(DomainError::InvalidPath(format!(
                "Watched directory must be normalized: {}",
                path.display()
            )));
        }
        Ok(Self(path))
    }

    /// Create a WatchedDirectory for a directory that must already exist
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path fails [`Self::new`],
    /// does not exist, or is not a directory
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let dir = Self::new(path)?;
        let metadata = std::fs::metadata(&dir.0).map_err(|e| {
            DomainError::InvalidPath(format!("{}: {e}", dir.0.display()))
        })?;
        if !metadata.is_dir() {
            return Err(DomainError::InvalidPath(format!(
                "Not a directory: {}",
                dir.0.display()
            )));
        }
        Ok(dir)
    }

    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Derive the index filename for an event path
    ///
    /// `/watch/shot.png` under `/watch` yields `shot.png`. The comparison is
    /// component-wise, so `/watchers/a.png` is not under `/watch`.
    ///
    /// # Errors
    /// Returns `DomainError::PathNotInWatchedDirectory` if the path is not
    /// directly below the root, or `DomainError::InvalidPath` if the
    /// remainder is not valid UTF-8
    pub fn relative_name(&self, event_path: &Path) -> Result<String, DomainError> {
        let relative = event_path.strip_prefix(&self.0).map_err(|_| {
            DomainError::PathNotInWatchedDirectory(format!(
                "{} is not within {}",
                event_path.display(),
                self.0.display()
            ))
        })?;

        if relative.as_os_str().is_empty() {
            return Err(DomainError::PathNotInWatchedDirectory(format!(
                "{} is the watched directory itself",
                event_path.display()
            )));
        }
        if relative.components().count() > 1 {
            return Err(DomainError::PathNotInWatchedDirectory(format!(
                "{} is inside a subdirectory of {}",
                event_path.display(),
                self.0.display()
            )));
        }

        relative.to_str().map(str::to_string).ok_or_else(|| {
            DomainError::InvalidPath(format!(
                "Filename is not valid UTF-8: {}",
                relative.display()
            ))
        })
    }
}

impl Display for WatchedDirectory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for WatchedDirectory {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
