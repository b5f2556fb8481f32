//! Error handling for cocoon_log
//!
//! This module provides the error type and result alias shared by sessions,
//! the registry, volume backends and the index reader.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in cocoon_log operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid session name, rotation parameter or option combination
    #[error("Configuration error: {0}")]
    Config(String),

    /// A live session with this name is already registered
    #[error("Session \"{0}\" already exists")]
    SessionExists(String),

    /// Errors related to I/O operations without a known path
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An OS-level failure on a specific file or directory
    #[error("I/O error on {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The startup scan could not establish the next volume number
    #[error("Recovery error for {path:?}: {message}")]
    Recovery {
        path: PathBuf,
        message: String,
    },

    /// Errors related to the side index
    #[error("Index error: {0}")]
    Index(String),

    /// Errors related to compression streams
    #[error("Compression error: {0}")]
    Compression(String),

    /// Generic error type for other cases
    #[error("{0}")]
    Other(String),
}

/// Result type for cocoon_log operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new duplicate-session error
    pub fn session_exists(name: impl Into<String>) -> Self {
        Self::SessionExists(name.into())
    }

    /// Attach a path to an OS error
    pub fn file(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::File {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a new recovery error
    pub fn recovery(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Recovery {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new index error
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    /// Create a new compression error
    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression(message.into())
    }

    /// Create a new generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Check if this is a configuration error (duplicate names included)
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::SessionExists(_))
    }

    /// Check if this is an I/O error, with or without a path
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::File { .. })
    }

    /// Check if this is a recovery error
    pub fn is_recovery_error(&self) -> bool {
        matches!(self, Self::Recovery { .. })
    }

    /// The path involved in the failure, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } | Self::Recovery { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The raw OS error code, if the failure came from the OS
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io(err) | Self::File { source: err, .. } => err.raw_os_error(),
            _ => None,
        }
    }

    /// Get a user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::SessionExists(_) => {
                Some("Drop every handle to the existing session before reusing its name".to_string())
            }
            Self::File { source, .. } | Self::Io(source) if source.kind() == io::ErrorKind::NotFound => {
                Some("The specified file or directory does not exist".to_string())
            }
            Self::File { source, .. } | Self::Io(source) if source.kind() == io::ErrorKind::PermissionDenied => {
                Some("Verify permissions on the log root directory".to_string())
            }
            Self::File { source, .. } if source.kind() == io::ErrorKind::AlreadyExists => {
                Some("Another writer owns this volume; check for a second process using the same root".to_string())
            }
            Self::Recovery { .. } => Some("Inspect the session directory for unreadable entries".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("session name can't be a full path");
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_config_error());

        let err = Error::session_exists("a");
        assert_eq!(err.to_string(), "Session \"a\" already exists");
        assert!(err.is_config_error());

        let err = Error::recovery("/logs", "cannot list directory");
        assert!(err.is_recovery_error());
        assert_eq!(err.path(), Some(Path::new("/logs")));
    }

    #[test]
    fn test_file_error_carries_path_and_code() {
        let io_err = io::Error::from_raw_os_error(2);
        let err = Error::file("/logs/a-00000-x.active", io_err);

        assert!(err.is_io_error());
        assert_eq!(err.path(), Some(Path::new("/logs/a-00000-x.active")));
        assert_eq!(err.raw_os_error(), Some(2));
        assert!(err.to_string().contains("a-00000-x.active"));
        assert!(err.suggestion().unwrap().contains("does not exist"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
        assert!(err.path().is_none());
        assert!(err.suggestion().unwrap().contains("permissions"));
    }
}
