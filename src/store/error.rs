//! Error types for the document store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`DocumentStore`](super::DocumentStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store directory could not be created or is not a directory.
    #[error("document store unavailable at {path}: {source}")]
    Unavailable {
        /// Store root that could not be prepared.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A file name that would escape the flat store layout.
    #[error("invalid document name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// Reading, writing or renaming a file failed.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Creates an `Unavailable` error for the store root.
    pub fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unavailable {
            path: path.into(),
            source,
        }
    }

    /// Creates an `InvalidName` error.
    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }

    /// Creates an IO error for a specific file.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_name_display_includes_reason() {
        let err = StoreError::invalid_name("../x.pdf", "contains a path separator");
        let msg = err.to_string();
        assert!(msg.contains("../x.pdf"));
        assert!(msg.contains("path separator"));
    }

    #[test]
    fn test_unavailable_display_includes_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StoreError::unavailable("/data/labels", io);
        assert!(err.to_string().contains("/data/labels"));
    }
}
