//! Error types for calendar storage.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The category of a storage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorCode {
    /// The backing file is missing.
    NotFound,
    /// Reading or writing the backing file failed.
    Io,
    /// The content is not a usable iCalendar document.
    InvalidData,
}

impl StorageErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Io => "io_error",
            Self::InvalidData => "invalid_data",
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while loading or saving a calendar.
#[derive(Debug, Error)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    /// The file involved, when there is one.
    path: Option<PathBuf>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    pub fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
            source: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::NotFound, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::Io, message)
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::InvalidData, message)
    }

    /// Wraps an I/O error, classifying a missing file as `NotFound`.
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        let code = if err.kind() == std::io::ErrorKind::NotFound {
            StorageErrorCode::NotFound
        } else {
            StorageErrorCode::Io
        };
        Self::new(code, err.to_string())
            .with_path(path)
            .with_source(err)
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: ", path.display())?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
