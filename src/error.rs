//! Error types for nix-cachefs
//!
//! All modules use `CacheFsResult<T>` as their return type.

use crate::transport::TransportError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nix-cachefs operations
pub type CacheFsResult<T> = Result<T, CacheFsError>;

/// A single failed attempt against one mirror
#[derive(Debug)]
pub struct MirrorAttempt {
    /// Base URL of the mirror that was tried
    pub mirror: String,
    /// Why the attempt failed
    pub error: CacheFsError,
}

/// Per-mirror failures accumulated while walking the mirror list
#[derive(Debug, Default)]
pub struct MirrorErrors(Vec<MirrorAttempt>);

impl MirrorErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a failed attempt
    pub fn push(&mut self, mirror: impl Into<String>, error: CacheFsError) {
        self.0.push(MirrorAttempt {
            mirror: mirror.into(),
            error,
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MirrorAttempt> {
        self.0.iter()
    }
}

impl fmt::Display for MirrorErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no mirrors attempted");
        }
        for (idx, attempt) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", attempt.mirror, attempt.error)?;
        }
        Ok(())
    }
}

/// All errors that can occur in nix-cachefs
#[derive(Error, Debug)]
pub enum CacheFsError {
    // Path errors
    #[error("Invalid path: {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    // Remote cache errors
    #[error("No mirror provided metadata for {key}: {attempts}")]
    MetadataNotFound { key: String, attempts: MirrorErrors },

    #[error("No mirror delivered the archive for {store_path}: {attempts}")]
    TransferFailed {
        store_path: String,
        attempts: MirrorErrors,
    },

    #[error("Malformed metadata: {reason}")]
    Metadata { reason: String },

    #[error("Malformed archive: {reason}")]
    Archive { reason: String },

    #[error(transparent)]
    Transport(TransportError),

    // Access errors
    #[error("Operation not permitted: {op} {path}")]
    PermissionDenied { op: &'static str, path: String },

    #[error("Operation not supported: {op} on {path}")]
    UnsupportedOperation { op: &'static str, path: String },

    // Local storage errors
    #[error("Local storage error: {context}")]
    LocalStorage {
        context: String,
        #[source]
        source: io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid credentials in {origin}: {reason}")]
    Credentials { origin: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CacheFsError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a local storage error with context
    pub fn local_storage(context: impl Into<String>, source: io::Error) -> Self {
        Self::LocalStorage {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn archive(reason: impl Into<String>) -> Self {
        Self::Archive {
            reason: reason.into(),
        }
    }

    pub fn credentials(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Credentials {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn metadata(reason: impl Into<String>) -> Self {
        Self::Metadata {
            reason: reason.into(),
        }
    }

    /// Check if a failure against one mirror should move on to the next one.
    ///
    /// Local resource failures are never retried against another mirror.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Metadata { .. } | Self::Archive { .. } => true,
            // decompression and body read failures surface as plain IO errors
            Self::Io { .. } => true,
            _ => false,
        }
    }

    /// Map to the closest `std::io::ErrorKind`
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::InvalidPath { .. } => io::ErrorKind::InvalidInput,
            Self::NotFound(_) | Self::MetadataNotFound { .. } => io::ErrorKind::NotFound,
            Self::NotADirectory(_) => io::ErrorKind::NotADirectory,
            Self::PermissionDenied { .. } => io::ErrorKind::PermissionDenied,
            Self::UnsupportedOperation { .. } => io::ErrorKind::Unsupported,
            Self::Metadata { .. } | Self::Archive { .. } => io::ErrorKind::InvalidData,
            Self::LocalStorage { source, .. } | Self::Io { source, .. } => source.kind(),
            _ => io::ErrorKind::Other,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidPath { .. } => {
                Some("Paths look like <store-dir>/<hash>-<name>[/sub/path], e.g. /nix/store/abc...-hello")
            }
            Self::MetadataNotFound { .. } => {
                Some("Check the store path exists on one of the configured mirrors")
            }
            Self::TransferFailed { .. } => {
                Some("Mirrors may be unreachable; configure a timeout and retry")
            }
            Self::PermissionDenied { .. } => Some("The binary cache filesystem is read-only"),
            Self::LocalStorage { .. } => Some("Check free space in the temporary directory"),
            Self::Credentials { .. } => {
                Some("netrc entries look like: machine <host> login <user> password <secret>")
            }
            _ => None,
        }
    }
}

impl From<TransportError> for CacheFsError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::LocalStorage { context, source } => {
                Self::LocalStorage { context, source }
            }
            other => Self::Transport(other),
        }
    }
}

impl From<CacheFsError> for io::Error {
    fn from(err: CacheFsError) -> Self {
        match err {
            CacheFsError::Io { source, .. } => source,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CacheFsError::NotADirectory("lib/libfoo.so".to_string());
        assert!(err.to_string().contains("Not a directory"));
    }

    #[test]
    fn error_hint() {
        let err = CacheFsError::PermissionDenied {
            op: "mkdir",
            path: "/nix/store/x".to_string(),
        };
        assert_eq!(err.hint(), Some("The binary cache filesystem is read-only"));
    }

    #[test]
    fn error_retryable() {
        assert!(CacheFsError::metadata("missing URL").is_retryable());
        assert!(!CacheFsError::local_storage("tmp", io::Error::other("full")).is_retryable());
        assert!(!CacheFsError::invalid_path("/nix/store", "too short").is_retryable());
        assert!(!CacheFsError::credentials("~/.netrc", "bad token").is_retryable());
    }

    #[test]
    fn io_kind_mapping() {
        let err = CacheFsError::UnsupportedOperation {
            op: "seek",
            path: "lib".to_string(),
        };
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::Unsupported);

        let err = CacheFsError::PermissionDenied {
            op: "write",
            path: "bin/hello".to_string(),
        };
        assert_eq!(err.io_kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn mirror_errors_join_causes() {
        let mut errors = MirrorErrors::new();
        errors.push("https://a.example/", CacheFsError::metadata("no URL field"));
        errors.push("https://b.example/", CacheFsError::NotFound("x".into()));
        let text = errors.to_string();
        assert!(text.contains("https://a.example/: Malformed metadata: no URL field"));
        assert!(text.contains("; https://b.example/"));
        assert_eq!(errors.len(), 2);
    }
}
