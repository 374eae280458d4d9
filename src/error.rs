//! Error types for Javelin
//!
//! All modules use `JavelinResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Javelin operations
pub type JavelinResult<T> = Result<T, JavelinError>;

/// All errors that can occur in Javelin
#[derive(Error, Debug)]
pub enum JavelinError {
    // Manifest errors
    #[error("No javelin.toml found in {0}. Create one to declare dependencies.")]
    ManifestNotFound(PathBuf),

    #[error("Invalid manifest at {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Invalid coordinate '{input}': expected {expected}")]
    CoordinateInvalid { input: String, expected: &'static str },

    #[error("Dependency not declared in manifest: {0}")]
    DependencyNotDeclared(String),

    #[error("Dependency already declared in manifest: {0}")]
    DependencyExists(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create directory {path}: {source}")]
    DirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Registry errors
    #[error("Artifact not found in any repository: {coordinate} (tried {repositories})")]
    ArtifactNotFound {
        coordinate: String,
        repositories: String,
    },

    #[error("Network error fetching {url} after {attempts} attempt(s): {reason}")]
    Network {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Malformed metadata for {coordinate}: {reason}")]
    MetadataInvalid { coordinate: String, reason: String },

    // Resolution errors
    #[error("Cannot resolve {identity}: no version declared or managed (required via {chain})")]
    Resolution { identity: String, chain: String },

    #[error("Dependency cycle detected: {chain}")]
    Cycle { chain: String },

    // Cache and download errors
    #[error("Checksum mismatch for {coordinate}: expected {expected}, got {actual}")]
    Integrity {
        coordinate: String,
        expected: String,
        actual: String,
    },

    #[error("Corrupt lock file at {path}: {reason}")]
    LockInvalid { path: PathBuf, reason: String },

    // Install errors
    #[error("Install cancelled")]
    Interrupted,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl JavelinError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a single failed request
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            attempts: 1,
            reason: reason.into(),
        }
    }

    /// Check if error is worth retrying. Transient network failures only;
    /// not-found and integrity failures are permanent by policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ManifestNotFound(_) => Some("Run in a directory containing javelin.toml"),
            Self::ArtifactNotFound { .. } => {
                Some("Check the coordinate spelling and your [repositories] section")
            }
            Self::Integrity { .. } => {
                Some("Delete the lock file and re-run install if the artifact was republished")
            }
            Self::Network { .. } => Some("Check your network connection and repository URLs"),
            _ => None,
        }
    }
}
