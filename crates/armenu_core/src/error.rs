//! Error types shared across the viewer

use thiserror::Error;

/// Failure to produce a decoded model for an asset path.
///
/// Cloneable because a single in-flight load is shared by every caller that
/// asked for the same key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Failed to fetch {path}: {reason}")]
    Fetch { path: String, reason: String },

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("{path} requires unsupported extension {extension}")]
    Unsupported { path: String, extension: String },

    #[error("Unknown asset key: {0}")]
    UnknownKey(String),
}

impl LoadError {
    pub fn fetch(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Path of the asset that failed, when known
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Fetch { path, .. } | Self::Decode { path, .. } | Self::Unsupported { path, .. } => {
                Some(path)
            }
            Self::UnknownKey(_) => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Camera feed errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera already requested for this page")]
    AlreadyRequested,

    #[error("Camera API not available: {0}")]
    NotAvailable(String),

    #[error("Camera permission denied or device busy: {0}")]
    Denied(String),
}

pub type LoadResult<T> = Result<T, LoadError>;
