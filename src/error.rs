use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Taxonomy class of a [`ConvertError`], as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    UnsupportedConversion,
    ConfigurationMissing,
    BackendUnavailable,
    ConversionFailed,
    MoveFailed,
    Io,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unsupported conversion {from} -> {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("backend configuration missing ({}): {reason}", .path.display())]
    ConfigurationMissing { path: PathBuf, reason: String },

    #[error("backend {backend} unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("{backend} conversion failed: {detail}")]
    ConversionFailed { backend: String, detail: String },

    #[error("{backend} did not produce expected file: {}", .expected.display())]
    BackendProducedNoOutput { backend: String, expected: PathBuf },

    #[error("failed to move {} -> {}: {source}", .from.display(), .to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,
            ConvertError::ConfigurationMissing { .. } => ErrorKind::ConfigurationMissing,
            ConvertError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            ConvertError::ConversionFailed { .. }
            | ConvertError::BackendProducedNoOutput { .. } => ErrorKind::ConversionFailed,
            ConvertError::MoveFailed { .. } => ErrorKind::MoveFailed,
            ConvertError::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        ConvertError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn failed(backend: &str, detail: impl Into<String>) -> Self {
        ConvertError::ConversionFailed {
            backend: backend.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn unavailable(backend: &str, reason: impl Into<String>) -> Self {
        ConvertError::BackendUnavailable {
            backend: backend.to_string(),
            reason: reason.into(),
        }
    }
}
