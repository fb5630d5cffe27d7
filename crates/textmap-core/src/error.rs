use std::fmt;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TextmapError {
    #[error("invalid input path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("invalid page range: {0}")]
    PageRange(String),

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("overlap threshold must be a finite number >= 0, got {0}")]
    InvalidThreshold(f64),

    #[error("failed to read PDF {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("poppler tool '{tool}' not found, install poppler-utils (or `brew install poppler`)")]
    PopplerNotFound { tool: &'static str },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    PopplerFailed {
        tool: &'static str,
        code: i32,
        stderr: String,
    },

    #[error("failed to decrypt PDF: {0}")]
    Decryption(String),

    #[error("failed to annotate PDF {path}: {reason}")]
    Annotation { path: PathBuf, reason: String },

    #[error("failed to write export file {path}: {reason}")]
    ExportWrite { path: PathBuf, reason: String },

    #[error("unsupported overlap strategy '{0}'")]
    UnsupportedStrategy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`TextmapError`], printed by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Read,
    Decryption,
    Annotation,
    ExportWrite,
    UnsupportedStrategy,
}

impl TextmapError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TextmapError::InvalidPath { .. }
            | TextmapError::PageRange(_)
            | TextmapError::InvalidRegion(_)
            | TextmapError::InvalidThreshold(_) => ErrorCategory::Validation,
            TextmapError::Read { .. }
            | TextmapError::PopplerNotFound { .. }
            | TextmapError::PopplerFailed { .. }
            | TextmapError::Io(_)
            | TextmapError::Json(_) => ErrorCategory::Read,
            TextmapError::Decryption(_) => ErrorCategory::Decryption,
            TextmapError::Annotation { .. } => ErrorCategory::Annotation,
            TextmapError::ExportWrite { .. } => ErrorCategory::ExportWrite,
            TextmapError::UnsupportedStrategy(_) => ErrorCategory::UnsupportedStrategy,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "ValidationError"),
            ErrorCategory::Read => write!(f, "ReadError"),
            ErrorCategory::Decryption => write!(f, "DecryptionError"),
            ErrorCategory::Annotation => write!(f, "AnnotationError"),
            ErrorCategory::ExportWrite => write!(f, "ExportWriteError"),
            ErrorCategory::UnsupportedStrategy => write!(f, "UnsupportedStrategyError"),
        }
    }
}
