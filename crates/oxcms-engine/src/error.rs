//! Error types for the pipeline engine
//!
//! Construction failures are both returned as [`Error`] and reported through
//! an [`ErrorSink`] owned by the [`Context`](crate::Context). Per-pixel
//! evaluation never fails and has no error path.

use std::fmt;
use std::sync::Mutex;

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error category, independent of the message carried with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Value or table size out of the allowed bounds
    Range,
    /// Incompatible connection space between chained profiles
    ColorspaceCheck,
    /// Unrecognized parametric curve type or intent code
    UnknownExtension,
    /// Invariant violation such as a bad channel count
    Internal,
    /// Degenerate matrix or non-invertible chromatic adaptation
    NotSuitable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Range => "range",
            Self::ColorspaceCheck => "colorspace check",
            Self::UnknownExtension => "unknown extension",
            Self::Internal => "internal",
            Self::NotSuitable => "not suitable",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while building curves, stages and pipelines
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Value out of range
    #[error("Range error: {0}")]
    Range(String),

    /// Colorspace mismatch between chained profiles
    #[error("Colorspace mismatch: {0}")]
    ColorspaceCheck(String),

    /// Unknown curve family or intent
    #[error("Unknown extension: {0}")]
    UnknownExtension(String),

    /// Internal invariant violated
    #[error("Internal error: {0}")]
    Internal(String),

    /// Degenerate data
    #[error("Not suitable: {0}")]
    NotSuitable(String),

    /// Buffer size mismatch
    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSize { expected: usize, actual: usize },
}

impl Error {
    /// Build an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Range => Self::Range(message),
            ErrorKind::ColorspaceCheck => Self::ColorspaceCheck(message),
            ErrorKind::UnknownExtension => Self::UnknownExtension(message),
            ErrorKind::Internal => Self::Internal(message),
            ErrorKind::NotSuitable => Self::NotSuitable(message),
        }
    }

    /// The category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Range(_) | Self::BufferSize { .. } => ErrorKind::Range,
            Self::ColorspaceCheck(_) => ErrorKind::ColorspaceCheck,
            Self::UnknownExtension(_) => ErrorKind::UnknownExtension,
            Self::Internal(_) => ErrorKind::Internal,
            Self::NotSuitable(_) => ErrorKind::NotSuitable,
        }
    }
}

/// Destination for construction-time error reports
pub trait ErrorSink: Send + Sync {
    fn log_error(&self, kind: ErrorKind, message: &str);
}

/// Forwards reports to `tracing` at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn log_error(&self, kind: ErrorKind, message: &str) {
        tracing::error!(kind = %kind, "{message}");
    }
}

/// Keeps every report in memory, mostly useful for assertions in tests
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<(ErrorKind, String)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn entries(&self) -> Vec<(ErrorKind, String)> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.entries().iter().any(|(k, _)| *k == kind)
    }
}

impl ErrorSink for CollectingSink {
    fn log_error(&self, kind: ErrorKind, message: &str) {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((kind, message.to_string()));
    }
}
