//! Shared error type across reqmetrics crates.

use thiserror::Error;

/// Stable error kinds (used in logs and by operators).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Response body did not match the result envelope.
    ExtractionFailed,
    /// Push to the external collector failed or timed out.
    ExportFailed,
    /// Two sinks share a name but disagree on kind, labels or buckets.
    SinkRegistrationConflict,
    /// Observation value rejected by the sink (negative delta, NaN).
    InvalidObservation,
    /// Label set does not match the sink's label schema.
    LabelMismatch,
    /// Invalid configuration.
    InvalidConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in structured logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ExtractionFailed => "EXTRACTION_FAILED",
            ErrorKind::ExportFailed => "EXPORT_FAILED",
            ErrorKind::SinkRegistrationConflict => "SINK_REGISTRATION_CONFLICT",
            ErrorKind::InvalidObservation => "INVALID_OBSERVATION",
            ErrorKind::LabelMismatch => "LABEL_MISMATCH",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("export failed: {0}")]
    ExportFailed(String),
    #[error("sink registration conflict: {0}")]
    SinkRegistrationConflict(String),
    #[error("invalid observation: {0}")]
    InvalidObservation(String),
    #[error("label mismatch: {0}")]
    LabelMismatch(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl MetricsError {
    /// Map the error to its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetricsError::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            MetricsError::ExportFailed(_) => ErrorKind::ExportFailed,
            MetricsError::SinkRegistrationConflict(_) => ErrorKind::SinkRegistrationConflict,
            MetricsError::InvalidObservation(_) => ErrorKind::InvalidObservation,
            MetricsError::LabelMismatch(_) => ErrorKind::LabelMismatch,
            MetricsError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            MetricsError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            MetricsError::Internal(_) => ErrorKind::Internal,
        }
    }
}
