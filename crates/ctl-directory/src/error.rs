//! Transform error types.

use thiserror::Error;

/// Errors raised while converting upstream records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// A record is missing data every entry needs, usually its id.
    #[error("Data format error in {kind}: {message}")]
    DataFormat {
        /// Kind of record that failed, e.g. `"person"`.
        kind: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

impl TransformError {
    /// Creates a data format error.
    #[must_use]
    pub fn data_format(kind: &'static str, message: impl Into<String>) -> Self {
        Self::DataFormat {
            kind,
            message: message.into(),
        }
    }

    /// Checks if this is a data format error.
    #[must_use]
    pub const fn is_data_format(&self) -> bool {
        matches!(self, Self::DataFormat { .. })
    }

    /// Kind of record the error refers to.
    #[must_use]
    pub const fn record_kind(&self) -> &'static str {
        match self {
            Self::DataFormat { kind, .. } => kind,
        }
    }
}

/// Result type for transform operations.
pub type TransformResult<T> = Result<T, TransformError>;
