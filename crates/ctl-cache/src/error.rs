//! Cache error types.

use std::fmt;

/// Directory cache errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// No directory is registered for the site.
    SiteNotFound(String),
    /// The delegated credential check could not complete.
    Validator(String),
}

impl CacheError {
    /// Creates a validator error.
    #[must_use]
    pub fn validator(msg: impl Into<String>) -> Self {
        Self::Validator(msg.into())
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SiteNotFound(site) => write!(f, "no directory for site: {site}"),
            Self::Validator(msg) => write!(f, "credential validator error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
