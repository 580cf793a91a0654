//! Delegated credential check.

use async_trait::async_trait;

use crate::error::CacheResult;

/// Verifies credentials the cache cannot confirm on its own.
///
/// `login` is the user's stable external id when the user is known, or the
/// bind DN otherwise.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Returns true if the credentials are valid.
    async fn validate_password(&self, login: &str, password: &str) -> CacheResult<bool>;
}

/// A validator that rejects everything.
///
/// Useful for sites where only the admin account may bind.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

#[async_trait]
impl CredentialValidator for RejectAll {
    async fn validate_password(&self, _login: &str, _password: &str) -> CacheResult<bool> {
        Ok(false)
    }
}
