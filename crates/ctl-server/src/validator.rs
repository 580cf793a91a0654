//! Delegated credential check against the upstream login.

use std::sync::Arc;

use async_trait::async_trait;
use ctl_cache::{CacheError, CacheResult, CredentialValidator};
use ctl_core::SiteConfig;
use ctl_upstream::UpstreamService;

/// Checks bind passwords by logging in upstream with the user's login.
#[derive(Debug, Clone)]
pub struct UpstreamCredentialValidator {
    service: UpstreamService,
    site: Arc<SiteConfig>,
}

impl UpstreamCredentialValidator {
    /// Creates a validator for one site.
    #[must_use]
    pub fn new(service: UpstreamService, site: Arc<SiteConfig>) -> Self {
        Self { service, site }
    }
}

#[async_trait]
impl CredentialValidator for UpstreamCredentialValidator {
    async fn validate_password(&self, login: &str, password: &str) -> CacheResult<bool> {
        self.service
            .authenticate(&self.site, login, password)
            .await
            .map_err(|e| CacheError::validator(e.to_string()))
    }
}
