//! # ctl-server
//!
//! Process wrapper of the ctldap directory bridge.
//!
//! [`Bridge`] owns the session manager, the upstream data service and the
//! directory registry. It builds each site's root tree and admin account,
//! wires the delegated credential check, and keeps every site in sync.
//!
//! ## Usage
//!
//! ```ignore
//! use ctl_server::Bridge;
//!
//! let config = ctl_core::AppConfig::load("config.toml")?;
//! let bridge = Bridge::from_config(config)?;
//! bridge.init_sites();
//! bridge.run(shutdown_signal()).await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod sync;
pub mod validator;

use std::future::Future;
use std::sync::Arc;

use ctl_cache::DirectoryRegistry;
use ctl_core::AppConfig;
use ctl_directory::{admin_entry, root_tree};
use ctl_upstream::{HttpTransport, SessionManager, Transport, UpstreamService};
use tokio::task::JoinSet;

pub use cli::Cli;
pub use sync::{run_site_loop, sync_site, SyncError, SyncReport, SyncResult};
pub use validator::UpstreamCredentialValidator;

/// The running bridge.
#[derive(Debug)]
pub struct Bridge {
    config: Arc<AppConfig>,
    service: UpstreamService,
    registry: Arc<DirectoryRegistry>,
}

impl Bridge {
    /// Creates a bridge talking to the upstream through `transport`.
    #[must_use]
    pub fn new(config: AppConfig, transport: Arc<dyn Transport>) -> Self {
        let sessions = Arc::new(SessionManager::new(transport));
        Self {
            config: Arc::new(config),
            service: UpstreamService::new(sessions),
            registry: Arc::new(DirectoryRegistry::new()),
        }
    }

    /// Creates a bridge with the HTTP transport from the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(&config.http)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Directory registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<DirectoryRegistry> {
        &self.registry
    }

    /// Upstream data service.
    #[must_use]
    pub fn service(&self) -> &UpstreamService {
        &self.service
    }

    /// Registers an empty directory for every configured site.
    pub fn init_sites(&self) {
        for site in &self.config.sites {
            let admin = admin_entry(&site.ldap.admin, &site.ldap.dc);
            let tree = root_tree(&site.ldap.dc, &admin.dn, site.organization());
            let validator = UpstreamCredentialValidator::new(self.service.clone(), Arc::new(site.clone()));

            self.registry
                .init(&site.name, tree, admin, &site.ldap.password, Arc::new(validator));
            tracing::info!(site = %site.name, base_dn = %site.ldap.dc, "Site initialized");
        }
    }

    /// Runs one sync cycle for every site, one after another.
    pub async fn sync_all(&self) -> Vec<(String, SyncResult<SyncReport>)> {
        let mut outcomes = Vec::with_capacity(self.config.sites.len());
        for site in &self.config.sites {
            let outcome = match self.registry.require(&site.name) {
                Ok(directory) => sync_site(&self.service, site, &directory).await,
                Err(e) => Err(e.into()),
            };
            outcomes.push((site.name.clone(), outcome));
        }
        outcomes
    }

    /// Syncs all sites periodically until `shutdown` completes.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let mut tasks = JoinSet::new();
        for site in &self.config.sites {
            let Some(directory) = self.registry.get(&site.name) else {
                tracing::warn!(site = %site.name, "Site not initialized, not syncing");
                continue;
            };
            tasks.spawn(run_site_loop(
                self.service.clone(),
                Arc::new(site.clone()),
                directory,
                self.config.sync.interval,
            ));
        }

        tracing::info!(
            sites = tasks.len(),
            interval = ?self.config.sync.interval,
            "Sync loops started"
        );
        shutdown.await;
        tasks.shutdown().await;
        tracing::info!("Sync loops stopped");
    }
}
