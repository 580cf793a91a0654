//! Periodic site synchronization.
//!
//! One cycle fetches a site's upstream data, builds the directory from it and
//! swaps it into the cache. A failed cycle leaves the previous tree in place.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ctl_cache::{CacheError, SiteDirectory};
use ctl_core::SiteConfig;
use ctl_directory::{build_directory, TransformError};
use ctl_upstream::{UpstreamError, UpstreamService};
use thiserror::Error;
use tokio::time::MissedTickBehavior;

/// Errors that abort a sync cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching upstream data failed.
    #[error("upstream fetch failed: {0}")]
    Upstream(#[from] UpstreamError),

    /// Building the directory failed.
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    /// The site has no directory.
    #[error("{0}")]
    Cache(#[from] CacheError),
}

impl SyncError {
    /// Checks if the site's login is disabled and later cycles will fail too.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Upstream(e) if e.is_fatal())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Site name.
    pub site: String,
    /// Exported users.
    pub users: usize,
    /// Exported groups, including role-groups and the admin group.
    pub groups: usize,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle completed.
    pub completed_at: DateTime<Utc>,
}

/// Runs one sync cycle for a site.
///
/// # Errors
///
/// Returns the first fetch or transform error; the directory is not touched
/// in that case.
pub async fn sync_site(
    service: &UpstreamService,
    site: &SiteConfig,
    directory: &SiteDirectory,
) -> SyncResult<SyncReport> {
    let started_at = Utc::now();

    let data = service.fetch_site_data(site).await?;
    let built = build_directory(site, &data, &directory.admin())?;
    let users = built.users.len();
    let groups = built.groups.len();
    directory.apply(built);

    Ok(SyncReport {
        site: site.name.clone(),
        users,
        groups,
        started_at,
        completed_at: Utc::now(),
    })
}

/// Syncs a site every `interval`, starting immediately. Never returns.
pub async fn run_site_loop(
    service: UpstreamService,
    site: Arc<SiteConfig>,
    directory: SiteDirectory,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        log_outcome(&site.name, sync_site(&service, &site, &directory).await);
    }
}

/// Logs the outcome of a cycle.
pub fn log_outcome(site: &str, outcome: SyncResult<SyncReport>) {
    match outcome {
        Ok(report) => tracing::info!(
            site,
            users = report.users,
            groups = report.groups,
            duration_ms = (report.completed_at - report.started_at).num_milliseconds(),
            "Sync completed"
        ),
        Err(e) if e.is_fatal() => {
            tracing::error!(site, error = %e, "Sync failed, upstream login disabled; keeping previous tree");
        }
        Err(e) => tracing::warn!(site, error = %e, "Sync failed; keeping previous tree"),
    }
}
