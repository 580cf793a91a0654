//! # ctl-core
//!
//! Core configuration and shared utilities for the ctldap directory bridge.
//!
//! This crate provides the site configuration model, its TOML loader, and
//! the injectable [`Clock`] used by every time-dependent component (cookie
//! expiry, login lockout).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AdminGroupConfig, AppConfig, AttributeReplacement, ConfiguredAttribute, GroupFilter,
    GroupSelection, GroupTransform, HttpConfig, LdapSiteConfig, RoleExport, RoleFilter,
    RoleFilterScope, SiteConfig, SyncConfig, UpstreamSiteConfig, UserSelection,
};
pub use error::{ConfigError, ConfigResult};
