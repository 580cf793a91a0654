//! # ctl-cache
//!
//! In-memory directory cache for the ctldap directory bridge.
//!
//! Each site gets a [`SiteDirectory`] holding its current tree, a cache of
//! verified passwords and a [`LockoutTable`]. Binds are checked against the
//! cache first and handed to a [`CredentialValidator`] when the cache cannot
//! confirm them.
//!
//! ## Example
//!
//! ```ignore
//! use ctl_cache::{DirectoryRegistry, RejectAll};
//!
//! let registry = DirectoryRegistry::new();
//! let directory = registry.init("site", tree, admin, "secret", Arc::new(RejectAll));
//! assert!(directory.check_authentication("cn=root,dc=site", "secret").await);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
pub mod error;
pub mod lockout;
pub mod registry;
pub mod validator;

pub use directory::{Globals, SiteDirectory};
pub use error::{CacheError, CacheResult};
pub use lockout::{LockEntry, LockoutPolicy, LockoutTable};
pub use registry::DirectoryRegistry;
pub use validator::{CredentialValidator, RejectAll};
