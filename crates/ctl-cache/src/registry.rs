//! Site directory registry.

use std::sync::Arc;

use ctl_model::{DirectoryEntry, RootTree};
use dashmap::DashMap;

use crate::directory::SiteDirectory;
use crate::error::{CacheError, CacheResult};
use crate::validator::CredentialValidator;

/// Directories of all sites, keyed by site name.
#[derive(Debug, Default)]
pub struct DirectoryRegistry {
    sites: DashMap<String, SiteDirectory>,
}

impl DirectoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers the directory of a site.
    ///
    /// A directory already registered under the name is replaced.
    pub fn init(
        &self,
        site: &str,
        tree: RootTree,
        admin: DirectoryEntry,
        admin_password: &str,
        validator: Arc<dyn CredentialValidator>,
    ) -> SiteDirectory {
        let directory = SiteDirectory::new(site, tree, admin, admin_password, validator);
        self.insert(directory.clone());
        directory
    }

    /// Registers a prepared directory under its site name.
    pub fn insert(&self, directory: SiteDirectory) {
        tracing::debug!(site = %directory.site(), "Registered site directory");
        self.sites.insert(directory.site().to_string(), directory);
    }

    /// Returns the directory of a site.
    #[must_use]
    pub fn get(&self, site: &str) -> Option<SiteDirectory> {
        self.sites.get(site).map(|entry| entry.value().clone())
    }

    /// Returns the directory of a site or an error naming it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::SiteNotFound`] if the site is not registered.
    pub fn require(&self, site: &str) -> CacheResult<SiteDirectory> {
        self.get(site)
            .ok_or_else(|| CacheError::SiteNotFound(site.to_string()))
    }

    /// Names of all registered sites.
    #[must_use]
    pub fn site_names(&self) -> Vec<String> {
        self.sites.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use ctl_model::EntryKind;

    use super::*;
    use crate::validator::RejectAll;

    fn tree(dc: &str) -> RootTree {
        RootTree {
            root: DirectoryEntry::new(EntryKind::RootDse, dc),
            users: DirectoryEntry::new(EntryKind::OrganizationalUnit, format!("ou=users,{dc}")),
            groups: DirectoryEntry::new(EntryKind::OrganizationalUnit, format!("ou=groups,{dc}")),
        }
    }

    #[test]
    fn sites_are_isolated() {
        let registry = DirectoryRegistry::new();
        let admin = DirectoryEntry::new(EntryKind::Admin, "cn=root");
        let a = registry.init("a", tree("dc=a"), admin.clone(), "pw", Arc::new(RejectAll));
        registry.init("b", tree("dc=b"), admin, "pw", Arc::new(RejectAll));

        a.set_data(vec![DirectoryEntry::new(EntryKind::User, "cn=x")], vec![]);

        assert_eq!(registry.require("a").unwrap().users().len(), 1);
        assert!(registry.require("b").unwrap().users().is_empty());
        assert_eq!(registry.get("b").unwrap().globals().root_dn.dn, "dc=b");
        assert!(matches!(
            registry.require("c"),
            Err(CacheError::SiteNotFound(name)) if name == "c"
        ));

        let mut names = registry.site_names();
        names.sort();
        assert_eq!(names, ["a", "b"]);
    }
}
