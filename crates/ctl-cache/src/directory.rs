//! Per-site directory handle.

use std::collections::HashMap;
use std::sync::Arc;

use ctl_core::{Clock, SystemClock};
use ctl_directory::DirectoryData;
use ctl_model::{dn, DirectoryEntry, EntryKind, RootTree, SUBSCHEMA_DN};
use parking_lot::{Mutex, RwLock};

use crate::lockout::{LockoutPolicy, LockoutTable};
use crate::validator::CredentialValidator;

/// Well-known entries of a site's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Globals {
    /// Root DSE.
    pub root_dn: DirectoryEntry,
    /// `ou=users` container.
    pub user_root: DirectoryEntry,
    /// `ou=groups` container.
    pub group_root: DirectoryEntry,
    /// Admin account.
    pub admin_dn: DirectoryEntry,
    /// Subschema entry, always `cn=Subschema`.
    pub schema_dn: DirectoryEntry,
}

#[derive(Debug)]
struct TreeState {
    tree: RootTree,
    admin: DirectoryEntry,
    users: Arc<Vec<DirectoryEntry>>,
    groups: Arc<Vec<DirectoryEntry>>,
}

/// Cached directory of one site.
///
/// Cloning is cheap; all clones share the same tree, password cache and
/// lockout table. Locks are never held across an `.await`.
#[derive(Clone)]
pub struct SiteDirectory {
    site: Arc<str>,
    admin_dn: Arc<str>,
    state: Arc<RwLock<TreeState>>,
    passwords: Arc<Mutex<HashMap<String, String>>>,
    lockouts: Arc<Mutex<LockoutTable>>,
    validator: Arc<dyn CredentialValidator>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SiteDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteDirectory")
            .field("site", &self.site)
            .field("admin_dn", &self.admin_dn)
            .finish_non_exhaustive()
    }
}

impl SiteDirectory {
    /// Creates a directory with an empty user and group list.
    ///
    /// The password cache is seeded with the admin account's password.
    #[must_use]
    pub fn new(
        site: &str,
        tree: RootTree,
        admin: DirectoryEntry,
        admin_password: &str,
        validator: Arc<dyn CredentialValidator>,
    ) -> Self {
        let admin_dn = dn::normalize(&admin.dn);
        let passwords = HashMap::from([(admin_dn.clone(), admin_password.to_string())]);

        Self {
            site: Arc::from(site),
            admin_dn: Arc::from(admin_dn),
            state: Arc::new(RwLock::new(TreeState {
                tree,
                admin,
                users: Arc::default(),
                groups: Arc::default(),
            })),
            passwords: Arc::new(Mutex::new(passwords)),
            lockouts: Arc::new(Mutex::new(LockoutTable::new(LockoutPolicy::default()))),
            validator,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Site name.
    #[must_use]
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Replaces users and groups wholesale.
    pub fn set_data(&self, users: Vec<DirectoryEntry>, groups: Vec<DirectoryEntry>) {
        let mut state = self.state.write();
        state.users = Arc::new(users);
        state.groups = Arc::new(groups);
    }

    /// Replaces users, groups and the admin entry from one build.
    pub fn apply(&self, data: DirectoryData) {
        tracing::debug!(
            site = %self.site,
            users = data.users.len(),
            groups = data.groups.len(),
            "Replacing directory data"
        );
        let mut state = self.state.write();
        state.users = Arc::new(data.users);
        state.groups = Arc::new(data.groups);
        state.admin = data.admin;
    }

    /// Current users.
    #[must_use]
    pub fn users(&self) -> Arc<Vec<DirectoryEntry>> {
        Arc::clone(&self.state.read().users)
    }

    /// Current groups.
    #[must_use]
    pub fn groups(&self) -> Arc<Vec<DirectoryEntry>> {
        Arc::clone(&self.state.read().groups)
    }

    /// Current admin entry.
    #[must_use]
    pub fn admin(&self) -> DirectoryEntry {
        self.state.read().admin.clone()
    }

    /// Returns the well-known entries.
    #[must_use]
    pub fn globals(&self) -> Globals {
        let state = self.state.read();
        Globals {
            root_dn: state.tree.root.clone(),
            user_root: state.tree.users.clone(),
            group_root: state.tree.groups.clone(),
            admin_dn: state.admin.clone(),
            schema_dn: schema_entry(),
        }
    }

    /// Finds a user by upstream id.
    #[must_use]
    pub fn user_by_id(&self, id: i64) -> Option<DirectoryEntry> {
        self.users().iter().find(|u| u.id() == Some(id)).cloned()
    }

    /// Finds a group by id.
    ///
    /// Role-groups carry their role id, so the first entry with a matching
    /// id wins; base groups come before their role-groups.
    #[must_use]
    pub fn group_by_id(&self, id: i64) -> Option<DirectoryEntry> {
        self.groups().iter().find(|g| g.id() == Some(id)).cloned()
    }

    /// Resolves the login used for a delegated check.
    ///
    /// Known users log in with their external id, everything else with the
    /// normalized DN itself.
    #[must_use]
    pub fn login_identifier(&self, normalized_dn: &str) -> String {
        self.users()
            .iter()
            .find(|u| dn::normalize(&u.dn) == normalized_dn)
            .and_then(DirectoryEntry::external_id)
            .unwrap_or(normalized_dn)
            .to_string()
    }

    /// Checks a bind.
    ///
    /// Locked DNs are rejected without looking at the password. Each attempt
    /// counts as a failure from the moment it passes the lock check, so at
    /// most the lockout threshold of attempts per DN can reach the validator,
    /// concurrent ones included. A password the cache cannot confirm is
    /// handed to the validator, except for the admin account. Success clears
    /// the failure count.
    pub async fn check_authentication(&self, bind_dn: &str, password: &str) -> bool {
        let dn = dn::normalize(bind_dn);

        let Some(attempt) = self.lockouts.lock().begin_attempt(&dn, self.clock.now()) else {
            tracing::info!(site = %self.site, dn = %dn, "Rejected locked login");
            return false;
        };

        let mut valid = self
            .passwords
            .lock()
            .get(&dn)
            .is_some_and(|cached| cached == password);

        if !valid && dn != *self.admin_dn {
            let login = self.login_identifier(&dn);
            valid = match self.validator.validate_password(&login, password).await {
                Ok(valid) => valid,
                Err(e) => {
                    tracing::warn!(site = %self.site, dn = %dn, error = %e, "Delegated credential check failed");
                    false
                }
            };
            if valid {
                self.passwords.lock().insert(dn.clone(), password.to_string());
            }
        }

        if valid {
            self.lockouts.lock().clear_failures(&dn);
        } else {
            tracing::debug!(site = %self.site, dn = %dn, failures = attempt, "Login failed");
        }
        valid
    }
}

fn schema_entry() -> DirectoryEntry {
    DirectoryEntry::new(EntryKind::Subschema, SUBSCHEMA_DN)
        .with("name", "SubschemaSubentry")
        .with("equality", "distinguishedNameMatch")
        .with("objectClass", vec!["top", "subschemaSubentry"])
        .with("attributeType", Vec::<String>::new())
}
