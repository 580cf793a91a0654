//! Bridge configuration.
//!
//! Configuration is read once at startup from a TOML file and is immutable
//! afterwards. One `[[sites]]` table describes one upstream instance and the
//! directory tree built from it.
//!
//! ```toml
//! [sync]
//! interval = "10m"
//!
//! [[sites]]
//! name = "example"
//!
//! [sites.upstream]
//! url = "https://example.church.tools/"
//! user = "sync-bot"
//! password = "secret"
//!
//! [sites.ldap]
//! dc = "dc=example,dc=org"
//! admin = "root"
//! password = "ldap-secret"
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// ============================================================================
// Application Configuration
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sync loop settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// HTTP client settings shared by all sites.
    #[serde(default)]
    pub http: HttpConfig,

    /// Configured sites.
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

impl AppConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or fails
    /// [`AppConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), sites = config.sites.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content does not parse or is invalid.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no site is configured, a site is incomplete, or
    /// two sites share a name.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sites.is_empty() {
            return Err(ConfigError::invalid("at least one site must be configured"));
        }

        let mut names = HashSet::new();
        for site in &self.sites {
            site.validate()?;
            if !names.insert(site.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate site name: {}",
                    site.name
                )));
            }
        }

        if self.sync.interval.is_zero() {
            return Err(ConfigError::invalid("sync.interval must be greater than zero"));
        }

        Ok(())
    }

    /// Finds a site by name.
    #[must_use]
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.name == name)
    }
}

/// Periodic sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Time between two sync cycles of a site.
    #[serde(with = "humantime_serde", default = "default_sync_interval")]
    pub interval: Duration,
}

fn default_sync_interval() -> Duration {
    Duration::from_secs(600)
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: default_sync_interval(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout applied to every upstream request.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Timeout for establishing a connection.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

// ============================================================================
// Site Configuration
// ============================================================================

/// One upstream instance and the directory built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Unique site name; keys the connection and the directory cache.
    pub name: String,

    /// Upstream API access.
    pub upstream: UpstreamSiteConfig,

    /// Directory layout.
    pub ldap: LdapSiteConfig,

    /// Synthetic admin group.
    #[serde(default)]
    pub admin_group: AdminGroupConfig,

    /// Restricts exported users to members of these groups.
    #[serde(default)]
    pub users: UserSelection,

    /// Group filters and per-group overrides.
    #[serde(default)]
    pub groups: GroupSelection,

    /// Role-group export.
    #[serde(default)]
    pub roles: RoleExport,

    /// Only persons in at least one of these departments are exported.
    #[serde(default)]
    pub departments: Option<Vec<i64>>,

    /// Extra attributes added to every user.
    #[serde(default)]
    pub attributes: Vec<ConfiguredAttribute>,
}

impl SiteConfig {
    /// Validates a single site.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing mandatory field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("site name cannot be empty"));
        }
        if self.upstream.url.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "site {}: upstream.url cannot be empty",
                self.name
            )));
        }
        if self.upstream.user.is_empty() {
            return Err(ConfigError::invalid(format!(
                "site {}: upstream.user cannot be empty",
                self.name
            )));
        }
        if self.ldap.dc.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "site {}: ldap.dc cannot be empty",
                self.name
            )));
        }
        if self.ldap.admin.trim().is_empty() {
            return Err(ConfigError::invalid(format!(
                "site {}: ldap.admin cannot be empty",
                self.name
            )));
        }
        Ok(())
    }

    /// Organization name shown on the root entries.
    #[must_use]
    pub fn organization(&self) -> &str {
        self.ldap.o.as_deref().unwrap_or(&self.name)
    }
}

/// Upstream API access for a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSiteConfig {
    /// Base URL of the instance, e.g. `https://example.church.tools/`.
    pub url: String,

    /// Technical user for the sync.
    pub user: String,

    /// Password of the technical user.
    #[serde(skip_serializing)]
    pub password: String,
}

impl UpstreamSiteConfig {
    /// Builds an absolute API URL for `path` (which starts with `/`).
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.url.trim_end_matches('/'), path)
    }
}

/// Directory layout of a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapSiteConfig {
    /// Base DN, e.g. `dc=example,dc=org`.
    pub dc: String,

    /// Common name of the admin account (`cn=<admin>,<dc>`).
    pub admin: String,

    /// Password of the admin account.
    #[serde(skip_serializing)]
    pub password: String,

    /// Organization name; defaults to the site name.
    #[serde(default)]
    pub o: Option<String>,

    /// Lowercase explicit user ids as well.
    #[serde(default)]
    pub userid_lowercase: bool,

    /// Drop groups without members after wiring.
    #[serde(default)]
    pub skip_empty_groups: bool,

    /// Export only the first user per email address; users without one are
    /// dropped.
    #[serde(default)]
    pub unique_emails: bool,
}

/// Synthetic admin group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminGroupConfig {
    /// Common name of the group.
    #[serde(default = "default_admin_group_cn")]
    pub cn: String,

    /// Upstream person ids added to the group.
    #[serde(default)]
    pub members: Vec<i64>,
}

fn default_admin_group_cn() -> String {
    "ldap-admins".to_string()
}

impl Default for AdminGroupConfig {
    fn default() -> Self {
        Self {
            cn: default_admin_group_cn(),
            members: Vec::new(),
        }
    }
}

/// User selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSelection {
    /// Only members of these groups are fetched.
    #[serde(default)]
    pub group_ids: Option<Vec<i64>>,
}

/// Group filters and overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupSelection {
    /// Groups matching any filter are not exported.
    #[serde(default)]
    pub filter: Vec<GroupFilter>,

    /// Per-group overrides.
    #[serde(default)]
    pub transform: Vec<GroupTransform>,
}

impl GroupSelection {
    /// Returns the override rule for a group id.
    #[must_use]
    pub fn rule_for(&self, group_id: i64) -> Option<&GroupTransform> {
        self.transform.iter().find(|t| t.gid == group_id)
    }

    /// Returns true if a group with this id and type is filtered out.
    #[must_use]
    pub fn excludes(&self, group_id: i64, group_type_id: Option<i64>) -> bool {
        self.filter.iter().any(|f| f.matches(group_id, group_type_id))
    }
}

/// Excludes groups by type or id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupFilter {
    /// Group type id.
    #[serde(rename = "type", default)]
    pub group_type: Option<i64>,

    /// Group id.
    #[serde(default)]
    pub id: Option<i64>,
}

impl GroupFilter {
    /// Returns true if the filter matches either the group type or the id.
    #[must_use]
    pub fn matches(&self, group_id: i64, group_type_id: Option<i64>) -> bool {
        let type_match = matches!((self.group_type, group_type_id), (Some(a), Some(b)) if a == b);
        type_match || self.id == Some(group_id)
    }
}

/// Per-group override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupTransform {
    /// Upstream group id the rule applies to.
    pub gid: i64,

    /// Replacement common name.
    #[serde(default)]
    pub name: Option<String>,

    /// Object class appended to every member.
    #[serde(default, alias = "objectClass")]
    pub object_class: Option<String>,
}

/// Role-group export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleExport {
    /// Export one group per active role.
    #[serde(default)]
    pub export: bool,

    /// Roles matching any filter are not exported.
    #[serde(default)]
    pub filter: Vec<RoleFilter>,
}

impl RoleExport {
    /// Returns true if a role is filtered out.
    #[must_use]
    pub fn excludes(&self, group_type_id: Option<i64>, role_name: &str) -> bool {
        self.filter.iter().any(|f| f.matches(group_type_id, role_name))
    }
}

/// Excludes a role by name, within one group type or all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleFilter {
    /// `"all"` or a group type id.
    #[serde(rename = "type")]
    pub scope: RoleFilterScope,

    /// Role name.
    pub role: String,
}

impl RoleFilter {
    /// Returns true if the scope covers the group type and the name matches.
    #[must_use]
    pub fn matches(&self, group_type_id: Option<i64>, role_name: &str) -> bool {
        self.scope.covers(group_type_id) && self.role == role_name
    }
}

/// Scope of a role filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleFilterScope {
    /// A specific group type id.
    GroupType(i64),
    /// A keyword; only `"all"` has a meaning.
    Keyword(String),
}

impl RoleFilterScope {
    /// Returns true if the scope covers the given group type.
    #[must_use]
    pub fn covers(&self, group_type_id: Option<i64>) -> bool {
        match self {
            Self::Keyword(k) => k == "all",
            Self::GroupType(id) => group_type_id == Some(*id),
        }
    }
}

/// Attribute added to every exported user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfiguredAttribute {
    /// Attribute name.
    pub name: String,

    /// Value used unless a replacement matches.
    pub default: String,

    /// Per-person values.
    #[serde(default)]
    pub replacements: Vec<AttributeReplacement>,
}

impl ConfiguredAttribute {
    /// Resolves the value for a person id.
    #[must_use]
    pub fn value_for(&self, person_id: i64) -> &str {
        self.replacements
            .iter()
            .find(|r| r.id == person_id)
            .map_or(self.default.as_str(), |r| r.value.as_str())
    }
}

/// Per-person attribute value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeReplacement {
    /// Upstream person id.
    pub id: i64,

    /// Value for this person.
    pub value: String,
}
