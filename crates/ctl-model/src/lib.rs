//! # ctl-model
//!
//! Domain models for the ctldap directory bridge.
//!
//! - [`record`] - raw records as returned by the upstream REST API
//! - [`entry`] - directory entries (`{dn, attributes}`) with a kind tag
//! - [`dn`] - distinguished name construction, escaping and normalization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dn;
pub mod entry;
pub mod record;

pub use entry::{attr, AttributeValue, Attributes, DirectoryEntry, EntryKind, RootTree};
pub use record::{
    ApiGroup, ApiMembership, ApiPerson, ApiRole, GroupInformation, GroupSettings, UpstreamData,
};

/// Organizational unit holding user entries.
pub const OU_USERS: &str = "users";

/// Organizational unit holding group entries.
pub const OU_GROUPS: &str = "groups";

/// Structural object class of exported users.
pub const OBJECT_CLASS_USER: &str = "CTPerson";

/// Object class of exported groups.
pub const OBJECT_CLASS_GROUP: &str = "group";

/// DN of the subschema entry.
pub const SUBSCHEMA_DN: &str = "cn=Subschema";

/// Upstream person field holding an explicit directory user id.
pub const EXTERNAL_ID_FIELD: &str = "ncuid";
