//! Directory entries.
//!
//! Every entry shares the `{dn, attributes}` shape that is handed to the
//! directory front end. The [`EntryKind`] tag tells the kinds apart without
//! inspecting attributes; it is not part of the serialized form.

use std::collections::BTreeMap;

use serde::Serialize;

/// Well-known attribute names.
pub mod attr {
    /// Common name.
    pub const CN: &str = "cn";
    /// Upstream numeric id.
    pub const ID: &str = "id";
    /// Display name.
    pub const DISPLAY_NAME: &str = "displayname";
    /// User id.
    pub const UID: &str = "uid";
    /// Upstream global id.
    pub const GUID: &str = "guid";
    /// Stable external id, used as the upstream login identifier.
    pub const ENTRY_UUID: &str = "entryUUID";
    /// Object classes.
    pub const OBJECT_CLASS: &str = "objectClass";
    /// Groups a user belongs to.
    pub const MEMBER_OF: &str = "memberOf";
    /// Members of a group.
    pub const UNIQUE_MEMBER: &str = "uniqueMember";
    /// Email address.
    pub const EMAIL: &str = "email";
    /// Email address (LDAP name).
    pub const MAIL: &str = "mail";
    /// Base group of a role-group.
    pub const BASE_GROUP_ID: &str = "baseGroupId";
    /// Role type id of a role-group.
    pub const GROUP_TYPE_ROLE_ID: &str = "groupTypeRoleId";
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Numeric value.
    Number(i64),
    /// Single string value.
    Text(String),
    /// Multi-valued attribute.
    List(Vec<String>),
}

impl AttributeValue {
    /// Returns the value as a string slice, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a number, if it is one.
    #[must_use]
    pub const fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the values of a multi-valued attribute.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(String::from).collect())
    }
}

/// Attribute map of an entry, ordered by name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Root of a site's tree.
    RootDse,
    /// `ou=users` / `ou=groups` container.
    OrganizationalUnit,
    /// The local admin account.
    Admin,
    /// A person.
    User,
    /// An upstream group.
    Group,
    /// One role within an upstream group.
    RoleGroup,
    /// The synthetic admin group.
    AdminGroup,
    /// The subschema entry.
    Subschema,
}

impl EntryKind {
    /// Returns true for entries that carry a member list.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self, Self::Group | Self::RoleGroup | Self::AdminGroup)
    }
}

/// A directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    /// Entry kind.
    #[serde(skip)]
    pub kind: EntryKind,
    /// Distinguished name.
    pub dn: String,
    /// Attributes.
    pub attributes: Attributes,
}

impl DirectoryEntry {
    /// Creates an entry without attributes.
    #[must_use]
    pub fn new(kind: EntryKind, dn: impl Into<String>) -> Self {
        Self {
            kind,
            dn: dn.into(),
            attributes: Attributes::new(),
        }
    }

    /// Sets an attribute, builder style.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    /// Gets an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Gets a text attribute.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::as_text)
    }

    /// Gets a numeric attribute.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(AttributeValue::as_number)
    }

    /// Gets the values of a multi-valued attribute, empty if absent.
    #[must_use]
    pub fn values(&self, name: &str) -> &[String] {
        self.get(name)
            .and_then(AttributeValue::as_list)
            .unwrap_or_default()
    }

    /// Appends a value to a multi-valued attribute.
    ///
    /// A missing attribute is created; a single text value is turned into a
    /// list holding it first.
    pub fn push_value(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let slot = self
            .attributes
            .entry(name.to_string())
            .or_insert_with(|| AttributeValue::List(Vec::new()));
        *slot = match std::mem::replace(slot, AttributeValue::List(Vec::new())) {
            AttributeValue::List(mut values) => {
                values.push(value);
                AttributeValue::List(values)
            }
            AttributeValue::Text(first) => AttributeValue::List(vec![first, value]),
            AttributeValue::Number(n) => AttributeValue::List(vec![n.to_string(), value]),
        };
    }

    /// Upstream id of the entry.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.number(attr::ID)
    }

    /// Groups this entry is a member of.
    #[must_use]
    pub fn member_of(&self) -> &[String] {
        self.values(attr::MEMBER_OF)
    }

    /// Members of this group.
    #[must_use]
    pub fn members(&self) -> &[String] {
        self.values(attr::UNIQUE_MEMBER)
    }

    /// Object classes.
    #[must_use]
    pub fn object_classes(&self) -> &[String] {
        self.values(attr::OBJECT_CLASS)
    }

    /// Stable external id used to log in upstream.
    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.text(attr::ENTRY_UUID)
    }

    /// Links `member` into `group` and `group` into `member`.
    ///
    /// Both lists are updated together; there is no way to link only one side.
    pub fn link_membership(group: &mut Self, member: &mut Self) {
        group.push_value(attr::UNIQUE_MEMBER, member.dn.clone());
        member.push_value(attr::MEMBER_OF, group.dn.clone());
    }
}

/// The fixed skeleton of a site's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootTree {
    /// Root DSE for the base DN.
    pub root: DirectoryEntry,
    /// `ou=users` container.
    pub users: DirectoryEntry,
    /// `ou=groups` container.
    pub groups: DirectoryEntry,
}
