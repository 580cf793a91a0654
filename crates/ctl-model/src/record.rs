//! Upstream API records.
//!
//! Only the fields the bridge uses are modelled; unknown fields are ignored.
//! Identifiers are optional on purpose: a record without one is rejected by
//! the transform with a data format error instead of failing deserialization
//! of a whole page.

use serde::{Deserialize, Serialize};

/// A person from `/api/persons`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiPerson {
    /// Upstream person id.
    pub id: Option<i64>,
    /// Stable global id.
    pub guid: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Nickname.
    pub nickname: Option<String>,
    /// Street and house number.
    pub street: Option<String>,
    /// Mobile phone number.
    pub mobile: Option<String>,
    /// Private phone number.
    pub phone_private: Option<String>,
    /// Postal code.
    pub zip: Option<String>,
    /// City.
    pub city: Option<String>,
    /// CMS user id.
    pub cms_user_id: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Explicit directory user id.
    pub ncuid: Option<String>,
    /// Departments the person belongs to.
    pub department_ids: Vec<i64>,
}

impl ApiPerson {
    /// Returns the explicit directory user id if it is set and non-empty.
    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.ncuid.as_deref().filter(|id| !id.is_empty())
    }

    /// Returns true if the person belongs to any of the given departments.
    #[must_use]
    pub fn in_any_department(&self, departments: &[i64]) -> bool {
        self.department_ids.iter().any(|d| departments.contains(d))
    }
}

/// A group from `/api/groups`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiGroup {
    /// Upstream group id.
    pub id: Option<i64>,
    /// Stable global id.
    pub guid: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Roles defined on the group.
    pub roles: Vec<ApiRole>,
    /// Group settings.
    pub settings: Option<GroupSettings>,
    /// Group metadata.
    pub information: Option<GroupInformation>,
}

impl ApiGroup {
    /// Returns true if the group is hidden upstream.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.settings
            .as_ref()
            .and_then(|s| s.visibility.as_deref())
            .is_some_and(|v| v == "hidden")
    }

    /// Returns the group type id, if known.
    #[must_use]
    pub fn group_type_id(&self) -> Option<i64> {
        self.information.as_ref().and_then(|i| i.group_type_id)
    }
}

/// Group settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupSettings {
    /// Visibility, e.g. `"public"`, `"restricted"` or `"hidden"`.
    pub visibility: Option<String>,
}

/// Group metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupInformation {
    /// Group type id.
    pub group_type_id: Option<i64>,
}

/// A role defined on a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiRole {
    /// Role id within the group.
    pub id: Option<i64>,
    /// Role type id shared by all groups of the same type.
    pub group_type_role_id: Option<i64>,
    /// Group type the role belongs to.
    pub group_type_id: Option<i64>,
    /// Role name.
    pub name: String,
    /// Inactive roles are never exported.
    pub is_active: bool,
}

/// A membership from `/api/groups/members`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMembership {
    /// Member person id.
    pub person_id: i64,
    /// Group id.
    pub group_id: i64,
    /// Role type of the membership.
    #[serde(default)]
    pub group_type_role_id: Option<i64>,
}

impl ApiMembership {
    /// Creates a membership without a role.
    #[must_use]
    pub const fn new(person_id: i64, group_id: i64) -> Self {
        Self {
            person_id,
            group_id,
            group_type_role_id: None,
        }
    }
}

/// Everything one sync cycle fetches for a site.
#[derive(Debug, Clone, Default)]
pub struct UpstreamData {
    /// Exported groups.
    pub groups: Vec<ApiGroup>,
    /// Exported persons.
    pub persons: Vec<ApiPerson>,
    /// All memberships.
    pub memberships: Vec<ApiMembership>,
}
