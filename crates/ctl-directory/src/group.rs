//! Group and role-group conversion.

use ctl_core::{GroupSelection, GroupTransform, RoleExport};
use ctl_model::{attr, dn, ApiGroup, ApiRole, DirectoryEntry, EntryKind, OBJECT_CLASS_GROUP};

use crate::error::{TransformError, TransformResult};

/// Converts an upstream group into a group entry below `ou=groups`.
///
/// A matching override rule replaces the common name.
///
/// # Errors
///
/// Returns [`TransformError::DataFormat`] if the group has no id or no name.
pub fn transform_group(
    group: &ApiGroup,
    rule: Option<&GroupTransform>,
    base_dn: &str,
) -> TransformResult<DirectoryEntry> {
    let id = group
        .id
        .ok_or_else(|| TransformError::data_format("group", "record has no id"))?;
    let cn = rule
        .and_then(|r| r.name.as_deref())
        .or(group.name.as_deref())
        .ok_or_else(|| TransformError::data_format("group", format!("group {id} has no name")))?;

    let mut entry = DirectoryEntry::new(EntryKind::Group, dn::group_dn(cn, base_dn))
        .with(attr::CN, cn)
        .with(attr::DISPLAY_NAME, cn)
        .with(attr::ID, id)
        .with("nsuniqueid", format!("g{id}"))
        .with(attr::OBJECT_CLASS, vec![OBJECT_CLASS_GROUP])
        .with(attr::UNIQUE_MEMBER, Vec::<String>::new());

    if let Some(guid) = &group.guid {
        entry.set(attr::GUID, guid.as_str());
        entry.set(attr::ENTRY_UUID, guid.as_str());
    }

    Ok(entry)
}

/// Converts one role of a group into a role-group entry.
///
/// The common name is `"<group displayname> <role name>"`; the entry keeps
/// the base group id and the role type id for membership wiring.
///
/// # Errors
///
/// Returns [`TransformError::DataFormat`] if the group entry or the role has
/// no id.
pub fn transform_role(
    group: &DirectoryEntry,
    role: &ApiRole,
    base_dn: &str,
) -> TransformResult<DirectoryEntry> {
    let group_id = group
        .id()
        .ok_or_else(|| TransformError::data_format("group", "entry has no id"))?;
    let role_id = role
        .id
        .ok_or_else(|| TransformError::data_format("role", format!("role {:?} has no id", role.name)))?;

    let cn = format!(
        "{} {}",
        group.text(attr::DISPLAY_NAME).unwrap_or_default(),
        role.name
    );

    let mut entry = DirectoryEntry::new(EntryKind::RoleGroup, dn::group_dn(&cn, base_dn))
        .with(attr::CN, cn.as_str())
        .with(attr::DISPLAY_NAME, cn.as_str())
        .with(attr::BASE_GROUP_ID, group_id)
        .with(attr::ID, role_id)
        .with("nsuniqueid", format!("r{role_id}"))
        .with(attr::OBJECT_CLASS, vec![OBJECT_CLASS_GROUP])
        .with(attr::UNIQUE_MEMBER, Vec::<String>::new());

    if let Some(type_role_id) = role.group_type_role_id {
        entry.set(attr::GROUP_TYPE_ROLE_ID, type_role_id);
    }

    Ok(entry)
}

/// Expands upstream groups into group and role-group entries.
///
/// Each group yields its base entry followed by one entry per exported role,
/// in input order. Roles are exported only when enabled, active, and not
/// matched by a role filter.
///
/// # Errors
///
/// Returns the first [`TransformError`] raised by a group or role.
pub fn group_entries_without_members(
    groups: &[ApiGroup],
    selection: &GroupSelection,
    roles: &RoleExport,
    base_dn: &str,
) -> TransformResult<Vec<DirectoryEntry>> {
    let mut entries = Vec::with_capacity(groups.len());

    for group in groups {
        let rule = group.id.and_then(|id| selection.rule_for(id));
        let base = transform_group(group, rule, base_dn)?;

        let mut role_groups = Vec::new();
        if roles.export {
            for role in &group.roles {
                if !role.is_active || roles.excludes(role.group_type_id, &role.name) {
                    continue;
                }
                role_groups.push(transform_role(&base, role, base_dn)?);
            }
        }

        entries.push(base);
        entries.append(&mut role_groups);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use ctl_core::{RoleFilter, RoleFilterScope};

    use super::*;

    fn group(id: i64, name: &str, roles: Vec<ApiRole>) -> ApiGroup {
        ApiGroup {
            id: Some(id),
            guid: Some(format!("guid-{id}")),
            name: Some(name.to_string()),
            roles,
            ..ApiGroup::default()
        }
    }

    fn role(id: i64, type_role_id: i64, name: &str, active: bool) -> ApiRole {
        ApiRole {
            id: Some(id),
            group_type_role_id: Some(type_role_id),
            group_type_id: Some(1),
            name: name.to_string(),
            is_active: active,
        }
    }

    #[test]
    fn transform_group_applies_rename_rule() {
        let rule = GroupTransform {
            gid: 2,
            name: Some("newGroupname".to_string()),
            object_class: None,
        };
        let entry = transform_group(&group(2, "This Group", vec![]), Some(&rule), "dc=site").unwrap();

        assert!(entry.dn.starts_with("cn=newgroupname,"));
        assert_eq!(entry.text(attr::CN), Some("newGroupname"));
        assert_eq!(entry.id(), Some(2));
        assert_eq!(entry.text(attr::GUID), Some("guid-2"));
        assert_eq!(entry.text("nsuniqueid"), Some("g2"));
        assert!(entry.members().is_empty());
    }

    #[test]
    fn transform_group_without_id_fails() {
        let err = transform_group(&ApiGroup::default(), None, "dc=site").unwrap_err();
        assert!(err.is_data_format());
        assert_eq!(err.record_kind(), "group");
    }

    #[test]
    fn transform_role_names_after_group() {
        let base = transform_group(&group(7, "Band", vec![]), None, "dc=site").unwrap();
        let entry = transform_role(&base, &role(3, 8, "Leiter", true), "dc=site").unwrap();

        assert_eq!(entry.kind, EntryKind::RoleGroup);
        assert_eq!(entry.dn, "cn=band leiter,ou=groups,dc=site");
        assert_eq!(entry.text(attr::CN), Some("Band Leiter"));
        assert_eq!(entry.number(attr::BASE_GROUP_ID), Some(7));
        assert_eq!(entry.number(attr::GROUP_TYPE_ROLE_ID), Some(8));
        assert_eq!(entry.text("nsuniqueid"), Some("r3"));
    }

    #[test]
    fn roles_are_exported_only_when_enabled() {
        let groups = vec![group(7, "Band", vec![role(3, 8, "Leiter", true)])];

        let entries = group_entries_without_members(
            &groups,
            &GroupSelection::default(),
            &RoleExport::default(),
            "dc=site",
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn inactive_and_filtered_roles_are_skipped() {
        let groups = vec![
            group(
                7,
                "Band",
                vec![
                    role(1, 8, "Leiter", true),
                    role(2, 9, "Teilnehmer", true),
                    role(3, 10, "Gast", false),
                ],
            ),
            group(8, "Chor", vec![role(4, 8, "Leiter", true)]),
        ];
        let roles = RoleExport {
            export: true,
            filter: vec![RoleFilter {
                scope: RoleFilterScope::Keyword("all".to_string()),
                role: "Teilnehmer".to_string(),
            }],
        };

        let entries =
            group_entries_without_members(&groups, &GroupSelection::default(), &roles, "dc=site")
                .unwrap();
        let names: Vec<_> = entries.iter().filter_map(|e| e.text(attr::CN)).collect();
        assert_eq!(names, ["Band", "Band Leiter", "Chor", "Chor Leiter"]);
    }

    #[test]
    fn bad_role_aborts_expansion() {
        let mut broken = role(1, 8, "Leiter", true);
        broken.id = None;
        let groups = vec![group(7, "Band", vec![broken])];
        let roles = RoleExport {
            export: true,
            filter: vec![],
        };

        let err = group_entries_without_members(&groups, &GroupSelection::default(), &roles, "dc=site")
            .unwrap_err();
        assert_eq!(err.record_kind(), "role");
    }
}
