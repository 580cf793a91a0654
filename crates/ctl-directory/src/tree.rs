//! Root skeleton, admin entries and full tree assembly.

use ctl_core::SiteConfig;
use ctl_model::{
    attr, dn, DirectoryEntry, EntryKind, RootTree, UpstreamData, OBJECT_CLASS_GROUP,
    OBJECT_CLASS_USER, OU_GROUPS, OU_USERS, SUBSCHEMA_DN,
};
use uuid::Uuid;

use crate::error::TransformResult;
use crate::group::group_entries_without_members;
use crate::user::{transform_users, unique_emails};
use crate::wiring::{connect_users_and_groups, drop_duplicate_dns, prune_empty_groups};

/// Users and groups of one sync cycle, plus the admin entry they were
/// wired against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryData {
    /// User entries.
    pub users: Vec<DirectoryEntry>,
    /// Group, role-group and admin group entries.
    pub groups: Vec<DirectoryEntry>,
    /// The admin account, member of the admin group.
    pub admin: DirectoryEntry,
}

/// Builds the local admin account entry `cn=<cn>,<base>`.
#[must_use]
pub fn admin_entry(cn: &str, base_dn: &str) -> DirectoryEntry {
    DirectoryEntry::new(EntryKind::Admin, dn::child_dn(cn, base_dn))
        .with(attr::CN, cn)
        .with(attr::DISPLAY_NAME, "Admin")
        .with(attr::ID, 0)
        .with(attr::UID, "Admin")
        .with("bbbrole", "admin")
        .with(attr::ENTRY_UUID, "admin0")
        .with("givenname", "Administrator")
        .with(
            attr::OBJECT_CLASS,
            vec![OBJECT_CLASS_USER, "simpleSecurityObject", "organizationalRole"],
        )
        .with(attr::MEMBER_OF, Vec::<String>::new())
}

/// Builds an empty admin group below `ou=groups`.
#[must_use]
pub fn admin_group(cn: &str, base_dn: &str) -> DirectoryEntry {
    DirectoryEntry::new(EntryKind::AdminGroup, dn::group_dn(cn, base_dn))
        .with(attr::CN, cn)
        .with(attr::ID, 0)
        .with(attr::DISPLAY_NAME, "Administrators")
        .with(attr::ENTRY_UUID, "admingroup0")
        .with(attr::OBJECT_CLASS, vec![OBJECT_CLASS_GROUP])
        .with(attr::UNIQUE_MEMBER, Vec::<String>::new())
}

/// Builds the admin group holding the admin account and every user whose id
/// is listed in `member_ids`.
pub fn add_users_admin_group(
    users: &mut [DirectoryEntry],
    admin: &mut DirectoryEntry,
    member_ids: &[i64],
    cn: &str,
    base_dn: &str,
) -> DirectoryEntry {
    let mut group = admin_group(cn, base_dn);
    for user in users.iter_mut() {
        if user.id().is_some_and(|id| member_ids.contains(&id)) {
            DirectoryEntry::link_membership(&mut group, user);
        }
    }
    DirectoryEntry::link_membership(&mut group, admin);
    group
}

/// Builds the root DSE and the two organizational unit containers.
#[must_use]
pub fn root_tree(base_dn: &str, admin_dn: &str, organization: &str) -> RootTree {
    let container = |ou: &str| {
        DirectoryEntry::new(EntryKind::OrganizationalUnit, dn::ou_dn(ou, base_dn))
            .with("o", organization)
            .with("ou", ou)
            .with(attr::CN, ou)
    };

    let root = DirectoryEntry::new(EntryKind::RootDse, base_dn)
        .with("creatorsname", admin_dn)
        .with("entrydn", base_dn)
        .with("entryuuid", Uuid::new_v4().to_string())
        .with("o", organization)
        .with("namingContexts", vec![base_dn])
        .with("objectclass", vec!["top", "RootDSE", "organization"])
        .with("structuralobjectclass", "organization")
        .with("subschemasubentry", SUBSCHEMA_DN);

    RootTree {
        root,
        users: container(OU_USERS),
        groups: container(OU_GROUPS),
    }
}

/// Builds a site's users and groups from one cycle's upstream data.
///
/// Groups are expanded, users converted, memberships wired, empty groups
/// pruned if configured, and the admin group appended last. `admin` is
/// copied with a fresh `memberOf` so repeated builds do not accumulate links.
///
/// # Errors
///
/// Returns the first [`TransformError`](crate::TransformError) of any record;
/// nothing is built in that case.
pub fn build_directory(
    site: &SiteConfig,
    data: &UpstreamData,
    admin: &DirectoryEntry,
) -> TransformResult<DirectoryData> {
    let base_dn = site.ldap.dc.as_str();

    let admin_group_dn = dn::group_dn(&site.admin_group.cn, base_dn);
    let mut groups =
        group_entries_without_members(&data.groups, &site.groups, &site.roles, base_dn)?;
    groups.retain(|group| {
        let collides = dn::normalize(&group.dn) == admin_group_dn;
        if collides {
            tracing::warn!(site = %site.name, dn = %group.dn, id = ?group.id(), "Group shadows the admin group, dropping it");
        }
        !collides
    });
    drop_duplicate_dns(&mut groups);

    let mut users = transform_users(&data.persons, site)?;
    if site.ldap.unique_emails {
        users = unique_emails(users);
    }
    drop_duplicate_dns(&mut users);

    connect_users_and_groups(&data.memberships, &mut groups, &mut users, &site.groups);

    if site.ldap.skip_empty_groups {
        tracing::info!(site = %site.name, "Skipping export of empty groups");
        prune_empty_groups(&mut groups);
    }

    let mut admin = admin.clone().with(attr::MEMBER_OF, Vec::<String>::new());
    groups.push(add_users_admin_group(
        &mut users,
        &mut admin,
        &site.admin_group.members,
        &site.admin_group.cn,
        base_dn,
    ));

    tracing::debug!(
        site = %site.name,
        users = users.len(),
        groups = groups.len(),
        "Built directory"
    );

    Ok(DirectoryData {
        users,
        groups,
        admin,
    })
}

#[cfg(test)]
mod tests {
    use ctl_core::AppConfig;
    use ctl_model::{ApiGroup, ApiMembership, ApiPerson, ApiRole};

    use super::*;

    fn site(extra: &str) -> SiteConfig {
        let config = AppConfig::from_toml_str(&format!(
            r#"
            [[sites]]
            name = "site"
            [sites.upstream]
            url = "https://site.church.tools"
            user = "bot"
            password = "pw"
            [sites.ldap]
            dc = "dc=site"
            admin = "root"
            password = "pw"
            {extra}
            "#
        ))
        .unwrap();
        config.sites.into_iter().next().unwrap()
    }

    fn person(id: i64, first: &str, last: &str) -> ApiPerson {
        ApiPerson {
            id: Some(id),
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            email: Some(format!("{first}@site")),
            ..ApiPerson::default()
        }
    }

    fn data() -> UpstreamData {
        UpstreamData {
            groups: vec![
                ApiGroup {
                    id: Some(7),
                    name: Some("Band".to_string()),
                    roles: vec![ApiRole {
                        id: Some(1),
                        group_type_role_id: Some(8),
                        group_type_id: Some(1),
                        name: "Leiter".to_string(),
                        is_active: true,
                    }],
                    ..ApiGroup::default()
                },
                ApiGroup {
                    id: Some(9),
                    name: Some("Leer".to_string()),
                    ..ApiGroup::default()
                },
            ],
            persons: vec![person(4, "Anna", "Alt"), person(5, "Bert", "Berg")],
            memberships: vec![
                ApiMembership {
                    person_id: 4,
                    group_id: 7,
                    group_type_role_id: Some(8),
                },
                ApiMembership::new(5, 7),
            ],
        }
    }

    #[test]
    fn admin_entries_have_fixed_shape() {
        let admin = admin_entry("Root", "dc=site");
        assert_eq!(admin.dn, "cn=root,dc=site");
        assert_eq!(admin.text(attr::CN), Some("Root"));
        assert_eq!(admin.external_id(), Some("admin0"));

        let group = admin_group("admin", "dcdc");
        assert_eq!(group.dn, "cn=admin,ou=groups,dcdc");
        assert_eq!(group.kind, EntryKind::AdminGroup);
    }

    #[test]
    fn admin_group_holds_admin_and_listed_users() {
        let mut users = vec![DirectoryEntry::new(EntryKind::User, "hho").with(attr::ID, 4)];
        let mut admin = DirectoryEntry::new(EntryKind::Admin, "hey");

        let group = add_users_admin_group(&mut users, &mut admin, &[4], "admin", "dcdc");
        assert_eq!(group.members(), ["hho", "hey"]);
        assert_eq!(admin.member_of(), ["cn=admin,ou=groups,dcdc"]);

        let mut admin = DirectoryEntry::new(EntryKind::Admin, "hey");
        let group = add_users_admin_group(&mut [], &mut admin, &[4], "admin", "dcdc");
        assert_eq!(group.members(), ["hey"]);
    }

    #[test]
    fn root_tree_names_contexts() {
        let tree = root_tree("dc=site", "cn=root,dc=site", "Site");

        assert_eq!(tree.root.dn, "dc=site");
        assert_eq!(tree.root.values("namingContexts"), ["dc=site"]);
        assert_eq!(tree.root.text("subschemasubentry"), Some(SUBSCHEMA_DN));
        assert_eq!(tree.users.dn, "ou=users,dc=site");
        assert_eq!(tree.groups.dn, "ou=groups,dc=site");
        assert_eq!(tree.groups.text("o"), Some("Site"));
    }

    #[test]
    fn build_directory_wires_everything() {
        let site = site("");
        let admin = admin_entry("root", "dc=site");

        let built = build_directory(&site, &data(), &admin).unwrap();

        assert_eq!(built.users.len(), 2);
        let names: Vec<_> = built.groups.iter().filter_map(|g| g.text(attr::CN)).collect();
        assert_eq!(names, ["Band", "Leer", "ldap-admins"]);
        assert_eq!(built.groups[0].members().len(), 2);
        assert_eq!(built.admin.member_of(), ["cn=ldap-admins,ou=groups,dc=site"]);

        // Every memberOf has a matching uniqueMember.
        for user in &built.users {
            for group_dn in user.member_of() {
                let group = built.groups.iter().find(|g| &g.dn == group_dn).unwrap();
                assert!(group.members().contains(&user.dn));
            }
        }
    }

    #[test]
    fn build_directory_exports_roles_and_prunes() {
        let site = site(
            r#"
            [sites.roles]
            export = true
            "#,
        );
        let mut site = site;
        site.ldap.skip_empty_groups = true;
        site.admin_group.members = vec![5];

        let built = build_directory(&site, &data(), &admin_entry("root", "dc=site")).unwrap();

        let names: Vec<_> = built.groups.iter().filter_map(|g| g.text(attr::CN)).collect();
        assert_eq!(names, ["Band", "Band Leiter", "ldap-admins"]);
        assert_eq!(built.groups[1].members(), ["cn=anna.alt,ou=users,dc=site"]);
        assert_eq!(built.groups[2].members().len(), 2);
    }

    #[test]
    fn repeated_builds_do_not_accumulate_admin_links() {
        let site = site("");
        let admin = admin_entry("root", "dc=site");

        let first = build_directory(&site, &data(), &admin).unwrap();
        let second = build_directory(&site, &data(), &first.admin).unwrap();

        assert_eq!(second.admin.member_of().len(), 1);
    }

    #[test]
    fn colliding_user_dns_keep_first_person() {
        let mut data = data();
        data.persons.push(person(6, "Anna", "Alt"));
        data.memberships.push(ApiMembership::new(6, 9));

        let built = build_directory(&site(""), &data, &admin_entry("root", "dc=site")).unwrap();

        let anna: Vec<_> = built
            .users
            .iter()
            .filter(|u| u.dn == "cn=anna.alt,ou=users,dc=site")
            .collect();
        assert_eq!(anna.len(), 1);
        assert_eq!(anna[0].id(), Some(4));
        assert_eq!(anna[0].member_of(), ["cn=band,ou=groups,dc=site"]);
        let leer = built.groups.iter().find(|g| g.id() == Some(9)).unwrap();
        assert!(leer.members().is_empty());
    }

    #[test]
    fn colliding_group_dns_keep_first_group() {
        let site = site(
            r#"
            [sites.roles]
            export = true
            "#,
        );
        let mut data = data();
        data.groups.push(ApiGroup {
            id: Some(11),
            name: Some("Band Leiter".to_string()),
            ..ApiGroup::default()
        });
        data.groups.push(ApiGroup {
            id: Some(12),
            name: Some("LDAP-Admins".to_string()),
            ..ApiGroup::default()
        });
        data.memberships.push(ApiMembership::new(5, 11));
        data.memberships.push(ApiMembership::new(5, 12));

        let built = build_directory(&site, &data, &admin_entry("root", "dc=site")).unwrap();

        let dns: Vec<_> = built.groups.iter().map(|g| dn::normalize(&g.dn)).collect();
        let mut unique = dns.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(dns.len(), unique.len());

        let leiter = built
            .groups
            .iter()
            .find(|g| g.dn == "cn=band leiter,ou=groups,dc=site")
            .unwrap();
        assert_eq!(leiter.kind, EntryKind::RoleGroup);
        assert_eq!(leiter.members(), ["cn=anna.alt,ou=users,dc=site"]);
        assert_eq!(built.groups.last().map(|g| g.kind), Some(EntryKind::AdminGroup));
        let bert = built.users.iter().find(|u| u.id() == Some(5)).unwrap();
        assert_eq!(bert.member_of(), ["cn=band,ou=groups,dc=site"]);
    }

    #[test]
    fn unique_emails_flag_drops_repeated_addresses() {
        let mut data = data();
        data.persons.push(person(6, "Anna", "Neu"));

        let built = build_directory(&site(""), &data, &admin_entry("root", "dc=site")).unwrap();
        assert_eq!(built.users.len(), 3);

        let mut site = site("");
        site.ldap.unique_emails = true;
        let built = build_directory(&site, &data, &admin_entry("root", "dc=site")).unwrap();
        let ids: Vec<_> = built.users.iter().filter_map(DirectoryEntry::id).collect();
        assert_eq!(ids, [4, 5]);
    }

    #[test]
    fn bad_record_aborts_build() {
        let mut broken = data();
        broken.persons.push(ApiPerson::default());

        let err = build_directory(&site(""), &broken, &admin_entry("root", "dc=site")).unwrap_err();
        assert_eq!(err.record_kind(), "person");
    }
}
