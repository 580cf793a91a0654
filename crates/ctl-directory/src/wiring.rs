//! Membership wiring.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use ctl_core::GroupSelection;
use ctl_model::{attr, dn, ApiMembership, DirectoryEntry, EntryKind};

/// Returns true if a membership belongs to a group or role-group entry.
///
/// A base group matches on its group id. A role-group matches on its role
/// type id only, since its `id` is the role id; entries with a base group id
/// additionally require the membership's group to be that base group.
#[must_use]
pub fn membership_matches(group: &DirectoryEntry, membership: &ApiMembership) -> bool {
    let type_role_id = group.number(attr::GROUP_TYPE_ROLE_ID);
    let matched = (group.kind == EntryKind::Group && group.id() == Some(membership.group_id))
        || (type_role_id.is_some() && membership.group_type_role_id == type_role_id);
    if !matched {
        return false;
    }

    match group.number(attr::BASE_GROUP_ID) {
        Some(base) => base == membership.group_id,
        None => true,
    }
}

/// Links users into groups according to the memberships.
///
/// Memberships naming unknown persons are skipped. Each link updates the
/// group's `uniqueMember` and the user's `memberOf` together; a group's
/// override rule with an object class appends it to every linked user.
pub fn connect_users_and_groups(
    memberships: &[ApiMembership],
    groups: &mut [DirectoryEntry],
    users: &mut [DirectoryEntry],
    selection: &GroupSelection,
) {
    let by_id: HashMap<i64, usize> = users
        .iter()
        .enumerate()
        .filter_map(|(index, user)| user.id().map(|id| (id, index)))
        .collect();

    for group in groups.iter_mut() {
        let extra_class = match (group.kind, group.id()) {
            (EntryKind::Group, Some(id)) => selection
                .rule_for(id)
                .and_then(|rule| rule.object_class.clone()),
            _ => None,
        };

        for membership in memberships {
            if !membership_matches(group, membership) {
                continue;
            }
            let Some(&index) = by_id.get(&membership.person_id) else {
                continue;
            };
            let user = &mut users[index];
            if group.members().contains(&user.dn) {
                continue;
            }

            DirectoryEntry::link_membership(group, user);
            if let Some(class) = &extra_class {
                if !user.object_classes().contains(class) {
                    user.push_value(attr::OBJECT_CLASS, class.as_str());
                }
            }
        }
    }
}

/// Keeps the first entry per normalized DN and drops later ones.
///
/// Returns the number of dropped entries.
pub fn drop_duplicate_dns(entries: &mut Vec<DirectoryEntry>) -> usize {
    let before = entries.len();
    let mut seen: HashMap<String, Option<i64>> = HashMap::with_capacity(before);
    entries.retain(|entry| match seen.entry(dn::normalize(&entry.dn)) {
        Entry::Occupied(kept) => {
            tracing::warn!(
                dn = %entry.dn,
                kept_id = ?kept.get(),
                dropped_id = ?entry.id(),
                "Dropping entry with duplicate DN"
            );
            false
        }
        Entry::Vacant(slot) => {
            slot.insert(entry.id());
            true
        }
    });
    before - entries.len()
}

/// Drops groups that ended up without members.
pub fn prune_empty_groups(groups: &mut Vec<DirectoryEntry>) {
    let before = groups.len();
    groups.retain(|group| !group.members().is_empty());
    tracing::debug!(dropped = before - groups.len(), "Pruned empty groups");
}
