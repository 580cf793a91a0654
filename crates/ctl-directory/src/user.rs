//! Person to user entry conversion.

use std::collections::HashSet;

use ctl_core::{ConfiguredAttribute, SiteConfig};
use ctl_model::{attr, dn, ApiPerson, DirectoryEntry, EntryKind, OBJECT_CLASS_USER};

use crate::error::{TransformError, TransformResult};

/// Object classes every exported user carries.
const USER_OBJECT_CLASSES: [&str; 4] = [OBJECT_CLASS_USER, "person", "organizationalPerson", "user"];

/// Lowercases and replaces German umlauts and sharp s.
#[must_use]
pub fn fold_umlauts(value: &str) -> String {
    value
        .to_lowercase()
        .replace('ö', "oe")
        .replace('ä', "ae")
        .replace('ü', "ue")
        .replace('ß', "ss")
}

/// Returns the user identifier (`cn` and `uid`) of a person.
///
/// An explicit external id wins; otherwise `firstName.lastName` is folded to
/// lowercase ASCII-ish form.
#[must_use]
pub fn user_identifier(person: &ApiPerson) -> String {
    if let Some(id) = person.external_id() {
        return id.to_string();
    }
    fold_umlauts(&format!(
        "{}.{}",
        person.first_name.as_deref().unwrap_or_default(),
        person.last_name.as_deref().unwrap_or_default()
    ))
}

/// Converts a person into a user entry below `ou=users`.
///
/// # Errors
///
/// Returns [`TransformError::DataFormat`] if the person has no id.
pub fn transform_user(person: &ApiPerson, site: &SiteConfig) -> TransformResult<DirectoryEntry> {
    let id = person
        .id
        .ok_or_else(|| TransformError::data_format("person", "record has no id"))?;

    let mut cn = user_identifier(person);
    if site.ldap.userid_lowercase {
        cn = cn.to_lowercase();
    }

    let first_name = person.first_name.as_deref().unwrap_or_default();
    let last_name = person.last_name.as_deref().unwrap_or_default();

    let mut entry = DirectoryEntry::new(EntryKind::User, dn::user_dn(&cn, &site.ldap.dc))
        .with(attr::CN, cn.as_str())
        .with(attr::ID, id)
        .with(attr::DISPLAY_NAME, format!("{first_name} {last_name}"))
        .with(attr::UID, cn.as_str())
        .with(attr::OBJECT_CLASS, USER_OBJECT_CLASSES.to_vec())
        .with(attr::MEMBER_OF, Vec::<String>::new());

    let optional = [
        (attr::GUID, &person.guid),
        (attr::ENTRY_UUID, &person.guid),
        ("givenname", &person.first_name),
        ("street", &person.street),
        ("telephoneMobile", &person.mobile),
        ("telephoneHome", &person.phone_private),
        ("postalCode", &person.zip),
        ("l", &person.city),
        ("sn", &person.last_name),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            entry.set(name, value.as_str());
        }
    }

    if let Some(email) = &person.email {
        let email = email.to_lowercase();
        entry.set(attr::EMAIL, email.as_str());
        entry.set(attr::MAIL, email);
    }

    add_config_attributes(&mut entry, &site.attributes);
    Ok(entry)
}

/// Sets every configured attribute on a user entry.
///
/// The value is the attribute's default unless a replacement names the
/// user's id.
pub fn add_config_attributes(entry: &mut DirectoryEntry, attributes: &[ConfiguredAttribute]) {
    let id = entry.id();
    for attribute in attributes {
        let value = match id {
            Some(id) => attribute.value_for(id),
            None => attribute.default.as_str(),
        };
        entry.set(&attribute.name, value);
    }
}

/// Converts all persons, failing on the first bad record.
///
/// # Errors
///
/// Returns the first [`TransformError`] raised by [`transform_user`].
pub fn transform_users(persons: &[ApiPerson], site: &SiteConfig) -> TransformResult<Vec<DirectoryEntry>> {
    persons.iter().map(|p| transform_user(p, site)).collect()
}

/// Keeps the first user per email address and drops users without one.
#[must_use]
pub fn unique_emails(users: Vec<DirectoryEntry>) -> Vec<DirectoryEntry> {
    let mut seen = HashSet::new();
    users
        .into_iter()
        .filter(|user| match user.text(attr::EMAIL) {
            Some(email) if !email.is_empty() => seen.insert(email.to_string()),
            _ => false,
        })
        .collect()
}
