//! Distinguished name helpers.
//!
//! Stored DNs are always lowercased; lookups go through [`normalize`] so
//! `cn=Foo, ou=users,dc=x` and `cn=foo,ou=users,dc=x` name the same entry.

use crate::{OU_GROUPS, OU_USERS};

/// Escapes an attribute value for use inside an RDN (RFC 4514).
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            '\\' | ',' | '+' | '"' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(c);
            }
            '\0' => result.push_str("\\00"),
            '#' if i == 0 => result.push_str("\\#"),
            ' ' if i == 0 || i == last => result.push_str("\\ "),
            _ => result.push(c),
        }
    }
    result
}

/// Builds `cn=<escaped cn>,<parent>`, lowercased.
#[must_use]
pub fn child_dn(cn: &str, parent: &str) -> String {
    format!("cn={},{parent}", escape_value(cn)).to_lowercase()
}

/// Builds the DN of a user entry below `ou=users`.
#[must_use]
pub fn user_dn(cn: &str, base_dn: &str) -> String {
    child_dn(cn, &ou_dn(OU_USERS, base_dn))
}

/// Builds the DN of a group entry below `ou=groups`.
#[must_use]
pub fn group_dn(cn: &str, base_dn: &str) -> String {
    child_dn(cn, &ou_dn(OU_GROUPS, base_dn))
}

/// Builds `ou=<ou>,<base>`.
#[must_use]
pub fn ou_dn(ou: &str, base_dn: &str) -> String {
    format!("ou={ou},{base_dn}")
}

/// Normalizes a DN for comparison.
///
/// Whitespace around unescaped RDN separators is removed and the result is
/// lowercased. Escaped characters, including escaped spaces, are kept.
#[must_use]
pub fn normalize(dn: &str) -> String {
    let mut result = String::with_capacity(dn.len());
    // Length of `result` that trimming may not cut into.
    let mut protected = 0;
    let mut skip_spaces = true;
    let mut chars = dn.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                result.push(c);
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
                protected = result.len();
                skip_spaces = false;
            }
            ',' => {
                let keep = result.trim_end().len().max(protected);
                result.truncate(keep);
                result.push(',');
                protected = result.len();
                skip_spaces = true;
            }
            c if c.is_whitespace() && skip_spaces => {}
            _ => {
                result.push(c);
                skip_spaces = false;
            }
        }
    }

    let keep = result.trim_end().len().max(protected);
    result.truncate(keep);
    result.to_lowercase()
}
