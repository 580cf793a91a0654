//! Session cookie helpers.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Returns the `name=value` pair of a `Set-Cookie` header.
#[must_use]
pub fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap_or_default().trim()
}

/// Returns the `expires` attribute of a `Set-Cookie` header.
#[must_use]
pub fn cookie_expiry(set_cookie: &str) -> Option<&str> {
    set_cookie.split(';').skip(1).find_map(|attribute| {
        let (name, value) = attribute.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("expires")
            .then(|| value.trim())
    })
}

/// Parses a cookie date in RFC 1123 (`Wed, 21 Oct 2015 07:28:00 GMT`) or
/// dashed (`Wed, 21-Oct-2015 07:28:00 GMT`) form.
#[must_use]
pub fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%a, %d-%b-%Y %H:%M:%S GMT", "%a, %d-%b-%y %H:%M:%S GMT"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Returns true if the cookie has not expired at `now`.
///
/// A cookie without `expires` is a session cookie and stays valid; an
/// unparseable date counts as expired.
#[must_use]
pub fn cookie_is_valid(set_cookie: &str, now: DateTime<Utc>) -> bool {
    match cookie_expiry(set_cookie) {
        None => true,
        Some(value) => parse_cookie_date(value).is_some_and(|expires| expires > now),
    }
}
