//! Email address checks for account endpoints.

use std::sync::LazyLock;

use regex::Regex;

/// Mail providers accepted for registration and login.
pub const ALLOWED_DOMAINS: [&str; 3] = ["qq.com", "163.com", "126.com"];

static EMAIL_SHAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_well_formed(email: &str) -> bool {
    EMAIL_SHAPE.as_ref().is_some_and(|re| re.is_match(email))
}

/// Well-formed and hosted by one of [`ALLOWED_DOMAINS`] (case-insensitive).
pub fn is_allowed_email(email: &str) -> bool {
    if !is_well_formed(email) {
        return false;
    }
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.to_ascii_lowercase())
        .is_some_and(|domain| ALLOWED_DOMAINS.contains(&domain.as_str()))
}
