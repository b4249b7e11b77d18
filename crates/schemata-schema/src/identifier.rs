//! Short-name rules.
//!
//! A short name doubles as a storage identifier (table or column name), so it
//! is restricted to lowercase ASCII identifiers and may not collide with the
//! columns every instance table carries or with the metadata tables.

use once_cell::sync::Lazy;
use regex::Regex;

static SHORT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,62}$").expect("valid regex"));

/// Columns present on every instance table.
pub const SYSTEM_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Prefixes reserved for metadata tables and SQLite internals.
pub const RESERVED_PREFIXES: [&str; 2] = ["schemata_", "sqlite_"];

/// Why a candidate short name was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameProblem {
    /// Does not match `^[a-z][a-z0-9_]{0,62}$`.
    Malformed,
    /// Collides with a system column or the metadata prefix.
    Reserved,
}

impl NameProblem {
    /// The error code reported in a field error.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Malformed => "invalid",
            Self::Reserved => "reserved",
        }
    }

    /// A human-readable message.
    pub const fn message(self) -> &'static str {
        match self {
            Self::Malformed => {
                "Must start with a lowercase letter and contain only lowercase letters, \
                 digits and underscores (at most 63 characters)."
            }
            Self::Reserved => "This name is reserved.",
        }
    }
}

/// Returns `true` if `name` is a well-formed short name.
pub fn is_well_formed(name: &str) -> bool {
    SHORT_NAME_RE.is_match(name)
}

/// Checks a candidate short name.
///
/// # Errors
///
/// Returns the first problem found with the name.
pub fn check_short_name(name: &str) -> Result<(), NameProblem> {
    if !is_well_formed(name) {
        return Err(NameProblem::Malformed);
    }
    if SYSTEM_COLUMNS.contains(&name) || RESERVED_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return Err(NameProblem::Reserved);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_identifiers() {
        assert!(check_short_name("email").is_ok());
        assert!(check_short_name("first_name2").is_ok());
        assert!(check_short_name(&format!("a{}", "b".repeat(62))).is_ok());
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "Email", "1abc", "_x", "a-b", "a b", "ä"] {
            assert_eq!(check_short_name(bad), Err(NameProblem::Malformed), "{bad}");
        }
        assert_eq!(
            check_short_name(&format!("a{}", "b".repeat(63))),
            Err(NameProblem::Malformed)
        );
    }

    #[test]
    fn test_rejects_reserved() {
        assert_eq!(check_short_name("id"), Err(NameProblem::Reserved));
        assert_eq!(check_short_name("created_at"), Err(NameProblem::Reserved));
        assert_eq!(check_short_name("schemata_field"), Err(NameProblem::Reserved));
        assert_eq!(check_short_name("sqlite_master"), Err(NameProblem::Reserved));
    }
}
