//! Column lookups used in WHERE clauses.
//!
//! The instance engine only needs a handful of comparisons: exact match for
//! filters and ids, case-insensitive substring match for search, membership
//! and null tests. Each [`Lookup`] is compiled by
//! [`SqlCompiler`](super::compiler::SqlCompiler) into a parameterized fragment.
//!
//! # Examples
//!
//! ```
//! use schemata_db::query::lookups::{escape_like, Lookup};
//! use schemata_db::value::Value;
//!
//! let by_id = Lookup::Exact(Value::from(7_i64));
//! let search = Lookup::IContains("50%".to_string());
//! assert_eq!(escape_like("50%"), "50\\%");
//! # let _ = (by_id, search);
//! ```

use crate::value::Value;

/// The escape character used in compiled `LIKE` patterns.
pub const LIKE_ESCAPE: char = '\\';

/// Unicode-aware lowercase scalar function that backends register on every
/// connection. `IContains` folds the column through it.
pub const CASEFOLD_FN: &str = "unicode_lower";

/// A column-level comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Exact match (`column = value`, or `IS NULL` for a null value).
    Exact(Value),
    /// Case-insensitive substring match, folding full Unicode case. `%` and
    /// `_` in the needle match literally.
    IContains(String),
    /// Membership test (`column IN (values...)`). An empty list matches nothing.
    In(Vec<Value>),
    /// `IS NULL` when `true`, `IS NOT NULL` when `false`.
    IsNull(bool),
}

/// Escapes `LIKE` wildcards (and the escape character itself) so the input
/// matches literally.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}
