//! Query construction and SQL compilation.
//!
//! - [`compiler`] - The [`Query`] AST, [`Row`] and the [`SqlCompiler`]
//! - [`lookups`] - Column lookups used in WHERE clauses

pub mod compiler;
pub mod lookups;

pub use compiler::{quote_ident, FromValue, OrderBy, Query, Row, SqlCompiler, WhereNode};
pub use lookups::{escape_like, Lookup, CASEFOLD_FN};
