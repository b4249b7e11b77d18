//! # schemata-db
//!
//! Storage layer abstractions for schemata. Provides the backend-agnostic
//! [`Value`](value::Value) enum, the single-table [`Query`](query::Query) AST
//! and its [`SqlCompiler`](query::SqlCompiler), and the async
//! [`DbExecutor`](executor::DbExecutor) trait implemented by
//! `schemata-db-backends`.
//!
//! Nothing in this crate talks to a database directly: the schema provisioner
//! and the instance engine build statements here and hand them to an executor.
//!
//! ## Module Overview
//!
//! - [`value`] - The [`Value`](value::Value) enum
//! - [`query`] - Query AST, lookups, rows and compilation
//! - [`executor`] - The [`DbExecutor`](executor::DbExecutor) trait and atomic
//!   [`Statement`](executor::Statement) batches

#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::result_large_err)]
#![allow(clippy::return_self_not_must_use)]

pub mod executor;
pub mod query;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use executor::{DbExecutor, Statement};
pub use query::{FromValue, Lookup, OrderBy, Query, Row, SqlCompiler, WhereNode};
pub use value::Value;
