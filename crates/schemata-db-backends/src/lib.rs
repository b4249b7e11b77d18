//! # schemata-db-backends
//!
//! The SQLite implementation of [`DbExecutor`](schemata_db::DbExecutor).
//! Every call runs on the blocking pool under a time budget; a call that
//! times out or whose future is dropped is interrupted and rolled back.
//!
//! - [`sqlite`] - [`SqliteBackend`](sqlite::SqliteBackend)
//! - [`cancel`] - Per-call cancellation state

#![allow(clippy::doc_markdown)]
#![allow(clippy::result_large_err)]
#![allow(clippy::significant_drop_tightening)]

pub mod cancel;
pub mod sqlite;

pub use sqlite::SqliteBackend;
