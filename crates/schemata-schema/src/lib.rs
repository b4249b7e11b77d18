//! # schemata-schema
//!
//! The live schema: field and object definitions, their metadata tables, and
//! the instance tables provisioned from them.
//!
//! ## Architecture
//!
//! - A [`FieldDefinition`] is a reusable, typed unit of data with validation
//!   rules.
//! - An [`ObjectDefinition`] is a record type made of field references plus
//!   display, search and sort metadata.
//! - The [`FieldRegistry`] and [`ObjectRegistry`] own every change to the
//!   schema. Metadata writes and the matching DDL from the [`Provisioner`]
//!   commit in a single transaction.
//! - [`KeyedLocks`] serialize mutations that touch the same object or field.
//! - The [`SchemaCache`] holds resolved [`ObjectSchema`]s for the validation
//!   and instance engines.
//!
//! ## Module Overview
//!
//! - [`identifier`] - Short-name rules
//! - [`datatype`] - The `Datatype` enum and datatype property checks
//! - [`rules`] - Validation rule definitions and compilation
//! - [`field`] - `FieldDefinition`, `FieldDraft`, `FieldPatch`
//! - [`object`] - `ObjectDefinition`, `ObjectDraft`, `ObjectPatch`
//! - [`schema`] - Resolved `ObjectSchema`
//! - [`store`] - Metadata tables
//! - [`provisioner`] - `SchemaEditor` and `Provisioner`
//! - [`locks`] - `KeyedLocks`
//! - [`cache`] - `SchemaCache`
//! - [`registry`] - `FieldRegistry`, `ObjectRegistry`, `SchemaContext`

#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_pass_by_value)]

pub mod cache;
pub mod datatype;
pub mod field;
pub mod identifier;
pub mod locks;
pub mod object;
pub mod provisioner;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod store;

// Re-export key types at the crate root.
pub use cache::SchemaCache;
pub use datatype::Datatype;
pub use field::{FieldDefinition, FieldDraft, FieldPatch};
pub use locks::KeyedLocks;
pub use object::{
    DisplayProperties, ObjectDefinition, ObjectDraft, ObjectFieldRef, ObjectPatch, SortOrder,
};
pub use provisioner::{Provisioner, SchemaEditor, SqliteSchemaEditor};
pub use registry::{FieldRegistry, ObjectRegistry, SchemaContext};
pub use rules::{CompiledRule, Rule, ValidationRule};
pub use schema::{ObjectSchema, ResolvedField};

use chrono::{DateTime, Utc};

/// Timestamp used for `createdAt` / `updatedAt`.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}
