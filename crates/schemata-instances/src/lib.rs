//! # schemata-instances
//!
//! The generic instance engine. Every object type registered through
//! `schemata-schema` gets the same list, get, create, update and delete
//! operations, driven entirely by its resolved schema.
//!
//! ## Module Overview
//!
//! - [`params`] - List parameters and paging
//! - [`response`] - `Instance` and `InstancePage`
//! - [`engine`] - `InstanceEngine`

#![allow(clippy::doc_markdown)]
#![allow(clippy::result_large_err)]
#![allow(clippy::cast_possible_truncation)]

pub mod engine;
pub mod params;
pub mod response;

pub use engine::InstanceEngine;
pub use params::{ListParams, PageLimits, PageRequest};
pub use response::{Instance, InstancePage};
