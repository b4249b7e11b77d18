//! # schemata-validation
//!
//! The validation engine. Given a resolved object schema and a JSON payload,
//! it checks requiredness, coerces every present value to the storage value
//! of its field's datatype and runs the field's rules in declared order.
//!
//! Errors accumulate across fields rather than short-circuiting, so every
//! problem with a payload is reported at once, in object field order.
//!
//! ## Module Overview
//!
//! - [`clean`] - Emptiness and datatype coercion
//! - [`validators`] - The `Validator` trait over compiled rules
//! - [`engine`] - `validate_payload` and `ValidationMode`

#![allow(clippy::doc_markdown)]
#![allow(clippy::result_large_err)]
#![allow(clippy::missing_const_for_fn)]

pub mod clean;
pub mod engine;
pub mod validators;

pub use clean::{clean_filter, clean_value, is_empty, is_empty_value, Invalid};
pub use engine::{validate_payload, CleanedValues, ValidationMode};
pub use validators::{run_rules, RuleFailure, Validator};
