//! # schemata-core
//!
//! Core types for schemata: the error taxonomy shared by every crate, settings
//! and their loader, and tracing-based logging helpers. This crate has no
//! dependency on the rest of the workspace.
//!
//! ## Modules
//!
//! - [`error`] - Error types, error kinds and result aliases
//! - [`settings`] - Runtime configuration
//! - [`settings_loader`] - TOML / JSON / environment loading
//! - [`logging`] - Tracing subscriber setup

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{ErrorKind, FieldError, SchemataError, SchemataResult, ValidationError};
pub use settings::Settings;
