//! Built-in management commands.
//!
//! Each resource command (`fields`, `objects`, `instances`) takes an action
//! subcommand, reads JSON arguments and returns JSON.

pub mod fields;
pub mod instances;
pub mod objects;

pub use fields::FieldsCommand;
pub use instances::InstancesCommand;
pub use objects::ObjectsCommand;

use crate::command::CommandRegistry;
use crate::serialization::read_json_arg;
use schemata::{SchemataError, SchemataResult};
use serde_json::Value as Json;

/// Registers all built-in management commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(FieldsCommand));
    registry.register(Box::new(ObjectsCommand));
    registry.register(Box::new(InstancesCommand));
}

/// A required positional string argument.
pub(crate) fn positional(name: &'static str, help: &'static str) -> clap::Arg {
    clap::Arg::new(name).required(true).help(help)
}

/// Returns the value of a required string argument.
pub(crate) fn required<'a>(matches: &'a clap::ArgMatches, name: &str) -> SchemataResult<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| SchemataError::ConfigurationError(format!("Missing argument <{name}>")))
}

/// Parses the value of a required JSON argument.
pub(crate) async fn required_json(matches: &clap::ArgMatches, name: &str) -> SchemataResult<Json> {
    read_json_arg(name, required(matches, name)?).await
}

/// Returns the action subcommand.
pub(crate) fn action(matches: &clap::ArgMatches) -> SchemataResult<(&str, &clap::ArgMatches)> {
    matches
        .subcommand()
        .ok_or_else(|| SchemataError::ConfigurationError("No action specified".to_string()))
}

pub(crate) fn unknown_action(name: &str) -> SchemataError {
    SchemataError::ConfigurationError(format!("Unknown action: {name}"))
}
