//! Management command framework.
//!
//! A [`ManagementCommand`] declares its clap arguments and handles a parsed
//! invocation against an open [`Schemata`] store, returning the JSON to
//! print. [`CommandRegistry`] collects commands, builds the top-level clap
//! `Command` and dispatches to the matching handler.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use schemata::{Schemata, SchemataResult};
//! use schemata_cli::command::ManagementCommand;
//!
//! struct CountCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for CountCommand {
//!     fn name(&self) -> &str { "count" }
//!     fn help(&self) -> &str { "Count registered objects" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         app: &Schemata,
//!     ) -> SchemataResult<serde_json::Value> {
//!         Ok(serde_json::json!(app.objects().list().await?.len()))
//!     }
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use schemata::{Schemata, SchemataError, SchemataResult};
use serde_json::Value as Json;

/// A command that can be registered and invoked through the CLI.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// Returns the name of this command (used to invoke it from the CLI).
    fn name(&self) -> &str;

    /// Returns a short help description for this command.
    fn help(&self) -> &str;

    /// Adds arguments or subcommands to the clap command.
    ///
    /// The default implementation returns the command unchanged.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command and returns the JSON to print.
    async fn handle(&self, matches: &clap::ArgMatches, app: &Schemata) -> SchemataResult<Json>;
}

/// A registry of management commands.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.list_commands())
            .finish()
    }
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a command, replacing any command with the same name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level `schemata` clap command with every registered
    /// subcommand and the global store options.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("schemata")
            .about("Manage schemata fields, objects and instances")
            .subcommand_required(true)
            .arg(
                clap::Arg::new("settings")
                    .long("settings")
                    .global(true)
                    .help("Settings file (.toml or .json)"),
            )
            .arg(
                clap::Arg::new("database")
                    .long("database")
                    .global(true)
                    .help("SQLite database path, overriding the settings"),
            )
            .arg(
                clap::Arg::new("pretty")
                    .long("pretty")
                    .global(true)
                    .action(clap::ArgAction::SetTrue)
                    .help("Pretty-print JSON output"),
            );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by_key(|(name, _)| (*name).clone());

        for (name, cmd) in entries {
            // Commands are registered once at startup, so leaking their names
            // for clap's `&'static str` is bounded.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }

        app
    }

    /// Dispatches to the command named by the parsed subcommand.
    pub async fn execute(&self, matches: &clap::ArgMatches, app: &Schemata) -> SchemataResult<Json> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            SchemataError::ConfigurationError("No subcommand specified".to_string())
        })?;

        let cmd = self.get(name).ok_or_else(|| {
            SchemataError::ConfigurationError(format!("Unknown command: {name}"))
        })?;

        tracing::debug!(command = name, "dispatching");
        cmd.handle(sub_matches, app).await
    }
}
