//! The `schemata` command-line tool.
//!
//! Settings come from `--settings <file>` (TOML or JSON) or the defaults,
//! then `SCHEMATA_*` environment variables, then `--database`. Results are
//! printed to stdout as JSON; failures are printed to stderr as
//! `{"error": {...}}` with a non-zero exit status.

use std::process::ExitCode;

use schemata::core::logging::setup_logging;
use schemata::core::settings_loader;
use schemata::{ErrorKind, Schemata, SchemataResult, Settings};
use schemata_cli::commands::register_builtin_commands;
use schemata_cli::serialization::{error_body, serializer};
use schemata_cli::CommandRegistry;

#[tokio::main]
async fn main() -> ExitCode {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();
    let out = serializer(matches.get_flag("pretty"));

    let result = async {
        let settings = load_settings(&matches)?;
        setup_logging(&settings);
        let app = Schemata::open(&settings).await?;
        let output = registry.execute(&matches, &app).await?;
        out.serialize(&output)
    }
    .await;

    match result {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::debug!(error = %error, "command failed");
            let body = error_body(&error);
            eprintln!(
                "{}",
                out.serialize(&body).unwrap_or_else(|_| body.to_string())
            );
            ExitCode::from(exit_status(error.kind()))
        }
    }
}

fn load_settings(matches: &clap::ArgMatches) -> SchemataResult<Settings> {
    let mut settings = match matches.get_one::<String>("settings") {
        Some(path) => settings_loader::from_file_with_env(path)?,
        None => settings_loader::from_env()?,
    };
    if let Some(database) = matches.get_one::<String>("database") {
        settings.database.path = database.into();
    }
    Ok(settings)
}

const fn exit_status(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InternalError => 1,
        ErrorKind::ValidationError => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::DuplicateError | ErrorKind::ConstraintError => 4,
    }
}
