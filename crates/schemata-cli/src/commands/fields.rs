//! The `fields` management command.

use async_trait::async_trait;
use schemata::schema::{FieldDraft, FieldPatch};
use schemata::{Schemata, SchemataResult};
use serde_json::{json, Value as Json};

use super::{action, positional, required, required_json, unknown_action};
use crate::command::ManagementCommand;

/// Lists, shows, registers, updates and deletes field definitions.
///
/// ```text
/// schemata fields register '{"shortName":"email","displayName":"Email","datatype":"email"}'
/// schemata fields update email '{"mandatory":true}'
/// schemata fields delete email
/// ```
pub struct FieldsCommand;

#[async_trait]
impl ManagementCommand for FieldsCommand {
    fn name(&self) -> &'static str {
        "fields"
    }

    fn help(&self) -> &'static str {
        "Manage field definitions"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.subcommand_required(true)
            .subcommand(clap::Command::new("list").about("List every field"))
            .subcommand(
                clap::Command::new("get")
                    .about("Show one field")
                    .arg(positional("name", "Field short name")),
            )
            .subcommand(
                clap::Command::new("register")
                    .about("Register a field from a JSON definition")
                    .arg(positional("definition", "JSON definition, or @file")),
            )
            .subcommand(
                clap::Command::new("update")
                    .about("Apply a JSON patch to a field")
                    .arg(positional("name", "Field short name"))
                    .arg(positional("patch", "JSON patch, or @file")),
            )
            .subcommand(
                clap::Command::new("delete")
                    .about("Delete an unreferenced field")
                    .arg(positional("name", "Field short name")),
            )
    }

    async fn handle(&self, matches: &clap::ArgMatches, app: &Schemata) -> SchemataResult<Json> {
        let fields = app.fields();
        match action(matches)? {
            ("list", _) => Ok(serde_json::to_value(fields.list().await?)?),
            ("get", args) => Ok(serde_json::to_value(fields.get(required(args, "name")?).await?)?),
            ("register", args) => {
                let draft = FieldDraft::from_json(required_json(args, "definition").await?)?;
                Ok(serde_json::to_value(fields.register(draft).await?)?)
            }
            ("update", args) => {
                let patch = FieldPatch::from_json(required_json(args, "patch").await?)?;
                let updated = fields.update(required(args, "name")?, patch).await?;
                Ok(serde_json::to_value(updated)?)
            }
            ("delete", args) => {
                let name = required(args, "name")?;
                fields.delete(name).await?;
                Ok(json!({ "deleted": name }))
            }
            (other, _) => Err(unknown_action(other)),
        }
    }
}
