//! The `objects` management command.

use async_trait::async_trait;
use schemata::schema::{ObjectDraft, ObjectPatch};
use schemata::{Schemata, SchemataResult};
use serde_json::{json, Value as Json};

use super::{action, positional, required, required_json, unknown_action};
use crate::command::ManagementCommand;

/// Lists, shows, registers, updates and deletes object definitions.
///
/// Registering or updating an object provisions its table; deleting it drops
/// the table together with every stored instance.
pub struct ObjectsCommand;

#[async_trait]
impl ManagementCommand for ObjectsCommand {
    fn name(&self) -> &'static str {
        "objects"
    }

    fn help(&self) -> &'static str {
        "Manage object definitions"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.subcommand_required(true)
            .subcommand(clap::Command::new("list").about("List every object"))
            .subcommand(
                clap::Command::new("get")
                    .about("Show one object")
                    .arg(positional("name", "Object short name")),
            )
            .subcommand(
                clap::Command::new("register")
                    .about("Register an object from a JSON definition")
                    .arg(positional("definition", "JSON definition, or @file")),
            )
            .subcommand(
                clap::Command::new("update")
                    .about("Apply a JSON patch to an object")
                    .arg(positional("name", "Object short name"))
                    .arg(positional("patch", "JSON patch, or @file")),
            )
            .subcommand(
                clap::Command::new("delete")
                    .about("Delete an object and its stored instances")
                    .arg(positional("name", "Object short name")),
            )
    }

    async fn handle(&self, matches: &clap::ArgMatches, app: &Schemata) -> SchemataResult<Json> {
        let objects = app.objects();
        match action(matches)? {
            ("list", _) => Ok(serde_json::to_value(objects.list().await?)?),
            ("get", args) => Ok(serde_json::to_value(objects.get(required(args, "name")?).await?)?),
            ("register", args) => {
                let draft = ObjectDraft::from_json(required_json(args, "definition").await?)?;
                Ok(serde_json::to_value(objects.register(draft).await?)?)
            }
            ("update", args) => {
                let patch = ObjectPatch::from_json(required_json(args, "patch").await?)?;
                let updated = objects.update(required(args, "name")?, patch).await?;
                Ok(serde_json::to_value(updated)?)
            }
            ("delete", args) => {
                let name = required(args, "name")?;
                objects.delete(name).await?;
                Ok(json!({ "deleted": name }))
            }
            (other, _) => Err(unknown_action(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandRegistry;
    use crate::commands::register_builtin_commands;

    async fn run(app: &Schemata, args: &[&str]) -> SchemataResult<Json> {
        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry);
        let matches = registry
            .build_cli()
            .try_get_matches_from(std::iter::once("schemata").chain(args.iter().copied()))
            .unwrap();
        registry.execute(&matches, app).await
    }

    #[tokio::test]
    async fn test_object_actions() {
        let app = Schemata::in_memory().await.unwrap();
        run(
            &app,
            &["fields", "register", r#"{"shortName":"title","displayName":"Title","datatype":"text"}"#],
        )
        .await
        .unwrap();

        let created = run(
            &app,
            &[
                "objects",
                "register",
                r#"{"shortName":"book","displayName":"Book","fields":[{"fieldShortName":"title","order":0}]}"#,
            ],
        )
        .await
        .unwrap();
        assert_eq!(created["shortName"], "book");
        assert_eq!(created["fields"][0]["fieldShortName"], "title");

        let updated = run(&app, &["objects", "update", "book", r#"{"displayName":"Books"}"#])
            .await
            .unwrap();
        assert_eq!(updated["displayName"], "Books");

        let err = run(&app, &["fields", "delete", "title"]).await.unwrap_err();
        assert_eq!(err.status_code(), 409);

        run(&app, &["objects", "delete", "book"]).await.unwrap();
        let listed = run(&app, &["objects", "list"]).await.unwrap();
        assert_eq!(listed, json!([]));
    }
}
