//! The `instances` management command.

use async_trait::async_trait;
use schemata::core::ValidationError;
use schemata::schema::SortOrder;
use schemata::{ListParams, Schemata, SchemataResult};
use serde_json::{json, Value as Json};

use super::{action, positional, required, required_json, unknown_action};
use crate::command::ManagementCommand;
use crate::serialization::read_json_arg;

/// Lists, shows, creates, updates and deletes instances of any object type.
///
/// ```text
/// schemata instances create customer '{"email":"a@b.com"}'
/// schemata instances list customer --search ada --filter status=open --page-size 10
/// schemata instances delete customer 1
/// ```
pub struct InstancesCommand;

fn id_arg() -> clap::Arg {
    positional("id", "Instance id").value_parser(clap::value_parser!(i64))
}

#[async_trait]
impl ManagementCommand for InstancesCommand {
    fn name(&self) -> &'static str {
        "instances"
    }

    fn help(&self) -> &'static str {
        "Manage stored instances"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        let object = || positional("object", "Object short name");
        cmd.subcommand_required(true)
            .subcommand(
                clap::Command::new("list")
                    .about("List instances with search, filters, sorting and paging")
                    .arg(object())
                    .arg(
                        clap::Arg::new("params")
                            .long("params")
                            .help("List parameters as JSON, or @file; flags override it"),
                    )
                    .arg(
                        clap::Arg::new("page")
                            .long("page")
                            .value_parser(clap::value_parser!(u64)),
                    )
                    .arg(
                        clap::Arg::new("page_size")
                            .long("page-size")
                            .value_parser(clap::value_parser!(u64)),
                    )
                    .arg(clap::Arg::new("sort_by").long("sort-by"))
                    .arg(
                        clap::Arg::new("sort_order")
                            .long("sort-order")
                            .help("asc or desc"),
                    )
                    .arg(clap::Arg::new("search").long("search"))
                    .arg(
                        clap::Arg::new("filter")
                            .long("filter")
                            .action(clap::ArgAction::Append)
                            .help("field=value; the value may be JSON"),
                    ),
            )
            .subcommand(
                clap::Command::new("get")
                    .about("Show one instance")
                    .arg(object())
                    .arg(id_arg()),
            )
            .subcommand(
                clap::Command::new("create")
                    .visible_alias("register")
                    .about("Create an instance from a JSON payload")
                    .arg(object())
                    .arg(positional("payload", "JSON payload, or @file")),
            )
            .subcommand(
                clap::Command::new("update")
                    .about("Apply a partial JSON payload to an instance")
                    .arg(object())
                    .arg(id_arg())
                    .arg(positional("payload", "JSON payload, or @file")),
            )
            .subcommand(
                clap::Command::new("delete")
                    .about("Delete an instance")
                    .arg(object())
                    .arg(id_arg()),
            )
    }

    async fn handle(&self, matches: &clap::ArgMatches, app: &Schemata) -> SchemataResult<Json> {
        let engine = app.instances();
        let (name, args) = action(matches)?;
        let object = required(args, "object")?;
        let id = args.try_get_one::<i64>("id").ok().flatten().copied();
        match (name, id) {
            ("list", _) => {
                let params = list_params(args).await?;
                Ok(serde_json::to_value(engine.list(object, &params).await?)?)
            }
            ("get", Some(id)) => Ok(serde_json::to_value(engine.get(object, id).await?)?),
            ("create", _) => {
                let payload = required_json(args, "payload").await?;
                Ok(serde_json::to_value(engine.create(object, &payload).await?)?)
            }
            ("update", Some(id)) => {
                let payload = required_json(args, "payload").await?;
                Ok(serde_json::to_value(engine.update(object, id, &payload).await?)?)
            }
            ("delete", Some(id)) => Ok(json!({ "deleted": engine.delete(object, id).await? })),
            (other, _) => Err(unknown_action(other)),
        }
    }
}

/// Builds list parameters from `--params` overlaid with the individual flags.
async fn list_params(args: &clap::ArgMatches) -> SchemataResult<ListParams> {
    let mut params = match args.get_one::<String>("params") {
        Some(raw) => serde_json::from_value(read_json_arg("params", raw).await?).map_err(|e| {
            ValidationError::field("params", "invalid", format!("Malformed list parameters: {e}"))
        })?,
        None => ListParams::new(),
    };
    if let Some(page) = args.get_one::<u64>("page") {
        params.page = Some(*page);
    }
    if let Some(size) = args.get_one::<u64>("page_size") {
        params.page_size = Some(*size);
    }
    if let Some(sort_by) = args.get_one::<String>("sort_by") {
        params.sort_by = Some(sort_by.clone());
    }
    if let Some(order) = args.get_one::<String>("sort_order") {
        let order = order
            .parse::<SortOrder>()
            .map_err(|message| ValidationError::field("sortOrder", "invalid", message))?;
        params.sort_order = Some(order);
    }
    if let Some(search) = args.get_one::<String>("search") {
        params.search = Some(search.clone());
    }
    for filter in args.get_many::<String>("filter").into_iter().flatten() {
        let (key, value) = parse_filter(filter)?;
        params.filters.insert(key, value);
    }
    Ok(params)
}

/// Splits `key=value`. The value is read as JSON when it parses, so
/// `age=30` is a number and `email=null` matches absent values; anything
/// else is a string.
fn parse_filter(raw: &str) -> Result<(String, Json), ValidationError> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        ValidationError::field("filter", "invalid", format!("Expected field=value, got '{raw}'."))
    })?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Json::String(value.to_string()));
    Ok((key.trim().to_string(), value))
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

    async fn people() -> Schemata {
        let app = Schemata::in_memory().await.unwrap();
        for definition in [
            r#"{"shortName":"name","displayName":"Name","datatype":"text","mandatory":true}"#,
            r#"{"shortName":"age","displayName":"Age","datatype":"integer"}"#,
        ] {
            run(&app, &["fields", "register", definition]).await.unwrap();
        }
        run(
            &app,
            &[
                "objects",
                "register",
                r#"{"shortName":"person","displayName":"Person",
                    "fields":[{"fieldShortName":"name","order":0},{"fieldShortName":"age","order":1}],
                    "displayProperties":{"searchableFields":["name"]}}"#,
            ],
        )
        .await
        .unwrap();
        app
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(parse_filter("age=30").unwrap(), ("age".into(), json!(30)));
        assert_eq!(parse_filter("name=Ada").unwrap(), ("name".into(), json!("Ada")));
        assert_eq!(parse_filter("age=null").unwrap(), ("age".into(), Json::Null));
        assert!(parse_filter("age").unwrap_err().has_field("filter"));
    }

    #[tokio::test]
    async fn test_instance_actions() {
        let app = people().await;

        let created = run(&app, &["instances", "create", "person", r#"{"name":"Ada","age":36}"#])
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap().to_string();
        assert_eq!(created["name"], "Ada");

        let updated = run(&app, &["instances", "update", "person", &id, r#"{"age":37}"#])
            .await
            .unwrap();
        assert_eq!(updated["age"], 37);
        assert_eq!(updated["name"], "Ada");

        let fetched = run(&app, &["instances", "get", "person", &id]).await.unwrap();
        assert_eq!(fetched, updated);

        let deleted = run(&app, &["instances", "delete", "person", &id]).await.unwrap();
        assert_eq!(deleted, json!({"deleted": true}));

        let err = run(&app, &["instances", "delete", "person", &id]).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_list_flags() {
        let app = people().await;
        for (name, age) in [("Ada", 36), ("Bob", 41), ("Adele", 36)] {
            let payload = json!({"name": name, "age": age}).to_string();
            run(&app, &["instances", "register", "person", &payload]).await.unwrap();
        }

        let page = run(
            &app,
            &[
                "instances", "list", "person", "--search", "ad", "--sort-by", "name",
                "--sort-order", "desc", "--filter", "age=36", "--page-size", "1",
            ],
        )
        .await
        .unwrap();
        assert_eq!(page["count"], 2);
        assert_eq!(page["totalPages"], 2);
        assert_eq!(page["results"][0]["name"], "Adele");

        let page = run(
            &app,
            &["instances", "list", "person", "--params", r#"{"page":2,"pageSize":2}"#],
        )
        .await
        .unwrap();
        assert_eq!(page["results"].as_array().unwrap().len(), 1);

        let err = run(&app, &["instances", "list", "person", "--sort-order", "sideways"])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
