//! Metadata persistence.
//!
//! Field and object definitions live in three metadata tables next to the
//! instance tables they describe:
//!
//! - `schemata_field`: one row per field definition
//! - `schemata_object`: one row per object definition (field list and
//!   display properties as JSON)
//! - `schemata_object_field`: one row per (object, field) reference, with a
//!   `RESTRICT` foreign key onto `schemata_field` so storage itself refuses to
//!   drop a field that is still referenced
//!
//! Reads run directly; writes are returned as [`Statement`]s so the registry
//! can commit them in the same transaction as the matching DDL.

use crate::datatype::Datatype;
use crate::field::FieldDefinition;
use crate::object::ObjectDefinition;
use schemata_core::{SchemataError, SchemataResult};
use schemata_db::executor::{fetch_all, DbExecutor, Statement};
use schemata_db::query::{Lookup, OrderBy, Query, Row, SqlCompiler, WhereNode};
use schemata_db::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Field metadata table.
pub const FIELD_TABLE: &str = "schemata_field";
/// Object metadata table.
pub const OBJECT_TABLE: &str = "schemata_object";
/// Object-to-field reference table.
pub const LINK_TABLE: &str = "schemata_object_field";

const BOOTSTRAP: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS \"schemata_field\" (\
        \"short_name\" TEXT PRIMARY KEY, \
        \"display_name\" TEXT NOT NULL, \
        \"description\" TEXT NOT NULL DEFAULT '', \
        \"datatype\" TEXT NOT NULL, \
        \"datatype_properties\" TEXT NOT NULL DEFAULT '{}', \
        \"mandatory\" INTEGER NOT NULL DEFAULT 0, \
        \"validation_rules\" TEXT NOT NULL DEFAULT '[]', \
        \"created_at\" TEXT NOT NULL, \
        \"updated_at\" TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS \"schemata_object\" (\
        \"short_name\" TEXT PRIMARY KEY, \
        \"display_name\" TEXT NOT NULL, \
        \"description\" TEXT NOT NULL DEFAULT '', \
        \"fields\" TEXT NOT NULL DEFAULT '[]', \
        \"display_properties\" TEXT NOT NULL DEFAULT '{}', \
        \"created_at\" TEXT NOT NULL, \
        \"updated_at\" TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS \"schemata_object_field\" (\
        \"object_short_name\" TEXT NOT NULL \
            REFERENCES \"schemata_object\" (\"short_name\") ON DELETE CASCADE, \
        \"field_short_name\" TEXT NOT NULL \
            REFERENCES \"schemata_field\" (\"short_name\") ON DELETE RESTRICT, \
        PRIMARY KEY (\"object_short_name\", \"field_short_name\"))",
    "CREATE INDEX IF NOT EXISTS \"schemata_object_field_by_field\" \
        ON \"schemata_object_field\" (\"field_short_name\")",
];

/// Reads and writes field and object metadata.
#[derive(Clone)]
pub struct MetadataStore {
    db: Arc<dyn DbExecutor>,
    compiler: SqlCompiler,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore").finish_non_exhaustive()
    }
}

impl MetadataStore {
    /// Creates a store over `db`.
    pub fn new(db: Arc<dyn DbExecutor>) -> Self {
        Self {
            db,
            compiler: SqlCompiler::new(),
        }
    }

    /// Creates the metadata tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn bootstrap(&self) -> SchemataResult<()> {
        self.db
            .atomic(BOOTSTRAP.iter().map(|sql| Statement::raw(*sql)).collect())
            .await?;
        tracing::debug!("metadata tables ready");
        Ok(())
    }

    // ── Fields ───────────────────────────────────────────────────────

    /// Loads one field definition.
    ///
    /// # Errors
    ///
    /// Propagates backend errors and undecodable rows.
    pub async fn get_field(&self, name: &str) -> SchemataResult<Option<FieldDefinition>> {
        let query = Query::new(FIELD_TABLE).filter(WhereNode::exact("short_name", name));
        fetch_all(self.db.as_ref(), &query)
            .await?
            .first()
            .map(field_from_row)
            .transpose()
    }

    /// Loads every field definition, sorted by short name.
    ///
    /// # Errors
    ///
    /// Propagates backend errors and undecodable rows.
    pub async fn list_fields(&self) -> SchemataResult<Vec<FieldDefinition>> {
        let query = Query::new(FIELD_TABLE).order(OrderBy::asc("short_name"));
        fetch_all(self.db.as_ref(), &query)
            .await?
            .iter()
            .map(field_from_row)
            .collect()
    }

    /// Loads the named field definitions; unknown names are simply absent.
    ///
    /// # Errors
    ///
    /// Propagates backend errors and undecodable rows.
    pub async fn fields_named(&self, names: &[&str]) -> SchemataResult<HashMap<String, FieldDefinition>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }
        let values = names.iter().map(|n| Value::from(*n)).collect();
        let query = Query::new(FIELD_TABLE).filter(WhereNode::condition("short_name", Lookup::In(values)));
        fetch_all(self.db.as_ref(), &query)
            .await?
            .iter()
            .map(|row| field_from_row(row).map(|f| (f.short_name.clone(), f)))
            .collect()
    }

    /// Names of the objects that reference `field`, sorted.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn objects_using_field(&self, field: &str) -> SchemataResult<Vec<String>> {
        let query = Query::new(LINK_TABLE)
            .columns(["object_short_name"])
            .filter(WhereNode::exact("field_short_name", field))
            .order(OrderBy::asc("object_short_name"));
        fetch_all(self.db.as_ref(), &query)
            .await?
            .iter()
            .map(|row| row.get::<String>("object_short_name"))
            .collect()
    }

    /// Statement inserting a field row.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the rules cannot be encoded.
    pub fn insert_field(&self, field: &FieldDefinition) -> SchemataResult<Statement> {
        Ok(self
            .compiler
            .compile_insert(FIELD_TABLE, &field_columns(field, true)?)
            .into())
    }

    /// Statement rewriting a field row; fails the batch if it is gone.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the rules cannot be encoded.
    pub fn update_field(&self, field: &FieldDefinition) -> SchemataResult<Statement> {
        Ok(Statement::from(self.compiler.compile_update(
            FIELD_TABLE,
            &field_columns(field, false)?,
            &WhereNode::exact("short_name", field.short_name.as_str()),
        ))
        .expect_rows(1))
    }

    /// Statement deleting a field row; fails the batch if it is gone.
    pub fn delete_field(&self, name: &str) -> Statement {
        Statement::from(
            self.compiler
                .compile_delete(FIELD_TABLE, &WhereNode::exact("short_name", name)),
        )
        .expect_rows(1)
    }

    // ── Objects ──────────────────────────────────────────────────────

    /// Loads one object definition.
    ///
    /// # Errors
    ///
    /// Propagates backend errors and undecodable rows.
    pub async fn get_object(&self, name: &str) -> SchemataResult<Option<ObjectDefinition>> {
        let query = Query::new(OBJECT_TABLE).filter(WhereNode::exact("short_name", name));
        fetch_all(self.db.as_ref(), &query)
            .await?
            .first()
            .map(object_from_row)
            .transpose()
    }

    /// Loads every object definition, sorted by short name.
    ///
    /// # Errors
    ///
    /// Propagates backend errors and undecodable rows.
    pub async fn list_objects(&self) -> SchemataResult<Vec<ObjectDefinition>> {
        let query = Query::new(OBJECT_TABLE).order(OrderBy::asc("short_name"));
        fetch_all(self.db.as_ref(), &query)
            .await?
            .iter()
            .map(object_from_row)
            .collect()
    }

    /// Statements inserting an object row and its field references.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the definition cannot be encoded.
    pub fn insert_object(&self, object: &ObjectDefinition) -> SchemataResult<Vec<Statement>> {
        let mut statements = vec![self
            .compiler
            .compile_insert(OBJECT_TABLE, &object_columns(object, true)?)
            .into()];
        statements.extend(self.link_rows(object));
        Ok(statements)
    }

    /// Statements rewriting an object row and replacing its field references.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the definition cannot be encoded.
    pub fn update_object(&self, object: &ObjectDefinition) -> SchemataResult<Vec<Statement>> {
        let by_name = WhereNode::exact("short_name", object.short_name.as_str());
        let mut statements = vec![
            Statement::from(self.compiler.compile_update(
                OBJECT_TABLE,
                &object_columns(object, false)?,
                &by_name,
            ))
            .expect_rows(1),
            self.unlink_all(&object.short_name),
        ];
        statements.extend(self.link_rows(object));
        Ok(statements)
    }

    /// Statements deleting an object row and its field references.
    pub fn delete_object(&self, name: &str) -> Vec<Statement> {
        vec![
            self.unlink_all(name),
            Statement::from(
                self.compiler
                    .compile_delete(OBJECT_TABLE, &WhereNode::exact("short_name", name)),
            )
            .expect_rows(1),
        ]
    }

    fn unlink_all(&self, object: &str) -> Statement {
        self.compiler
            .compile_delete(LINK_TABLE, &WhereNode::exact("object_short_name", object))
            .into()
    }

    fn link_rows<'a>(&'a self, object: &'a ObjectDefinition) -> impl Iterator<Item = Statement> + 'a {
        object.field_names().map(move |field| {
            self.compiler
                .compile_insert(
                    LINK_TABLE,
                    &[
                        ("object_short_name".to_string(), Value::from(object.short_name.as_str())),
                        ("field_short_name".to_string(), Value::from(field)),
                    ],
                )
                .into()
        })
    }
}

fn field_columns(field: &FieldDefinition, with_key: bool) -> SchemataResult<Vec<(String, Value)>> {
    let mut columns = Vec::with_capacity(9);
    if with_key {
        columns.push(("short_name".to_string(), Value::from(field.short_name.as_str())));
    }
    columns.extend([
        ("display_name".to_string(), Value::from(field.display_name.as_str())),
        ("description".to_string(), Value::from(field.description.as_str())),
        ("datatype".to_string(), Value::from(field.datatype.as_str())),
        (
            "datatype_properties".to_string(),
            Value::Json(serde_json::Value::Object(field.datatype_properties.clone())),
        ),
        ("mandatory".to_string(), Value::Bool(field.mandatory)),
        (
            "validation_rules".to_string(),
            Value::Json(serde_json::to_value(&field.validation_rules)?),
        ),
    ]);
    if with_key {
        columns.push(("created_at".to_string(), Value::DateTime(field.created_at)));
    }
    columns.push(("updated_at".to_string(), Value::DateTime(field.updated_at)));
    Ok(columns)
}

fn object_columns(object: &ObjectDefinition, with_key: bool) -> SchemataResult<Vec<(String, Value)>> {
    let mut columns = Vec::with_capacity(7);
    if with_key {
        columns.push(("short_name".to_string(), Value::from(object.short_name.as_str())));
    }
    columns.extend([
        ("display_name".to_string(), Value::from(object.display_name.as_str())),
        ("description".to_string(), Value::from(object.description.as_str())),
        ("fields".to_string(), Value::Json(serde_json::to_value(&object.fields)?)),
        (
            "display_properties".to_string(),
            Value::Json(serde_json::to_value(&object.display_properties)?),
        ),
    ]);
    if with_key {
        columns.push(("created_at".to_string(), Value::DateTime(object.created_at)));
    }
    columns.push(("updated_at".to_string(), Value::DateTime(object.updated_at)));
    Ok(columns)
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row, column: &str) -> SchemataResult<T> {
    let raw: serde_json::Value = row.get(column)?;
    serde_json::from_value(raw).map_err(|e| {
        SchemataError::SerializationError(format!("Column '{column}' holds invalid metadata: {e}"))
    })
}

fn field_from_row(row: &Row) -> SchemataResult<FieldDefinition> {
    let datatype: String = row.get("datatype")?;
    Ok(FieldDefinition {
        short_name: row.get("short_name")?,
        display_name: row.get("display_name")?,
        description: row.get("description")?,
        datatype: datatype
            .parse::<Datatype>()
            .map_err(SchemataError::SerializationError)?,
        datatype_properties: json_column(row, "datatype_properties")?,
        mandatory: row.get("mandatory")?,
        validation_rules: json_column(row, "validation_rules")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn object_from_row(row: &Row) -> SchemataResult<ObjectDefinition> {
    Ok(ObjectDefinition {
        short_name: row.get("short_name")?,
        display_name: row.get("display_name")?,
        description: row.get("description")?,
        fields: json_column(row, "fields")?,
        display_properties: json_column(row, "display_properties")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
