//! Schema provisioning: keeps instance tables in step with object metadata.
//!
//! The [`SchemaEditor`] trait generates DDL for one SQL dialect. The
//! [`Provisioner`] turns object schemas into statement plans that the
//! registries run in the same transaction as their metadata writes, so a
//! failed DDL statement leaves the metadata untouched and vice versa.

use crate::datatype::Datatype;
use crate::field::FieldDefinition;
use crate::schema::ObjectSchema;
use schemata_core::SchemataResult;
use schemata_db::query::quote_ident;
use schemata_db::{DbExecutor, Statement};
use std::collections::HashSet;
use std::sync::Arc;

/// Generates DDL SQL for instance tables.
///
/// Each method returns `Vec<String>` because some dialects need more than one
/// statement for an operation.
pub trait SchemaEditor: Send + Sync {
    /// Generates `CREATE TABLE` DDL for an instance table with the given
    /// field columns.
    fn create_table(&self, table: &str, fields: &[&FieldDefinition]) -> Vec<String>;

    /// Generates `DROP TABLE` DDL.
    fn drop_table(&self, table: &str) -> Vec<String>;

    /// Generates `ALTER TABLE ... ADD COLUMN` DDL.
    fn add_column(&self, table: &str, field: &FieldDefinition) -> Vec<String>;

    /// Generates `ALTER TABLE ... DROP COLUMN` DDL.
    fn drop_column(&self, table: &str, column: &str) -> Vec<String>;

    /// Generates the SQL fragment for a field column (type and constraints).
    fn column_sql(&self, datatype: Datatype) -> String;
}

/// SQLite schema editor.
///
/// Field columns are always nullable so they can be added to tables that
/// already hold rows; requiredness is enforced by the validation engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteSchemaEditor;

impl SchemaEditor for SqliteSchemaEditor {
    fn create_table(&self, table: &str, fields: &[&FieldDefinition]) -> Vec<String> {
        let mut columns = vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident("id"))];
        for field in fields {
            columns.push(format!(
                "{} {}",
                quote_ident(&field.short_name),
                self.column_sql(field.datatype)
            ));
        }
        columns.push(format!("{} TEXT NOT NULL", quote_ident("created_at")));
        columns.push(format!("{} TEXT NOT NULL", quote_ident("updated_at")));
        vec![format!(
            "CREATE TABLE {} ({})",
            quote_ident(table),
            columns.join(", ")
        )]
    }

    fn drop_table(&self, table: &str) -> Vec<String> {
        vec![format!("DROP TABLE IF EXISTS {}", quote_ident(table))]
    }

    fn add_column(&self, table: &str, field: &FieldDefinition) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table),
            quote_ident(&field.short_name),
            self.column_sql(field.datatype)
        )]
    }

    fn drop_column(&self, table: &str, column: &str) -> Vec<String> {
        // Requires SQLite 3.35+, which the bundled library provides.
        vec![format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_ident(table),
            quote_ident(column)
        )]
    }

    fn column_sql(&self, datatype: Datatype) -> String {
        format!("{} NULL", datatype.sql_type())
    }
}

/// Builds the storage statement plans for object registration, update and
/// deletion.
#[derive(Clone)]
pub struct Provisioner {
    editor: Arc<dyn SchemaEditor>,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner").finish_non_exhaustive()
    }
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new(SqliteSchemaEditor)
    }
}

impl Provisioner {
    /// Creates a provisioner generating DDL with `editor`.
    pub fn new(editor: impl SchemaEditor + 'static) -> Self {
        Self {
            editor: Arc::new(editor),
        }
    }

    /// Plan creating the instance table for `schema`.
    pub fn provision(&self, schema: &ObjectSchema) -> Vec<Statement> {
        let fields: Vec<&FieldDefinition> = schema.fields.iter().map(|f| &f.definition).collect();
        let plan = into_statements(self.editor.create_table(schema.name(), &fields));
        log_plan("provision", schema.name(), &plan);
        plan
    }

    /// Plan bringing the live instance table in line with `schema`.
    ///
    /// The plan is computed from the table's current columns, so running it
    /// twice is a no-op the second time. Columns for newly referenced fields
    /// are added; columns of fields no longer referenced are dropped.
    /// Existing column types are never changed. A missing table is
    /// provisioned from scratch.
    ///
    /// # Errors
    ///
    /// Propagates backend errors from column introspection.
    pub async fn reconcile(
        &self,
        db: &dyn DbExecutor,
        schema: &ObjectSchema,
    ) -> SchemataResult<Vec<Statement>> {
        let live = db.table_columns(schema.name()).await?;
        if live.is_empty() {
            tracing::warn!(object = schema.name(), "instance table missing, provisioning");
            return Ok(self.provision(schema));
        }
        let plan = self.plan_reconcile(&live, schema);
        log_plan("reconcile", schema.name(), &plan);
        Ok(plan)
    }

    /// Computes the reconcile plan against a known live column list.
    pub fn plan_reconcile(&self, live: &[String], schema: &ObjectSchema) -> Vec<Statement> {
        let live_set: HashSet<&str> = live.iter().map(String::as_str).collect();
        let wanted: HashSet<&str> = schema.fields.iter().map(|f| f.name()).collect();
        let table = schema.name();

        let mut ddl = Vec::new();
        for field in &schema.fields {
            if !live_set.contains(field.name()) {
                ddl.extend(self.editor.add_column(table, &field.definition));
            }
        }
        for column in live {
            let system = crate::identifier::SYSTEM_COLUMNS.contains(&column.as_str());
            if !system && !wanted.contains(column.as_str()) {
                ddl.extend(self.editor.drop_column(table, column));
            }
        }
        into_statements(ddl)
    }

    /// Plan dropping the instance table of `object`.
    pub fn deprovision(&self, object: &str) -> Vec<Statement> {
        let plan = into_statements(self.editor.drop_table(object));
        log_plan("deprovision", object, &plan);
        plan
    }
}

fn into_statements(ddl: Vec<String>) -> Vec<Statement> {
    ddl.into_iter().map(Statement::raw).collect()
}

fn log_plan(action: &str, object: &str, plan: &[Statement]) {
    for statement in plan {
        tracing::debug!(action, object, sql = %statement.sql, "planned DDL");
    }
}
