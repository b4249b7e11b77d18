//! The generic instance engine.
//!
//! One code path serves every object type: the resolved schema decides the
//! columns, the validation, the sortable names and the search scope.

use crate::params::{ListParams, PageLimits};
use crate::response::{Instance, InstancePage};
use chrono::Utc;
use schemata_core::logging::operation_span;
use schemata_core::{FieldError, SchemataError, SchemataResult, Settings, ValidationError};
use schemata_db::executor::{fetch_all, fetch_count, row_exists};
use schemata_db::{DbExecutor, Lookup, OrderBy, Query, SqlCompiler, Value, WhereNode};
use schemata_schema::{ObjectRegistry, ObjectSchema};
use schemata_validation::{clean_filter, validate_payload, CleanedValues, ValidationMode};
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::Instrument;

/// List, get, create, update and delete for instances of any object type.
#[derive(Clone)]
pub struct InstanceEngine {
    objects: ObjectRegistry,
    db: Arc<dyn DbExecutor>,
    limits: PageLimits,
    compiler: SqlCompiler,
}

impl std::fmt::Debug for InstanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceEngine")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl InstanceEngine {
    /// Creates an engine over the registry's executor with default paging.
    pub fn new(objects: ObjectRegistry) -> Self {
        let db = Arc::clone(objects.context().db());
        Self {
            objects,
            db,
            limits: PageLimits::default(),
            compiler: SqlCompiler::new(),
        }
    }

    /// Creates an engine taking page sizes from `settings`.
    pub fn from_settings(objects: ObjectRegistry, settings: &Settings) -> Self {
        Self::new(objects).with_limits(PageLimits {
            default_page_size: settings.schemata.default_page_size as u64,
            max_page_size: settings.schemata.max_page_size as u64,
        })
    }

    /// Replaces the page size limits.
    #[must_use]
    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The page size limits in effect.
    pub const fn limits(&self) -> PageLimits {
        self.limits
    }

    /// Lists instances with filtering, search, sorting and pagination.
    ///
    /// `id ASC` is always appended as a tie-breaker so paging is
    /// deterministic.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown object type
    /// - `ValidationError` for bad paging, an unknown sort column or an
    ///   unknown or uncoercible filter
    pub async fn list(&self, object: &str, params: &ListParams) -> SchemataResult<InstancePage> {
        async move {
            let schema = self.objects.schema(object).await?;
            let paging = params.paging(self.limits)?;
            let (sort_by, default_order) = schema.default_sort();
            let sort_by = params.sort_by.as_deref().unwrap_or(sort_by);
            if !schema.is_sortable(sort_by) {
                return Err(ValidationError::field(
                    "sortBy",
                    "invalid",
                    format!("Cannot sort by '{sort_by}'."),
                )
                .into());
            }
            let descending = params.sort_order.unwrap_or(default_order).is_descending();

            let mut query = Query::new(schema.name()).columns(schema.columns());
            let conditions = list_conditions(&schema, params)?;
            if !conditions.is_empty() {
                query = query.filter(WhereNode::And(conditions));
            }
            let count = fetch_count(self.db.as_ref(), &query).await?;

            query = query.order(if descending {
                OrderBy::desc(sort_by)
            } else {
                OrderBy::asc(sort_by)
            });
            if sort_by != "id" {
                query = query.order(OrderBy::asc("id"));
            }
            query = query.slice(paging.page_size, paging.offset());

            let results = fetch_all(self.db.as_ref(), &query)
                .await?
                .iter()
                .map(|row| Instance::from_row(&schema, row))
                .collect::<SchemataResult<Vec<_>>>()?;
            tracing::debug!(
                object,
                count,
                page = paging.page,
                returned = results.len(),
                "listed instances"
            );
            Ok(InstancePage::new(results, count, paging.page, paging.page_size))
        }
        .instrument(operation_span("list_instances", object))
        .await
    }

    /// Returns one instance.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown object type or id.
    pub async fn get(&self, object: &str, id: i64) -> SchemataResult<Instance> {
        let schema = self.objects.schema(object).await?;
        self.fetch(&schema, id).await
    }

    /// Validates `payload`, inserts it and returns the stored instance.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown object type
    /// - `ValidationError` for invalid values or references to missing
    ///   records
    pub async fn create(&self, object: &str, payload: &Json) -> SchemataResult<Instance> {
        async move {
            let schema = self.objects.schema(object).await?;
            let mut values = validate_payload(&schema, payload, ValidationMode::Create)?;
            self.check_references(&schema, &values).await?;

            let now = Utc::now();
            values.push(("created_at".to_string(), Value::DateTime(now)));
            values.push(("updated_at".to_string(), Value::DateTime(now)));
            let (sql, params) = self.compiler.compile_insert(schema.name(), &values);
            let id = self.db.insert_returning_id(&sql, &params).await?;
            tracing::info!(object, id, "instance created");
            self.fetch(&schema, id).await
        }
        .instrument(operation_span("create_instance", object))
        .await
    }

    /// Applies a partial update and returns the stored instance.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown object type or id
    /// - `ValidationError` for invalid values or references to missing
    ///   records
    pub async fn update(&self, object: &str, id: i64, payload: &Json) -> SchemataResult<Instance> {
        async move {
            let schema = self.objects.schema(object).await?;
            if !row_exists(self.db.as_ref(), schema.name(), id).await? {
                return Err(instance_not_found(object, id));
            }
            let mut values = validate_payload(&schema, payload, ValidationMode::Update)?;
            self.check_references(&schema, &values).await?;

            values.push(("updated_at".to_string(), Value::DateTime(Utc::now())));
            let (sql, params) =
                self.compiler
                    .compile_update(schema.name(), &values, &WhereNode::exact("id", id));
            if self.db.execute_sql(&sql, &params).await? == 0 {
                return Err(instance_not_found(object, id));
            }
            tracing::info!(object, id, fields = values.len() - 1, "instance updated");
            self.fetch(&schema, id).await
        }
        .instrument(operation_span("update_instance", object))
        .await
    }

    /// Deletes one instance. Returns `true` when a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown object type or id.
    pub async fn delete(&self, object: &str, id: i64) -> SchemataResult<bool> {
        async move {
            let schema = self.objects.schema(object).await?;
            let (sql, params) = self
                .compiler
                .compile_delete(schema.name(), &WhereNode::exact("id", id));
            if self.db.execute_sql(&sql, &params).await? == 0 {
                return Err(instance_not_found(object, id));
            }
            tracing::info!(object, id, "instance deleted");
            Ok(true)
        }
        .instrument(operation_span("delete_instance", object))
        .await
    }

    async fn fetch(&self, schema: &ObjectSchema, id: i64) -> SchemataResult<Instance> {
        let query = Query::new(schema.name())
            .columns(schema.columns())
            .filter(WhereNode::exact("id", id));
        let rows = fetch_all(self.db.as_ref(), &query).await?;
        let row = rows
            .first()
            .ok_or_else(|| instance_not_found(schema.name(), id))?;
        Instance::from_row(schema, row)
    }

    /// Present reference values must name existing records of the target
    /// object type.
    async fn check_references(
        &self,
        schema: &ObjectSchema,
        values: &CleanedValues,
    ) -> SchemataResult<()> {
        let mut errors = Vec::new();
        for (name, value) in values {
            let Value::Int(id) = value else { continue };
            let Some(target) = schema
                .field(name)
                .and_then(|f| f.definition.reference_target())
            else {
                continue;
            };
            let exists = match self.objects.schema(target).await {
                Ok(target_schema) => {
                    row_exists(self.db.as_ref(), target_schema.name(), *id).await?
                }
                Err(SchemataError::NotFound(_)) => false,
                Err(e) => return Err(e),
            };
            if !exists {
                errors.push(FieldError::new(
                    name.as_str(),
                    "invalid_reference",
                    format!("Record {id} of '{target}' does not exist."),
                ));
            }
        }
        ValidationError::check("Invalid payload.", errors)?;
        Ok(())
    }
}

/// WHERE conditions for search and filters.
fn list_conditions(schema: &ObjectSchema, params: &ListParams) -> SchemataResult<Vec<WhereNode>> {
    let mut conditions = Vec::new();

    if let Some(term) = params.search_term() {
        // No searchable fields means an empty OR, which matches nothing.
        conditions.push(WhereNode::Or(
            schema
                .searchable_fields()
                .iter()
                .map(|f| WhereNode::condition(f.as_str(), Lookup::IContains(term.to_string())))
                .collect(),
        ));
    }

    let mut errors = Vec::new();
    for (key, raw) in &params.filters {
        match filter_condition(schema, key, raw) {
            Ok(node) => conditions.push(node),
            Err(error) => errors.push(error),
        }
    }
    ValidationError::check("Invalid filters.", errors)?;
    Ok(conditions)
}

/// An exact-match condition. `null` and `""` match absent values; a
/// multi-select filter must equal the whole stored option list.
fn filter_condition(schema: &ObjectSchema, key: &str, raw: &Json) -> Result<WhereNode, FieldError> {
    let field = match schema.field(key) {
        Some(field) => Some(field),
        None if key == "id" => None,
        None => {
            return Err(FieldError::new(
                key,
                "unknown",
                format!("'{key}' is not a field of this object."),
            ))
        }
    };
    if raw.is_null() || raw.as_str() == Some("") {
        return Ok(WhereNode::condition(key, Lookup::IsNull(true)));
    }
    let value = match field {
        Some(field) => clean_filter(&field.definition, raw)
            .map_err(|invalid| FieldError::new(key, invalid.code, invalid.message))?,
        None => match raw {
            Json::Number(n) => n.as_i64(),
            Json::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .map(Value::Int)
        .ok_or_else(|| FieldError::new(key, "invalid", "Enter a whole number."))?,
    };
    Ok(WhereNode::exact(key, value))
}

fn instance_not_found(object: &str, id: i64) -> SchemataError {
    SchemataError::NotFound(format!("Instance {id} of '{object}' not found"))
}
