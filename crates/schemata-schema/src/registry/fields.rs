use super::SchemaContext;
use crate::field::{FieldDefinition, FieldDraft, FieldPatch};
use crate::locks::field_key;
use schemata_core::logging::operation_span;
use schemata_core::{FieldError, SchemataError, SchemataResult, ValidationError};
use std::sync::Arc;
use tracing::Instrument;

/// Registers, reads, updates and deletes field definitions.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    ctx: Arc<SchemaContext>,
}

impl FieldRegistry {
    pub(crate) fn new(ctx: Arc<SchemaContext>) -> Self {
        Self { ctx }
    }

    /// Registers a new field and returns the stored definition.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a missing or invalid name, display name,
    ///   datatype, datatype properties or rule
    /// - `Duplicate` if the short name is taken
    pub async fn register(&self, draft: FieldDraft) -> SchemataResult<FieldDefinition> {
        let name = draft.short_name.clone().unwrap_or_default();
        async move {
            let field = draft.into_definition(crate::now())?;
            let _guard = self.ctx.locks.lock([field_key(&field.short_name)]).await;
            if self.ctx.store.get_field(&field.short_name).await?.is_some() {
                return Err(SchemataError::Duplicate(format!(
                    "Field '{}' already exists",
                    field.short_name
                )));
            }
            let insert = self.ctx.store.insert_field(&field)?;
            self.ctx.apply("register_field", &field.short_name, vec![insert]).await?;
            tracing::info!(field = %field.short_name, datatype = %field.datatype, "field registered");
            Ok(field)
        }
        .instrument(operation_span("register_field", &name))
        .await
    }

    /// Returns the named field.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown name.
    pub async fn get(&self, name: &str) -> SchemataResult<FieldDefinition> {
        self.ctx
            .store
            .get_field(name)
            .await?
            .ok_or_else(|| not_found(name))
    }

    /// Returns every field, sorted by short name.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn list(&self) -> SchemataResult<Vec<FieldDefinition>> {
        self.ctx.store.list_fields().await
    }

    /// Applies a partial update and returns the stored definition.
    ///
    /// Cached schemas of every object using the field are evicted.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown name
    /// - `ValidationError` if the patch renames the field or the result is
    ///   invalid
    /// - `Constraint` if the datatype changes while objects use the field
    pub async fn update(&self, name: &str, patch: FieldPatch) -> SchemataResult<FieldDefinition> {
        async move {
            let _guard = self.ctx.locks.lock([field_key(name)]).await;
            let current = self.get(name).await?;
            let updated = patch.apply(&current, crate::now())?;
            let users = self.ctx.store.objects_using_field(name).await?;

            if !users.is_empty() {
                if updated.datatype != current.datatype {
                    return Err(SchemataError::Constraint(format!(
                        "Cannot change the datatype of field '{name}' while it is used by: {}",
                        users.join(", ")
                    )));
                }
                self.check_reference_target(&updated).await?;
            }

            self.ctx.cache.evict(&users);
            let update = self.ctx.store.update_field(&updated)?;
            let result = self.ctx.apply("update_field", name, vec![update]).await;
            self.ctx.cache.evict(&users);
            result?;
            tracing::info!(field = name, evicted = users.len(), "field updated");
            Ok(updated)
        }
        .instrument(operation_span("update_field", name))
        .await
    }

    /// Deletes an unreferenced field.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown name
    /// - `Constraint` while any object references the field
    pub async fn delete(&self, name: &str) -> SchemataResult<()> {
        async move {
            let _guard = self.ctx.locks.lock([field_key(name)]).await;
            self.get(name).await?;
            let users = self.ctx.store.objects_using_field(name).await?;
            if !users.is_empty() {
                return Err(SchemataError::Constraint(format!(
                    "Field '{name}' is used by: {}",
                    users.join(", ")
                )));
            }
            self.ctx
                .apply("delete_field", name, vec![self.ctx.store.delete_field(name)])
                .await?;
            tracing::info!(field = name, "field deleted");
            Ok(())
        }
        .instrument(operation_span("delete_field", name))
        .await
    }

    /// A reference field in use must keep pointing at an existing object.
    async fn check_reference_target(&self, field: &FieldDefinition) -> SchemataResult<()> {
        let Some(target) = field.reference_target() else {
            return Ok(());
        };
        if self.ctx.store.get_object(target).await?.is_some() {
            return Ok(());
        }
        Err(ValidationError::with_field_errors(vec![FieldError::new(
            "datatypeProperties.object",
            "invalid_reference",
            format!("Object '{target}' does not exist."),
        )])
        .into())
    }
}

fn not_found(name: &str) -> SchemataError {
    SchemataError::NotFound(format!("Field '{name}' not found"))
}
