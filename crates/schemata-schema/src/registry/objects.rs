use super::SchemaContext;
use crate::datatype::Datatype;
use crate::field::FieldDefinition;
use crate::locks::{field_key, object_key};
use crate::object::{ObjectDefinition, ObjectDraft, ObjectPatch, INVALID_OBJECT};
use crate::schema::ObjectSchema;
use schemata_core::logging::operation_span;
use schemata_core::{FieldError, SchemataError, SchemataResult, ValidationError};
use std::sync::Arc;
use tracing::Instrument;

/// Registers, reads, updates and deletes object definitions, provisioning
/// their instance tables in the same transaction.
#[derive(Debug, Clone)]
pub struct ObjectRegistry {
    ctx: Arc<SchemaContext>,
}

impl ObjectRegistry {
    pub(crate) fn new(ctx: Arc<SchemaContext>) -> Self {
        Self { ctx }
    }

    /// The shared schema context.
    pub fn context(&self) -> &Arc<SchemaContext> {
        &self.ctx
    }

    /// Registers an object and creates its instance table.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for invalid names, duplicated or unknown fields,
    ///   invalid display properties or a reference to a missing object
    /// - `Duplicate` if the short name is taken
    /// - storage errors, in which case neither metadata nor table exist
    pub async fn register(&self, draft: ObjectDraft) -> SchemataResult<ObjectDefinition> {
        let name = draft.short_name.clone().unwrap_or_default();
        async move {
            let object = draft.into_definition(crate::now())?;
            let _guard = self.ctx.locks.lock(lock_keys(&object, None)).await;
            if self.ctx.store.get_object(&object.short_name).await?.is_some() {
                return Err(SchemataError::Duplicate(format!(
                    "Object '{}' already exists",
                    object.short_name
                )));
            }
            let schema = self.resolve_checked(&object).await?;

            let mut batch = self.ctx.store.insert_object(&object)?;
            batch.extend(self.ctx.provisioner.provision(&schema));
            self.ctx.cache.evict([&object.short_name]);
            let result = self.ctx.apply("register_object", &object.short_name, batch).await;
            self.ctx.cache.evict([&object.short_name]);
            result?;
            tracing::info!(
                object = %object.short_name,
                fields = object.fields.len(),
                "object registered"
            );
            Ok(object)
        }
        .instrument(operation_span("register_object", &name))
        .await
    }

    /// Returns the named object.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown name.
    pub async fn get(&self, name: &str) -> SchemataResult<ObjectDefinition> {
        self.ctx
            .store
            .get_object(name)
            .await?
            .ok_or_else(|| not_found(name))
    }

    /// Returns every object, sorted by short name.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn list(&self) -> SchemataResult<Vec<ObjectDefinition>> {
        self.ctx.store.list_objects().await
    }

    /// Applies a partial update and reconciles the instance table.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown name
    /// - `ValidationError` as for [`register`](Self::register), or if the
    ///   patch renames the object
    /// - storage errors, in which case nothing changed
    pub async fn update(&self, name: &str, patch: ObjectPatch) -> SchemataResult<ObjectDefinition> {
        async move {
            let before = self.get(name).await?;
            let _guard = self
                .ctx
                .locks
                .lock(lock_keys(&before, patch.fields.as_deref().map(field_names)))
                .await;
            // Re-read under the lock; a concurrent update may have landed.
            let current = self.get(name).await?;
            let updated = patch.apply(&current, crate::now())?;
            let schema = self.resolve_checked(&updated).await?;

            let mut batch = self.ctx.store.update_object(&updated)?;
            batch.extend(self.ctx.provisioner.reconcile(self.ctx.db.as_ref(), &schema).await?);
            self.ctx.cache.evict([name]);
            let result = self.ctx.apply("update_object", name, batch).await;
            self.ctx.cache.evict([name]);
            result?;
            tracing::info!(object = name, fields = updated.fields.len(), "object updated");
            Ok(updated)
        }
        .instrument(operation_span("update_object", name))
        .await
    }

    /// Deletes an object, dropping its instance table and every instance.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown name
    /// - storage errors, in which case nothing changed
    pub async fn delete(&self, name: &str) -> SchemataResult<()> {
        async move {
            let _guard = self.ctx.locks.lock([object_key(name)]).await;
            self.get(name).await?;

            let mut batch = self.ctx.provisioner.deprovision(name);
            batch.extend(self.ctx.store.delete_object(name));
            self.ctx.cache.evict([name]);
            let result = self.ctx.apply("delete_object", name, batch).await;
            self.ctx.cache.evict([name]);
            result?;
            tracing::info!(object = name, "object deleted");
            Ok(())
        }
        .instrument(operation_span("delete_object", name))
        .await
    }

    /// Returns the resolved schema of `name`, from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown name.
    pub async fn schema(&self, name: &str) -> SchemataResult<Arc<ObjectSchema>> {
        if let Some(schema) = self.ctx.cache.get(name) {
            return Ok(schema);
        }
        let loaded_at = self.ctx.cache.generation();
        let object = self.get(name).await?;
        let names: Vec<&str> = object.field_names().collect();
        let fields = self.ctx.store.fields_named(&names).await?;
        let schema = Arc::new(ObjectSchema::resolve(object, |n| fields.get(n))?);
        if self.ctx.cache.insert_if_current(Arc::clone(&schema), loaded_at) {
            tracing::trace!(object = name, "schema cached");
        }
        Ok(schema)
    }

    /// Checks that every referenced field exists, that reference fields
    /// point at existing objects and that no multi-select field is
    /// searchable, then resolves the schema.
    async fn resolve_checked(&self, object: &ObjectDefinition) -> SchemataResult<ObjectSchema> {
        let names: Vec<&str> = object.field_names().collect();
        let fields = self.ctx.store.fields_named(&names).await?;

        let mut errors = Vec::new();
        for (i, field_ref) in object.fields.iter().enumerate() {
            let member = format!("fields[{i}].fieldShortName");
            match fields.get(&field_ref.field_short_name) {
                None => errors.push(FieldError::new(
                    member,
                    "unknown",
                    format!("Field '{}' does not exist.", field_ref.field_short_name),
                )),
                Some(field) => {
                    if let Some(problem) = self.reference_problem(object, field).await? {
                        errors.push(FieldError::new(member, "invalid_reference", problem));
                    }
                }
            }
        }
        // Multi-select values are stored as JSON text, which search would
        // match on its punctuation.
        for (i, name) in object.display_properties.searchable_fields.iter().enumerate() {
            if fields.get(name).is_some_and(|f| f.datatype == Datatype::MultiSelect) {
                errors.push(FieldError::new(
                    format!("displayProperties.searchableFields[{i}]"),
                    "not_searchable",
                    format!("Field '{name}' is a multi_select field and cannot be searched."),
                ));
            }
        }
        ValidationError::check(INVALID_OBJECT, errors)?;
        ObjectSchema::resolve(object.clone(), |n| fields.get(n))
    }

    async fn reference_problem(
        &self,
        object: &ObjectDefinition,
        field: &FieldDefinition,
    ) -> SchemataResult<Option<String>> {
        let Some(target) = field.reference_target() else {
            return Ok(None);
        };
        if target == object.short_name || self.ctx.store.get_object(target).await?.is_some() {
            return Ok(None);
        }
        Ok(Some(format!(
            "Field '{}' references object '{target}', which does not exist.",
            field.short_name
        )))
    }
}

fn field_names(fields: &[crate::object::ObjectFieldRef]) -> Vec<String> {
    fields.iter().map(|f| f.field_short_name.clone()).collect()
}

fn lock_keys(object: &ObjectDefinition, extra_fields: Option<Vec<String>>) -> Vec<String> {
    let mut keys = vec![object_key(&object.short_name)];
    keys.extend(object.field_names().map(field_key));
    keys.extend(extra_fields.unwrap_or_default().iter().map(|f| field_key(f)));
    keys
}

fn not_found(name: &str) -> SchemataError {
    SchemataError::NotFound(format!("Object '{name}' not found"))
}
